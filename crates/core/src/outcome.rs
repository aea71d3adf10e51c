//! 탐지 모듈 실행 결과
//!
//! [`DetectionOutcome`]은 한 파일에 대해 한 모듈을 실행한 결과이며, 생성 후 변경되지 않습니다.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{Severity, round_to};

/// `ai` 모듈 예측값에서 악성 확률을 담는 키
pub const MALICIOUS_PROBABILITY_KEY: &str = "malicious_probability";

/// 탐지 모듈 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    /// 시그니처 매칭
    Static,
    /// 신경망 추론
    Ai,
    /// 이벤트 로그 규칙 헌팅
    Dynamic,
}

impl ModuleKind {
    /// 모든 모듈 종류
    pub const ALL: [ModuleKind; 3] = [Self::Static, Self::Ai, Self::Dynamic];

    /// 모듈 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Ai => "ai",
            Self::Dynamic => "dynamic",
        }
    }

    /// 모듈 이름을 파싱합니다. 알 수 없는 이름은 `None`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "static" => Some(Self::Static),
            "ai" => Some(Self::Ai),
            "dynamic" => Some(Self::Dynamic),
            _ => None,
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 모듈 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleStatus {
    Success,
    Failed,
    Skipped,
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// 구조화된 매칭 항목
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// 규칙 ID (시그니처 모듈은 규칙 이름)
    pub rule_id: String,
    /// 규칙 제목
    pub title: String,
    /// 심각도 (규칙에 없으면 `None`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    /// 매칭된 이벤트 ID (로그 규칙만)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<u32>,
}

impl MatchRecord {
    /// 이름만 있는 매칭 항목 (시그니처 규칙)
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            rule_id: name.clone(),
            title: name,
            severity: None,
            event_id: None,
        }
    }
}

/// 모듈 하나의 실행 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionOutcome {
    /// 모듈 이름 (알 수 없는 모듈은 요청된 이름 그대로)
    pub module: String,
    /// 실행 상태
    pub status: ModuleStatus,
    /// 악성 여부 (`None` = 판단 불가)
    pub is_malicious: Option<bool>,
    /// 설명 메시지
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// 매칭 목록 (순서 유지)
    #[serde(default)]
    pub matches: Vec<MatchRecord>,
    /// 구조화된 예측값
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction: Option<Map<String, Value>>,
    /// 실행 시간 (밀리초, 소수점 둘째 자리)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
}

impl DetectionOutcome {
    /// 성공 결과
    pub fn success(module: impl Into<String>, is_malicious: bool) -> Self {
        Self {
            module: module.into(),
            status: ModuleStatus::Success,
            is_malicious: Some(is_malicious),
            message: None,
            matches: Vec::new(),
            prediction: None,
            duration_ms: None,
        }
    }

    /// 실패 결과 (진단 메시지 포함)
    pub fn failed(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            status: ModuleStatus::Failed,
            is_malicious: None,
            message: Some(message.into()),
            matches: Vec::new(),
            prediction: None,
            duration_ms: None,
        }
    }

    /// 건너뜀 결과 (적용 불가 조합)
    pub fn skipped(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            status: ModuleStatus::Skipped,
            is_malicious: None,
            message: Some(message.into()),
            matches: Vec::new(),
            prediction: None,
            duration_ms: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_matches(mut self, matches: Vec<MatchRecord>) -> Self {
        self.matches = matches;
        self
    }

    pub fn with_prediction(mut self, prediction: Map<String, Value>) -> Self {
        self.prediction = Some(prediction);
        self
    }

    /// 실행 시간을 기록합니다 (소수점 둘째 자리 반올림).
    pub fn with_duration(mut self, elapsed: std::time::Duration) -> Self {
        self.duration_ms = Some(round_to(elapsed.as_secs_f64() * 1000.0, 2));
        self
    }

    /// 예측값에 담긴 숫자형 악성 확률
    pub fn malicious_probability(&self) -> Option<f64> {
        self.prediction
            .as_ref()?
            .get(MALICIOUS_PROBABILITY_KEY)?
            .as_f64()
    }

    pub fn is_skipped(&self) -> bool {
        self.status == ModuleStatus::Skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn module_kind_parse_is_case_insensitive() {
        assert_eq!(ModuleKind::parse("Static"), Some(ModuleKind::Static));
        assert_eq!(ModuleKind::parse(" ai "), Some(ModuleKind::Ai));
        assert_eq!(ModuleKind::parse("sandbox"), None);
    }

    #[test]
    fn failed_outcome_has_unknown_verdict() {
        let outcome = DetectionOutcome::failed("static", "yara not found");
        assert_eq!(outcome.status, ModuleStatus::Failed);
        assert_eq!(outcome.is_malicious, None);
        assert_eq!(outcome.message.as_deref(), Some("yara not found"));
    }

    #[test]
    fn duration_is_rounded_to_two_places() {
        let outcome =
            DetectionOutcome::success("ai", false).with_duration(Duration::from_micros(12_346));
        assert_eq!(outcome.duration_ms, Some(12.35));
    }

    #[test]
    fn malicious_probability_reads_numeric_prediction() {
        let mut prediction = Map::new();
        prediction.insert(MALICIOUS_PROBABILITY_KEY.to_owned(), Value::from(0.0));
        let outcome = DetectionOutcome::success("ai", false).with_prediction(prediction);
        assert_eq!(outcome.malicious_probability(), Some(0.0));
    }

    #[test]
    fn malicious_probability_ignores_non_numeric() {
        let mut prediction = Map::new();
        prediction.insert(MALICIOUS_PROBABILITY_KEY.to_owned(), Value::from("high"));
        let outcome = DetectionOutcome::success("ai", true).with_prediction(prediction);
        assert_eq!(outcome.malicious_probability(), None);
    }

    #[test]
    fn outcome_serializes_lowercase_status() {
        let outcome = DetectionOutcome::skipped("dynamic", "not applicable");
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "skipped");
        assert_eq!(json["is_malicious"], Value::Null);
        assert!(json.get("prediction").is_none());
    }
}
