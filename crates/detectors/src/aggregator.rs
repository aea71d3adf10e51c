//! 판정 집계 -- 모듈 결과 목록 → 파일 하나의 판정
//!
//! 판정은 OR 집계입니다. 한 모듈이라도 악성이라고 하면 악성이며,
//! 정밀도보다 재현율을 우선합니다. 평균이나 가중치는 사용하지 않습니다.
//! `skipped` 결과와 판단 불가(`is_malicious = None`) 결과는 판정에 기여하지 않습니다.
//!
//! 점수는 `ai` 모듈 예측값의 `malicious_probability`를 그대로 노출하며,
//! 다른 모듈의 신뢰도는 점수에 반영되지 않습니다.

use maltrace_core::outcome::{DetectionOutcome, ModuleKind};
use serde::{Deserialize, Serialize};

/// 파일 하나의 판정
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// 악성 여부
    pub malicious: bool,
    /// `ai` 모듈의 악성 확률 (없으면 `None`)
    pub score: Option<f64>,
}

impl Verdict {
    /// `"malicious"` 또는 `"benign"`
    pub fn label(&self) -> &'static str {
        if self.malicious { "malicious" } else { "benign" }
    }
}

/// 모듈 결과들을 하나의 판정으로 합칩니다.
pub fn combine(outcomes: &[DetectionOutcome]) -> Verdict {
    let malicious = outcomes
        .iter()
        .filter(|o| !o.is_skipped())
        .any(|o| o.is_malicious == Some(true));

    // 같은 모듈이 여러 번 요청되면 마지막 결과가 남습니다.
    let score = outcomes
        .iter()
        .filter(|o| o.module == ModuleKind::Ai.as_str())
        .filter_map(DetectionOutcome::malicious_probability)
        .next_back();

    Verdict { malicious, score }
}
