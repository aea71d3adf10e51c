//! static / ai 탐지기 설정
//!
//! core의 [`StaticScanConfig`](maltrace_core::config::StaticScanConfig),
//! [`AiConfig`](maltrace_core::config::AiConfig)에서 파생됩니다.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::DetectorError;

/// 시그니처 스캐너 설정
#[derive(Debug, Clone)]
pub struct SignatureConfig {
    /// 스캐너 실행 파일
    pub scanner_path: String,
    /// 컴파일된 규칙 번들 후보 (처음 존재하는 것을 사용)
    pub compiled_rules: Vec<PathBuf>,
    /// 스캐너 타임아웃
    pub timeout: Duration,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self::from_core(&maltrace_core::config::StaticScanConfig::default())
    }
}

impl SignatureConfig {
    pub fn from_core(core: &maltrace_core::config::StaticScanConfig) -> Self {
        Self {
            scanner_path: core.scanner_path.clone(),
            compiled_rules: core.compiled_rules.iter().map(PathBuf::from).collect(),
            timeout: Duration::from_secs(core.timeout_secs),
        }
    }

    pub fn validate(&self) -> Result<(), DetectorError> {
        if self.scanner_path.trim().is_empty() {
            return Err(DetectorError::Config {
                field: "static.scanner_path".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }
        if self.timeout.is_zero() {
            return Err(DetectorError::Config {
                field: "static.timeout_secs".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }
        Ok(())
    }
}

/// 추론 탐지기 설정
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    /// 추론 엔진 프로그램 (빈 문자열 = 미설정)
    pub command: String,
    /// 추론 엔진 인자
    pub args: Vec<String>,
    /// 읽을 최대 바이트 수
    pub max_input_bytes: usize,
    /// 악성 판정 임계값 (P(악성) > threshold)
    pub threshold: f64,
    /// 추론 타임아웃
    pub timeout: Duration,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self::from_core(&maltrace_core::config::AiConfig::default())
    }
}

impl InferenceConfig {
    pub fn from_core(core: &maltrace_core::config::AiConfig) -> Self {
        Self {
            command: core.command.clone(),
            args: core.args.clone(),
            max_input_bytes: core.max_input_bytes,
            threshold: core.threshold,
            timeout: Duration::from_secs(core.timeout_secs),
        }
    }

    pub fn validate(&self) -> Result<(), DetectorError> {
        if self.max_input_bytes == 0 {
            return Err(DetectorError::Config {
                field: "ai.max_input_bytes".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(DetectorError::Config {
                field: "ai.threshold".to_owned(),
                reason: "must be between 0 and 1 (exclusive)".to_owned(),
            });
        }
        if self.timeout.is_zero() {
            return Err(DetectorError::Config {
                field: "ai.timeout_secs".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }
        Ok(())
    }
}
