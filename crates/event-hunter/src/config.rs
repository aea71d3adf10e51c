//! 헌팅 엔진 설정
//!
//! core의 [`DynamicConfig`](maltrace_core::config::DynamicConfig)에서 파생됩니다.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::HuntError;

const MAX_RULES_LIMIT: usize = 100_000;

/// 헌팅 엔진 설정
#[derive(Debug, Clone)]
pub struct HuntConfig {
    /// 규칙 디렉토리
    pub rule_dir: PathBuf,
    /// 대상 플랫폼 (소문자)
    pub platform: String,
    /// 플랫폼 규칙으로 인정할 파일명 접두어 (소문자)
    pub filename_prefixes: Vec<String>,
    /// 읽을 규칙 파일 최대 개수
    pub max_rules: usize,
    /// 로그 변환 도구
    pub converter_path: String,
    /// 변환 도구 인자
    pub converter_args: Vec<String>,
    /// 변환 도구 타임아웃
    pub timeout: Duration,
}

impl Default for HuntConfig {
    fn default() -> Self {
        Self::from_core(&maltrace_core::config::DynamicConfig::default())
    }
}

impl HuntConfig {
    /// core 설정에서 헌팅 설정을 생성합니다.
    pub fn from_core(core: &maltrace_core::config::DynamicConfig) -> Self {
        Self {
            rule_dir: PathBuf::from(&core.rule_dir),
            platform: core.platform.to_lowercase(),
            filename_prefixes: core
                .filename_prefixes
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
            max_rules: core.max_rules,
            converter_path: core.converter_path.clone(),
            converter_args: core.converter_args.clone(),
            timeout: Duration::from_secs(core.timeout_secs),
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), HuntError> {
        if self.platform.is_empty() {
            return Err(HuntError::Config {
                field: "platform".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }
        if self.max_rules == 0 || self.max_rules > MAX_RULES_LIMIT {
            return Err(HuntError::Config {
                field: "max_rules".to_owned(),
                reason: format!("must be 1-{MAX_RULES_LIMIT}"),
            });
        }
        if self.timeout.is_zero() {
            return Err(HuntError::Config {
                field: "timeout_secs".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }
        Ok(())
    }
}
