//! 헌팅 엔진 에러 타입
//!
//! `From<HuntError> for MaltraceError` / `DetectError` 변환이 구현되어 있어
//! 디스패처에서는 `failed` 결과로, 상위 레이어에서는 `?`로 전파됩니다.

use maltrace_core::error::{ConfigError, DetectError, MaltraceError};

/// 헌팅 엔진 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum HuntError {
    /// 규칙 디렉토리 로딩 실패
    #[error("rule load error: {path}: {reason}")]
    RuleLoad {
        /// 규칙 디렉토리 또는 파일 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 필터링 후 남은 규칙이 없음
    #[error("no {platform} rules loaded from {path}")]
    NoRules {
        /// 규칙 디렉토리
        path: String,
        /// 대상 플랫폼
        platform: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },
}

impl From<HuntError> for DetectError {
    fn from(err: HuntError) -> Self {
        DetectError::Configuration(err.to_string())
    }
}

impl From<HuntError> for MaltraceError {
    fn from(err: HuntError) -> Self {
        match err {
            HuntError::Config { field, reason } => {
                MaltraceError::Config(ConfigError::InvalidValue { field, reason })
            }
            other => MaltraceError::Detect(other.into()),
        }
    }
}
