//! 탐지 모듈 크레이트 에러 타입

use maltrace_core::error::{ConfigError, DetectError, MaltraceError};

/// 탐지 모듈 / 디스패처 에러
///
/// 탐지기 자체의 실패는 `failed` 결과가 되며 여기에 포함되지 않습니다.
#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 모듈 실행 태스크가 패닉으로 종료됨
    #[error("{module} module panicked: {reason}")]
    ModulePanicked {
        /// 모듈 이름
        module: String,
        /// 패닉 정보
        reason: String,
    },
}

impl From<DetectorError> for MaltraceError {
    fn from(err: DetectorError) -> Self {
        match err {
            DetectorError::Config { field, reason } => {
                MaltraceError::Config(ConfigError::InvalidValue { field, reason })
            }
            DetectorError::ModulePanicked { module, reason } => {
                MaltraceError::Detect(DetectError::Execution {
                    program: module,
                    code: "panic".to_owned(),
                    stderr: reason,
                })
            }
        }
    }
}
