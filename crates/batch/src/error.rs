//! 배치 오케스트레이터 에러 타입
//!
//! 파일 단위 에러는 태스크의 `errors` 목록에 기록되고 배치를 중단시키지 않습니다.
//! 오케스트레이션 수준 에러만 태스크를 `Failed`로 만듭니다.

use maltrace_core::error::{ConfigError, InputError, MaltraceError};

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// 존재하지 않거나 이미 정리된 태스크
    #[error("task not found: {task_id}")]
    TaskNotFound { task_id: String },

    /// 입력 파일 거부 (파일 단위)
    #[error(transparent)]
    Input(#[from] InputError),

    /// 정답 레이블 페이로드 크기 초과 (오케스트레이션 수준)
    #[error("ground truth too large: {size} bytes (max: {max})")]
    GroundTruthTooLarge { size: usize, max: usize },

    /// 파일 처리 중 모듈 태스크 실패
    #[error("{0}")]
    Worker(String),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config { field: String, reason: String },

    /// 오케스트레이터 종료로 취소됨
    #[error("cancelled")]
    Cancelled,
}

impl From<BatchError> for MaltraceError {
    fn from(err: BatchError) -> Self {
        match err {
            BatchError::Input(e) => MaltraceError::Input(e),
            BatchError::Config { field, reason } => {
                MaltraceError::Config(ConfigError::InvalidValue { field, reason })
            }
            other => MaltraceError::Batch(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_error_is_transparent() {
        let err = BatchError::Input(InputError::NotFound {
            path: "a.exe".to_owned(),
        });
        assert_eq!(err.to_string(), "file not found: a.exe");
        assert!(matches!(MaltraceError::from(err), MaltraceError::Input(_)));
    }

    #[test]
    fn task_not_found_converts_to_batch_error() {
        let err = BatchError::TaskNotFound {
            task_id: "t-1".to_owned(),
        };
        let top: MaltraceError = err.into();
        assert_eq!(top.to_string(), "batch error: task not found: t-1");
    }

    #[test]
    fn cancelled_display() {
        assert_eq!(BatchError::Cancelled.to_string(), "cancelled");
    }
}
