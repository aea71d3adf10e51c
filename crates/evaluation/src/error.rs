//! 평가 엔진 에러 타입
//!
//! 정답 레이블 해석은 실패하지 않으며(빈 맵 반환), 파일 읽기만 에러가 됩니다.

use maltrace_core::error::MaltraceError;

#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    /// 정답 레이블 파일 읽기 실패
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<EvaluationError> for MaltraceError {
    fn from(err: EvaluationError) -> Self {
        match err {
            EvaluationError::Io { path, source } => MaltraceError::Io(std::io::Error::new(
                source.kind(),
                format!("{path}: {source}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_keeps_path_when_converted() {
        let err = EvaluationError::Io {
            path: "labels.csv".to_owned(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        let top: MaltraceError = err.into();
        match top {
            MaltraceError::Io(e) => {
                assert_eq!(e.kind(), std::io::ErrorKind::NotFound);
                assert!(e.to_string().contains("labels.csv"));
            }
            other => panic!("unexpected: {other}"),
        }
    }
}
