//! 에러 타입: 도메인별 에러 정의

/// maltrace 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum MaltraceError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 탐지 모듈 에러
    #[error("detect error: {0}")]
    Detect(#[from] DetectError),

    /// 입력 파일 에러
    #[error("input error: {0}")]
    Input(#[from] InputError),

    /// 배치 작업 에러
    #[error("batch error: {0}")]
    Batch(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 탐지 모듈 실행 에러
///
/// 디스패처가 `failed` 상태의 결과로 변환하며, 배치를 중단시키지 않습니다.
#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    /// 외부 엔진 바이너리 / 규칙 번들 / 모델 누락
    #[error("configuration error: {0}")]
    Configuration(String),

    /// 외부 프로세스가 0이 아닌 종료 코드로 끝남
    #[error("{program} exited with {code}: {stderr}")]
    Execution {
        program: String,
        code: String,
        stderr: String,
    },

    /// 외부 프로세스 타임아웃
    #[error("{program} timed out after {secs}s")]
    Timeout { program: String, secs: u64 },

    /// 협력자 출력 해석 실패
    #[error("unexpected output: {0}")]
    Output(String),

    /// 파일 읽기 실패
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 입력 파일 에러 (디스패치 전에 거부)
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    /// 파일 없음
    #[error("file not found: {path}")]
    NotFound { path: String },

    /// 최대 크기 초과
    #[error("file too large: {size} bytes (max: {max})")]
    TooLarge { size: u64, max: u64 },

    /// 읽기 실패
    #[error("unreadable file {path}: {reason}")]
    Unreadable { path: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_error_converts_into_top_level() {
        let err: MaltraceError = DetectError::Configuration("yara not found".to_owned()).into();
        assert!(matches!(err, MaltraceError::Detect(_)));
        assert!(err.to_string().contains("yara not found"));
    }

    #[test]
    fn timeout_message_names_program() {
        let err = DetectError::Timeout {
            program: "evtx_dump".to_owned(),
            secs: 120,
        };
        assert_eq!(err.to_string(), "evtx_dump timed out after 120s");
    }

    #[test]
    fn too_large_reports_both_sizes() {
        let err = InputError::TooLarge { size: 200, max: 100 };
        assert_eq!(err.to_string(), "file too large: 200 bytes (max: 100)");
    }
}
