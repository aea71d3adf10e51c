//! 로그 변환 도구 어댑터
//!
//! 바이너리 이벤트 로그를 [`EventRecord`] 목록으로 바꾸는 외부 도구를 감쌉니다.
//! 테스트에서는 [`LogConverter`]의 목 구현을 사용합니다.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use maltrace_core::error::DetectError;
use maltrace_core::process::run_with_timeout;

use crate::config::HuntConfig;
use crate::record::{EventRecord, parse_records};

/// 이벤트 로그 → 레코드 변환 trait
pub trait LogConverter: Send + Sync + 'static {
    /// 로그 파일 하나를 변환합니다.
    ///
    /// # Errors
    /// - 도구가 없으면 `DetectError::Configuration`
    /// - 비정상 종료 / 타임아웃이면 `DetectError::Execution` / `DetectError::Timeout`
    fn convert(
        &self,
        path: &Path,
    ) -> impl Future<Output = Result<Vec<EventRecord>, DetectError>> + Send;
}

/// `evtx_dump` 계열 도구를 실행하는 변환기
///
/// `<program> <args…> <file>`을 실행하고 표준 출력의 JSON / JSON Lines를 해석합니다.
#[derive(Debug, Clone)]
pub struct EvtxDumpConverter {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl EvtxDumpConverter {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    pub fn from_config(config: &HuntConfig) -> Self {
        Self::new(
            config.converter_path.clone(),
            config.converter_args.clone(),
            config.timeout,
        )
    }
}

impl LogConverter for EvtxDumpConverter {
    async fn convert(&self, path: &Path) -> Result<Vec<EventRecord>, DetectError> {
        let mut args: Vec<&std::ffi::OsStr> = self.args.iter().map(|a| a.as_ref()).collect();
        args.push(path.as_os_str());

        let output = run_with_timeout(&self.program, args, None, self.timeout).await?;
        let records = parse_records(&output.stdout);

        tracing::debug!(
            path = %path.display(),
            records = records.len(),
            "converted event log"
        );
        Ok(records)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn converts_json_lines_from_stdout() {
        // sh -c '<script>' <path>: 경로는 $0으로 전달되어 무시됩니다.
        let converter = EvtxDumpConverter::new(
            "sh",
            vec![
                "-c".to_owned(),
                r#"printf '{"EventID":4688,"x":"powershell"}\n{"EventID":1}\n'"#.to_owned(),
            ],
            Duration::from_secs(5),
        );
        let records = converter.convert(Path::new("Security.evtx")).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].event_id, 4688);
    }

    #[tokio::test]
    async fn missing_tool_is_configuration_error() {
        let converter = EvtxDumpConverter::new(
            "maltrace-missing-evtx-dump",
            Vec::new(),
            Duration::from_secs(5),
        );
        let err = converter.convert(Path::new("x.evtx")).await.unwrap_err();
        assert!(matches!(err, DetectError::Configuration(_)));
    }
}
