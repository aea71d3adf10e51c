//! 외부 프로세스 실행: 타임아웃과 종료 코드 처리
//!
//! 시그니처 스캐너, 로그 변환 도구, 추론 엔진 호출이 공유합니다.
//! 타임아웃이 지나면 자식 프로세스는 `kill_on_drop`으로 정리됩니다.

use std::ffi::OsStr;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::DetectError;

/// 프로세스 실행 결과
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// 표준 출력 (UTF-8 손실 변환)
    pub stdout: String,
    /// 표준 에러 (UTF-8 손실 변환)
    pub stderr: String,
}

/// 외부 프로그램을 실행하고 종료를 기다립니다.
///
/// `stdin`이 주어지면 자식 프로세스의 표준 입력으로 전달합니다.
///
/// # Errors
///
/// - 프로그램을 찾을 수 없으면 `DetectError::Configuration`
/// - 0이 아닌 종료 코드면 `DetectError::Execution`
/// - `timeout` 초과 시 `DetectError::Timeout`
pub async fn run_with_timeout<I, S>(
    program: &str,
    args: I,
    stdin: Option<Vec<u8>>,
    timeout: Duration,
) -> Result<CommandOutput, DetectError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            DetectError::Configuration(format!("{program} not found"))
        } else {
            DetectError::Io(e)
        }
    })?;

    // 출력 파이프가 가득 차서 멈추지 않도록 입력은 별도 태스크에서 씁니다.
    if let (Some(data), Some(mut pipe)) = (stdin, child.stdin.take()) {
        tokio::spawn(async move {
            if let Err(e) = pipe.write_all(&data).await {
                debug!(error = %e, "child closed stdin early");
            }
        });
    }

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => return Err(DetectError::Io(e)),
        Err(_elapsed) => {
            return Err(DetectError::Timeout {
                program: program.to_owned(),
                secs: timeout.as_secs(),
            });
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        let code = output
            .status
            .code()
            .map_or_else(|| "signal".to_owned(), |c| c.to_string());
        return Err(DetectError::Execution {
            program: program.to_owned(),
            code,
            stderr: stderr.trim().to_owned(),
        });
    }

    Ok(CommandOutput { stdout, stderr })
}
