//! `static` 모듈 -- 시그니처 스캐너 어댑터
//!
//! `<scanner> -C <bundle> <target>`을 실행하고, 표준 출력 각 줄의 첫 토큰을
//! 매칭된 규칙 이름으로 해석합니다. 규칙 이름은 중복 제거 후 정렬됩니다.

use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::path::Path;
use std::time::Instant;

use maltrace_core::detector::Detector;
use maltrace_core::error::DetectError;
use maltrace_core::outcome::{DetectionOutcome, MatchRecord, ModuleKind};
use maltrace_core::process::run_with_timeout;
use maltrace_core::types::FileMeta;

use crate::config::SignatureConfig;

/// 시그니처 탐지기
#[derive(Debug, Clone)]
pub struct StaticDetector {
    config: SignatureConfig,
}

impl StaticDetector {
    pub fn new(config: SignatureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SignatureConfig {
        &self.config
    }

    /// 처음으로 존재하는 규칙 번들을 찾습니다.
    fn resolve_bundle(&self) -> Result<&Path, DetectError> {
        self.config
            .compiled_rules
            .iter()
            .map(|p| p.as_path())
            .find(|p| p.is_file())
            .ok_or_else(|| {
                let candidates: Vec<String> = self
                    .config
                    .compiled_rules
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect();
                DetectError::Configuration(format!(
                    "compiled rule bundle not found (tried: {})",
                    candidates.join(", ")
                ))
            })
    }
}

/// 스캐너 출력에서 규칙 이름을 추출합니다 (중복 제거, 정렬).
pub fn parse_rule_names(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_owned)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

impl Detector for StaticDetector {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Static
    }

    async fn detect(&self, file: &FileMeta) -> Result<DetectionOutcome, DetectError> {
        let start = Instant::now();
        let bundle = self.resolve_bundle()?;

        let args: [&OsStr; 3] = ["-C".as_ref(), bundle.as_os_str(), file.path.as_os_str()];
        let output =
            run_with_timeout(&self.config.scanner_path, args, None, self.config.timeout).await?;

        let names = parse_rule_names(&output.stdout);
        let message = if names.is_empty() {
            "no signature matched".to_owned()
        } else {
            format!("matched {} signature rules", names.len())
        };

        tracing::debug!(
            file = %file.filename,
            bundle = %bundle.display(),
            matched = names.len(),
            "signature scan finished"
        );

        let malicious = !names.is_empty();
        Ok(DetectionOutcome::success(ModuleKind::Static.as_str(), malicious)
            .with_message(message)
            .with_matches(names.into_iter().map(MatchRecord::named).collect())
            .with_duration(start.elapsed()))
    }
}
