//! Configuration loading and detector wiring shared by the subcommands.

use std::path::Path;

use maltrace_core::config::MaltraceConfig;
use maltrace_detectors::{
    AiDetector, CommandInferenceBackend, InferenceConfig, ModuleDispatcher, SignatureConfig,
    StaticDetector,
};
use maltrace_event_hunter::{DynamicDetector, EvtxDumpConverter, HuntConfig};

use crate::error::CliError;

/// Configuration file used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "maltrace.toml";

/// Dispatcher over the production detectors.
pub type LocalDispatcher = ModuleDispatcher<
    StaticDetector,
    AiDetector<CommandInferenceBackend>,
    DynamicDetector<EvtxDumpConverter>,
>;

/// Load the effective configuration.
///
/// A missing file at the default location falls back to built-in defaults
/// plus environment overrides. An explicitly named file must exist.
pub async fn load_config(path: &Path) -> Result<MaltraceConfig, CliError> {
    let is_default = path == Path::new(DEFAULT_CONFIG_PATH);
    if is_default && !tokio::fs::try_exists(path).await.unwrap_or(false) {
        let mut config = MaltraceConfig::default();
        config.apply_env_overrides();
        config.validate()?;
        return Ok(config);
    }
    Ok(MaltraceConfig::load(path).await?)
}

/// Build the module dispatcher from the `[static]`, `[ai]`, `[dynamic]` and `[batch]` sections.
///
/// Hunt rules are not read here; the dynamic detector loads them on first use.
pub fn build_dispatcher(config: &MaltraceConfig) -> Result<LocalDispatcher, CliError> {
    let signature = SignatureConfig::from_core(&config.static_scan);
    signature.validate()?;

    let inference = InferenceConfig::from_core(&config.ai);
    inference.validate()?;

    let hunt = HuntConfig::from_core(&config.dynamic);
    hunt.validate()?;

    let backend = CommandInferenceBackend::from_config(&inference);
    let converter = EvtxDumpConverter::from_config(&hunt);

    Ok(ModuleDispatcher::new(
        StaticDetector::new(signature),
        AiDetector::new(inference, backend),
        DynamicDetector::new(hunt, converter),
    )
    .with_parallel_modules(config.batch.parallel_modules))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 테스트 동안 환경변수를 설정하고 drop 시 원래 값으로 되돌립니다.
    struct EnvGuard {
        key: &'static str,
        original: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: &str) -> Self {
            let original = std::env::var(key).ok();
            // SAFETY: 환경변수를 건드리는 테스트는 serial_test로 직렬화됩니다.
            unsafe {
                std::env::set_var(key, value);
            }
            Self { key, original }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            // SAFETY: 테스트 정리
            unsafe {
                match &self.original {
                    Some(value) => std::env::set_var(self.key, value),
                    None => std::env::remove_var(self.key),
                }
            }
        }
    }

    #[test]
    fn dispatcher_follows_parallel_setting() {
        let mut config = MaltraceConfig::default();
        config.batch.parallel_modules = false;
        let dispatcher = build_dispatcher(&config).expect("default config is valid");
        assert!(!dispatcher.parallel_modules());
    }

    #[test]
    fn invalid_hunt_config_is_a_config_error() {
        let mut config = MaltraceConfig::default();
        config.dynamic.max_rules = 0;
        let err = build_dispatcher(&config).err().expect("max_rules = 0 is invalid");
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = load_config(&dir.path().join("absent.toml"))
            .await
            .expect_err("explicit path must exist");
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn explicit_file_is_loaded() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("maltrace.toml");
        std::fs::write(&path, "[batch]\nparallel_modules = false\n").expect("write config");
        let config = load_config(&path).await.expect("valid config");
        assert!(!config.batch.parallel_modules);
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn env_override_applies_to_loaded_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("maltrace.toml");
        std::fs::write(&path, "[batch]\ntask_ttl_secs = 3600\n").expect("write config");

        let _env = EnvGuard::set("MALTRACE_BATCH_TASK_TTL_SECS", "120");
        let config = load_config(&path).await.expect("valid config");
        assert_eq!(config.batch.task_ttl_secs, 120);
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn invalid_env_override_fails_validation() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("maltrace.toml");
        std::fs::write(&path, "").expect("write config");

        let _env = EnvGuard::set("MALTRACE_AI_THRESHOLD", "1.5");
        let err = load_config(&path).await.expect_err("threshold above 1 is invalid");
        assert_eq!(err.exit_code(), 2);
    }
}
