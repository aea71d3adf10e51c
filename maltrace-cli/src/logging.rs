//! Logging initialization for the maltrace binary.
//!
//! Configures `tracing-subscriber` from the `[general]` section of
//! `MaltraceConfig`, with CLI flags taking precedence. Log lines go to
//! stderr so that `--output json` on stdout stays machine-readable.

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use maltrace_core::config::GeneralConfig;

/// Initialize the global tracing subscriber.
///
/// Must be called exactly once, before any tracing macros are used.
/// `RUST_LOG` overrides `log_level` when set.
///
/// # Formats
///
/// * `"json"` - Machine-parseable JSON lines
/// * `"pretty"` - Human-readable colored output
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    match config.log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .try_init()
                .map_err(|e| {
                    anyhow::anyhow!("failed to initialize JSON tracing subscriber: {}", e)
                })?;
        }
        "pretty" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_writer(std::io::stderr),
                )
                .try_init()
                .map_err(|e| {
                    anyhow::anyhow!("failed to initialize pretty tracing subscriber: {}", e)
                })?;
        }
        _ => {
            return Err(anyhow::anyhow!(
                "unknown log format '{}', expected 'json' or 'pretty'",
                config.log_format
            ));
        }
    }

    Ok(())
}

/// Apply `--log-level` / `--log-format` overrides on top of the file configuration.
pub fn effective_general(
    base: &GeneralConfig,
    log_level: Option<&str>,
    log_format: Option<&str>,
) -> GeneralConfig {
    let mut general = base.clone();
    if let Some(level) = log_level {
        general.log_level = level.to_owned();
    }
    if let Some(format) = log_format {
        general.log_format = format.to_owned();
    }
    general
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_file_values() {
        let base = GeneralConfig::default();
        let general = effective_general(&base, Some("debug"), Some("pretty"));
        assert_eq!(general.log_level, "debug");
        assert_eq!(general.log_format, "pretty");
    }

    #[test]
    fn missing_flags_keep_file_values() {
        let base = GeneralConfig {
            log_level: "warn".to_owned(),
            log_format: "json".to_owned(),
        };
        let general = effective_general(&base, None, None);
        assert_eq!(general.log_level, "warn");
        assert_eq!(general.log_format, "json");
    }

    #[test]
    fn unknown_format_is_rejected() {
        let general = effective_general(&GeneralConfig::default(), None, Some("xml"));
        assert!(init_tracing(&general).is_err());
    }
}
