//! 설정 관리: maltrace.toml 파싱 및 런타임 설정
//!
//! [`MaltraceConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`MALTRACE_DYNAMIC_RULE_DIR=/opt/sigma` 형식)
//! 3. 설정 파일 (`maltrace.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), maltrace_core::error::MaltraceError> {
//! use maltrace_core::config::MaltraceConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = MaltraceConfig::load("maltrace.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = MaltraceConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, MaltraceError};

/// 외부 프로세스 타임아웃 상한 (초)
const MAX_TIMEOUT_SECS: u64 = 600;

/// 추론 입력 상한 (바이트)
const MAX_AI_INPUT_BYTES: usize = 64 * 1024 * 1024;

/// maltrace 통합 설정
///
/// `maltrace.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 모듈은 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaltraceConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 입력 파일 제한
    #[serde(default)]
    pub storage: StorageConfig,
    /// 시그니처 스캐너 설정
    #[serde(default, rename = "static")]
    pub static_scan: StaticScanConfig,
    /// 추론 엔진 설정
    #[serde(default)]
    pub ai: AiConfig,
    /// 이벤트 로그 헌팅 설정
    #[serde(default)]
    pub dynamic: DynamicConfig,
    /// 배치 오케스트레이터 설정
    #[serde(default)]
    pub batch: BatchConfig,
}

impl MaltraceConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, MaltraceError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, MaltraceError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MaltraceError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                MaltraceError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, MaltraceError> {
        toml::from_str(toml_str).map_err(|e| {
            MaltraceError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `MALTRACE_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "MALTRACE_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "MALTRACE_GENERAL_LOG_FORMAT");

        // Storage
        override_u64(
            &mut self.storage.max_file_size_mb,
            "MALTRACE_STORAGE_MAX_FILE_SIZE_MB",
        );
        override_csv(
            &mut self.storage.allowed_extensions,
            "MALTRACE_STORAGE_ALLOWED_EXTENSIONS",
        );

        // Static
        override_string(
            &mut self.static_scan.scanner_path,
            "MALTRACE_STATIC_SCANNER_PATH",
        );
        override_csv(
            &mut self.static_scan.compiled_rules,
            "MALTRACE_STATIC_COMPILED_RULES",
        );
        override_u64(
            &mut self.static_scan.timeout_secs,
            "MALTRACE_STATIC_TIMEOUT_SECS",
        );

        // AI
        override_string(&mut self.ai.command, "MALTRACE_AI_COMMAND");
        override_csv(&mut self.ai.args, "MALTRACE_AI_ARGS");
        override_usize(&mut self.ai.max_input_bytes, "MALTRACE_AI_MAX_INPUT_BYTES");
        override_f64(&mut self.ai.threshold, "MALTRACE_AI_THRESHOLD");
        override_u64(&mut self.ai.timeout_secs, "MALTRACE_AI_TIMEOUT_SECS");

        // Dynamic
        override_string(
            &mut self.dynamic.converter_path,
            "MALTRACE_DYNAMIC_CONVERTER_PATH",
        );
        override_csv(
            &mut self.dynamic.converter_args,
            "MALTRACE_DYNAMIC_CONVERTER_ARGS",
        );
        override_string(&mut self.dynamic.rule_dir, "MALTRACE_DYNAMIC_RULE_DIR");
        override_string(&mut self.dynamic.platform, "MALTRACE_DYNAMIC_PLATFORM");
        override_csv(
            &mut self.dynamic.filename_prefixes,
            "MALTRACE_DYNAMIC_FILENAME_PREFIXES",
        );
        override_usize(&mut self.dynamic.max_rules, "MALTRACE_DYNAMIC_MAX_RULES");
        override_u64(
            &mut self.dynamic.timeout_secs,
            "MALTRACE_DYNAMIC_TIMEOUT_SECS",
        );

        // Batch
        override_u64(&mut self.batch.task_ttl_secs, "MALTRACE_BATCH_TASK_TTL_SECS");
        override_u64(
            &mut self.batch.sweep_interval_secs,
            "MALTRACE_BATCH_SWEEP_INTERVAL_SECS",
        );
        override_usize(
            &mut self.batch.max_ground_truth_bytes,
            "MALTRACE_BATCH_MAX_GROUND_TRUTH_BYTES",
        );
        override_bool(
            &mut self.batch.parallel_modules,
            "MALTRACE_BATCH_PARALLEL_MODULES",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), MaltraceError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.storage.max_file_size_mb == 0 {
            return Err(invalid("storage.max_file_size_mb", "must be greater than 0"));
        }

        if self.static_scan.scanner_path.is_empty() {
            return Err(invalid("static.scanner_path", "must not be empty"));
        }
        check_timeout("static.timeout_secs", self.static_scan.timeout_secs)?;

        if self.ai.max_input_bytes == 0 || self.ai.max_input_bytes > MAX_AI_INPUT_BYTES {
            return Err(invalid(
                "ai.max_input_bytes",
                format!("must be between 1 and {MAX_AI_INPUT_BYTES}"),
            ));
        }
        if !(self.ai.threshold > 0.0 && self.ai.threshold < 1.0) {
            return Err(invalid("ai.threshold", "must be strictly between 0 and 1"));
        }
        check_timeout("ai.timeout_secs", self.ai.timeout_secs)?;

        if self.dynamic.converter_path.is_empty() {
            return Err(invalid("dynamic.converter_path", "must not be empty"));
        }
        if self.dynamic.platform.is_empty() {
            return Err(invalid("dynamic.platform", "must not be empty"));
        }
        if self.dynamic.max_rules == 0 || self.dynamic.max_rules > 100_000 {
            return Err(invalid("dynamic.max_rules", "must be between 1 and 100000"));
        }
        check_timeout("dynamic.timeout_secs", self.dynamic.timeout_secs)?;

        if self.batch.task_ttl_secs == 0 {
            return Err(invalid("batch.task_ttl_secs", "must be greater than 0"));
        }
        if self.batch.sweep_interval_secs == 0 {
            return Err(invalid("batch.sweep_interval_secs", "must be greater than 0"));
        }
        if self.batch.max_ground_truth_bytes == 0 {
            return Err(invalid(
                "batch.max_ground_truth_bytes",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> MaltraceError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

fn check_timeout(field: &str, secs: u64) -> Result<(), MaltraceError> {
    if secs == 0 || secs > MAX_TIMEOUT_SECS {
        return Err(invalid(
            field,
            format!("must be between 1 and {MAX_TIMEOUT_SECS} seconds"),
        ));
    }
    Ok(())
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 입력 파일 제한
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// 파일 최대 크기 (MB). 초과 시 디스패치 전에 거부
    pub max_file_size_mb: u64,
    /// 디렉토리 확장 시 포함할 확장자 (비어 있으면 전부)
    pub allowed_extensions: Vec<String>,
}

impl StorageConfig {
    /// 파일 최대 크기 (바이트)
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }

    /// 확장자 허용 여부 (대소문자 무시)
    pub fn allows(&self, path: &Path) -> bool {
        if self.allowed_extensions.is_empty() {
            return true;
        }
        let Some(ext) = path.extension() else {
            return false;
        };
        let ext = ext.to_string_lossy();
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(&ext))
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 100,
            allowed_extensions: [
                "exe", "dll", "sys", "bin", "evtx", "ps1", "bat", "cmd", "sh", "py", "js",
            ]
            .iter()
            .map(|s| (*s).to_owned())
            .collect(),
        }
    }
}

/// 시그니처 스캐너 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticScanConfig {
    /// 스캐너 실행 파일
    pub scanner_path: String,
    /// 컴파일된 규칙 번들 후보 (처음 존재하는 것을 사용)
    pub compiled_rules: Vec<String>,
    /// 실행 타임아웃 (초)
    pub timeout_secs: u64,
}

impl Default for StaticScanConfig {
    fn default() -> Self {
        Self {
            scanner_path: "yara".to_owned(),
            compiled_rules: vec![
                "compiled_rules/all_rules.yac".to_owned(),
                "compiled_rules/all_rules.yarc".to_owned(),
            ],
            timeout_secs: 60,
        }
    }
}

/// 추론 엔진 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// 추론 엔진 실행 파일 (비어 있으면 미설정)
    pub command: String,
    /// 추론 엔진 인자
    pub args: Vec<String>,
    /// 모델 입력으로 사용할 최대 바이트 수
    pub max_input_bytes: usize,
    /// 악성 판정 임계값 (P(malicious) > threshold)
    pub threshold: f64,
    /// 실행 타임아웃 (초)
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            command: String::new(),
            args: Vec::new(),
            max_input_bytes: 4_000_000,
            threshold: 0.5,
            timeout_secs: 120,
        }
    }
}

/// 이벤트 로그 헌팅 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicConfig {
    /// 로그 변환 도구 실행 파일
    pub converter_path: String,
    /// 변환 도구 인자 (대상 파일 경로 앞에 붙음)
    pub converter_args: Vec<String>,
    /// 규칙 디렉토리
    pub rule_dir: String,
    /// 대상 플랫폼 (logsource 필터)
    pub platform: String,
    /// 플랫폼 규칙으로 인정할 파일명 접두어
    pub filename_prefixes: Vec<String>,
    /// 읽을 규칙 파일 최대 개수
    pub max_rules: usize,
    /// 변환 도구 타임아웃 (초)
    pub timeout_secs: u64,
}

impl Default for DynamicConfig {
    fn default() -> Self {
        Self {
            converter_path: "evtx_dump".to_owned(),
            converter_args: vec!["-o".to_owned(), "jsonl".to_owned()],
            rule_dir: "rules/sigma".to_owned(),
            platform: "windows".to_owned(),
            filename_prefixes: vec!["win_".to_owned()],
            max_rules: 400,
            timeout_secs: 120,
        }
    }
}

/// 배치 오케스트레이터 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// 종료된 태스크 보존 기간 (초)
    pub task_ttl_secs: u64,
    /// 보존 기간 점검 주기 (초)
    pub sweep_interval_secs: u64,
    /// ground truth 최대 크기 (바이트)
    pub max_ground_truth_bytes: usize,
    /// 파일 하나의 모듈들을 동시에 실행
    pub parallel_modules: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            task_ttl_secs: 3600,
            sweep_interval_secs: 60,
            max_ground_truth_bytes: 10 * 1024 * 1024,
            parallel_modules: true,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_f64(target: &mut f64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<f64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse f64 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
