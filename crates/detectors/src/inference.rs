//! `ai` 모듈 -- 신경망 추론 엔진 어댑터
//!
//! 파일 앞부분 최대 `max_input_bytes` 바이트를 읽어 각 바이트를 `byte + 1`의
//! `i16` 토큰으로 넓힙니다. 0은 패딩 값으로 예약됩니다.
//! 추론 엔진은 `[P(정상), P(악성)]` 두 클래스 확률을 돌려주며,
//! `P(악성) > threshold`이면 악성입니다.

use std::future::Future;
use std::time::{Duration, Instant};

use maltrace_core::detector::Detector;
use maltrace_core::error::DetectError;
use maltrace_core::outcome::{DetectionOutcome, MALICIOUS_PROBABILITY_KEY, ModuleKind};
use maltrace_core::process::run_with_timeout;
use maltrace_core::types::{FileMeta, round_to};
use serde_json::{Map, Value};
use tokio::io::AsyncReadExt;

use crate::config::InferenceConfig;

/// 추론 엔진 trait
///
/// 모델 구조와 학습은 범위 밖입니다. 테스트에서는 목 구현을 사용합니다.
pub trait InferenceBackend: Send + Sync + 'static {
    /// 토큰 시퀀스에 대한 `[P(정상), P(악성)]`을 반환합니다.
    ///
    /// # Errors
    /// - 엔진 미설정 / 누락: `DetectError::Configuration`
    /// - 엔진 실행 실패: `DetectError::Execution` / `DetectError::Timeout`
    /// - 출력 해석 실패: `DetectError::Output`
    fn predict(&self, tokens: &[i16]) -> impl Future<Output = Result<[f64; 2], DetectError>> + Send;
}

/// 외부 프로그램으로 추론하는 백엔드
///
/// 토큰을 little-endian `i16`으로 표준 입력에 쓰고, 표준 출력에서
/// `[a, b]`, `{"probabilities": [a, b]}` 또는 `{"logits": [a, b]}`를 읽습니다.
/// logits는 softmax로 확률로 바꿉니다.
#[derive(Debug, Clone)]
pub struct CommandInferenceBackend {
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandInferenceBackend {
    pub fn new(command: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            args,
            timeout,
        }
    }

    pub fn from_config(config: &InferenceConfig) -> Self {
        Self::new(config.command.clone(), config.args.clone(), config.timeout)
    }
}

impl InferenceBackend for CommandInferenceBackend {
    async fn predict(&self, tokens: &[i16]) -> Result<[f64; 2], DetectError> {
        if self.command.trim().is_empty() {
            return Err(DetectError::Configuration(
                "inference engine not configured (ai.command is empty)".to_owned(),
            ));
        }

        let input: Vec<u8> = tokens.iter().flat_map(|t| t.to_le_bytes()).collect();
        let output = run_with_timeout(&self.command, &self.args, Some(input), self.timeout).await?;
        parse_probabilities(&output.stdout)
    }
}

/// 추론 엔진 출력에서 두 클래스 확률을 해석합니다.
///
/// 진단 메시지가 섞일 수 있으므로 마지막 비어있지 않은 줄을 JSON으로 읽습니다.
pub fn parse_probabilities(stdout: &str) -> Result<[f64; 2], DetectError> {
    let line = stdout
        .lines()
        .map(str::trim)
        .rfind(|l| !l.is_empty())
        .ok_or_else(|| DetectError::Output("inference engine produced no output".to_owned()))?;

    let value: Value = serde_json::from_str(line)
        .map_err(|e| DetectError::Output(format!("invalid inference output: {e}")))?;

    let (values, logits) = match &value {
        Value::Array(items) => (items, false),
        Value::Object(obj) => match (obj.get("probabilities"), obj.get("logits")) {
            (Some(Value::Array(items)), _) => (items, false),
            (None, Some(Value::Array(items))) => (items, true),
            _ => {
                return Err(DetectError::Output(
                    "expected 'probabilities' or 'logits' array".to_owned(),
                ));
            }
        },
        _ => {
            return Err(DetectError::Output(
                "expected a two-class probability vector".to_owned(),
            ));
        }
    };

    let pair = match values.as_slice() {
        [a, b] => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) if a.is_finite() && b.is_finite() => [a, b],
            _ => return Err(DetectError::Output("non-numeric class score".to_owned())),
        },
        other => {
            return Err(DetectError::Output(format!(
                "expected 2 class scores, got {}",
                other.len()
            )));
        }
    };

    Ok(if logits { softmax(pair) } else { pair })
}

fn softmax([a, b]: [f64; 2]) -> [f64; 2] {
    let max = a.max(b);
    let (ea, eb) = ((a - max).exp(), (b - max).exp());
    let sum = ea + eb;
    [ea / sum, eb / sum]
}

/// 바이트를 `byte + 1` 토큰으로 넓힙니다.
pub fn widen_bytes(bytes: &[u8]) -> Vec<i16> {
    bytes.iter().map(|&b| i16::from(b) + 1).collect()
}

/// 신경망 추론 탐지기
pub struct AiDetector<B: InferenceBackend> {
    config: InferenceConfig,
    backend: B,
}

impl<B: InferenceBackend> AiDetector<B> {
    pub fn new(config: InferenceConfig, backend: B) -> Self {
        Self { config, backend }
    }

    async fn read_prefix(&self, file: &FileMeta) -> Result<Vec<u8>, DetectError> {
        let handle = tokio::fs::File::open(&file.path).await?;
        let mut buf = Vec::with_capacity(self.config.max_input_bytes.min(1024 * 1024));
        handle
            .take(self.config.max_input_bytes as u64)
            .read_to_end(&mut buf)
            .await?;
        Ok(buf)
    }
}

impl<B: InferenceBackend> Detector for AiDetector<B> {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Ai
    }

    async fn detect(&self, file: &FileMeta) -> Result<DetectionOutcome, DetectError> {
        let start = Instant::now();
        let bytes = self.read_prefix(file).await?;
        if bytes.is_empty() {
            return Err(DetectError::Output("file is empty, nothing to evaluate".to_owned()));
        }

        let tokens = widen_bytes(&bytes);
        let [_, malicious] = self.backend.predict(&tokens).await?;
        let is_malicious = malicious > self.config.threshold;
        let probability = round_to(malicious, 4);

        let mut prediction = Map::new();
        prediction.insert(MALICIOUS_PROBABILITY_KEY.to_owned(), Value::from(probability));
        prediction.insert("bytes_evaluated".to_owned(), Value::from(bytes.len()));

        tracing::debug!(
            file = %file.filename,
            bytes = bytes.len(),
            probability,
            "inference finished"
        );

        Ok(DetectionOutcome::success(ModuleKind::Ai.as_str(), is_malicious)
            .with_message(format!("malicious probability {probability:.4}"))
            .with_prediction(prediction)
            .with_duration(start.elapsed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Mutex;

    use maltrace_core::types::FileType;

    /// 입력을 기록하고 고정 확률을 돌려주는 백엔드
    struct FixedBackend {
        probabilities: [f64; 2],
        seen: Mutex<Vec<i16>>,
    }

    impl FixedBackend {
        fn new(probabilities: [f64; 2]) -> Self {
            Self {
                probabilities,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl InferenceBackend for FixedBackend {
        async fn predict(&self, tokens: &[i16]) -> Result<[f64; 2], DetectError> {
            *self.seen.lock().unwrap() = tokens.to_vec();
            Ok(self.probabilities)
        }
    }

    fn sample(path: &Path) -> FileMeta {
        FileMeta {
            file_id: "f-1".to_owned(),
            filename: "sample.exe".to_owned(),
            path: path.to_path_buf(),
            file_type: FileType::Pe,
            size: 0,
            sha256: String::new(),
        }
    }

    #[test]
    fn widen_bytes_reserves_zero_for_padding() {
        assert_eq!(widen_bytes(&[0, 1, 255]), vec![1, 2, 256]);
    }

    #[test]
    fn parses_plain_pair() {
        assert_eq!(parse_probabilities("[0.25, 0.75]\n").unwrap(), [0.25, 0.75]);
    }

    #[test]
    fn parses_object_on_last_line() {
        let stdout = "loading model\n{\"probabilities\": [0.9, 0.1]}\n";
        assert_eq!(parse_probabilities(stdout).unwrap(), [0.9, 0.1]);
    }

    #[test]
    fn logits_go_through_softmax() {
        let [benign, malicious] = parse_probabilities("{\"logits\": [0.0, 0.0]}").unwrap();
        assert!((benign - 0.5).abs() < 1e-12);
        assert!((malicious - 0.5).abs() < 1e-12);
    }

    #[test]
    fn rejects_wrong_arity_and_garbage() {
        assert!(matches!(
            parse_probabilities("[0.1, 0.2, 0.7]"),
            Err(DetectError::Output(_))
        ));
        assert!(matches!(parse_probabilities("not json"), Err(DetectError::Output(_))));
        assert!(matches!(parse_probabilities(""), Err(DetectError::Output(_))));
    }

    #[tokio::test]
    async fn detect_reads_prefix_and_applies_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.exe");
        std::fs::write(&path, [0u8, 9, 255, 7, 7, 7]).unwrap();

        let config = InferenceConfig {
            max_input_bytes: 3,
            ..InferenceConfig::default()
        };
        let detector = AiDetector::new(config, FixedBackend::new([0.12344, 0.87656]));
        let outcome = detector.detect(&sample(&path)).await.unwrap();

        assert_eq!(*detector.backend.seen.lock().unwrap(), vec![1, 10, 256]);
        assert_eq!(outcome.is_malicious, Some(true));
        assert_eq!(outcome.malicious_probability(), Some(0.8766));
        assert_eq!(outcome.prediction.unwrap()["bytes_evaluated"], 3);
    }

    #[tokio::test]
    async fn probability_at_threshold_is_benign() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.exe");
        std::fs::write(&path, b"MZ").unwrap();

        let detector = AiDetector::new(InferenceConfig::default(), FixedBackend::new([0.5, 0.5]));
        let outcome = detector.detect(&sample(&path)).await.unwrap();
        assert_eq!(outcome.is_malicious, Some(false));
        assert_eq!(outcome.malicious_probability(), Some(0.5));
    }

    #[tokio::test]
    async fn unconfigured_command_is_configuration_error() {
        let backend = CommandInferenceBackend::from_config(&InferenceConfig::default());
        let err = backend.predict(&[1, 2, 3]).await.unwrap_err();
        assert!(matches!(err, DetectError::Configuration(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_backend_receives_little_endian_tokens() {
        // 입력 바이트 수를 세어 확률에 반영하는 스크립트
        let backend = CommandInferenceBackend::new(
            "sh",
            vec![
                "-c".to_owned(),
                "n=$(wc -c | tr -d ' '); echo \"[0.$n, 0.1]\"".to_owned(),
            ],
            Duration::from_secs(5),
        );
        let [benign, _] = backend.predict(&[1, 2, 256]).await.unwrap();
        // 토큰 3개 × 2바이트
        assert!((benign - 0.6).abs() < 1e-12);
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let detector = AiDetector::new(InferenceConfig::default(), FixedBackend::new([0.0, 1.0]));
        let err = detector
            .detect(&sample(Path::new("/nonexistent/maltrace/sample.exe")))
            .await
            .unwrap_err();
        assert!(matches!(err, DetectError::Io(_)));
    }
}
