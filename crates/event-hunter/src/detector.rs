//! `dynamic` 모듈 -- 이벤트 로그 규칙 헌팅 탐지기
//!
//! 규칙은 첫 탐지 요청 시 한 번만 로드되어 이후 모든 파일에 재사용됩니다.
//! 규칙 디렉토리나 변환 도구가 없으면 `dynamic` 모듈만 `failed`가 되고
//! 다른 모듈에는 영향이 없습니다.

use std::time::Instant;

use maltrace_core::detector::Detector;
use maltrace_core::error::DetectError;
use maltrace_core::outcome::{DetectionOutcome, ModuleKind};
use maltrace_core::types::FileMeta;
use serde_json::{Map, Value};
use tokio::sync::OnceCell;

use crate::config::HuntConfig;
use crate::converter::LogConverter;
use crate::rule::HuntEngine;

/// 이벤트 로그 헌팅 탐지기
pub struct DynamicDetector<C: LogConverter> {
    config: HuntConfig,
    converter: C,
    engine: OnceCell<HuntEngine>,
}

impl<C: LogConverter> DynamicDetector<C> {
    /// 새 탐지기를 생성합니다. 규칙은 아직 로드하지 않습니다.
    pub fn new(config: HuntConfig, converter: C) -> Self {
        Self {
            config,
            converter,
            engine: OnceCell::new(),
        }
    }

    /// 이미 로드된 엔진으로 탐지기를 생성합니다.
    pub fn with_engine(config: HuntConfig, converter: C, engine: HuntEngine) -> Self {
        Self {
            config,
            converter,
            engine: OnceCell::new_with(Some(engine)),
        }
    }

    /// 엔진을 반환합니다. 처음 호출될 때 규칙 디렉토리를 로드합니다.
    pub async fn engine(&self) -> Result<&HuntEngine, DetectError> {
        self.engine
            .get_or_try_init(|| async {
                if !self.config.rule_dir.is_dir() {
                    return Err(DetectError::Configuration(format!(
                        "rule directory not found: {}",
                        self.config.rule_dir.display()
                    )));
                }
                HuntEngine::load(&self.config).await.map_err(DetectError::from)
            })
            .await
    }
}

impl<C: LogConverter> Detector for DynamicDetector<C> {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Dynamic
    }

    async fn detect(&self, file: &FileMeta) -> Result<DetectionOutcome, DetectError> {
        let start = Instant::now();
        let engine = self.engine().await?;
        let events = self.converter.convert(&file.path).await?;
        let report = engine.scan(&events)?;

        let message = if report.matches.is_empty() {
            "no hunt rule matched".to_owned()
        } else {
            format!("matched {} hunt rules", report.matches.len())
        };

        let mut prediction = Map::new();
        prediction.insert(
            "matches".to_owned(),
            serde_json::to_value(&report.matches).unwrap_or(Value::Null),
        );
        prediction.insert(
            "events_scanned".to_owned(),
            Value::from(report.events_scanned),
        );

        tracing::info!(
            file = %file.filename,
            events = report.events_scanned,
            matched = report.matches.len(),
            "hunt finished"
        );

        Ok(DetectionOutcome::success(ModuleKind::Dynamic.as_str(), report.is_malicious())
            .with_message(message)
            .with_matches(report.matches)
            .with_prediction(prediction)
            .with_duration(start.elapsed()))
    }
}
