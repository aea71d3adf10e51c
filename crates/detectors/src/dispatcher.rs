//! 모듈 디스패처 -- (파일 유형, 모듈 이름) → 탐지기 호출
//!
//! # 적용 규칙
//! - `static`, `ai`: 이벤트 로그(EVTX)에는 적용되지 않음 → `skipped`
//! - `dynamic`: 이벤트 로그에만 적용 → 그 외 유형은 `skipped`
//! - 알 수 없는 모듈 이름 → `skipped`
//! - 탐지기 에러(설정 / 실행 / 타임아웃 / I/O) → `failed`
//!
//! [`ModuleDispatcher::dispatch`]는 어떤 입력에도 결과를 반환하며 에러를 내지 않습니다.
//! [`ModuleDispatcher::run_modules`]는 모듈마다 별도의 tokio 태스크를 사용하므로
//! 탐지기 패닉은 해당 파일의 에러([`DetectorError::ModulePanicked`])로 격리됩니다.

use std::sync::Arc;
use std::time::Instant;

use maltrace_core::detector::Detector;
use maltrace_core::metrics as m;
use maltrace_core::outcome::{DetectionOutcome, ModuleKind};
use maltrace_core::types::{FileMeta, FileType};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::DetectorError;

/// 파일 유형별 기본 모듈 목록
///
/// 이벤트 로그는 `dynamic`, 그 외에는 `static` + `ai`.
pub fn default_modules(file_type: &FileType) -> Vec<String> {
    if file_type.is_log() {
        vec![ModuleKind::Dynamic.as_str().to_owned()]
    } else {
        vec![
            ModuleKind::Static.as_str().to_owned(),
            ModuleKind::Ai.as_str().to_owned(),
        ]
    }
}

/// 적용 불가 조합이면 건너뜀 사유를 반환합니다.
fn inapplicable(kind: ModuleKind, file_type: &FileType) -> Option<&'static str> {
    match kind {
        ModuleKind::Static if file_type.is_log() => {
            Some("static detection does not apply to event logs")
        }
        ModuleKind::Ai if file_type.is_log() => Some("ai detection does not apply to event logs"),
        ModuleKind::Dynamic if !file_type.is_log() => {
            Some("dynamic detection only applies to event logs")
        }
        _ => None,
    }
}

/// 모듈 디스패처
///
/// 모듈 종류마다 하나의 [`Detector`] 구현을 보유합니다.
pub struct ModuleDispatcher<S: Detector, A: Detector, D: Detector> {
    static_detector: Arc<S>,
    ai_detector: Arc<A>,
    dynamic_detector: Arc<D>,
    parallel: bool,
}

impl<S: Detector, A: Detector, D: Detector> Clone for ModuleDispatcher<S, A, D> {
    fn clone(&self) -> Self {
        Self {
            static_detector: Arc::clone(&self.static_detector),
            ai_detector: Arc::clone(&self.ai_detector),
            dynamic_detector: Arc::clone(&self.dynamic_detector),
            parallel: self.parallel,
        }
    }
}

impl<S: Detector, A: Detector, D: Detector> ModuleDispatcher<S, A, D> {
    /// 새 디스패처를 생성합니다. 기본은 모듈 순차 실행입니다.
    pub fn new(static_detector: S, ai_detector: A, dynamic_detector: D) -> Self {
        Self {
            static_detector: Arc::new(static_detector),
            ai_detector: Arc::new(ai_detector),
            dynamic_detector: Arc::new(dynamic_detector),
            parallel: false,
        }
    }

    /// 한 파일의 모듈들을 동시에 실행할지 설정합니다.
    pub fn with_parallel_modules(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn parallel_modules(&self) -> bool {
        self.parallel
    }

    /// 모듈 하나를 실행합니다.
    pub async fn dispatch(&self, file: &FileMeta, module: &str) -> DetectionOutcome {
        let Some(kind) = ModuleKind::parse(module) else {
            debug!(module, file = %file.filename, "unknown module requested");
            let outcome = DetectionOutcome::skipped(module, "unknown module");
            record_outcome(&outcome);
            return outcome;
        };

        if let Some(reason) = inapplicable(kind, &file.file_type) {
            let outcome = DetectionOutcome::skipped(kind.as_str(), reason);
            record_outcome(&outcome);
            return outcome;
        }

        let start = Instant::now();
        let result = match kind {
            ModuleKind::Static => self.static_detector.detect(file).await,
            ModuleKind::Ai => self.ai_detector.detect(file).await,
            ModuleKind::Dynamic => self.dynamic_detector.detect(file).await,
        };
        let elapsed = start.elapsed();

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    module = kind.as_str(),
                    file = %file.filename,
                    error = %e,
                    "detection module failed"
                );
                DetectionOutcome::failed(kind.as_str(), e.to_string()).with_duration(elapsed)
            }
        };

        metrics::histogram!(m::MODULE_DURATION_SECONDS, m::LABEL_MODULE => kind.as_str())
            .record(elapsed.as_secs_f64());
        record_outcome(&outcome);
        outcome
    }

    /// 요청된 순서대로 모듈들을 실행합니다.
    ///
    /// 반환 순서는 `modules` 순서와 같습니다. 병렬 모드에서도 각 모듈은
    /// 자기 슬롯에만 결과를 씁니다.
    ///
    /// # Errors
    /// 모듈 태스크가 패닉하면 `DetectorError::ModulePanicked`
    pub async fn run_modules(
        &self,
        file: &FileMeta,
        modules: &[String],
    ) -> Result<Vec<DetectionOutcome>, DetectorError> {
        let mut outcomes = Vec::with_capacity(modules.len());

        if self.parallel {
            let handles: Vec<(String, JoinHandle<DetectionOutcome>)> = modules
                .iter()
                .map(|module| (module.clone(), self.spawn_dispatch(file, module)))
                .collect();

            let mut pending = handles.into_iter();
            while let Some((module, handle)) = pending.next() {
                match handle.await {
                    Ok(outcome) => outcomes.push(outcome),
                    Err(e) => {
                        for (_, rest) in pending.by_ref() {
                            rest.abort();
                        }
                        return Err(panicked(module, e));
                    }
                }
            }
        } else {
            for module in modules {
                let outcome = self
                    .spawn_dispatch(file, module)
                    .await
                    .map_err(|e| panicked(module.clone(), e))?;
                outcomes.push(outcome);
            }
        }

        Ok(outcomes)
    }

    fn spawn_dispatch(&self, file: &FileMeta, module: &str) -> JoinHandle<DetectionOutcome> {
        let dispatcher = self.clone();
        let file = file.clone();
        let module = module.to_owned();
        tokio::spawn(async move { dispatcher.dispatch(&file, &module).await })
    }
}

fn panicked(module: String, err: tokio::task::JoinError) -> DetectorError {
    DetectorError::ModulePanicked {
        module,
        reason: err.to_string(),
    }
}

fn record_outcome(outcome: &DetectionOutcome) {
    metrics::counter!(
        m::MODULE_OUTCOMES_TOTAL,
        m::LABEL_MODULE => outcome.module.clone(),
        m::LABEL_STATUS => outcome.status.to_string()
    )
    .increment(1);
}
