//! 배치 오케스트레이터
//!
//! [`BatchOrchestrator::submit`]은 태스크를 등록하고 백그라운드 워커 하나를 띄운 뒤
//! 곧바로 태스크 ID를 반환합니다. 워커는 파일을 제출 순서대로 하나씩 처리합니다.
//!
//! # 파일 하나의 처리 단계
//! 1. `current` 갱신
//! 2. [`FileMeta::inspect`] (크기 초과 / 읽기 실패는 파일 단위 에러)
//! 3. [`ModuleDispatcher::run_modules`] → [`combine`]
//! 4. 결과 추가, `completed` 증가 (실패해도 증가)
//!
//! 파일 단위 에러는 `"<파일 이름>: <원인>"` 형식으로 `errors`에 기록되고 다음 파일로 넘어갑니다.
//! 정답 레이블 크기 초과, 취소, 워커 패닉만 태스크 전체를 `Failed`로 만듭니다.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use maltrace_core::detector::Detector;
use maltrace_core::metrics as m;
use maltrace_core::types::FileMeta;
use maltrace_detectors::{ModuleDispatcher, combine, default_modules};
use maltrace_evaluation::{Metrics, evaluate, load_ground_truth};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::OrchestratorConfig;
use crate::error::BatchError;
use crate::registry::{SharedTask, TaskRegistry};
use crate::retention::spawn_retention_sweeper;
use crate::task::{BatchStatus, FileResult, TaskId};

/// 배치 제출 요청
#[derive(Debug, Clone, Default)]
pub struct BatchRequest {
    /// 처리할 파일 (제출 순서 유지)
    pub files: Vec<PathBuf>,
    /// 실행할 모듈. `None`이면 파일 유형별 기본 모듈
    pub modules: Option<Vec<String>>,
    /// 정답 레이블 페이로드
    pub ground_truth: Option<Vec<u8>>,
    /// 제출 전에 거부된 항목의 에러
    pub initial_errors: Vec<String>,
}

impl BatchRequest {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self {
            files,
            ..Default::default()
        }
    }

    pub fn with_modules(mut self, modules: Vec<String>) -> Self {
        self.modules = Some(modules);
        self
    }

    pub fn with_ground_truth(mut self, ground_truth: Vec<u8>) -> Self {
        self.ground_truth = Some(ground_truth);
        self
    }

    pub fn with_initial_errors(mut self, errors: Vec<String>) -> Self {
        self.initial_errors = errors;
        self
    }
}

/// 배치 오케스트레이터
pub struct BatchOrchestrator<S: Detector, A: Detector, D: Detector> {
    dispatcher: ModuleDispatcher<S, A, D>,
    registry: TaskRegistry,
    config: OrchestratorConfig,
    cancel: CancellationToken,
}

impl<S: Detector, A: Detector, D: Detector> BatchOrchestrator<S, A, D> {
    pub fn new(dispatcher: ModuleDispatcher<S, A, D>, config: OrchestratorConfig) -> Self {
        Self {
            dispatcher,
            registry: TaskRegistry::new(),
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// 배치를 제출합니다. 처리를 기다리지 않고 태스크 ID를 반환합니다.
    pub async fn submit(&self, request: BatchRequest) -> TaskId {
        let (task_id, task) = self
            .registry
            .create(request.files.len(), request.initial_errors.clone())
            .await;
        metrics::counter!(m::BATCH_SUBMITTED_TOTAL).increment(1);
        info!(
            task_id = %task_id,
            files = request.files.len(),
            "batch submitted"
        );

        let worker = BatchWorker {
            task_id: task_id.clone(),
            task: SharedTask::clone(&task),
            dispatcher: self.dispatcher.clone(),
            max_file_size: self.config.max_file_size,
            max_ground_truth_bytes: self.config.max_ground_truth_bytes,
            cancel: self.cancel.child_token(),
        };
        let handle = tokio::spawn(worker.run(request));
        supervise(task_id.clone(), task, handle);

        task_id
    }

    /// 태스크 진행 상황을 조회합니다.
    ///
    /// # Errors
    /// 태스크가 없거나 이미 정리되었으면 `BatchError::TaskNotFound`
    pub async fn status(&self, task_id: &TaskId) -> Result<BatchStatus, BatchError> {
        self.registry
            .snapshot(task_id)
            .await
            .ok_or_else(|| BatchError::TaskNotFound {
                task_id: task_id.to_string(),
            })
    }

    /// 지금까지 쌓인 파일 결과를 복사합니다. 실패한 태스크의 부분 결과도 포함됩니다.
    pub async fn results(&self, task_id: &TaskId) -> Result<Vec<FileResult>, BatchError> {
        let task = self
            .registry
            .get(task_id)
            .await
            .ok_or_else(|| BatchError::TaskNotFound {
                task_id: task_id.to_string(),
            })?;
        let results = task.lock().await.results().to_vec();
        Ok(results)
    }

    /// 태스크가 종료될 때까지 `poll` 간격으로 조회합니다.
    pub async fn wait(&self, task_id: &TaskId, poll: Duration) -> Result<BatchStatus, BatchError> {
        loop {
            let status = self.status(task_id).await?;
            if status.is_terminal() {
                return Ok(status);
            }
            tokio::time::sleep(poll).await;
        }
    }

    /// 보존 기간 정리 태스크를 시작합니다. [`shutdown`](Self::shutdown) 시 함께 종료됩니다.
    pub fn spawn_retention_sweeper(&self) -> JoinHandle<()> {
        spawn_retention_sweeper(
            self.registry.clone(),
            self.config.task_ttl,
            self.config.sweep_interval,
            self.cancel.child_token(),
        )
    }

    /// 실행 중인 배치를 파일 경계에서 멈추고 정리 태스크를 종료합니다.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

/// 워커가 패닉으로 끝나면 태스크를 `Failed`로 전환합니다.
fn supervise(task_id: TaskId, task: SharedTask, handle: JoinHandle<()>) {
    tokio::spawn(async move {
        if let Err(e) = handle.await {
            error!(task_id = %task_id, error = %e, "batch worker aborted");
            if task.lock().await.fail(format!("worker aborted: {e}")) {
                metrics::counter!(m::BATCH_FAILED_TOTAL).increment(1);
            }
        }
    });
}

/// 배치 하나를 처리하는 백그라운드 워커
struct BatchWorker<S: Detector, A: Detector, D: Detector> {
    task_id: TaskId,
    task: SharedTask,
    dispatcher: ModuleDispatcher<S, A, D>,
    max_file_size: u64,
    max_ground_truth_bytes: usize,
    cancel: CancellationToken,
}

impl<S: Detector, A: Detector, D: Detector> BatchWorker<S, A, D> {
    async fn run(self, request: BatchRequest) {
        let modules = request.modules.as_deref().map(dedup_modules);

        let ground_truth = match request.ground_truth.as_deref() {
            Some(bytes) if bytes.len() > self.max_ground_truth_bytes => {
                let err = BatchError::GroundTruthTooLarge {
                    size: bytes.len(),
                    max: self.max_ground_truth_bytes,
                };
                self.fail(&err).await;
                return;
            }
            Some(bytes) => Some(load_ground_truth(bytes)),
            None => None,
        };

        let mut predictions: Vec<(String, bool)> = Vec::with_capacity(request.files.len());

        for path in &request.files {
            if self.cancel.is_cancelled() {
                self.fail(&BatchError::Cancelled).await;
                return;
            }

            let filename = display_name(path);
            self.task.lock().await.set_current(filename.clone());

            match self.process_file(path, modules.as_deref()).await {
                Ok(result) => {
                    predictions.push((result.filename.clone(), result.is_malicious()));
                    let mut task = self.task.lock().await;
                    task.push_result(result);
                    task.advance();
                }
                Err(e) => {
                    warn!(
                        task_id = %self.task_id,
                        file = %filename,
                        error = %e,
                        "batch item failed"
                    );
                    metrics::counter!(m::BATCH_FILE_ERRORS_TOTAL).increment(1);
                    let mut task = self.task.lock().await;
                    task.push_error(format!("{filename}: {e}"));
                    task.advance();
                }
            }
            metrics::counter!(m::BATCH_FILES_PROCESSED_TOTAL).increment(1);
        }

        let metrics = ground_truth.and_then(|ground_truth| {
            if ground_truth.is_empty() {
                warn!(
                    task_id = %self.task_id,
                    "ground truth contained no usable labels, metrics omitted"
                );
                return None;
            }
            Some(evaluate(&predictions, &ground_truth).metrics)
        });
        self.complete(metrics).await;
    }

    async fn process_file(
        &self,
        path: &Path,
        modules: Option<&[String]>,
    ) -> Result<FileResult, BatchError> {
        let meta = FileMeta::inspect(path, self.max_file_size).await?;
        let modules = match modules {
            Some(modules) => modules.to_vec(),
            None => default_modules(&meta.file_type),
        };
        debug!(
            task_id = %self.task_id,
            file = %meta.filename,
            file_type = %meta.file_type,
            modules = ?modules,
            "processing file"
        );

        let outcomes = self
            .dispatcher
            .run_modules(&meta, &modules)
            .await
            .map_err(|e| BatchError::Worker(e.to_string()))?;
        let verdict = combine(&outcomes);
        Ok(FileResult::new(&meta, outcomes, verdict))
    }

    async fn complete(&self, metrics: Option<Metrics>) {
        let (completed, errors) = {
            let mut task = self.task.lock().await;
            if !task.complete(metrics) {
                return;
            }
            (task.completed(), task.errors().len())
        };
        metrics::counter!(m::BATCH_COMPLETED_TOTAL).increment(1);
        info!(
            task_id = %self.task_id,
            completed,
            errors,
            "batch completed"
        );
    }

    async fn fail(&self, err: &BatchError) {
        if self.task.lock().await.fail(err.to_string()) {
            metrics::counter!(m::BATCH_FAILED_TOTAL).increment(1);
            error!(task_id = %self.task_id, error = %err, "batch failed");
        }
    }
}

/// 요청된 모듈 목록에서 중복을 제거합니다 (첫 위치 유지).
fn dedup_modules(modules: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    modules
        .iter()
        .map(|m| m.trim().to_lowercase())
        .filter(|m| !m.is_empty() && seen.insert(m.clone()))
        .collect()
}

/// 에러 메시지에 쓰는 파일 이름
fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
