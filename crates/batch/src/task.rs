//! 배치 태스크 상태 머신
//!
//! ```text
//! Running ──complete()──▶ Completed
//!    │
//!    └──────fail()──────▶ Failed
//! ```
//!
//! 종료 상태(`Completed`, `Failed`)에서는 모든 변경 메서드가 아무 일도 하지 않습니다.
//! `completed`는 `total`을 넘지 않습니다.
//! 조회는 [`BatchTask::snapshot`]으로 한 번에 복사한 [`BatchStatus`]를 사용합니다.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use maltrace_core::outcome::DetectionOutcome;
use maltrace_core::types::{FileMeta, FileType, round_to};
use maltrace_detectors::Verdict;
use maltrace_evaluation::Metrics;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// 불투명한 태스크 식별자 (UUID v4)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// 태스크 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// 파일 하나의 배치 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileResult {
    pub file_id: String,
    pub filename: String,
    pub file_type: FileType,
    /// `"malicious"` 또는 `"benign"`
    pub verdict: String,
    /// `ai` 모듈의 악성 확률
    pub malicious_score: Option<f64>,
    /// 모듈 이름 → 결과
    pub results: BTreeMap<String, DetectionOutcome>,
}

impl FileResult {
    pub fn new(file: &FileMeta, outcomes: Vec<DetectionOutcome>, verdict: Verdict) -> Self {
        Self {
            file_id: file.file_id.clone(),
            filename: file.filename.clone(),
            file_type: file.file_type.clone(),
            verdict: verdict.label().to_owned(),
            malicious_score: verdict.score,
            results: outcomes
                .into_iter()
                .map(|o| (o.module.clone(), o))
                .collect(),
        }
    }

    pub fn is_malicious(&self) -> bool {
        self.verdict == "malicious"
    }
}

/// 완료된 배치의 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub total: usize,
    pub results: Vec<FileResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Metrics>,
}

/// 진행 상황 조회 응답
///
/// `result`는 상태가 `completed`일 때만 포함됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchStatus {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub total: usize,
    pub completed: usize,
    pub current: Option<String>,
    /// 진행률 (%, 소수점 둘째 자리)
    pub percent: f64,
    pub errors: Vec<String>,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<BatchResult>,
}

impl BatchStatus {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// 배치 태스크 레코드
///
/// 오케스트레이터 워커만 변경하고, 조회 호출자는 스냅샷만 읽습니다.
#[derive(Debug)]
pub struct BatchTask {
    id: TaskId,
    total: usize,
    completed: usize,
    current: Option<String>,
    status: TaskStatus,
    results: Vec<FileResult>,
    errors: Vec<String>,
    metrics: Option<Metrics>,
    message: Option<String>,
    created_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    finished: Option<Instant>,
}

impl BatchTask {
    /// `Running` 상태의 새 태스크. `total`은 이후 바뀌지 않습니다.
    pub fn new(id: TaskId, total: usize, initial_errors: Vec<String>) -> Self {
        Self {
            id,
            total,
            completed: 0,
            current: None,
            status: TaskStatus::Running,
            results: Vec::new(),
            errors: initial_errors,
            metrics: None,
            message: None,
            created_at: Utc::now(),
            finished_at: None,
            finished: None,
        }
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn results(&self) -> &[FileResult] {
        &self.results
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn set_current(&mut self, filename: impl Into<String>) {
        if !self.status.is_terminal() {
            self.current = Some(filename.into());
        }
    }

    pub fn push_result(&mut self, result: FileResult) {
        if !self.status.is_terminal() {
            self.results.push(result);
        }
    }

    pub fn push_error(&mut self, error: impl Into<String>) {
        if !self.status.is_terminal() {
            self.errors.push(error.into());
        }
    }

    /// 처리한 파일 수를 하나 늘립니다. `total`에서 멈춥니다.
    pub fn advance(&mut self) {
        if !self.status.is_terminal() && self.completed < self.total {
            self.completed += 1;
        }
    }

    /// `Running` → `Completed`. 이미 종료되었으면 `false`.
    pub fn complete(&mut self, metrics: Option<Metrics>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.metrics = metrics;
        self.status = TaskStatus::Completed;
        self.finish();
        true
    }

    /// `Running` → `Failed`. 이미 종료되었으면 `false`.
    pub fn fail(&mut self, message: impl Into<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.message = Some(message.into());
        self.status = TaskStatus::Failed;
        self.finish();
        true
    }

    fn finish(&mut self) {
        self.current = None;
        self.finished_at = Some(Utc::now());
        self.finished = Some(Instant::now());
    }

    /// 진행률 (%)
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            round_to(self.completed as f64 / self.total as f64 * 100.0, 2)
        }
    }

    /// 종료 후 `ttl`이 지났는지 여부. 실행 중인 태스크는 만료되지 않습니다.
    pub fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        self.finished
            .is_some_and(|finished| now.saturating_duration_since(finished) >= ttl)
    }

    /// 현재 상태를 한 번에 복사합니다.
    pub fn snapshot(&self) -> BatchStatus {
        let result = (self.status == TaskStatus::Completed).then(|| BatchResult {
            total: self.total,
            results: self.results.clone(),
            metrics: self.metrics.clone(),
        });

        BatchStatus {
            task_id: self.id.clone(),
            status: self.status,
            total: self.total,
            completed: self.completed,
            current: self.current.clone(),
            percent: self.percent(),
            errors: self.errors.clone(),
            message: self.message.clone(),
            created_at: self.created_at,
            finished_at: self.finished_at,
            result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn file_result(name: &str, malicious: bool) -> FileResult {
        let meta = FileMeta {
            file_id: format!("id-{name}"),
            filename: name.to_owned(),
            path: PathBuf::from(name),
            file_type: FileType::Pe,
            size: 1,
            sha256: String::new(),
        };
        FileResult::new(
            &meta,
            vec![DetectionOutcome::success("static", malicious)],
            Verdict {
                malicious,
                score: None,
            },
        )
    }

    #[test]
    fn new_task_is_running_at_zero() {
        let task = BatchTask::new(TaskId::from("t"), 3, vec!["x.txt: extension not allowed".to_owned()]);
        assert_eq!(task.status(), TaskStatus::Running);
        assert_eq!(task.completed(), 0);
        assert_eq!(task.errors().len(), 1);
        assert_eq!(task.percent(), 0.0);
    }

    #[test]
    fn advance_saturates_at_total() {
        let mut task = BatchTask::new(TaskId::from("t"), 2, Vec::new());
        for _ in 0..5 {
            task.advance();
        }
        assert_eq!(task.completed(), 2);
        assert_eq!(task.percent(), 100.0);
    }

    #[test]
    fn percent_is_rounded() {
        let mut task = BatchTask::new(TaskId::from("t"), 3, Vec::new());
        task.advance();
        assert_eq!(task.percent(), 33.33);
    }

    #[test]
    fn empty_batch_reports_zero_percent() {
        let task = BatchTask::new(TaskId::from("t"), 0, Vec::new());
        assert_eq!(task.percent(), 0.0);
    }

    #[test]
    fn terminal_state_is_final() {
        let mut task = BatchTask::new(TaskId::from("t"), 2, Vec::new());
        task.set_current("a.exe");
        task.push_result(file_result("a.exe", true));
        task.advance();
        assert!(task.complete(None));

        let before = task.snapshot();
        assert!(!task.fail("late failure"));
        assert!(!task.complete(None));
        task.advance();
        task.push_error("b.exe: late");
        task.push_result(file_result("b.exe", false));
        task.set_current("b.exe");

        assert_eq!(task.snapshot(), before);
        assert_eq!(task.status(), TaskStatus::Completed);
    }

    #[test]
    fn failed_task_keeps_partial_results_without_result_payload() {
        let mut task = BatchTask::new(TaskId::from("t"), 2, Vec::new());
        task.push_result(file_result("a.exe", true));
        task.advance();
        assert!(task.fail("ground truth too large"));

        let status = task.snapshot();
        assert_eq!(status.status, TaskStatus::Failed);
        assert_eq!(status.message.as_deref(), Some("ground truth too large"));
        assert!(status.result.is_none());
        assert_eq!(task.results().len(), 1);
    }

    #[test]
    fn result_only_appears_when_completed() {
        let mut task = BatchTask::new(TaskId::from("t"), 1, Vec::new());
        task.push_result(file_result("a.exe", false));
        task.advance();
        assert!(task.snapshot().result.is_none());

        task.complete(None);
        let result = task.snapshot().result.unwrap();
        assert_eq!(result.total, 1);
        assert_eq!(result.results[0].verdict, "benign");
        assert!(result.metrics.is_none());
    }

    #[test]
    fn current_is_cleared_on_completion() {
        let mut task = BatchTask::new(TaskId::from("t"), 1, Vec::new());
        task.set_current("a.exe");
        assert_eq!(task.snapshot().current.as_deref(), Some("a.exe"));
        task.complete(None);
        assert_eq!(task.snapshot().current, None);
    }

    #[tokio::test(start_paused = true)]
    async fn only_finished_tasks_expire() {
        let ttl = Duration::from_secs(60);
        let mut task = BatchTask::new(TaskId::from("t"), 1, Vec::new());
        tokio::time::advance(Duration::from_secs(120)).await;
        assert!(!task.is_expired(Instant::now(), ttl));

        task.complete(None);
        assert!(!task.is_expired(Instant::now(), ttl));
        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(task.is_expired(Instant::now(), ttl));
    }

    #[test]
    fn status_serializes_lowercase_and_skips_absent_result() {
        let task = BatchTask::new(TaskId::from("t-1"), 0, Vec::new());
        let json = serde_json::to_value(task.snapshot()).unwrap();
        assert_eq!(json["task_id"], "t-1");
        assert_eq!(json["status"], "running");
        assert!(json.get("result").is_none());
        assert!(json["current"].is_null());
    }

    #[test]
    fn file_result_maps_outcomes_by_module() {
        let result = file_result("a.exe", true);
        assert!(result.is_malicious());
        assert_eq!(result.file_type, FileType::Pe);
        assert!(result.results.contains_key("static"));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["file_type"], "PE");
    }
}
