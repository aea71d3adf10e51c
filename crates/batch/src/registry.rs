//! 태스크 레지스트리 -- 태스크 ID → 태스크 레코드
//!
//! 맵 잠금은 삽입 / 조회 / 삭제 동안만 잡습니다.
//! 태스크 레코드마다 별도의 `Mutex`가 있으며, 한 번의 상태 변경이나
//! 스냅샷 복사 동안만 잡습니다. 탐지 모듈 실행 중에는 잡지 않습니다.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

use crate::task::{BatchStatus, BatchTask, TaskId};

/// 공유 태스크 레코드
pub type SharedTask = Arc<Mutex<BatchTask>>;

/// 태스크 레지스트리 (복제 시 같은 맵을 공유)
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: Arc<RwLock<HashMap<TaskId, SharedTask>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Running` 상태의 새 태스크를 등록합니다.
    pub async fn create(&self, total: usize, initial_errors: Vec<String>) -> (TaskId, SharedTask) {
        let id = TaskId::new();
        let task = Arc::new(Mutex::new(BatchTask::new(id.clone(), total, initial_errors)));
        self.tasks.write().await.insert(id.clone(), Arc::clone(&task));
        (id, task)
    }

    pub async fn get(&self, id: &TaskId) -> Option<SharedTask> {
        self.tasks.read().await.get(id).cloned()
    }

    /// 태스크의 현재 상태를 복사합니다.
    pub async fn snapshot(&self, id: &TaskId) -> Option<BatchStatus> {
        let task = self.get(id).await?;
        let snapshot = task.lock().await.snapshot();
        Some(snapshot)
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }

    /// 종료 후 `ttl`이 지난 태스크를 제거하고 제거한 수를 반환합니다.
    ///
    /// 실행 중인 태스크는 제거하지 않습니다.
    pub async fn evict_expired(&self, ttl: Duration) -> usize {
        let candidates: Vec<(TaskId, SharedTask)> = self
            .tasks
            .read()
            .await
            .iter()
            .map(|(id, task)| (id.clone(), Arc::clone(task)))
            .collect();

        let now = Instant::now();
        let mut expired = Vec::new();
        for (id, task) in candidates {
            if task.lock().await.is_expired(now, ttl) {
                expired.push(id);
            }
        }

        if expired.is_empty() {
            return 0;
        }

        // 종료된 태스크는 더 이상 바뀌지 않으므로 다시 확인하지 않습니다.
        let mut tasks = self.tasks.write().await;
        expired.iter().filter(|id| tasks.remove(*id).is_some()).count()
    }
}
