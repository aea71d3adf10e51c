//! 태스크 보존 정책 -- 종료된 태스크의 TTL 기반 정리
//!
//! 종료 후 `ttl`이 지난 태스크를 `interval`마다 레지스트리에서 제거합니다.
//! 실행 중인 태스크는 제거하지 않습니다.

use std::time::Duration;

use maltrace_core::metrics as m;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::registry::TaskRegistry;

/// 보존 기간 정리 태스크를 시작합니다. `cancel`이 발동되면 종료합니다.
pub fn spawn_retention_sweeper(
    registry: TaskRegistry,
    ttl: Duration,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // 첫 tick은 즉시 완료됩니다.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("retention sweeper stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let evicted = registry.evict_expired(ttl).await;
                    if evicted > 0 {
                        metrics::counter!(m::BATCH_TASKS_EVICTED_TOTAL).increment(evicted as u64);
                        info!(evicted, ttl_secs = ttl.as_secs(), "evicted expired batch tasks");
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sweeper_evicts_after_ttl_and_stops_on_cancel() {
        let registry = TaskRegistry::new();
        let (id, task) = registry.create(0, Vec::new()).await;
        task.lock().await.complete(None);

        let cancel = CancellationToken::new();
        let handle = spawn_retention_sweeper(
            registry.clone(),
            Duration::from_secs(10),
            Duration::from_secs(5),
            cancel.clone(),
        );

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(registry.get(&id).await.is_some());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(registry.get(&id).await.is_none());

        cancel.cancel();
        handle.await.unwrap();
    }
}
