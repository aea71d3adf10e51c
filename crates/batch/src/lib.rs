//! maltrace 배치 오케스트레이터
//!
//! 여러 파일을 하나의 백그라운드 태스크로 처리하고, 진행 상황을 동시에 조회할 수 있게 합니다.
//!
//! - [`task`]: 태스크 상태 머신 (`Running` → `Completed` | `Failed`)과 조회 스냅샷
//! - [`registry`]: 태스크 ID → 태스크 레코드 공유 맵
//! - [`orchestrator`]: 배치 제출, 파일 단위 실패 격리, 완료 시 평가
//! - [`retention`]: 종료된 태스크의 TTL 기반 정리
//!
//! # 제한 사항
//!
//! 태스크 상태는 프로세스 메모리에만 존재하며 재시작하면 사라집니다.
//! 분산 조정이나 장애 복구는 제공하지 않습니다.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod registry;
pub mod retention;
pub mod task;

pub use config::OrchestratorConfig;
pub use error::BatchError;
pub use orchestrator::{BatchOrchestrator, BatchRequest};
pub use registry::TaskRegistry;
pub use retention::spawn_retention_sweeper;
pub use task::{BatchResult, BatchStatus, BatchTask, FileResult, TaskId, TaskStatus};
