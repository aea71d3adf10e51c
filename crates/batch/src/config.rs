//! 오케스트레이터 설정
//!
//! core의 [`BatchConfig`](maltrace_core::config::BatchConfig)와
//! [`StorageConfig`](maltrace_core::config::StorageConfig)에서 파생됩니다.

use std::time::Duration;

use maltrace_core::config::{BatchConfig, StorageConfig};

use crate::error::BatchError;

/// 오케스트레이터 설정
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// 종료된 태스크 보존 기간
    pub task_ttl: Duration,
    /// 보존 기간 점검 주기
    pub sweep_interval: Duration,
    /// 정답 레이블 페이로드 최대 크기 (바이트)
    pub max_ground_truth_bytes: usize,
    /// 입력 파일 최대 크기 (바이트)
    pub max_file_size: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from_core(&BatchConfig::default(), &StorageConfig::default())
    }
}

impl OrchestratorConfig {
    pub fn from_core(batch: &BatchConfig, storage: &StorageConfig) -> Self {
        Self {
            task_ttl: Duration::from_secs(batch.task_ttl_secs),
            sweep_interval: Duration::from_secs(batch.sweep_interval_secs),
            max_ground_truth_bytes: batch.max_ground_truth_bytes,
            max_file_size: storage.max_file_size_bytes(),
        }
    }

    pub fn validate(&self) -> Result<(), BatchError> {
        let invalid = |field: &str| {
            Err(BatchError::Config {
                field: format!("batch.{field}"),
                reason: "must be greater than 0".to_owned(),
            })
        };
        if self.task_ttl.is_zero() {
            return invalid("task_ttl_secs");
        }
        if self.sweep_interval.is_zero() {
            return invalid("sweep_interval_secs");
        }
        if self.max_ground_truth_bytes == 0 {
            return invalid("max_ground_truth_bytes");
        }
        if self.max_file_size == 0 {
            return Err(BatchError::Config {
                field: "storage.max_file_size_mb".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }
        Ok(())
    }
}
