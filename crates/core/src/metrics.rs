//! 메트릭 상수 및 설명 등록
//!
//! 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 크레이트는 이 상수로 `metrics::counter!()`, `metrics::histogram!()`을 호출합니다.
//! 레코더(exporter) 설치는 임베딩하는 프로세스의 몫입니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `maltrace_`
//! - 접미어: `_total` (counter), `_seconds` (histogram)

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 모듈 레이블 키 (static, ai, dynamic)
pub const LABEL_MODULE: &str = "module";

/// 상태 레이블 키 (success, failed, skipped)
pub const LABEL_STATUS: &str = "status";

/// 심각도 레이블 키
pub const LABEL_SEVERITY: &str = "severity";

// ─── Batch 메트릭 ──────────────────────────────────────────────────

/// 제출된 배치 수 (counter)
pub const BATCH_SUBMITTED_TOTAL: &str = "maltrace_batch_submitted_total";

/// 완료된 배치 수 (counter)
pub const BATCH_COMPLETED_TOTAL: &str = "maltrace_batch_completed_total";

/// 실패한 배치 수 (counter)
pub const BATCH_FAILED_TOTAL: &str = "maltrace_batch_failed_total";

/// 처리된 파일 수 (counter)
pub const BATCH_FILES_PROCESSED_TOTAL: &str = "maltrace_batch_files_processed_total";

/// 파일 단위 에러 수 (counter)
pub const BATCH_FILE_ERRORS_TOTAL: &str = "maltrace_batch_file_errors_total";

/// 보존 기간 만료로 제거된 태스크 수 (counter)
pub const BATCH_TASKS_EVICTED_TOTAL: &str = "maltrace_batch_tasks_evicted_total";

// ─── Module 메트릭 ─────────────────────────────────────────────────

/// 모듈 실행 결과 수 (counter, label: module, status)
pub const MODULE_OUTCOMES_TOTAL: &str = "maltrace_module_outcomes_total";

/// 모듈 실행 시간 (histogram, 초, label: module)
pub const MODULE_DURATION_SECONDS: &str = "maltrace_module_duration_seconds";

// ─── Hunt 메트릭 ───────────────────────────────────────────────────

/// 규칙 매칭 수 (counter, label: severity)
pub const HUNT_RULE_MATCHES_TOTAL: &str = "maltrace_hunt_rule_matches_total";

/// 검사한 이벤트 수 (counter)
pub const HUNT_EVENTS_SCANNED_TOTAL: &str = "maltrace_hunt_events_scanned_total";

// ─── 히스토그램 버킷 ───────────────────────────────────────────────

/// 모듈 실행 시간 버킷 (초). 외부 프로세스 타임아웃 상한(600초)까지 포함합니다.
pub const MODULE_DURATION_BUCKETS: [f64; 9] = [0.01, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 120.0, 600.0];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_histogram};

    describe_counter!(BATCH_SUBMITTED_TOTAL, "Total number of batches submitted");
    describe_counter!(
        BATCH_COMPLETED_TOTAL,
        "Total number of batches that reached the Completed state"
    );
    describe_counter!(
        BATCH_FAILED_TOTAL,
        "Total number of batches that reached the Failed state"
    );
    describe_counter!(
        BATCH_FILES_PROCESSED_TOTAL,
        "Total number of files processed by batch workers"
    );
    describe_counter!(
        BATCH_FILE_ERRORS_TOTAL,
        "Total number of per-file errors recorded in batches"
    );
    describe_counter!(
        BATCH_TASKS_EVICTED_TOTAL,
        "Total number of terminal tasks evicted by the retention sweeper"
    );
    describe_counter!(
        MODULE_OUTCOMES_TOTAL,
        "Detection module outcomes by module and status"
    );
    describe_histogram!(
        MODULE_DURATION_SECONDS,
        "Time spent in a single detection module run in seconds"
    );
    describe_counter!(
        HUNT_RULE_MATCHES_TOTAL,
        "Total number of event-log rule matches"
    );
    describe_counter!(
        HUNT_EVENTS_SCANNED_TOTAL,
        "Total number of event records scanned by the rule engine"
    );
}
