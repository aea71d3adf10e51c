//! maltrace 공통 크레이트
//!
//! 모든 탐지 모듈과 오케스트레이터가 공유하는 타입, trait, 에러, 설정을 정의합니다.
//!
//! - [`outcome`]: 모듈 실행 결과 ([`DetectionOutcome`])
//! - [`types`]: 파일 메타데이터, 파일 유형, 심각도
//! - [`detector`]: 탐지 모듈 / 보고서 생성기 확장 포인트
//! - [`process`]: 타임아웃이 걸린 외부 프로세스 실행
//! - [`config`]: `maltrace.toml` 설정
//! - [`metrics`]: 메트릭 이름 상수

pub mod config;
pub mod detector;
pub mod error;
pub mod metrics;
pub mod outcome;
pub mod process;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, DetectError, InputError, MaltraceError};

// 설정
pub use config::MaltraceConfig;

// trait
pub use detector::{Detector, Report, ReportGenerator};

// 도메인 타입
pub use outcome::{DetectionOutcome, MatchRecord, ModuleKind, ModuleStatus};
pub use types::{FileMeta, FileType, Severity};
