//! maltrace-event-hunter -- 이벤트 로그 규칙 헌팅 엔진
//!
//! Windows 이벤트 로그를 구조화된 레코드로 변환한 뒤,
//! Sigma 스타일 YAML 규칙의 이벤트 ID / 키워드 조건으로 매칭합니다.
//!
//! # 흐름
//! ```text
//! .evtx ──▶ LogConverter ──▶ Vec<EventRecord> ──▶ HuntEngine::scan ──▶ HuntReport
//!                                                    ▲
//!                              RuleLoader ───────────┘ (rule_dir, 플랫폼 필터)
//! ```
//!
//! # 모듈
//! - [`rule`]: 규칙 로딩, 선택 절 트리 탐색, 매칭
//! - [`record`]: 변환 도구 출력 → [`EventRecord`]
//! - [`converter`]: 외부 로그 변환 도구 어댑터
//! - [`detector`]: `dynamic` 모듈 [`Detector`](maltrace_core::Detector) 구현

pub mod config;
pub mod converter;
pub mod detector;
pub mod error;
pub mod record;
pub mod rule;

pub use config::HuntConfig;
pub use converter::{EvtxDumpConverter, LogConverter};
pub use detector::DynamicDetector;
pub use error::HuntError;
pub use record::EventRecord;
pub use rule::{HuntEngine, HuntReport, RuleDefinition, RuleLoader, RuleNode};
