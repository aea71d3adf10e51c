//! maltrace 탐지 모듈 크레이트
//!
//! 파일 하나를 여러 탐지 모듈에 보내고, 그 결과를 하나의 판정으로 합칩니다.
//!
//! - [`dispatcher`]: 모듈 이름 + 파일 유형 → 탐지기 호출, 적용 불가 조합 정규화
//! - [`aggregator`]: 모듈 결과 → 판정 ([`Verdict`])
//! - [`signature`]: `static` 모듈 (시그니처 스캐너 어댑터)
//! - [`inference`]: `ai` 모듈 (신경망 추론 엔진 어댑터)
//! - [`report`]: 로컬 markdown 요약 보고서

pub mod aggregator;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod inference;
pub mod report;
pub mod signature;

pub use aggregator::{Verdict, combine};
pub use config::{InferenceConfig, SignatureConfig};
pub use dispatcher::{ModuleDispatcher, default_modules};
pub use error::DetectorError;
pub use inference::{AiDetector, CommandInferenceBackend, InferenceBackend};
pub use report::SummaryReportGenerator;
pub use signature::StaticDetector;
