//! 확장 포인트: 탐지 모듈과 보고서 생성기 trait
//!
//! 디스패처는 모듈 종류별로 하나의 [`Detector`] 구현을 제네릭으로 보유합니다.
//! 테스트에서는 목(mock) 구현으로 교체합니다.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::DetectError;
use crate::outcome::{DetectionOutcome, ModuleKind};
use crate::types::FileMeta;

/// 탐지 모듈 trait
///
/// 외부 엔진(시그니처 스캐너, 추론 엔진, 로그 변환 도구)을 감싸는 어댑터가 구현합니다.
/// 반환된 에러는 디스패처가 `failed` 결과로 변환하므로, 구현은 패닉 대신 에러를 반환해야 합니다.
pub trait Detector: Send + Sync + 'static {
    /// 담당 모듈 종류
    fn kind(&self) -> ModuleKind;

    /// 파일 하나를 분석합니다.
    ///
    /// # Errors
    ///
    /// - `DetectError::Configuration`: 엔진 바이너리 / 규칙 번들 누락
    /// - `DetectError::Execution` / `DetectError::Timeout`: 외부 프로세스 실패
    /// - `DetectError::Io`: 파일 읽기 실패
    fn detect(
        &self,
        file: &FileMeta,
    ) -> impl Future<Output = Result<DetectionOutcome, DetectError>> + Send;
}

/// 파일 요약 보고서
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// 보고서를 생성한 제공자 이름
    pub provider: String,
    /// 보고서 본문 (markdown)
    pub content: String,
}

/// 보고서 생성기 trait
///
/// 파일 메타데이터와 모듈 결과를 받아 서술형 보고서를 만듭니다.
/// 실패를 호출자에게 전파하지 않습니다.
pub trait ReportGenerator: Send + Sync {
    fn generate(&self, file: &FileMeta, outcomes: &[DetectionOutcome]) -> Report;
}
