//! maltrace 평가 엔진
//!
//! 외부에서 제공된 정답 레이블로 배치 판정의 정확도를 계산합니다.
//!
//! - [`ground_truth`]: 정답 레이블 로더 (JSON 맵 / 레코드 배열 / CSV 표)
//! - [`metrics`]: 혼동 행렬과 지표 계산

pub mod error;
pub mod ground_truth;
pub mod metrics;

pub use error::EvaluationError;
pub use ground_truth::{
    GroundTruthMap, load_ground_truth, normalize_label, parse_map, parse_records, parse_tabular,
    read_ground_truth_file,
};
pub use metrics::{ConfusionMatrix, EvaluationResult, Metrics, evaluate};
