//! 혼동 행렬과 탐지 성능 지표
//!
//! 예측과 정답 양쪽에 모두 있는 이름만 평가합니다. 한쪽에만 있는 항목은 조용히 제외됩니다.
//!
//! `false_negative_rate`는 전체 평가 샘플 대비 미탐 비율(`fn / total`)입니다.
//! 일반적인 `fn / (tp + fn)` 정의와 다르며, 보고서 호환을 위해 이 정의를 유지합니다.

use std::collections::HashMap;

use maltrace_core::types::round_to;
use serde::{Deserialize, Serialize};

use crate::ground_truth::GroundTruthMap;

/// 2×2 혼동 행렬
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub tp: usize,
    pub tn: usize,
    pub fp: usize,
    #[serde(rename = "fn")]
    pub fn_: usize,
}

impl ConfusionMatrix {
    pub fn total(&self) -> usize {
        self.tp + self.tn + self.fp + self.fn_
    }

    fn record(&mut self, predicted: bool, actual: bool) {
        match (predicted, actual) {
            (true, true) => self.tp += 1,
            (true, false) => self.fp += 1,
            (false, true) => self.fn_ += 1,
            (false, false) => self.tn += 1,
        }
    }
}

/// 탐지 성능 지표
///
/// 평가 가능한 샘플이 없으면 모든 값이 비어 있습니다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub accuracy: Option<f64>,
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    /// 미탐 / 전체 평가 샘플
    pub false_negative_rate: Option<f64>,
    /// 오탐 / 정상 샘플
    pub false_positive_rate: Option<f64>,
    /// 미탐 파일 이름 (예측 순서)
    #[serde(default)]
    pub false_negatives: Vec<String>,
    /// 오탐 파일 이름 (예측 순서)
    #[serde(default)]
    pub false_positives: Vec<String>,
}

impl Metrics {
    /// 평가 가능한 샘플이 없었는지 여부
    pub fn is_empty(&self) -> bool {
        self.accuracy.is_none()
            && self.precision.is_none()
            && self.recall.is_none()
            && self.false_negative_rate.is_none()
            && self.false_positive_rate.is_none()
            && self.false_negatives.is_empty()
            && self.false_positives.is_empty()
    }
}

/// 평가 결과
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub metrics: Metrics,
    pub confusion: ConfusionMatrix,
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        round_to(numerator as f64 / denominator as f64, 4)
    }
}

/// 예측(`이름 → 악성 여부`)을 정답 레이블로 평가합니다.
///
/// 같은 이름이 여러 번 나오면 처음 위치에 마지막 값이 남습니다.
pub fn evaluate(predictions: &[(String, bool)], ground_truth: &GroundTruthMap) -> EvaluationResult {
    let mut order: Vec<&str> = Vec::with_capacity(predictions.len());
    let mut latest: HashMap<&str, bool> = HashMap::with_capacity(predictions.len());
    for (name, predicted) in predictions {
        if latest.insert(name.as_str(), *predicted).is_none() {
            order.push(name.as_str());
        }
    }

    let mut confusion = ConfusionMatrix::default();
    let mut false_negatives = Vec::new();
    let mut false_positives = Vec::new();

    for name in order {
        let Some(&label) = ground_truth.get(name) else {
            continue;
        };
        let predicted = latest[name];
        let actual = label != 0;
        confusion.record(predicted, actual);
        match (predicted, actual) {
            (false, true) => false_negatives.push(name.to_owned()),
            (true, false) => false_positives.push(name.to_owned()),
            _ => {}
        }
    }

    let total = confusion.total();
    if total == 0 {
        return EvaluationResult {
            metrics: Metrics::default(),
            confusion,
        };
    }

    let ConfusionMatrix { tp, tn, fp, fn_ } = confusion;
    let metrics = Metrics {
        accuracy: Some(ratio(tp + tn, total)),
        precision: Some(ratio(tp, tp + fp)),
        recall: Some(ratio(tp, tp + fn_)),
        false_negative_rate: Some(ratio(fn_, total)),
        false_positive_rate: Some(ratio(fp, tn + fp)),
        false_negatives,
        false_positives,
    };

    EvaluationResult { metrics, confusion }
}
