//! `maltrace evaluate` command handler

use std::io::Write;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use maltrace_evaluation::{ConfusionMatrix, Metrics, evaluate, read_ground_truth_file};

use crate::cli::EvaluateArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render, percent_or_dash};

/// Execute the `evaluate` command.
pub async fn execute(args: EvaluateArgs, writer: &OutputWriter) -> Result<(), CliError> {
    let raw = tokio::fs::read(&args.predictions).await?;
    let predictions = parse_predictions(&raw)?;

    let ground_truth = read_ground_truth_file(&args.ground_truth).await?;
    if ground_truth.is_empty() {
        return Err(CliError::Command(format!(
            "no usable labels in {}",
            args.ground_truth.display()
        )));
    }
    info!(
        predictions = predictions.len(),
        labels = ground_truth.len(),
        "evaluating predictions"
    );

    let result = evaluate(&predictions, &ground_truth);
    if result.metrics.is_empty() {
        warn!("no prediction matched a ground-truth label");
    }

    let report = EvaluationReport {
        predictions: predictions.len(),
        labels: ground_truth.len(),
        matched: result.confusion.total(),
        confusion: result.confusion,
        metrics: result.metrics,
    };
    writer.render(&report)
}

/// Parse a JSON object mapping file name to a malicious prediction.
///
/// Values may be booleans or the integers `0` / `1`. Entries keep document order.
pub(crate) fn parse_predictions(raw: &[u8]) -> Result<Vec<(String, bool)>, CliError> {
    let value: Value = serde_json::from_slice(raw)?;
    let Value::Object(map) = value else {
        return Err(CliError::Command(
            "predictions must be a JSON object of name -> bool".to_owned(),
        ));
    };

    map.into_iter()
        .map(|(name, value)| {
            let predicted = match &value {
                Value::Bool(b) => *b,
                Value::Number(n) if n.as_u64() == Some(0) => false,
                Value::Number(n) if n.as_u64() == Some(1) => true,
                other => {
                    return Err(CliError::Command(format!(
                        "prediction for {name} must be a boolean, got {other}"
                    )));
                }
            };
            Ok((name, predicted))
        })
        .collect()
}

#[derive(Serialize)]
pub struct EvaluationReport {
    pub predictions: usize,
    pub labels: usize,
    pub matched: usize,
    pub confusion: ConfusionMatrix,
    pub metrics: Metrics,
}

impl Render for EvaluationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "Evaluation: {} predictions, {} labels, {} matched",
            self.predictions,
            self.labels,
            self.matched
        )?;
        writeln!(w)?;
        writeln!(w, "                 actual mal   actual benign")?;
        writeln!(
            w,
            "  predicted mal  {:>10}   {:>13}",
            self.confusion.tp, self.confusion.fp
        )?;
        writeln!(
            w,
            "  predicted ben  {:>10}   {:>13}",
            self.confusion.fn_, self.confusion.tn
        )?;
        writeln!(w)?;
        writeln!(w, "Accuracy:            {}", percent_or_dash(self.metrics.accuracy))?;
        writeln!(w, "Precision:           {}", percent_or_dash(self.metrics.precision))?;
        writeln!(w, "Recall:              {}", percent_or_dash(self.metrics.recall))?;
        writeln!(
            w,
            "False negative rate: {}",
            percent_or_dash(self.metrics.false_negative_rate)
        )?;
        writeln!(
            w,
            "False positive rate: {}",
            percent_or_dash(self.metrics.false_positive_rate)
        )?;

        if !self.metrics.false_negatives.is_empty() {
            writeln!(w)?;
            writeln!(w, "Missed:")?;
            for name in &self.metrics.false_negatives {
                writeln!(w, "  {}", name.red())?;
            }
        }
        if !self.metrics.false_positives.is_empty() {
            writeln!(w)?;
            writeln!(w, "False alarms:")?;
            for name in &self.metrics.false_positives {
                writeln!(w, "  {}", name.yellow())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_predictions_accepts_bools_and_bits() {
        let raw = br#"{"b.exe": 1, "a.exe": true, "c.exe": false, "d.exe": 0}"#;
        let predictions = parse_predictions(raw).expect("valid predictions");
        assert_eq!(
            predictions,
            vec![
                ("b.exe".to_owned(), true),
                ("a.exe".to_owned(), true),
                ("c.exe".to_owned(), false),
                ("d.exe".to_owned(), false),
            ]
        );
    }

    #[test]
    fn parse_predictions_rejects_other_values() {
        assert!(parse_predictions(br#"{"a.exe": "yes"}"#).is_err());
        assert!(parse_predictions(br#"{"a.exe": 2}"#).is_err());
        assert!(parse_predictions(br#"[true]"#).is_err());
        assert!(parse_predictions(b"not json").is_err());
    }

    #[test]
    fn text_render_shows_missed_files() {
        let predictions = vec![("a.exe".to_owned(), false), ("b.exe".to_owned(), true)];
        let ground_truth = [("a.exe".to_owned(), 1u8), ("b.exe".to_owned(), 1u8)]
            .into_iter()
            .collect();
        let result = evaluate(&predictions, &ground_truth);
        let report = EvaluationReport {
            predictions: 2,
            labels: 2,
            matched: result.confusion.total(),
            confusion: result.confusion,
            metrics: result.metrics,
        };

        let mut buffer = Vec::new();
        report.render_text(&mut buffer).expect("render");
        let output = String::from_utf8(buffer).expect("utf-8");
        assert!(output.contains("2 matched"));
        assert!(output.contains("Recall:              50.00%"));
        assert!(output.contains("Missed:"));
        assert!(output.contains("a.exe"));
    }
}
