//! 로컬 요약 보고서 생성기
//!
//! 원격 서술형 보고서 생성 없이, 모듈 결과를 markdown 요약으로 정리합니다.

use std::fmt::Write;

use maltrace_core::detector::{Report, ReportGenerator};
use maltrace_core::outcome::DetectionOutcome;
use maltrace_core::types::FileMeta;

use crate::aggregator::combine;

/// 보고서 제공자 이름
pub const PROVIDER: &str = "local-summary";

/// markdown 요약 보고서 생성기
#[derive(Debug, Clone, Copy, Default)]
pub struct SummaryReportGenerator;

impl ReportGenerator for SummaryReportGenerator {
    fn generate(&self, file: &FileMeta, outcomes: &[DetectionOutcome]) -> Report {
        let verdict = combine(outcomes);
        let mut out = String::new();

        // String에 대한 write!는 실패하지 않습니다.
        let _ = writeln!(out, "# Detection summary: {}", file.filename);
        let _ = writeln!(out);
        let _ = writeln!(out, "- File type: {}", file.file_type);
        let _ = writeln!(out, "- Size: {} bytes", file.size);
        let _ = writeln!(out, "- SHA-256: {}", file.sha256);
        match verdict.score {
            Some(score) => {
                let _ = writeln!(out, "- Verdict: {} (score {score:.4})", verdict.label());
            }
            None => {
                let _ = writeln!(out, "- Verdict: {}", verdict.label());
            }
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "## Detection results");
        let _ = writeln!(out);

        if outcomes.is_empty() {
            let _ = writeln!(out, "- no detection results");
        }
        for outcome in outcomes {
            let malicious = match outcome.is_malicious {
                Some(true) => "yes",
                Some(false) => "no",
                None => "unknown",
            };
            let _ = writeln!(
                out,
                "- module: {} | status: {} | malicious: {malicious}",
                outcome.module, outcome.status
            );
            if let Some(message) = &outcome.message {
                let _ = writeln!(out, "  - detail: {message}");
            }
            if !outcome.matches.is_empty() {
                let hits: Vec<String> = outcome
                    .matches
                    .iter()
                    .map(|m| match (m.event_id, m.severity) {
                        (Some(id), Some(severity)) => format!("{} (event {id}, {severity})", m.title),
                        (Some(id), None) => format!("{} (event {id})", m.title),
                        _ => m.title.clone(),
                    })
                    .collect();
                let _ = writeln!(out, "  - rule hits: {}", hits.join(", "));
            }
            if let Some(prediction) = &outcome.prediction {
                if let Some(probability) = outcome.malicious_probability() {
                    let _ = writeln!(out, "  - malicious probability: {probability:.4}");
                } else if let Some(events) = prediction.get("events_scanned") {
                    let _ = writeln!(out, "  - events scanned: {events}");
                }
            }
        }

        Report {
            provider: PROVIDER.to_owned(),
            content: out,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use maltrace_core::outcome::MatchRecord;
    use maltrace_core::types::{FileType, Severity};

    fn meta() -> FileMeta {
        FileMeta {
            file_id: "f-1".to_owned(),
            filename: "Security.evtx".to_owned(),
            path: PathBuf::from("Security.evtx"),
            file_type: FileType::Evtx,
            size: 69_632,
            sha256: "ab".repeat(32),
        }
    }

    #[test]
    fn report_lists_outcomes_and_verdict() {
        let outcome = DetectionOutcome::success("dynamic", true)
            .with_message("matched 1 hunt rules")
            .with_matches(vec![MatchRecord {
                rule_id: "ps".to_owned(),
                title: "Suspicious PowerShell".to_owned(),
                severity: Some(Severity::High),
                event_id: Some(4688),
            }]);

        let report = SummaryReportGenerator.generate(&meta(), &[outcome]);
        assert_eq!(report.provider, "local-summary");
        assert!(report.content.starts_with("# Detection summary: Security.evtx"));
        assert!(report.content.contains("- Verdict: malicious"));
        assert!(report.content.contains("module: dynamic | status: success | malicious: yes"));
        assert!(report.content.contains("Suspicious PowerShell (event 4688"));
    }

    #[test]
    fn report_without_outcomes_is_benign() {
        let report = SummaryReportGenerator.generate(&meta(), &[]);
        assert!(report.content.contains("- Verdict: benign"));
        assert!(report.content.contains("- no detection results"));
    }
}
