//! `maltrace detect` command handler

use std::io::Write;

use serde::Serialize;
use tracing::info;

use maltrace_core::config::MaltraceConfig;
use maltrace_core::detector::{Report, ReportGenerator};
use maltrace_core::error::MaltraceError;
use maltrace_core::outcome::{DetectionOutcome, ModuleStatus};
use maltrace_core::types::FileMeta;
use maltrace_detectors::{SummaryReportGenerator, combine, default_modules};

use crate::cli::DetectArgs;
use crate::engine::build_dispatcher;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `detect` command.
pub async fn execute(
    args: DetectArgs,
    config: &MaltraceConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let dispatcher = build_dispatcher(config)?;
    let file = FileMeta::inspect(&args.file, config.storage.max_file_size_bytes())
        .await
        .map_err(MaltraceError::from)?;

    let modules = match args.modules {
        Some(requested) => normalize_modules(&requested),
        None => default_modules(&file.file_type),
    };
    info!(
        file = %file.filename,
        file_type = %file.file_type,
        modules = ?modules,
        "running detection"
    );

    let outcomes = dispatcher.run_modules(&file, &modules).await?;
    let verdict = combine(&outcomes);
    let summary = SummaryReportGenerator.generate(&file, &outcomes);

    let report = DetectReport {
        file,
        verdict: verdict.label(),
        malicious_score: verdict.score,
        outcomes,
        report: summary,
    };
    writer.render(&report)
}

/// Lower-case, trim and de-duplicate requested module names, keeping first positions.
fn normalize_modules(requested: &[String]) -> Vec<String> {
    let mut modules: Vec<String> = Vec::with_capacity(requested.len());
    for name in requested {
        let name = name.trim().to_lowercase();
        if !name.is_empty() && !modules.contains(&name) {
            modules.push(name);
        }
    }
    modules
}

/// Single-file detection payload.
#[derive(Serialize)]
pub struct DetectReport {
    pub file: FileMeta,
    pub verdict: &'static str,
    pub malicious_score: Option<f64>,
    pub outcomes: Vec<DetectionOutcome>,
    pub report: Report,
}

impl Render for DetectReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "File: {}", self.file.filename.bold())?;
        writeln!(w, "Type: {}", self.file.file_type)?;
        writeln!(w, "Size: {} bytes", self.file.size)?;
        writeln!(w, "SHA-256: {}", self.file.sha256)?;
        writeln!(w)?;

        writeln!(
            w,
            "{:<10} {:<10} {:<10} {:>10}  Message",
            "Module", "Status", "Verdict", "Time (ms)"
        )?;
        writeln!(w, "{}", "-".repeat(80))?;
        for o in &self.outcomes {
            let status = match o.status {
                ModuleStatus::Success => o.status.to_string().green(),
                ModuleStatus::Failed => o.status.to_string().red(),
                ModuleStatus::Skipped => o.status.to_string().dimmed(),
            };
            let verdict = match o.is_malicious {
                Some(true) => "malicious".red().bold(),
                Some(false) => "benign".normal(),
                None => "-".dimmed(),
            };
            let duration = o
                .duration_ms
                .map_or_else(|| "-".to_owned(), |d| format!("{d:.2}"));
            writeln!(
                w,
                "{:<10} {:<10} {:<10} {:>10}  {}",
                o.module,
                status,
                verdict,
                duration,
                o.message.as_deref().unwrap_or("")
            )?;
        }
        writeln!(w)?;

        let verdict = if self.verdict == "malicious" {
            self.verdict.red().bold()
        } else {
            self.verdict.green().bold()
        };
        match self.malicious_score {
            Some(score) => writeln!(w, "Verdict: {verdict} (score {score:.4})")?,
            None => writeln!(w, "Verdict: {verdict}")?,
        }
        writeln!(w)?;
        write!(w, "{}", self.report.content)?;

        Ok(())
    }
}
