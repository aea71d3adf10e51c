//! `maltrace scan` command handler

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use maltrace_batch::{
    BatchOrchestrator, BatchRequest, BatchStatus, FileResult, OrchestratorConfig, TaskId,
    TaskStatus,
};
use maltrace_core::config::{MaltraceConfig, StorageConfig};
use maltrace_core::detector::Detector;
use maltrace_core::outcome::{DetectionOutcome, ModuleStatus};

use crate::cli::ScanArgs;
use crate::engine::build_dispatcher;
use crate::error::CliError;
use crate::output::{OutputWriter, Render, percent_or_dash};

/// Execute the `scan` command.
pub async fn execute(
    args: ScanArgs,
    config: &MaltraceConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let (files, rejected) = collect_files(&args.paths, &config.storage).await?;
    let ground_truth = match &args.ground_truth {
        Some(path) => Some(tokio::fs::read(path).await?),
        None => None,
    };

    let orchestrator_config = OrchestratorConfig::from_core(&config.batch, &config.storage);
    orchestrator_config.validate()?;
    let orchestrator = BatchOrchestrator::new(build_dispatcher(config)?, orchestrator_config);

    let mut request = BatchRequest::new(files).with_initial_errors(rejected);
    if let Some(modules) = args.modules {
        request = request.with_modules(modules);
    }
    if let Some(bytes) = ground_truth {
        request = request.with_ground_truth(bytes);
    }

    let task_id = orchestrator.submit(request).await;
    let poll = Duration::from_millis(args.poll_ms.max(1));
    let status = tokio::select! {
        status = poll_until_done(&orchestrator, &task_id, poll) => status?,
        _ = tokio::signal::ctrl_c() => {
            warn!(task_id = %task_id, "interrupt received, stopping batch at the next file");
            orchestrator.shutdown();
            poll_until_done(&orchestrator, &task_id, poll).await?
        }
    };

    let partial_results = if status.status == TaskStatus::Failed {
        orchestrator.results(&task_id).await?
    } else {
        Vec::new()
    };
    orchestrator.shutdown();

    let report = ScanReport {
        status,
        partial_results,
    };
    writer.render(&report)?;

    match report.status.status {
        TaskStatus::Failed => Err(CliError::Batch(
            report.status.message.clone().unwrap_or_default(),
        )),
        _ if !report.status.errors.is_empty() => Err(CliError::ItemErrors {
            count: report.status.errors.len(),
        }),
        _ => Ok(()),
    }
}

/// Expand the command-line paths into batch inputs.
///
/// Directories contribute their regular files (one level, sorted by name).
/// Files whose extension is not allowed become `"<name>: extension not allowed"`
/// entries. Paths that do not exist are passed through so the batch reports them.
pub(crate) async fn collect_files(
    paths: &[PathBuf],
    storage: &StorageConfig,
) -> Result<(Vec<PathBuf>, Vec<String>), CliError> {
    let mut files = Vec::new();
    let mut rejected = Vec::new();

    for path in paths {
        let is_dir = tokio::fs::metadata(path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);

        let candidates = if is_dir {
            list_directory(path).await?
        } else {
            vec![path.clone()]
        };

        for candidate in candidates {
            if storage.allows(&candidate) {
                files.push(candidate);
            } else {
                rejected.push(format!("{}: extension not allowed", file_label(&candidate)));
            }
        }
    }

    Ok((files, rejected))
}

async fn list_directory(dir: &Path) -> Result<Vec<PathBuf>, CliError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

async fn poll_until_done<S: Detector, A: Detector, D: Detector>(
    orchestrator: &BatchOrchestrator<S, A, D>,
    task_id: &TaskId,
    poll: Duration,
) -> Result<BatchStatus, CliError> {
    let mut last_completed = None;
    loop {
        let status = orchestrator.status(task_id).await?;
        if last_completed != Some(status.completed) {
            info!(
                task_id = %task_id,
                completed = status.completed,
                total = status.total,
                percent = status.percent,
                current = status.current.as_deref().unwrap_or(""),
                "batch progress"
            );
            last_completed = Some(status.completed);
        }
        if status.is_terminal() {
            return Ok(status);
        }
        tokio::time::sleep(poll).await;
    }
}

/// Final scan payload: the terminal poll response, plus partial results of a failed batch.
#[derive(Serialize)]
pub struct ScanReport {
    #[serde(flatten)]
    pub status: BatchStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub partial_results: Vec<FileResult>,
}

fn outcome_label(outcome: &DetectionOutcome) -> &'static str {
    match (outcome.status, outcome.is_malicious) {
        (ModuleStatus::Failed, _) => "failed",
        (ModuleStatus::Skipped, _) => "skipped",
        (ModuleStatus::Success, Some(true)) => "malicious",
        (ModuleStatus::Success, _) => "benign",
    }
}

fn render_results(w: &mut dyn Write, results: &[FileResult]) -> std::io::Result<()> {
    use colored::Colorize;

    writeln!(
        w,
        "{:<32} {:<8} {:<10} {:<8} Modules",
        "File", "Type", "Verdict", "Score"
    )?;
    writeln!(w, "{}", "-".repeat(90))?;

    for r in results {
        let verdict = if r.is_malicious() {
            r.verdict.red().bold()
        } else {
            r.verdict.green()
        };
        let score = r
            .malicious_score
            .map_or_else(|| "-".to_owned(), |s| format!("{s:.4}"));
        let modules: Vec<String> = r
            .results
            .iter()
            .map(|(module, outcome)| format!("{module}={}", outcome_label(outcome)))
            .collect();

        writeln!(
            w,
            "{:<32} {:<8} {:<10} {:<8} {}",
            r.filename,
            r.file_type.label(),
            verdict,
            score,
            modules.join(" ")
        )?;
    }
    Ok(())
}

impl Render for ScanReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        let status = &self.status;
        let state = match status.status {
            TaskStatus::Completed => status.status.to_string().green().bold(),
            TaskStatus::Failed => status.status.to_string().red().bold(),
            TaskStatus::Running => status.status.to_string().yellow(),
        };

        writeln!(w, "Batch {} {}", status.task_id.as_str().bold(), state)?;
        writeln!(
            w,
            "Progress: {}/{} ({:.2}%)",
            status.completed, status.total, status.percent
        )?;
        if let Some(message) = &status.message {
            writeln!(w, "Message: {}", message.red())?;
        }
        writeln!(w)?;

        if let Some(result) = &status.result {
            if result.results.is_empty() {
                writeln!(w, "{}", "No files analysed.".dimmed())?;
            } else {
                render_results(w, &result.results)?;
            }
        } else if !self.partial_results.is_empty() {
            writeln!(w, "Partial results:")?;
            render_results(w, &self.partial_results)?;
        }

        if !status.errors.is_empty() {
            writeln!(w)?;
            writeln!(w, "Errors ({}):", status.errors.len())?;
            for e in &status.errors {
                writeln!(w, "  {}", e.red())?;
            }
        }

        if let Some(metrics) = status.result.as_ref().and_then(|r| r.metrics.as_ref()) {
            writeln!(w)?;
            writeln!(w, "Evaluation:")?;
            writeln!(w, "  Accuracy:            {}", percent_or_dash(metrics.accuracy))?;
            writeln!(w, "  Precision:           {}", percent_or_dash(metrics.precision))?;
            writeln!(w, "  Recall:              {}", percent_or_dash(metrics.recall))?;
            writeln!(
                w,
                "  False negative rate: {}",
                percent_or_dash(metrics.false_negative_rate)
            )?;
            writeln!(
                w,
                "  False positive rate: {}",
                percent_or_dash(metrics.false_positive_rate)
            )?;
            if !metrics.false_negatives.is_empty() {
                writeln!(w, "  Missed: {}", metrics.false_negatives.join(", ").red())?;
            }
            if !metrics.false_positives.is_empty() {
                writeln!(
                    w,
                    "  False alarms: {}",
                    metrics.false_positives.join(", ").yellow()
                )?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn collect_files_expands_directories_one_level() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(dir.path().join("b.exe"), b"MZ").expect("write");
        std::fs::write(dir.path().join("a.ps1"), b"echo").expect("write");
        std::fs::write(dir.path().join("notes.docx"), b"doc").expect("write");
        std::fs::create_dir(dir.path().join("nested")).expect("mkdir");
        std::fs::write(dir.path().join("nested").join("c.exe"), b"MZ").expect("write");

        let (files, rejected) =
            collect_files(&[dir.path().to_path_buf()], &StorageConfig::default())
                .await
                .expect("collect");

        let names: Vec<String> = files.iter().map(|p| file_label(p)).collect();
        assert_eq!(names, vec!["a.ps1", "b.exe"]);
        assert_eq!(rejected, vec!["notes.docx: extension not allowed"]);
    }

    #[tokio::test]
    async fn collect_files_passes_missing_paths_through() {
        let missing = PathBuf::from("/nonexistent/sample.exe");
        let (files, rejected) = collect_files(&[missing.clone()], &StorageConfig::default())
            .await
            .expect("collect");
        assert_eq!(files, vec![missing]);
        assert!(rejected.is_empty());
    }

    #[tokio::test]
    async fn collect_files_accepts_everything_without_allow_list() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("README");
        std::fs::write(&path, b"text").expect("write");
        let storage = StorageConfig {
            allowed_extensions: Vec::new(),
            ..StorageConfig::default()
        };

        let (files, rejected) = collect_files(&[path.clone()], &storage)
            .await
            .expect("collect");
        assert_eq!(files, vec![path]);
        assert!(rejected.is_empty());
    }

    #[test]
    fn outcome_labels() {
        assert_eq!(
            outcome_label(&DetectionOutcome::success("static", true)),
            "malicious"
        );
        assert_eq!(
            outcome_label(&DetectionOutcome::success("ai", false)),
            "benign"
        );
        assert_eq!(
            outcome_label(&DetectionOutcome::failed("ai", "not configured")),
            "failed"
        );
        assert_eq!(
            outcome_label(&DetectionOutcome::skipped("dynamic", "n/a")),
            "skipped"
        );
    }
}
