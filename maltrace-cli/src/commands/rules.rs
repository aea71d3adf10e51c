//! `maltrace rules` command handler

use std::io::Write;
use std::path::PathBuf;

use serde::Serialize;
use tracing::info;

use maltrace_core::config::MaltraceConfig;
use maltrace_event_hunter::{HuntConfig, RuleDefinition, RuleLoader};
use maltrace_event_hunter::rule::LoadSummary;

use crate::cli::{RulesAction, RulesArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `rules` command.
pub async fn execute(
    args: RulesArgs,
    config: &MaltraceConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        RulesAction::List { dir } => execute_list(hunt_config(config, dir)?, writer).await,
        RulesAction::Validate { dir } => execute_validate(hunt_config(config, dir)?, writer).await,
    }
}

fn hunt_config(config: &MaltraceConfig, dir: Option<PathBuf>) -> Result<HuntConfig, CliError> {
    let mut hunt = HuntConfig::from_core(&config.dynamic);
    if let Some(dir) = dir {
        hunt.rule_dir = dir;
    }
    hunt.validate()?;
    Ok(hunt)
}

async fn execute_list(hunt: HuntConfig, writer: &OutputWriter) -> Result<(), CliError> {
    info!(rule_dir = %hunt.rule_dir.display(), "loading hunt rules");

    let (rules, _) = RuleLoader::load_directory(&hunt).await?;

    let report = RuleListReport {
        rule_dir: hunt.rule_dir.display().to_string(),
        platform: hunt.platform.clone(),
        total: rules.len(),
        rules: rules.iter().map(RuleEntry::from).collect(),
    };
    writer.render(&report)
}

async fn execute_validate(hunt: HuntConfig, writer: &OutputWriter) -> Result<(), CliError> {
    info!(rule_dir = %hunt.rule_dir.display(), "validating hunt rules");

    let (rules, summary) = RuleLoader::load_directory(&hunt).await?;
    let report = RuleValidationReport::new(&hunt, rules.len(), &summary);
    writer.render(&report)?;

    if report.loaded == 0 {
        return Err(CliError::Rule(format!(
            "no {} rules loaded from {}",
            report.platform, report.rule_dir
        )));
    }
    Ok(())
}

#[derive(Serialize)]
pub struct RuleListReport {
    pub rule_dir: String,
    pub platform: String,
    pub total: usize,
    pub rules: Vec<RuleEntry>,
}

#[derive(Serialize)]
pub struct RuleEntry {
    pub id: String,
    pub title: String,
    pub severity: Option<String>,
    pub event_ids: usize,
    pub keywords: usize,
}

impl From<&RuleDefinition> for RuleEntry {
    fn from(rule: &RuleDefinition) -> Self {
        Self {
            id: rule.id.clone(),
            title: rule.title.clone(),
            severity: rule.severity.map(|s| s.to_string()),
            event_ids: rule.event_ids.len(),
            keywords: rule.keywords.len(),
        }
    }
}

impl Render for RuleListReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "Hunt Rules ({} {} rules from {})",
            self.total.to_string().bold(),
            self.platform,
            self.rule_dir
        )?;
        writeln!(w)?;
        writeln!(
            w,
            "{:<36} {:<40} {:<10} {:>6} {:>8}",
            "ID", "Title", "Severity", "IDs", "Keywords"
        )?;
        writeln!(w, "{}", "-".repeat(104))?;

        for r in &self.rules {
            let severity = r.severity.as_deref().unwrap_or("-");
            let severity = match severity {
                "Critical" => severity.red().bold(),
                "High" => severity.red(),
                "Medium" => severity.yellow(),
                _ => severity.normal(),
            };
            let keywords = if r.event_ids == 0 && r.keywords == 0 {
                "never".dimmed()
            } else {
                r.keywords.to_string().normal()
            };
            writeln!(
                w,
                "{:<36} {:<40} {:<10} {:>6} {:>8}",
                r.id, r.title, severity, r.event_ids, keywords
            )?;
        }

        Ok(())
    }
}

#[derive(Serialize)]
pub struct RuleValidationReport {
    pub rule_dir: String,
    pub platform: String,
    pub candidates: usize,
    pub loaded: usize,
    pub unparsable: usize,
    pub filtered: usize,
    pub duplicates: usize,
    pub degenerate: usize,
}

impl RuleValidationReport {
    fn new(hunt: &HuntConfig, loaded: usize, summary: &LoadSummary) -> Self {
        Self {
            rule_dir: hunt.rule_dir.display().to_string(),
            platform: hunt.platform.clone(),
            candidates: summary.candidates,
            loaded,
            unparsable: summary.unparsable,
            filtered: summary.filtered,
            duplicates: summary.duplicates,
            degenerate: summary.degenerate,
        }
    }
}

impl Render for RuleValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Rule Validation: {}", self.rule_dir.bold())?;
        writeln!(w, "  Platform:    {}", self.platform)?;
        writeln!(w, "  Candidates:  {}", self.candidates)?;
        let loaded = if self.loaded > 0 {
            self.loaded.to_string().green()
        } else {
            self.loaded.to_string().red()
        };
        writeln!(w, "  Loaded:      {loaded}")?;
        writeln!(w, "  Unparsable:  {}", self.unparsable)?;
        writeln!(w, "  Other platform: {}", self.filtered)?;
        writeln!(w, "  Duplicate id:   {}", self.duplicates)?;
        if self.degenerate > 0 {
            writeln!(
                w,
                "  {} rule(s) have neither event ids nor keywords and never match",
                self.degenerate.to_string().yellow()
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::OutputFormat;

    const WIN_RULE: &str = r#"
title: Suspicious PowerShell
id: ps-001
level: high
logsource:
  product: windows
detection:
  selection:
    EventID: 4104
    ScriptBlockText|contains: "IEX"
  condition: selection
"#;

    const LINUX_RULE: &str = r#"
title: Linux thing
id: lx-001
logsource:
  product: linux
detection:
  selection:
    keyword: "sudo"
  condition: selection
"#;

    #[tokio::test]
    async fn validate_counts_loaded_and_filtered() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(dir.path().join("a_ps.yml"), WIN_RULE).expect("write");
        std::fs::write(dir.path().join("b_linux.yml"), LINUX_RULE).expect("write");
        std::fs::write(dir.path().join("c_broken.yml"), "::: not yaml [").expect("write");

        let hunt = hunt_config(&MaltraceConfig::default(), Some(dir.path().to_path_buf()))
            .expect("valid");
        let (rules, summary) = RuleLoader::load_directory(&hunt).await.expect("load");
        let report = RuleValidationReport::new(&hunt, rules.len(), &summary);

        assert_eq!(report.candidates, 3);
        assert_eq!(report.loaded, 1);
        assert_eq!(report.filtered, 1);
        assert_eq!(report.unparsable, 1);

        let entry = RuleEntry::from(&rules[0]);
        assert_eq!(entry.id, "ps-001");
        assert_eq!(entry.severity.as_deref(), Some("High"));
        assert_eq!(entry.event_ids, 1);
    }

    #[tokio::test]
    async fn validate_fails_when_nothing_loads() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(dir.path().join("b_linux.yml"), LINUX_RULE).expect("write");

        let hunt = hunt_config(&MaltraceConfig::default(), Some(dir.path().to_path_buf()))
            .expect("valid");
        let writer = OutputWriter::new(OutputFormat::Json);
        let err = execute_validate(hunt, &writer).await.expect_err("no rules");
        assert!(matches!(err, CliError::Rule(_)));
    }

    #[tokio::test]
    async fn missing_rule_dir_is_a_rule_error() {
        let hunt = hunt_config(
            &MaltraceConfig::default(),
            Some(PathBuf::from("/nonexistent/rules")),
        )
        .expect("valid");
        let writer = OutputWriter::new(OutputFormat::Json);
        let err = execute_list(hunt, &writer).await.expect_err("missing dir");
        assert!(matches!(err, CliError::Rule(_)));
    }
}
