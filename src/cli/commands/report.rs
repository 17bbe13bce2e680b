//! Implementation of the `kube-invariants report` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Args;

use crate::cli::output::{output, summary_table, CommandOutput};
use crate::domain::models::{Config, FinalReport};
use crate::services::report_aggregator::{summarize, ReportAggregator, ReportSummary};

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// JSON-lines log produced by a suite run
    pub log_file: PathBuf,

    /// Directory the report is written to (must exist)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, serde::Serialize)]
pub struct ReportOutput {
    pub report_path: PathBuf,
    pub success_ratio: String,
    pub failing_tests: Vec<String>,
    pub failed_but_not_allowed: Vec<String>,
    pub summary: Option<ReportSummary>,
}

impl ReportOutput {
    pub fn new(report_path: PathBuf, report: &FinalReport) -> Self {
        Self {
            report_path,
            success_ratio: report.success_ratio.clone(),
            failing_tests: report.failing_tests.clone(),
            failed_but_not_allowed: report.failed_but_not_allowed.clone(),
            summary: summarize(report),
        }
    }
}

impl CommandOutput for ReportOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!("Report written to {}", self.report_path.display())];
        if let Some(summary) = &self.summary {
            lines.push(summary_table(summary));
        } else {
            lines.push(format!("Success ratio: {}", self.success_ratio));
        }
        if !self.failed_but_not_allowed.is_empty() {
            lines.push(format!(
                "Failed but not allowed to fail: {}",
                self.failed_but_not_allowed.join(", ")
            ));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: ReportArgs, config: &Config, json_mode: bool) -> Result<()> {
    let log = tokio::fs::read(&args.log_file)
        .await
        .with_context(|| format!("Failed to read log file {}", args.log_file.display()))?;

    let mut report_config = config.report.clone();
    if let Some(dir) = args.output_dir {
        report_config.output_dir = dir;
    }
    let aggregator = ReportAggregator::new(report_config, config.allowed_to_fail.clone());
    let generated_at = Local::now();
    let report = aggregator.aggregate_bytes(&log, generated_at);
    let path = aggregator
        .write(&report, generated_at)
        .context("Failed to write report")?;

    output(&ReportOutput::new(path, &report), json_mode);
    Ok(())
}
