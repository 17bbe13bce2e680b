//! Implementation of the `kube-invariants run` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::Args;
use uuid::Uuid;

use crate::cli::commands::report::ReportOutput;
use crate::cli::output::{output, scenario_table, summary_table, CommandOutput};
use crate::domain::models::Config;
use crate::infrastructure::cluster::KubeClusterProvider;
use crate::infrastructure::logging::{LogChannel, ScenarioLogger};
use crate::infrastructure::manifests::FsManifestSource;
use crate::services::report_aggregator::ReportAggregator;
use crate::services::scenario_runner::{ScenarioOutcome, ScenarioRunner};
use crate::services::scenarios;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Run only this scenario tag (repeatable; default: all)
    #[arg(short, long = "scenario")]
    pub scenarios: Vec<String>,

    /// Manifest root directory (overrides manifests.root)
    #[arg(short, long)]
    pub manifests: Option<PathBuf>,

    /// Report output directory (overrides report.output_dir)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, serde::Serialize)]
pub struct RunOutput {
    pub run_id: Uuid,
    pub outcomes: Vec<ScenarioOutcome>,
    pub report: ReportOutput,
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("Suite run {}", self.run_id),
            scenario_table(&self.outcomes),
            format!("Report written to {}", self.report.report_path.display()),
        ];
        match &self.report.summary {
            Some(summary) => lines.push(summary_table(summary)),
            None => lines.push(format!("Success ratio: {}", self.report.success_ratio)),
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Run the selected scenarios, aggregate the scenario log channel into a
/// report and fail when a scenario outside the allow-list failed.
pub async fn execute(
    args: RunArgs,
    mut config: Config,
    channel: LogChannel,
    json_mode: bool,
) -> Result<()> {
    if let Some(root) = args.manifests {
        config.manifests.root = root;
    }
    if let Some(dir) = args.output_dir {
        config.report.output_dir = dir;
    }
    let selected = scenarios::select(&args.scenarios)?;

    let run_id = Uuid::new_v4();
    let setup = ScenarioLogger::new(&config.report.bootstrap_tag);
    setup.info(format!(
        "suite run {run_id}: {} scenario(s), access mode {:?}, namespace {}",
        selected.len(),
        config.access.mode,
        config.namespace
    ));

    let cluster = KubeClusterProvider::connect(&config.access)
        .await
        .context("Failed to connect to cluster")?;
    let manifests = FsManifestSource::new(config.manifests.root.clone());
    let runner = ScenarioRunner::new(Arc::new(cluster), Arc::new(manifests), config.clone());
    let outcomes = runner.run_all(&selected).await;

    let log = channel.drain().context("Scenario log was already consumed")?;
    let aggregator = ReportAggregator::new(config.report.clone(), config.allowed_to_fail.clone());
    let generated_at = Local::now();
    let report = aggregator.aggregate_bytes(&log, generated_at);
    let path = aggregator
        .write(&report, generated_at)
        .context("Failed to write report")?;

    let unexpected = report.failed_but_not_allowed.clone();
    output(
        &RunOutput {
            run_id,
            outcomes,
            report: ReportOutput::new(path, &report),
        },
        json_mode,
    );

    if !unexpected.is_empty() {
        bail!(
            "{} scenario(s) failed without being allowed to: {}",
            unexpected.len(),
            unexpected.join(", ")
        );
    }
    Ok(())
}
