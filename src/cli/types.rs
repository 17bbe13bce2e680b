//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use super::commands::apply::ApplyArgs;
use super::commands::report::ReportArgs;
use super::commands::run::RunArgs;

#[derive(Parser, Debug)]
#[command(name = "kube-invariants")]
#[command(about = "Verify cluster orchestration guarantees while workloads converge", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to kube-invariants.yaml in the working directory)
    #[arg(short, long, global = true, env = "KUBE_INVARIANTS_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the verification suite and write the report
    Run(RunArgs),

    /// Aggregate an existing JSON-lines scenario log into a report
    Report(ReportArgs),

    /// Apply a multi-document manifest through the resource dispatcher
    Apply(ApplyArgs),

    /// List the built-in scenarios
    Scenarios,
}
