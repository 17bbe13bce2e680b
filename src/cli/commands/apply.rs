//! Implementation of the `kube-invariants apply` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;
use crate::infrastructure::cluster::KubeClusterProvider;
use crate::services::dispatcher::ResourceDispatcher;

#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Manifest file (documents separated by `---` lines)
    pub manifest: PathBuf,

    /// Namespace for documents that do not name one
    #[arg(short, long)]
    pub namespace: Option<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct CreatedResource {
    pub kind: String,
    pub name: String,
}

#[derive(Debug, serde::Serialize)]
pub struct ApplyOutput {
    pub namespace: String,
    pub created: Vec<CreatedResource>,
    pub skipped: usize,
}

impl CommandOutput for ApplyOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "Applied {} resource(s) (default namespace {})",
            self.created.len(),
            self.namespace
        )];
        for resource in &self.created {
            lines.push(format!("  - {} {}", resource.kind, resource.name));
        }
        if self.skipped > 0 {
            lines.push(format!("Skipped {} empty document(s)", self.skipped));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: ApplyArgs, config: &Config, json_mode: bool) -> Result<()> {
    let blob = tokio::fs::read(&args.manifest)
        .await
        .with_context(|| format!("Failed to read manifest {}", args.manifest.display()))?;
    let namespace = args.namespace.unwrap_or_else(|| config.namespace.clone());

    let cluster = KubeClusterProvider::connect(&config.access)
        .await
        .context("Failed to connect to cluster")?;
    let dispatcher = ResourceDispatcher::new(Arc::new(cluster), namespace.clone());
    let summary = dispatcher.apply(&blob).await?;

    let result = ApplyOutput {
        namespace,
        created: summary
            .created
            .into_iter()
            .map(|(kind, name)| CreatedResource {
                kind: kind.to_string(),
                name,
            })
            .collect(),
        skipped: summary.skipped,
    };
    output(&result, json_mode);
    Ok(())
}
