use anyhow::{ensure, Context};
use async_trait::async_trait;

use crate::domain::models::pod;
use crate::services::scenario_runner::{Scenario, ScenarioContext};

/// Nodes are listable and the scenario namespace is reachable.
pub struct ConnectivityScenario;

#[async_trait]
impl Scenario for ConnectivityScenario {
    fn tag(&self) -> &str {
        "Connectivity"
    }

    async fn run(&self, ctx: &ScenarioContext) -> anyhow::Result<()> {
        ctx.log.info("=== Listing cluster nodes ===");
        let nodes = ctx.cluster.list_nodes().await.context("failed to list nodes")?;
        ensure!(!nodes.is_empty(), "cluster reported no nodes");

        ctx.log.info(format!("found {} nodes", nodes.len()));
        for node in &nodes {
            let name = node.metadata.name.as_deref().unwrap_or_default();
            let ready = if pod::node_is_ready(node) { "Ready" } else { "NotReady" };
            let zone = pod::node_zone(node).unwrap_or("<none>");
            ctx.log.info(format!("- {name} ({ready}, zone {zone})"));
        }

        ctx.log.info(format!("=== Checking namespace {} ===", ctx.namespace));
        ctx.cluster
            .get_namespace(&ctx.namespace)
            .await
            .with_context(|| format!("namespace {} is not reachable", ctx.namespace))?;
        Ok(())
    }
}
