use async_trait::async_trait;

use super::{
    budget_min_available, running, verify_budget_after_deletion, wait_until_ready, DeletionProbe,
    Workload,
};
use crate::services::scenario_runner::{Scenario, ScenarioContext};

const STATEFUL_SET_MANIFEST: &str = "pdb_statefulset/sts";
const BUDGET_MANIFEST: &str = "pdb_statefulset/pdb";
const STATEFUL_SET_NAME: &str = "web";

/// Deleting every running pod of a stateful set never drops the running
/// count below the disruption budget.
pub struct StatefulSetBudgetScenario;

#[async_trait]
impl Scenario for StatefulSetBudgetScenario {
    fn tag(&self) -> &str {
        "StatefulSetPDBTest"
    }

    async fn run(&self, ctx: &ScenarioContext) -> anyhow::Result<()> {
        let stateful_set = ctx.load_manifest(STATEFUL_SET_MANIFEST)?;
        let budget = ctx.load_manifest(BUDGET_MANIFEST)?;
        let min_available = budget_min_available(&budget, &ctx.namespace)?;
        ctx.log
            .info(format!("=== Minimum allowed pods from PDB: {min_available} ==="));

        ctx.apply(STATEFUL_SET_MANIFEST, &stateful_set).await?;
        ctx.apply(BUDGET_MANIFEST, &budget).await?;

        ctx.log.info("=== Wait for Pods to schedule ===");
        wait_until_ready(ctx, Workload::StatefulSet, STATEFUL_SET_NAME).await?;

        // Every running pod in the namespace, terminating ones included.
        let probe = DeletionProbe {
            selector: running(None),
            exclude_terminating: false,
        };
        verify_budget_after_deletion(ctx, &probe, min_available).await?;
        ctx.log.info("=== All post-deletion checks passed ===");
        Ok(())
    }
}
