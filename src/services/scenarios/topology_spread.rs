use anyhow::{bail, Context};
use async_trait::async_trait;

use super::{
    autoscaler_max_replicas, name_of, node_zones, place, wait_until_ready, workload_selector,
    Workload,
};
use crate::domain::errors::ClusterError;
use crate::domain::models::pod;
use crate::domain::models::Placement;
use crate::domain::ports::ListSelector;
use crate::services::convergence_monitor::ConvergenceMonitor;
use crate::services::scenario_runner::{Scenario, ScenarioContext};
use crate::services::topology::{max_skew_invariant, SkewReport};

const MAX_SKEW: usize = 1;

/// One observation of a spreading workload.
#[derive(Debug, Clone)]
struct SpreadSample {
    running: u32,
    placements: Vec<Placement>,
}

/// An autoscaled workload grows to the autoscaler's `maxReplicas` while its
/// pods stay spread across zones with a skew of at most one.
pub struct TopologySpreadScenario {
    workload: Workload,
}

impl TopologySpreadScenario {
    pub const fn new(workload: Workload) -> Self {
        Self { workload }
    }

    const fn workload_manifest(&self) -> &'static str {
        match self.workload {
            Workload::Deployment => "topology_deployment/deployment",
            Workload::StatefulSet => "topology_statefulset/statefulset",
        }
    }

    const fn autoscaler_manifest(&self) -> &'static str {
        match self.workload {
            Workload::Deployment => "topology_deployment/hpa",
            Workload::StatefulSet => "topology_statefulset/hpa",
        }
    }

    const fn workload_name(&self) -> &'static str {
        match self.workload {
            Workload::Deployment => "zone-spread-example",
            Workload::StatefulSet => "zone-spread-statefulset",
        }
    }
}

#[async_trait]
impl Scenario for TopologySpreadScenario {
    fn tag(&self) -> &str {
        match self.workload {
            Workload::Deployment => "DeploymentTopologyTest",
            Workload::StatefulSet => "StatefulSetTopologyTest",
        }
    }

    async fn run(&self, ctx: &ScenarioContext) -> anyhow::Result<()> {
        let workload = ctx.load_manifest(self.workload_manifest())?;
        let autoscaler = ctx.load_manifest(self.autoscaler_manifest())?;
        let max_replicas = autoscaler_max_replicas(&autoscaler, &ctx.namespace)?;

        ctx.apply(self.workload_manifest(), &workload).await?;
        ctx.log
            .info(format!("=== Applying HPA manifest (maxReplicas: {max_replicas}) ==="));
        ctx.apply(self.autoscaler_manifest(), &autoscaler).await?;

        verify_resources(ctx, self.workload, self.workload_name()).await?;
        wait_until_ready(ctx, self.workload, self.workload_name()).await?;

        let selector =
            ListSelector::labels(workload_selector(ctx, self.workload, self.workload_name()).await?);

        ctx.log.info("=== Wait for HPA to trigger ===");
        let monitor = ConvergenceMonitor::new(format!("{}/spread", ctx.log.tag()), ctx.monitor)
            .tagged(ctx.log.tag())
            .invariant(max_skew_invariant(MAX_SKEW, |s: &SpreadSample| {
                s.placements.clone()
            }))
            .until(move |s: &SpreadSample| s.running >= max_replicas)
            .track(|s: &SpreadSample| i64::from(s.running));

        let cluster = ctx.cluster.as_ref();
        let namespace = ctx.namespace.as_str();
        let log = &ctx.log;
        let selector = &selector;
        let report = monitor
            .run(move || async move {
                let pods = cluster.list_pods(namespace, selector).await?;
                let zones = node_zones(cluster).await?;
                let running = pods
                    .iter()
                    .filter(|p| !pod::is_terminating(p) && pod::phase(p) == Some("Running"))
                    .count();
                let sample = SpreadSample {
                    running: u32::try_from(running).unwrap_or(u32::MAX),
                    placements: place(&pods, &zones),
                };
                log.info(format!("current running pods: {}/{max_replicas}", sample.running));
                Ok::<_, ClusterError>(sample)
            })
            .await?;
        report.ensure_succeeded()?;

        audit_spread(ctx, selector).await
    }
}

async fn verify_resources(
    ctx: &ScenarioContext,
    workload: Workload,
    name: &str,
) -> anyhow::Result<()> {
    ctx.log.info("=== Verifying cluster resources ===");
    match workload {
        Workload::Deployment => {
            let deployments = ctx.cluster.list_deployments(&ctx.namespace).await?;
            if deployments.is_empty() {
                bail!("no deployments found in namespace {}", ctx.namespace);
            }
            ctx.log
                .info(format!("Found {} deployments in namespace:", deployments.len()));
            for d in &deployments {
                let replicas = d.spec.as_ref().and_then(|s| s.replicas).unwrap_or_default();
                ctx.log.info(format!(
                    "- {} (Replicas: {replicas})",
                    d.metadata.name.as_deref().unwrap_or_default()
                ));
            }
        }
        Workload::StatefulSet => {
            let stateful_set = ctx
                .cluster
                .get_stateful_set(&ctx.namespace, name)
                .await
                .with_context(|| format!("stateful set {name} not found"))?;
            let replicas = stateful_set
                .spec
                .as_ref()
                .and_then(|s| s.replicas)
                .unwrap_or_default();
            ctx.log.info(format!("- {name} (Replicas: {replicas})"));
        }
    }

    let autoscalers = ctx
        .cluster
        .list_horizontal_pod_autoscalers(&ctx.namespace)
        .await?;
    if autoscalers.is_empty() {
        bail!("no HPAs found in namespace {}", ctx.namespace);
    }
    ctx.log
        .info(format!("Found {} HPAs in namespace:", autoscalers.len()));
    for h in &autoscalers {
        let (min, max) = h
            .spec
            .as_ref()
            .map(|s| (s.min_replicas.unwrap_or(1), s.max_replicas))
            .unwrap_or_default();
        ctx.log.info(format!(
            "- {} (Min: {min}, Max: {max})",
            h.metadata.name.as_deref().unwrap_or_default()
        ));
    }
    Ok(())
}

/// Final placement check: every pod has a zone and the skew is within bounds.
async fn audit_spread(ctx: &ScenarioContext, selector: &ListSelector) -> anyhow::Result<()> {
    ctx.log
        .info("=== Verifying pod scale count and distribution ===");
    let pods: Vec<_> = ctx
        .cluster
        .list_pods(&ctx.namespace, selector)
        .await?
        .into_iter()
        .filter(|p| !pod::is_terminating(p))
        .collect();
    let zones = node_zones(ctx.cluster.as_ref()).await?;
    let placements = place(&pods, &zones);

    ctx.log.info("Pod-to-Zone Distribution:");
    for (p, placement) in pods.iter().zip(&placements) {
        let node = pod::node_name(p).unwrap_or("<unscheduled>");
        ctx.log.info(format!(
            "- Pod {:<40} Node: {node:<15} Zone: {}",
            name_of(p),
            placement.zone.as_deref().unwrap_or("<none>")
        ));
    }

    let report = SkewReport::from_placements(&placements).context("no pod has a zone")?;
    ctx.log.info(format!(
        "Total Pods: {} | Zones: {:?} | Skew: {}",
        placements.len(),
        report.distribution.counts(),
        report.skew
    ));
    if report.unplaced > 0 {
        bail!("{} pods are not placed in a zone", report.unplaced);
    }
    if !report.within(MAX_SKEW) {
        bail!("zone skew {} exceeds {MAX_SKEW}", report.skew);
    }
    Ok(())
}
