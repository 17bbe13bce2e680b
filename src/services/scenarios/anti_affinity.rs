use std::time::Duration;

use anyhow::{bail, ensure};
use async_trait::async_trait;

use super::{autoscaler_max_replicas, node_zones, place, placements, running};
use crate::domain::errors::ClusterError;
use crate::domain::models::{MonitorConfig, Placement};
use crate::domain::ports::{ClusterStateProvider, ListSelector};
use crate::services::convergence_monitor::ConvergenceMonitor;
use crate::services::scenario_runner::{Scenario, ScenarioContext};
use crate::services::topology::{zone_collisions, zone_separation_invariant};

const ZONE_MARKER_MANIFEST: &str = "anti_affinity/zone-marker";
const DEPENDENT_MANIFEST: &str = "anti_affinity/dependent-app";
const AUTOSCALER_MANIFEST: &str = "anti_affinity/hpa";
const MARKER_LABELS: &str = "app=desired-zone-for-anti-affinity";
const DEPENDENT_LABELS: &str = "app=dependent-app";

/// Poll every 5 seconds for up to 5 minutes while the autoscaler grows the
/// dependent workload.
const GROWTH_WAIT: MonitorConfig =
    MonitorConfig::new(Duration::from_secs(5), Duration::from_secs(300));

#[derive(Debug, Clone)]
struct SeparationSample {
    running: u32,
    markers: Vec<Placement>,
    dependents: Vec<Placement>,
}

/// Pods of a workload with zone anti-affinity toward a marker workload never
/// share a zone with any marker pod, even after autoscaling to capacity.
pub struct AntiAffinityScenario;

#[async_trait]
impl Scenario for AntiAffinityScenario {
    fn tag(&self) -> &str {
        "DeploymentAntiAffinityTest"
    }

    async fn run(&self, ctx: &ScenarioContext) -> anyhow::Result<()> {
        let marker = ctx.load_manifest(ZONE_MARKER_MANIFEST)?;
        let dependent = ctx.load_manifest(DEPENDENT_MANIFEST)?;
        let autoscaler = ctx.load_manifest(AUTOSCALER_MANIFEST)?;
        let max_replicas = autoscaler_max_replicas(&autoscaler, &ctx.namespace)?;

        ctx.apply(ZONE_MARKER_MANIFEST, &marker).await?;
        ctx.apply(DEPENDENT_MANIFEST, &dependent).await?;
        ctx.log
            .info(format!("=== Applying HPA manifest (maxReplicas: {max_replicas}) ==="));
        ctx.apply(AUTOSCALER_MANIFEST, &autoscaler).await?;

        ctx.log.info("=== Wait for HPA to trigger scaling ===");
        let wait = GROWTH_WAIT.with_observation_retries(
            ctx.monitor.max_observation_failures,
            ctx.monitor.observation_retry,
        );
        let monitor = ConvergenceMonitor::new(format!("{}/growth", ctx.log.tag()), wait)
            .tagged(ctx.log.tag())
            .invariant(zone_separation_invariant(|s: &SeparationSample| {
                (s.markers.clone(), s.dependents.clone())
            }))
            .until(move |s: &SeparationSample| s.running >= max_replicas)
            .track(|s: &SeparationSample| i64::from(s.running));

        let cluster = ctx.cluster.as_ref();
        let namespace = ctx.namespace.as_str();
        let log = &ctx.log;
        let report = monitor
            .run(move || async move {
                let sample = observe(cluster, namespace).await?;
                log.info(format!(
                    "Waiting for HPA, Current running pods: {}/{max_replicas}",
                    sample.running
                ));
                Ok::<_, ClusterError>(sample)
            })
            .await?;
        report.ensure_succeeded()?;
        ctx.log
            .info(format!("Reached required pod count of {max_replicas}"));

        audit_separation(ctx).await
    }
}

async fn observe(
    cluster: &dyn ClusterStateProvider,
    namespace: &str,
) -> Result<SeparationSample, ClusterError> {
    let zones = node_zones(cluster).await?;
    let markers = cluster
        .list_pods(namespace, &ListSelector::labels(MARKER_LABELS))
        .await?;
    let dependents = cluster
        .list_pods(namespace, &running(Some(DEPENDENT_LABELS)))
        .await?;
    let dependents = place(&dependents, &zones);
    Ok(SeparationSample {
        running: u32::try_from(dependents.len()).unwrap_or(u32::MAX),
        markers: place(&markers, &zones),
        dependents,
    })
}

async fn audit_separation(ctx: &ScenarioContext) -> anyhow::Result<()> {
    let cluster = ctx.cluster.as_ref();

    ctx.log.info("=== Getting zone-marker pod details ===");
    let markers = placements(cluster, &ctx.namespace, &ListSelector::labels(MARKER_LABELS)).await?;
    ensure!(!markers.is_empty(), "no zone-marker pods found");
    for marker in &markers {
        let Some(zone) = marker.zone.as_deref() else {
            bail!("zone-marker pod {} has no zone", marker.entity);
        };
        ctx.log
            .info(format!("Zone-Marker Pod: {:<20} Zone: {zone}", marker.entity));
    }

    ctx.log.info("=== Getting dependent-app pods details ===");
    let dependents =
        placements(cluster, &ctx.namespace, &ListSelector::labels(DEPENDENT_LABELS)).await?;
    ensure!(!dependents.is_empty(), "no dependent-app pods found");
    for dependent in &dependents {
        let Some(zone) = dependent.zone.as_deref() else {
            bail!("dependent-app pod {} has no zone", dependent.entity);
        };
        ctx.log
            .info(format!("Dependent Pod: {:<20} Zone: {zone}", dependent.entity));
    }

    ctx.log.info("=== Validating zone constraints ===");
    let collisions = zone_collisions(&markers, &dependents);
    if let Some(first) = collisions.first() {
        bail!(
            "pod {} in prohibited zone {} ({} collisions)",
            first.entity,
            first.zone.as_deref().unwrap_or_default(),
            collisions.len()
        );
    }
    ctx.log.info("=== Zone separation holds ===");
    Ok(())
}
