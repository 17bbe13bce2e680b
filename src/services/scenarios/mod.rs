//! Built-in verification scenarios and the cluster queries they share.

mod anti_affinity;
mod connectivity;
mod pdb_deployment;
mod pdb_statefulset;
mod topology_spread;

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{bail, Context};
use k8s_openapi::api::core::v1::Pod;
use tracing::debug;

use crate::domain::errors::ClusterError;
use crate::domain::models::pod::{self, RUNNING_PHASE_SELECTOR};
use crate::domain::models::{
    invariant, Check, IntOrPercent, MonitorConfig, PodCensus, Placement, Resource, ResourceDescriptor,
};
use crate::domain::ports::{ClusterStateProvider, ListSelector};
use crate::services::convergence_monitor::ConvergenceMonitor;
use crate::services::dispatcher::split_documents;
use crate::services::scenario_runner::{Scenario, ScenarioContext};

pub use anti_affinity::AntiAffinityScenario;
pub use connectivity::ConnectivityScenario;
pub use pdb_deployment::DeploymentBudgetScenario;
pub use pdb_statefulset::StatefulSetBudgetScenario;
pub use topology_spread::TopologySpreadScenario;

/// Workload family a scenario drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workload {
    Deployment,
    StatefulSet,
}

impl Workload {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Deployment => "Deployment",
            Self::StatefulSet => "StatefulSet",
        }
    }
}

/// Samples taken right after every pod behind a budget is deleted.
pub const POST_DELETION_SAMPLES: u32 = 10;

/// Every built-in scenario, in execution order.
pub fn builtin() -> Vec<Box<dyn Scenario>> {
    vec![
        Box::new(ConnectivityScenario),
        Box::new(DeploymentBudgetScenario),
        Box::new(StatefulSetBudgetScenario),
        Box::new(TopologySpreadScenario::new(Workload::Deployment)),
        Box::new(TopologySpreadScenario::new(Workload::StatefulSet)),
        Box::new(AntiAffinityScenario),
    ]
}

/// Built-in scenarios whose tag is in `tags`, in execution order. An empty
/// filter selects everything; an unknown tag is an error.
pub fn select(tags: &[String]) -> anyhow::Result<Vec<Box<dyn Scenario>>> {
    let all = builtin();
    if tags.is_empty() {
        return Ok(all);
    }
    for tag in tags {
        if !all.iter().any(|s| s.tag() == tag) {
            let known: Vec<&str> = all.iter().map(|s| s.tag()).collect();
            bail!("unknown scenario '{tag}' (known: {})", known.join(", "));
        }
    }
    Ok(all.into_iter().filter(|s| tags.iter().any(|t| t == s.tag())).collect())
}

/// First document of `blob` satisfying `pick`. Documents that fail to
/// decode are skipped.
pub(crate) fn find_document<T>(
    blob: &[u8],
    namespace: &str,
    pick: impl Fn(ResourceDescriptor) -> Option<T>,
) -> Option<T> {
    let text = String::from_utf8_lossy(blob);
    split_documents(&text)
        .into_iter()
        .filter(|doc| !doc.trim().is_empty())
        .filter_map(|doc| ResourceDescriptor::decode(doc, namespace).ok())
        .find_map(pick)
}

/// `spec.minAvailable` of the first disruption budget in `blob`.
pub(crate) fn budget_min_available(blob: &[u8], namespace: &str) -> anyhow::Result<u32> {
    let budget = find_document(blob, namespace, |d| match d.resource {
        Resource::PodDisruptionBudget(b) => Some(b),
        _ => None,
    })
    .context("manifest contains no PodDisruptionBudget")?;
    let min = budget
        .spec
        .as_ref()
        .and_then(|s| s.min_available.as_ref())
        .context("PodDisruptionBudget has no minAvailable")?;
    match IntOrPercent::try_from(min)? {
        IntOrPercent::Count(n) => Ok(n),
        IntOrPercent::Percent(p) => bail!("percentage minAvailable {p}% is not supported"),
    }
}

/// `spec.maxReplicas` of the first autoscaler in `blob`.
pub(crate) fn autoscaler_max_replicas(blob: &[u8], namespace: &str) -> anyhow::Result<u32> {
    let autoscaler = find_document(blob, namespace, |d| match d.resource {
        Resource::HorizontalPodAutoscaler(h) => Some(h),
        _ => None,
    })
    .context("manifest contains no HorizontalPodAutoscaler")?;
    let max = autoscaler
        .spec
        .as_ref()
        .map(|s| s.max_replicas)
        .context("HorizontalPodAutoscaler has no spec")?;
    u32::try_from(max).with_context(|| format!("invalid maxReplicas {max}"))
}

pub(crate) fn running(labels: Option<&str>) -> ListSelector {
    ListSelector {
        labels: labels.map(str::to_string),
        fields: None,
    }
    .with_fields(RUNNING_PHASE_SELECTOR)
}

pub(crate) fn name_of(pod: &Pod) -> &str {
    pod.metadata.name.as_deref().unwrap_or_default()
}

/// Zone of every node, `None` for nodes without the zone label.
pub(crate) async fn node_zones(
    cluster: &dyn ClusterStateProvider,
) -> Result<BTreeMap<String, Option<String>>, ClusterError> {
    let nodes = cluster.list_nodes().await?;
    Ok(nodes
        .iter()
        .filter_map(|node| {
            let name = node.metadata.name.clone()?;
            Some((name, pod::node_zone(node).map(str::to_string)))
        })
        .collect())
}

/// Placement of every pod that is not terminating, given the node zones.
pub(crate) fn place(pods: &[Pod], zones: &BTreeMap<String, Option<String>>) -> Vec<Placement> {
    pods.iter()
        .filter(|p| !pod::is_terminating(p))
        .map(|p| {
            let zone = pod::node_name(p).and_then(|node| zones.get(node).cloned().flatten());
            if zone.is_none() {
                debug!(pod = name_of(p), "pod has no zone yet");
            }
            Placement {
                entity: name_of(p).to_string(),
                zone,
            }
        })
        .collect()
}

/// Placement of every pod matching `selector` that is not terminating.
pub(crate) async fn placements(
    cluster: &dyn ClusterStateProvider,
    namespace: &str,
    selector: &ListSelector,
) -> Result<Vec<Placement>, ClusterError> {
    let pods = cluster.list_pods(namespace, selector).await?;
    let zones = node_zones(cluster).await?;
    Ok(place(&pods, &zones))
}

/// `(ready, desired)` replica counts of a workload.
async fn readiness(
    cluster: &dyn ClusterStateProvider,
    namespace: &str,
    workload: Workload,
    name: &str,
) -> Result<(u32, u32), ClusterError> {
    let count = |v: Option<i32>| v.and_then(|n| u32::try_from(n).ok()).unwrap_or(0);
    Ok(match workload {
        Workload::Deployment => {
            let d = cluster.get_deployment(namespace, name).await?;
            (
                count(d.status.as_ref().and_then(|s| s.available_replicas)),
                count(d.spec.as_ref().and_then(|s| s.replicas)),
            )
        }
        Workload::StatefulSet => {
            let s = cluster.get_stateful_set(namespace, name).await?;
            (
                count(s.status.as_ref().and_then(|s| s.ready_replicas)),
                count(s.spec.as_ref().and_then(|s| s.replicas)),
            )
        }
    })
}

/// Wait until every desired replica of the workload is ready.
pub(crate) async fn wait_until_ready(
    ctx: &ScenarioContext,
    workload: Workload,
    name: &str,
) -> anyhow::Result<()> {
    let monitor = ConvergenceMonitor::new(format!("{}/{name}/ready", ctx.log.tag()), ctx.monitor)
        .tagged(ctx.log.tag())
        .until(|&(ready, desired): &(u32, u32)| desired > 0 && ready >= desired)
        .track(|&(ready, _): &(u32, u32)| i64::from(ready));
    let cluster = ctx.cluster.as_ref();
    let namespace = ctx.namespace.as_str();
    let log = &ctx.log;
    let report = monitor
        .run(move || async move {
            let (ready, desired) = readiness(cluster, namespace, workload, name).await?;
            log.info(format!("{} {name}: {ready}/{desired} ready", workload.as_str()));
            Ok::<_, ClusterError>((ready, desired))
        })
        .await?;
    report
        .ensure_succeeded()
        .with_context(|| format!("{} {name} never became ready", workload.as_str()))?;
    Ok(())
}

/// Label selector of a workload's pods, in list syntax.
pub(crate) async fn workload_selector(
    ctx: &ScenarioContext,
    workload: Workload,
    name: &str,
) -> anyhow::Result<String> {
    let selector = match workload {
        Workload::Deployment => ctx
            .cluster
            .get_deployment(&ctx.namespace, name)
            .await?
            .spec
            .map(|s| s.selector),
        Workload::StatefulSet => ctx
            .cluster
            .get_stateful_set(&ctx.namespace, name)
            .await?
            .spec
            .map(|s| s.selector),
    }
    .with_context(|| format!("{} {name} has no spec", workload.as_str()))?;
    Ok(pod::format_label_selector(&selector))
}

/// Which pods count toward a budget once their siblings have been deleted.
pub(crate) struct DeletionProbe {
    pub selector: ListSelector,
    pub exclude_terminating: bool,
}

impl DeletionProbe {
    async fn count(&self, cluster: &dyn ClusterStateProvider, namespace: &str) -> Result<u32, ClusterError> {
        let pods = cluster.list_pods(namespace, &self.selector).await?;
        let census = PodCensus::from_pods(&pods);
        Ok(if self.exclude_terminating {
            census.active()
        } else {
            census.total
        })
    }
}

/// Delete every pod the probe sees, then sample the running count
/// [`POST_DELETION_SAMPLES`] times in quick succession. Each sample must
/// stay at or above `min_available`.
pub(crate) async fn verify_budget_after_deletion(
    ctx: &ScenarioContext,
    probe: &DeletionProbe,
    min_available: u32,
) -> anyhow::Result<()> {
    ctx.log.info("=== Verifying disruption budget under pod deletion ===");
    let cluster = ctx.cluster.as_ref();
    let namespace = ctx.namespace.as_str();

    let pods = cluster.list_pods(namespace, &probe.selector).await?;
    let targets: Vec<&Pod> = pods
        .iter()
        .filter(|p| !probe.exclude_terminating || !pod::is_terminating(p))
        .collect();
    ctx.log.info(format!("initial running pods: {}", targets.len()));
    let initial = u32::try_from(targets.len()).unwrap_or(u32::MAX);
    if initial < min_available {
        bail!("initial running pods {initial} below disruption budget {min_available}");
    }

    for target in &targets {
        let name = name_of(target);
        ctx.log.info(format!("deleting pod {name}"));
        match cluster.delete_pod(namespace, name).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err).with_context(|| format!("failed to delete pod {name}")),
        }
    }

    let config = MonitorConfig::new(Duration::from_millis(200), Duration::from_secs(30))
        .with_observation_retries(ctx.monitor.max_observation_failures, ctx.monitor.observation_retry);
    let monitor = ConvergenceMonitor::new(format!("{}/post-deletion", ctx.log.tag()), config)
        .tagged(ctx.log.tag())
        .invariant(invariant(
            format!("running pods >= {min_available}"),
            move |running: &u32| {
                Check::ensure(*running >= min_available, || {
                    format!("running pod count {running} violated disruption budget {min_available}")
                })
            },
        ))
        .observe_for(POST_DELETION_SAMPLES)
        .track(|running: &u32| i64::from(*running));

    let log = &ctx.log;
    let report = monitor
        .run(move || async move {
            let running = probe.count(cluster, namespace).await?;
            log.info(format!("running pods after deletion: {running}"));
            Ok::<_, ClusterError>(running)
        })
        .await?;
    ctx.log.info(format!("post-deletion running pods: {}", report.extrema));
    report.ensure_succeeded()?;
    Ok(())
}
