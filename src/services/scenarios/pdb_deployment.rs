use anyhow::Context;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

use super::{
    budget_min_available, running, verify_budget_after_deletion, wait_until_ready, DeletionProbe,
    Workload,
};
use crate::domain::errors::ClusterError;
use crate::domain::models::{PodCensus, RolloutSample};
use crate::services::rollout_tracker::{running_pods_floor, RolloutTracker};
use crate::services::scenario_runner::{Scenario, ScenarioContext};

const DEPLOYMENT_MANIFEST: &str = "pdb_deployment/deployment";
const BUDGET_MANIFEST: &str = "pdb_deployment/pdb";
const DEPLOYMENT_NAME: &str = "app";
const POD_LABELS: &str = "app=app";
const DELETION_LABELS: &str = "app=app,component=my-unique-deployment";
const UPDATED_CPU_REQUEST: &str = "100m";

/// A rolling update and a mass pod deletion both keep the running pod count
/// at or above the disruption budget's `minAvailable`.
pub struct DeploymentBudgetScenario;

#[async_trait]
impl Scenario for DeploymentBudgetScenario {
    fn tag(&self) -> &str {
        "DeploymentPDBTest"
    }

    async fn run(&self, ctx: &ScenarioContext) -> anyhow::Result<()> {
        let deployment = ctx.load_manifest(DEPLOYMENT_MANIFEST)?;
        let budget = ctx.load_manifest(BUDGET_MANIFEST)?;
        let min_available = budget_min_available(&budget, &ctx.namespace)?;
        ctx.log
            .info(format!("=== Minimum allowed pods from PDB: {min_available} ==="));

        ctx.apply(DEPLOYMENT_MANIFEST, &deployment).await?;
        ctx.apply(BUDGET_MANIFEST, &budget).await?;

        ctx.log.info("=== Wait for Pods to schedule ===");
        wait_until_ready(ctx, Workload::Deployment, DEPLOYMENT_NAME).await?;

        rolling_update(ctx, min_available).await?;

        let probe = DeletionProbe {
            selector: running(Some(DELETION_LABELS)),
            exclude_terminating: true,
        };
        verify_budget_after_deletion(ctx, &probe, min_available).await
    }
}

async fn rolling_update(ctx: &ScenarioContext, min_available: u32) -> anyhow::Result<()> {
    let cluster = ctx.cluster.as_ref();
    let namespace = ctx.namespace.as_str();

    let current = cluster.get_deployment(namespace, DEPLOYMENT_NAME).await?;
    let bumped = with_cpu_request(current, UPDATED_CPU_REQUEST)?;

    ctx.log
        .info("=== Triggering rolling update with new CPU requests ===");
    let updated = cluster
        .replace_deployment(namespace, &bumped)
        .await
        .context("failed to update deployment")?;

    let tracker =
        RolloutTracker::for_deployment(format!("{}/rollout", ctx.log.tag()), &updated, ctx.monitor)?
            .with_invariant(running_pods_floor(min_available))
            .tagged(ctx.log.tag());
    let bounds = tracker.bounds();
    ctx.log.info(format!(
        "rollout bounds: desired {}, floor {}, ceiling {}",
        bounds.desired,
        bounds.availability_floor(),
        bounds.surge_ceiling()
    ));

    let log = &ctx.log;
    let report = tracker
        .track(move || async move {
            let deployment = cluster.get_deployment(namespace, DEPLOYMENT_NAME).await?;
            let pods = cluster.list_pods(namespace, &running(Some(POD_LABELS))).await?;
            let census = PodCensus::from_pods(&pods);
            let sample = observed_sample(&deployment).with_running_pods(census.total);
            log.info(format!(
                "Running Pods: {} (min: {min_available}) | Updated: {}/{} | Available: {} | \
                 Ready: {} | RunningNotReady: {} | Pending: {} | Terminating: {}",
                census.total,
                sample.updated,
                sample.desired,
                sample.available,
                census.ready,
                census.running_not_ready,
                census.pending,
                census.terminating
            ));
            Ok::<_, ClusterError>(sample)
        })
        .await?;

    if let Some(min) = report.min_available {
        ctx.log
            .info(format!("minimum available replicas during rollout: {min}"));
    }
    report.ensure_succeeded()?;
    ctx.log.info("=== Rollout completed ===");
    Ok(())
}

/// Sample of a deployment's rollout status. Until the controller has
/// observed the latest generation no replica counts as updated, so a status
/// left over from the previous template cannot complete the rollout.
fn observed_sample(deployment: &Deployment) -> RolloutSample {
    let mut sample = RolloutSample::from_deployment(deployment);
    let observed = deployment
        .status
        .as_ref()
        .and_then(|s| s.observed_generation);
    if observed < deployment.metadata.generation {
        sample.updated = 0;
    }
    sample
}

fn with_cpu_request(mut deployment: Deployment, request: &str) -> anyhow::Result<Deployment> {
    let container = deployment
        .spec
        .as_mut()
        .and_then(|s| s.template.spec.as_mut())
        .and_then(|p| p.containers.first_mut())
        .context("deployment has no containers")?;
    container
        .resources
        .get_or_insert_with(Default::default)
        .requests
        .get_or_insert_with(Default::default)
        .insert("cpu".to_string(), Quantity(request.to_string()));
    Ok(deployment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::{DeploymentSpec, DeploymentStatus};
    use k8s_openapi::api::core::v1::{Container, PodSpec, PodTemplateSpec};

    fn deployment(generation: i64, observed: i64) -> Deployment {
        let mut d = Deployment {
            spec: Some(DeploymentSpec {
                replicas: Some(3),
                template: PodTemplateSpec {
                    spec: Some(PodSpec {
                        containers: vec![Container {
                            name: "app".to_string(),
                            ..Default::default()
                        }],
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                ..Default::default()
            }),
            status: Some(DeploymentStatus {
                observed_generation: Some(observed),
                replicas: Some(3),
                updated_replicas: Some(3),
                available_replicas: Some(3),
                ..Default::default()
            }),
            ..Default::default()
        };
        d.metadata.generation = Some(generation);
        d
    }

    #[test]
    fn test_cpu_request_bump() {
        let bumped = with_cpu_request(deployment(1, 1), "100m").unwrap();
        let requests = bumped.spec.unwrap().template.spec.unwrap().containers[0]
            .resources
            .clone()
            .unwrap()
            .requests
            .unwrap();
        assert_eq!(requests["cpu"], Quantity("100m".to_string()));
    }

    #[test]
    fn test_cpu_request_requires_container() {
        let mut d = deployment(1, 1);
        d.spec.as_mut().unwrap().template.spec = None;
        assert!(with_cpu_request(d, "100m").is_err());
    }

    #[test]
    fn test_stale_status_is_not_complete() {
        assert!(!observed_sample(&deployment(2, 1)).is_complete());
        assert!(observed_sample(&deployment(2, 2)).is_complete());
    }
}
