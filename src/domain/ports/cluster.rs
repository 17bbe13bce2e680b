use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::{Namespace, Node, Pod, Service};
use k8s_openapi::api::policy::v1::PodDisruptionBudget;

use crate::domain::errors::ClusterError;

/// Label and field selectors for list operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListSelector {
    pub labels: Option<String>,
    pub fields: Option<String>,
}

impl ListSelector {
    pub fn labels(selector: impl Into<String>) -> Self {
        Self {
            labels: Some(selector.into()),
            fields: None,
        }
    }

    #[must_use]
    pub fn with_fields(mut self, selector: impl Into<String>) -> Self {
        self.fields = Some(selector.into());
        self
    }
}

/// Interface to the cluster control plane
///
/// Every call may fail; a missing object is always reported as
/// [`ClusterError::NotFound`] and a create that collides with an existing
/// object as [`ClusterError::AlreadyExists`], never folded into other errors.
/// Creates are one-shot: implementations must not retry or upsert.
#[async_trait]
pub trait ClusterStateProvider: Send + Sync {
    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<Deployment, ClusterError>;

    async fn create_stateful_set(
        &self,
        namespace: &str,
        stateful_set: &StatefulSet,
    ) -> Result<StatefulSet, ClusterError>;

    async fn create_service(&self, namespace: &str, service: &Service)
        -> Result<Service, ClusterError>;

    async fn create_pod_disruption_budget(
        &self,
        namespace: &str,
        budget: &PodDisruptionBudget,
    ) -> Result<PodDisruptionBudget, ClusterError>;

    async fn create_horizontal_pod_autoscaler(
        &self,
        namespace: &str,
        autoscaler: &HorizontalPodAutoscaler,
    ) -> Result<HorizontalPodAutoscaler, ClusterError>;

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment, ClusterError>;

    /// Replace a deployment's spec, triggering a rollout when the pod
    /// template changed.
    async fn replace_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<Deployment, ClusterError>;

    async fn list_deployments(&self, namespace: &str) -> Result<Vec<Deployment>, ClusterError>;

    async fn get_stateful_set(&self, namespace: &str, name: &str)
        -> Result<StatefulSet, ClusterError>;

    async fn list_horizontal_pod_autoscalers(
        &self,
        namespace: &str,
    ) -> Result<Vec<HorizontalPodAutoscaler>, ClusterError>;

    async fn list_pods(
        &self,
        namespace: &str,
        selector: &ListSelector,
    ) -> Result<Vec<Pod>, ClusterError>;

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;

    async fn get_node(&self, name: &str) -> Result<Node, ClusterError>;

    async fn list_nodes(&self) -> Result<Vec<Node>, ClusterError>;

    async fn get_namespace(&self, name: &str) -> Result<Namespace, ClusterError>;

    async fn create_namespace(&self, name: &str) -> Result<Namespace, ClusterError>;

    /// Delete a namespace. `force` drops the grace period and uses background
    /// propagation.
    async fn delete_namespace(&self, name: &str, force: bool) -> Result<(), ClusterError>;
}
