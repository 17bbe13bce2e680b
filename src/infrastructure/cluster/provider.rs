use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::{Namespace, Node, Pod, Service};
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument};

use super::credentials::{self, CredentialsError};
use crate::domain::errors::ClusterError;
use crate::domain::models::AccessConfig;
use crate::domain::ports::{ClusterStateProvider, ListSelector};

/// [`ClusterStateProvider`] backed by a kube-rs client.
#[derive(Clone)]
pub struct KubeClusterProvider {
    client: Client,
}

impl KubeClusterProvider {
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    /// Resolve credentials for `access` and build a client.
    pub async fn connect(access: &AccessConfig) -> Result<Self, CredentialsError> {
        let config = credentials::resolve(access).await?;
        debug!(cluster_url = %config.cluster_url, "connecting to cluster");
        let client = Client::try_from(config)?;
        Ok(Self::new(client))
    }

    fn namespaced<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn create<K>(&self, namespace: &str, obj: &K) -> Result<K, ClusterError>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + Debug
            + Serialize
            + DeserializeOwned,
    {
        let name = obj.name_any();
        self.namespaced::<K>(namespace)
            .create(&PostParams::default(), obj)
            .await
            .map_err(|e| map_error(e, &K::kind(&()), &name))
    }

    async fn get<K>(&self, namespace: &str, name: &str) -> Result<K, ClusterError>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + Debug
            + DeserializeOwned,
    {
        self.namespaced::<K>(namespace)
            .get(name)
            .await
            .map_err(|e| map_error(e, &K::kind(&()), name))
    }

    async fn list<K>(&self, namespace: &str, params: &ListParams) -> Result<Vec<K>, ClusterError>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + Debug
            + DeserializeOwned,
    {
        self.namespaced::<K>(namespace)
            .list(params)
            .await
            .map(|list| list.items)
            .map_err(|e| map_error(e, &K::kind(&()), namespace))
    }
}

/// 404 and 409 keep their meaning; everything else is passed through.
pub(crate) fn map_error(err: kube::Error, kind: &str, name: &str) -> ClusterError {
    match err {
        kube::Error::Api(e) if e.code == 404 => ClusterError::not_found(kind, name),
        kube::Error::Api(e) if e.code == 409 => ClusterError::already_exists(kind, name),
        kube::Error::Api(e) => ClusterError::Api {
            code: e.code,
            message: e.message,
        },
        other => ClusterError::Transport(other.to_string()),
    }
}

fn list_params(selector: &ListSelector) -> ListParams {
    let mut params = ListParams::default();
    if let Some(labels) = &selector.labels {
        params = params.labels(labels);
    }
    if let Some(fields) = &selector.fields {
        params = params.fields(fields);
    }
    params
}

#[async_trait]
impl ClusterStateProvider for KubeClusterProvider {
    #[instrument(skip(self, deployment), fields(name = %deployment.name_any()))]
    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<Deployment, ClusterError> {
        self.create(namespace, deployment).await
    }

    async fn create_stateful_set(
        &self,
        namespace: &str,
        stateful_set: &StatefulSet,
    ) -> Result<StatefulSet, ClusterError> {
        self.create(namespace, stateful_set).await
    }

    async fn create_service(&self, namespace: &str, service: &Service) -> Result<Service, ClusterError> {
        self.create(namespace, service).await
    }

    async fn create_pod_disruption_budget(
        &self,
        namespace: &str,
        budget: &PodDisruptionBudget,
    ) -> Result<PodDisruptionBudget, ClusterError> {
        self.create(namespace, budget).await
    }

    async fn create_horizontal_pod_autoscaler(
        &self,
        namespace: &str,
        autoscaler: &HorizontalPodAutoscaler,
    ) -> Result<HorizontalPodAutoscaler, ClusterError> {
        self.create(namespace, autoscaler).await
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment, ClusterError> {
        self.get(namespace, name).await
    }

    async fn replace_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<Deployment, ClusterError> {
        let name = deployment.name_any();
        self.namespaced::<Deployment>(namespace)
            .replace(&name, &PostParams::default(), deployment)
            .await
            .map_err(|e| map_error(e, "Deployment", &name))
    }

    async fn list_deployments(&self, namespace: &str) -> Result<Vec<Deployment>, ClusterError> {
        self.list(namespace, &ListParams::default()).await
    }

    async fn get_stateful_set(&self, namespace: &str, name: &str) -> Result<StatefulSet, ClusterError> {
        self.get(namespace, name).await
    }

    async fn list_horizontal_pod_autoscalers(
        &self,
        namespace: &str,
    ) -> Result<Vec<HorizontalPodAutoscaler>, ClusterError> {
        self.list(namespace, &ListParams::default()).await
    }

    async fn list_pods(&self, namespace: &str, selector: &ListSelector) -> Result<Vec<Pod>, ClusterError> {
        self.list(namespace, &list_params(selector)).await
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        self.namespaced::<Pod>(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map(drop)
            .map_err(|e| map_error(e, "Pod", name))
    }

    async fn get_node(&self, name: &str) -> Result<Node, ClusterError> {
        Api::<Node>::all(self.client.clone())
            .get(name)
            .await
            .map_err(|e| map_error(e, "Node", name))
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, ClusterError> {
        Api::<Node>::all(self.client.clone())
            .list(&ListParams::default())
            .await
            .map(|list| list.items)
            .map_err(|e| map_error(e, "Node", ""))
    }

    async fn get_namespace(&self, name: &str) -> Result<Namespace, ClusterError> {
        Api::<Namespace>::all(self.client.clone())
            .get(name)
            .await
            .map_err(|e| map_error(e, "Namespace", name))
    }

    async fn create_namespace(&self, name: &str) -> Result<Namespace, ClusterError> {
        let namespace = Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..ObjectMeta::default()
            },
            ..Namespace::default()
        };
        Api::<Namespace>::all(self.client.clone())
            .create(&PostParams::default(), &namespace)
            .await
            .map_err(|e| map_error(e, "Namespace", name))
    }

    async fn delete_namespace(&self, name: &str, force: bool) -> Result<(), ClusterError> {
        let params = if force {
            DeleteParams::background().grace_period(0)
        } else {
            DeleteParams::default()
        };
        Api::<Namespace>::all(self.client.clone())
            .delete(name, &params)
            .await
            .map(drop)
            .map_err(|e| map_error(e, "Namespace", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;

    fn api_error(code: u16) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: format!("status {code}"),
            reason: String::new(),
            code,
        })
    }

    #[test]
    fn test_map_error_keeps_not_found_and_conflict() {
        assert_eq!(
            map_error(api_error(404), "Deployment", "web"),
            ClusterError::not_found("Deployment", "web")
        );
        assert!(map_error(api_error(409), "Deployment", "web").is_already_exists());
        assert_eq!(
            map_error(api_error(500), "Deployment", "web"),
            ClusterError::Api {
                code: 500,
                message: "status 500".to_string()
            }
        );
    }

    #[test]
    fn test_list_params_from_selector() {
        let params = list_params(&ListSelector::labels("app=web").with_fields("status.phase=Running"));
        assert_eq!(params.label_selector.as_deref(), Some("app=web"));
        assert_eq!(params.field_selector.as_deref(), Some("status.phase=Running"));
    }
}
