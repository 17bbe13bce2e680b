//! Common test utilities for integration tests
//!
//! Provides an in-memory cluster, pod/node builders and scripted samplers
//! shared across the integration test files.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::{
    Namespace, Node, NodeCondition, NodeStatus, Pod, PodSpec, PodStatus, Service,
};
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use tempfile::TempDir;

use kube_invariants::domain::errors::ClusterError;
use kube_invariants::domain::ports::{ClusterStateProvider, ListSelector};

/// Create a temporary directory for test isolation
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Setup test logging
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

type Key = (String, String);

#[derive(Default)]
struct FakeState {
    namespaces: BTreeSet<String>,
    deployments: BTreeMap<Key, Deployment>,
    stateful_sets: BTreeMap<Key, StatefulSet>,
    services: BTreeMap<Key, Service>,
    budgets: BTreeMap<Key, PodDisruptionBudget>,
    autoscalers: BTreeMap<Key, HorizontalPodAutoscaler>,
    pods: BTreeMap<Key, Pod>,
    nodes: Vec<Node>,
    /// Namespaces that ignore a non-forced delete.
    sticky_namespaces: BTreeSet<String>,
    /// Resource names whose creation is rejected with a 500.
    rejected: BTreeSet<String>,
    calls: Vec<String>,
}

/// In-memory [`ClusterStateProvider`].
#[derive(Clone, Default)]
pub struct FakeCluster {
    state: Arc<Mutex<FakeState>>,
}

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

fn name_of(meta: &k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta) -> String {
    meta.name.clone().unwrap_or_default()
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_namespace(self, name: &str) -> Self {
        self.state.lock().unwrap().namespaces.insert(name.to_string());
        self
    }

    pub fn with_nodes(self, nodes: Vec<Node>) -> Self {
        self.state.lock().unwrap().nodes = nodes;
        self
    }

    pub fn with_pod(self, namespace: &str, pod: Pod) -> Self {
        let name = name_of(&pod.metadata);
        self.state.lock().unwrap().pods.insert(key(namespace, &name), pod);
        self
    }

    pub fn sticky_namespace(self, name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .sticky_namespaces
            .insert(name.to_string());
        self
    }

    pub fn reject(self, name: &str) -> Self {
        self.state.lock().unwrap().rejected.insert(name.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn has_namespace(&self, name: &str) -> bool {
        self.state.lock().unwrap().namespaces.contains(name)
    }

    pub fn pod_names(&self, namespace: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .pods
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, name)| name.clone())
            .collect()
    }

    pub fn deployment(&self, namespace: &str, name: &str) -> Option<Deployment> {
        self.state
            .lock()
            .unwrap()
            .deployments
            .get(&key(namespace, name))
            .cloned()
    }

    fn insert<T: Clone>(
        &self,
        kind: &str,
        namespace: &str,
        name: String,
        object: &T,
        table: impl FnOnce(&mut FakeState) -> &mut BTreeMap<Key, T>,
    ) -> Result<T, ClusterError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("create {kind} {namespace}/{name}"));
        if state.rejected.contains(&name) {
            return Err(ClusterError::Api {
                code: 500,
                message: format!("{name} rejected"),
            });
        }
        let map = table(&mut *state);
        if map.contains_key(&key(namespace, &name)) {
            return Err(ClusterError::already_exists(kind, name));
        }
        map.insert(key(namespace, &name), object.clone());
        Ok(object.clone())
    }
}

/// `a=b,c=d` equality selectors only.
fn labels_match(selector: Option<&str>, pod: &Pod) -> bool {
    let Some(selector) = selector.filter(|s| !s.is_empty()) else {
        return true;
    };
    let labels = pod.metadata.labels.clone().unwrap_or_default();
    selector.split(',').all(|term| match term.split_once('=') {
        Some((k, v)) => labels.get(k.trim()).is_some_and(|actual| actual == v.trim()),
        None => labels.contains_key(term.trim()),
    })
}

fn fields_match(selector: Option<&str>, pod: &Pod) -> bool {
    match selector {
        Some("status.phase=Running") => {
            pod.status.as_ref().and_then(|s| s.phase.as_deref()) == Some("Running")
        }
        _ => true,
    }
}

#[async_trait]
impl ClusterStateProvider for FakeCluster {
    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<Deployment, ClusterError> {
        self.insert("Deployment", namespace, name_of(&deployment.metadata), deployment, |s| {
            &mut s.deployments
        })
    }

    async fn create_stateful_set(
        &self,
        namespace: &str,
        stateful_set: &StatefulSet,
    ) -> Result<StatefulSet, ClusterError> {
        self.insert("StatefulSet", namespace, name_of(&stateful_set.metadata), stateful_set, |s| {
            &mut s.stateful_sets
        })
    }

    async fn create_service(&self, namespace: &str, service: &Service) -> Result<Service, ClusterError> {
        self.insert("Service", namespace, name_of(&service.metadata), service, |s| &mut s.services)
    }

    async fn create_pod_disruption_budget(
        &self,
        namespace: &str,
        budget: &PodDisruptionBudget,
    ) -> Result<PodDisruptionBudget, ClusterError> {
        self.insert("PodDisruptionBudget", namespace, name_of(&budget.metadata), budget, |s| {
            &mut s.budgets
        })
    }

    async fn create_horizontal_pod_autoscaler(
        &self,
        namespace: &str,
        autoscaler: &HorizontalPodAutoscaler,
    ) -> Result<HorizontalPodAutoscaler, ClusterError> {
        self.insert(
            "HorizontalPodAutoscaler",
            namespace,
            name_of(&autoscaler.metadata),
            autoscaler,
            |s| &mut s.autoscalers,
        )
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment, ClusterError> {
        self.deployment(namespace, name)
            .ok_or_else(|| ClusterError::not_found("Deployment", name))
    }

    async fn replace_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<Deployment, ClusterError> {
        let name = name_of(&deployment.metadata);
        let mut state = self.state.lock().unwrap();
        match state.deployments.get_mut(&key(namespace, &name)) {
            Some(existing) => {
                *existing = deployment.clone();
                Ok(deployment.clone())
            }
            None => Err(ClusterError::not_found("Deployment", name)),
        }
    }

    async fn list_deployments(&self, namespace: &str) -> Result<Vec<Deployment>, ClusterError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .deployments
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, d)| d.clone())
            .collect())
    }

    async fn get_stateful_set(&self, namespace: &str, name: &str) -> Result<StatefulSet, ClusterError> {
        self.state
            .lock()
            .unwrap()
            .stateful_sets
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| ClusterError::not_found("StatefulSet", name))
    }

    async fn list_horizontal_pod_autoscalers(
        &self,
        namespace: &str,
    ) -> Result<Vec<HorizontalPodAutoscaler>, ClusterError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .autoscalers
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, h)| h.clone())
            .collect())
    }

    async fn list_pods(&self, namespace: &str, selector: &ListSelector) -> Result<Vec<Pod>, ClusterError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .pods
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, p)| p)
            .filter(|p| labels_match(selector.labels.as_deref(), p))
            .filter(|p| fields_match(selector.fields.as_deref(), p))
            .cloned()
            .collect())
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("delete Pod {namespace}/{name}"));
        state
            .pods
            .remove(&key(namespace, name))
            .map(drop)
            .ok_or_else(|| ClusterError::not_found("Pod", name))
    }

    async fn get_node(&self, name: &str) -> Result<Node, ClusterError> {
        self.state
            .lock()
            .unwrap()
            .nodes
            .iter()
            .find(|n| n.metadata.name.as_deref() == Some(name))
            .cloned()
            .ok_or_else(|| ClusterError::not_found("Node", name))
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, ClusterError> {
        Ok(self.state.lock().unwrap().nodes.clone())
    }

    async fn get_namespace(&self, name: &str) -> Result<Namespace, ClusterError> {
        let state = self.state.lock().unwrap();
        if state.namespaces.contains(name) {
            let mut namespace = Namespace::default();
            namespace.metadata.name = Some(name.to_string());
            Ok(namespace)
        } else {
            Err(ClusterError::not_found("Namespace", name))
        }
    }

    async fn create_namespace(&self, name: &str) -> Result<Namespace, ClusterError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("create Namespace {name}"));
        if !state.namespaces.insert(name.to_string()) {
            return Err(ClusterError::already_exists("Namespace", name));
        }
        let mut namespace = Namespace::default();
        namespace.metadata.name = Some(name.to_string());
        Ok(namespace)
    }

    async fn delete_namespace(&self, name: &str, force: bool) -> Result<(), ClusterError> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(format!("delete Namespace {name} force={force}"));
        if !state.namespaces.contains(name) {
            return Err(ClusterError::not_found("Namespace", name));
        }
        if force || !state.sticky_namespaces.contains(name) {
            state.namespaces.remove(name);
            state.pods.retain(|(ns, _), _| ns != name);
            state.deployments.retain(|(ns, _), _| ns != name);
            state.stateful_sets.retain(|(ns, _), _| ns != name);
            state.services.retain(|(ns, _), _| ns != name);
            state.budgets.retain(|(ns, _), _| ns != name);
            state.autoscalers.retain(|(ns, _), _| ns != name);
        }
        Ok(())
    }
}

/// A running, ready pod with the given labels scheduled on `node`.
pub fn pod(name: &str, labels: &[(&str, &str)], phase: &str, node: Option<&str>) -> Pod {
    let mut pod = Pod::default();
    pod.metadata.name = Some(name.to_string());
    pod.metadata.labels = Some(
        labels
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect(),
    );
    pod.spec = Some(PodSpec {
        node_name: node.map(str::to_string),
        ..Default::default()
    });
    pod.status = Some(PodStatus {
        phase: Some(phase.to_string()),
        ..Default::default()
    });
    pod
}

/// A ready node, labelled with `zone` when given.
pub fn node(name: &str, zone: Option<&str>) -> Node {
    let mut node = Node::default();
    node.metadata.name = Some(name.to_string());
    if let Some(zone) = zone {
        node.metadata.labels = Some(BTreeMap::from([(
            "topology.kubernetes.io/zone".to_string(),
            zone.to_string(),
        )]));
    }
    node.status = Some(NodeStatus {
        conditions: Some(vec![NodeCondition {
            type_: "Ready".to_string(),
            status: "True".to_string(),
            ..Default::default()
        }]),
        ..Default::default()
    });
    node
}

/// Sampler returning the scripted results in order, then an error once the
/// script is exhausted.
pub fn scripted<T>(
    script: Vec<Result<T, String>>,
) -> impl FnMut() -> std::pin::Pin<Box<dyn Future<Output = Result<T, String>> + Send>> + Send
where
    T: Send + 'static,
{
    let queue = Arc::new(Mutex::new(VecDeque::from(script)));
    move || {
        let next = queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err("script exhausted".to_string()));
        Box::pin(async move { next })
    }
}
