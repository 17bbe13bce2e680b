//! Integration tests for manifest dispatch against the in-memory cluster.

mod common;

use std::sync::Arc;

use common::FakeCluster;
use kube_invariants::domain::errors::{ClusterError, DocumentFailureKind};
use kube_invariants::domain::models::ResourceKind;
use kube_invariants::services::ResourceDispatcher;

const SERVICE: &str = "apiVersion: v1
kind: Service
metadata:
  name: web
spec:
  clusterIP: None
  selector:
    app: web
";

const MALFORMED: &str = "apiVersion: apps/v1
kind: Deployment
metadata:
  name: [broken
";

const BUDGET: &str = "apiVersion: policy/v1
kind: PodDisruptionBudget
metadata:
  name: web-pdb
  namespace: other
spec:
  minAvailable: 2
";

const DEPLOYMENT: &str = "apiVersion: apps/v1
kind: Deployment
metadata:
  name: app
spec:
  replicas: 3
  selector:
    matchLabels:
      app: app
  template:
    metadata:
      labels:
        app: app
";

fn dispatcher(cluster: &FakeCluster) -> ResourceDispatcher {
    ResourceDispatcher::new(Arc::new(cluster.clone()), "invariants")
}

#[tokio::test]
async fn test_malformed_document_does_not_stop_the_rest() {
    let cluster = FakeCluster::new();
    let blob = format!("{SERVICE}---\n{MALFORMED}---\n{BUDGET}");

    let err = dispatcher(&cluster).apply(blob.as_bytes()).await.unwrap_err();

    assert_eq!(err.indices(), vec![2]);
    assert!(matches!(err.failures[0].kind, DocumentFailureKind::Decode(_)));
    assert!(err.to_string().starts_with("manifest application errors:"));
    assert_eq!(
        cluster.calls(),
        vec![
            "create Service invariants/web".to_string(),
            "create PodDisruptionBudget other/web-pdb".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_all_documents_created_in_order() {
    let cluster = FakeCluster::new();
    let blob = format!("{DEPLOYMENT}---\n{SERVICE}");

    let summary = dispatcher(&cluster).apply(blob.as_bytes()).await.unwrap();

    assert_eq!(
        summary.created,
        vec![
            (ResourceKind::Deployment, "app".to_string()),
            (ResourceKind::Service, "web".to_string()),
        ]
    );
    assert_eq!(summary.skipped, 0);
    let deployment = cluster.deployment("invariants", "app").unwrap();
    assert_eq!(deployment.metadata.namespace.as_deref(), Some("invariants"));
}

#[tokio::test]
async fn test_empty_documents_are_skipped() {
    let cluster = FakeCluster::new();
    let blob = format!("---\n{SERVICE}---\n   \n---\n");

    let summary = dispatcher(&cluster).apply(blob.as_bytes()).await.unwrap();

    assert_eq!(summary.created.len(), 1);
    assert_eq!(summary.skipped, 3);
}

#[tokio::test]
async fn test_unsupported_kind_is_reported() {
    let cluster = FakeCluster::new();
    let blob = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: settings\n";

    let err = dispatcher(&cluster).apply(blob.as_bytes()).await.unwrap_err();

    assert_eq!(err.indices(), vec![1]);
    assert_eq!(
        err.failures[0].kind,
        DocumentFailureKind::Unsupported("v1/ConfigMap".to_string())
    );
    assert!(cluster.calls().is_empty());
}

#[tokio::test]
async fn test_existing_resource_is_a_conflict() {
    let cluster = FakeCluster::new();
    let dispatcher = dispatcher(&cluster);
    dispatcher.apply(SERVICE.as_bytes()).await.unwrap();

    let err = dispatcher.apply(SERVICE.as_bytes()).await.unwrap_err();

    assert_eq!(
        err.failures[0].kind,
        DocumentFailureKind::Apply(ClusterError::already_exists("Service", "web"))
    );
}

#[tokio::test]
async fn test_every_failing_document_is_listed() {
    let cluster = FakeCluster::new().reject("web-pdb");
    let blob = format!("{MALFORMED}---\n{SERVICE}---\n{BUDGET}");

    let err = dispatcher(&cluster).apply(blob.as_bytes()).await.unwrap_err();

    assert_eq!(err.indices(), vec![1, 3]);
    let message = err.to_string();
    assert!(message.contains("Document 1 decode failed"));
    assert!(message.contains("Document 3 apply failed: API error (500): web-pdb rejected"));
}
