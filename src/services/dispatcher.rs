//! Resource dispatcher.
//!
//! Decodes a multi-document manifest blob into typed descriptors and routes
//! each one to the creation call for its kind. Failures are collected per
//! document and reported together once the whole blob has been processed.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::errors::{ApplyError, ClusterError, DocumentFailure, DocumentFailureKind};
use crate::domain::models::{Resource, ResourceDescriptor, ResourceKind};
use crate::domain::ports::ClusterStateProvider;

/// Split a blob on lines consisting solely of `---`.
///
/// Every segment is returned, empty ones included, so that document indices
/// line up with the position of the document in the blob.
pub fn split_documents(blob: &str) -> Vec<&str> {
    let mut documents = Vec::new();
    let mut start = 0;
    let mut offset = 0;
    for line in blob.split_inclusive('\n') {
        if line.trim_end() == "---" {
            documents.push(&blob[start..offset]);
            start = offset + line.len();
        }
        offset += line.len();
    }
    documents.push(&blob[start..]);
    documents
}

/// Resources created by a successful apply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplySummary {
    /// Documents that were decoded and dispatched.
    pub created: Vec<(ResourceKind, String)>,
    /// Empty or whitespace-only documents.
    pub skipped: usize,
}

pub struct ResourceDispatcher {
    cluster: Arc<dyn ClusterStateProvider>,
    default_namespace: String,
    tag: Option<String>,
}

impl ResourceDispatcher {
    pub fn new(cluster: Arc<dyn ClusterStateProvider>, default_namespace: impl Into<String>) -> Self {
        Self {
            cluster,
            default_namespace: default_namespace.into(),
            tag: None,
        }
    }

    /// Attach every per-document event to a scenario tag.
    #[must_use]
    pub fn tagged(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Apply every document of `blob`.
    ///
    /// A document that fails to decode, has an unsupported kind, or is
    /// rejected by the cluster (including already-exists conflicts) does not
    /// stop the remaining documents. If any document failed, the returned
    /// [`ApplyError`] lists all of them by 1-based index.
    pub async fn apply(&self, blob: &[u8]) -> Result<ApplySummary, ApplyError> {
        let text = String::from_utf8_lossy(blob);
        let mut summary = ApplySummary::default();
        let mut failures = Vec::new();

        for (i, document) in split_documents(&text).into_iter().enumerate() {
            let index = i + 1;
            if document.trim().is_empty() {
                summary.skipped += 1;
                continue;
            }

            let descriptor = match ResourceDescriptor::decode(document, &self.default_namespace) {
                Ok(d) => d,
                Err(kind) => {
                    warn!(
                        tag = self.tag.as_deref(),
                        document = index,
                        error = %kind,
                        "manifest document rejected"
                    );
                    failures.push(DocumentFailure { index, kind });
                    continue;
                }
            };

            let kind = descriptor.kind();
            debug!(
                tag = self.tag.as_deref(),
                document = index,
                kind = %kind,
                namespace = %descriptor.namespace,
                name = %descriptor.name,
                "dispatching manifest document"
            );

            match self.create(&descriptor).await {
                Ok(()) => {
                    info!(
                        tag = self.tag.as_deref(),
                        kind = %kind,
                        name = %descriptor.name,
                        "resource created"
                    );
                    summary.created.push((kind, descriptor.name));
                }
                Err(err) => {
                    warn!(
                        tag = self.tag.as_deref(),
                        document = index,
                        kind = %kind,
                        error = %err,
                        "resource create failed"
                    );
                    failures.push(DocumentFailure {
                        index,
                        kind: DocumentFailureKind::Apply(err),
                    });
                }
            }
        }

        if failures.is_empty() {
            Ok(summary)
        } else {
            Err(ApplyError { failures })
        }
    }

    async fn create(&self, descriptor: &ResourceDescriptor) -> Result<(), ClusterError> {
        let namespace = descriptor.namespace.as_str();
        match &descriptor.resource {
            Resource::Deployment(o) => self.cluster.create_deployment(namespace, o).await.map(drop),
            Resource::StatefulSet(o) => self.cluster.create_stateful_set(namespace, o).await.map(drop),
            Resource::Service(o) => self.cluster.create_service(namespace, o).await.map(drop),
            Resource::PodDisruptionBudget(o) => self
                .cluster
                .create_pod_disruption_budget(namespace, o)
                .await
                .map(drop),
            Resource::HorizontalPodAutoscaler(o) => self
                .cluster
                .create_horizontal_pod_autoscaler(namespace, o)
                .await
                .map(drop),
        }
    }
}
