//! Typed resource descriptors decoded from declarative manifest documents.

use std::fmt;

use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::Resource as _;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::domain::errors::DocumentFailureKind;

/// The closed set of resource families the dispatcher can create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Scalable workload.
    Deployment,
    /// Stateful workload.
    StatefulSet,
    /// Network endpoint.
    Service,
    /// Availability budget.
    PodDisruptionBudget,
    /// Autoscaler.
    HorizontalPodAutoscaler,
}

impl ResourceKind {
    pub const ALL: [Self; 5] = [
        Self::Deployment,
        Self::StatefulSet,
        Self::Service,
        Self::PodDisruptionBudget,
        Self::HorizontalPodAutoscaler,
    ];

    /// Resolve a document's `apiVersion`/`kind` pair.
    pub fn from_type_meta(api_version: &str, kind: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.api_version() == api_version && k.as_str() == kind)
    }

    pub const fn api_version(self) -> &'static str {
        match self {
            Self::Deployment => Deployment::API_VERSION,
            Self::StatefulSet => StatefulSet::API_VERSION,
            Self::Service => Service::API_VERSION,
            Self::PodDisruptionBudget => PodDisruptionBudget::API_VERSION,
            Self::HorizontalPodAutoscaler => HorizontalPodAutoscaler::API_VERSION,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Deployment => Deployment::KIND,
            Self::StatefulSet => StatefulSet::KIND,
            Self::Service => Service::KIND,
            Self::PodDisruptionBudget => PodDisruptionBudget::KIND,
            Self::HorizontalPodAutoscaler => HorizontalPodAutoscaler::KIND,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed payload of a decoded document.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    Deployment(Box<Deployment>),
    StatefulSet(Box<StatefulSet>),
    Service(Box<Service>),
    PodDisruptionBudget(Box<PodDisruptionBudget>),
    HorizontalPodAutoscaler(Box<HorizontalPodAutoscaler>),
}

impl Resource {
    pub const fn kind(&self) -> ResourceKind {
        match self {
            Self::Deployment(_) => ResourceKind::Deployment,
            Self::StatefulSet(_) => ResourceKind::StatefulSet,
            Self::Service(_) => ResourceKind::Service,
            Self::PodDisruptionBudget(_) => ResourceKind::PodDisruptionBudget,
            Self::HorizontalPodAutoscaler(_) => ResourceKind::HorizontalPodAutoscaler,
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            Self::Deployment(o) => &o.metadata,
            Self::StatefulSet(o) => &o.metadata,
            Self::Service(o) => &o.metadata,
            Self::PodDisruptionBudget(o) => &o.metadata,
            Self::HorizontalPodAutoscaler(o) => &o.metadata,
        }
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        match self {
            Self::Deployment(o) => &mut o.metadata,
            Self::StatefulSet(o) => &mut o.metadata,
            Self::Service(o) => &mut o.metadata,
            Self::PodDisruptionBudget(o) => &mut o.metadata,
            Self::HorizontalPodAutoscaler(o) => &mut o.metadata,
        }
    }

    fn decode(kind: ResourceKind, value: serde_yaml::Value) -> Result<Self, DocumentFailureKind> {
        Ok(match kind {
            ResourceKind::Deployment => Self::Deployment(decode_typed(value)?),
            ResourceKind::StatefulSet => Self::StatefulSet(decode_typed(value)?),
            ResourceKind::Service => Self::Service(decode_typed(value)?),
            ResourceKind::PodDisruptionBudget => Self::PodDisruptionBudget(decode_typed(value)?),
            ResourceKind::HorizontalPodAutoscaler => {
                Self::HorizontalPodAutoscaler(decode_typed(value)?)
            }
        })
    }
}

fn decode_typed<T: DeserializeOwned>(value: serde_yaml::Value) -> Result<Box<T>, DocumentFailureKind> {
    serde_yaml::from_value(value)
        .map(Box::new)
        .map_err(|e| DocumentFailureKind::Decode(e.to_string()))
}

/// A decoded document: kind, placement and typed payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDescriptor {
    pub namespace: String,
    pub name: String,
    pub resource: Resource,
}

impl ResourceDescriptor {
    pub const fn kind(&self) -> ResourceKind {
        self.resource.kind()
    }

    /// Decode one YAML document.
    ///
    /// Documents without `metadata.namespace` are placed in
    /// `default_namespace`. An `apiVersion`/`kind` outside the supported set
    /// yields [`DocumentFailureKind::Unsupported`].
    pub fn decode(document: &str, default_namespace: &str) -> Result<Self, DocumentFailureKind> {
        let value: serde_yaml::Value = serde_yaml::from_str(document)
            .map_err(|e| DocumentFailureKind::Decode(e.to_string()))?;

        let api_version = string_field(&value, "apiVersion")?;
        let kind_name = string_field(&value, "kind")?;
        let kind = ResourceKind::from_type_meta(&api_version, &kind_name)
            .ok_or_else(|| DocumentFailureKind::Unsupported(format!("{api_version}/{kind_name}")))?;

        let mut resource = Resource::decode(kind, value)?;
        let metadata = resource.metadata_mut();
        let name = metadata
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| DocumentFailureKind::Decode("missing metadata.name".to_string()))?;
        let namespace = metadata
            .namespace
            .clone()
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| default_namespace.to_string());
        metadata.namespace = Some(namespace.clone());

        Ok(Self {
            namespace,
            name,
            resource,
        })
    }
}

fn string_field(value: &serde_yaml::Value, field: &str) -> Result<String, DocumentFailureKind> {
    value
        .get(field)
        .and_then(serde_yaml::Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| DocumentFailureKind::Decode(format!("missing {field}")))
}
