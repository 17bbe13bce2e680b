//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines the interfaces infrastructure adapters must implement:
//! - ClusterStateProvider: list/get/create/delete over cluster resources
//! - ManifestSource: raw declarative blobs by logical name
//!
//! These traits keep the engine independent of the concrete cluster client
//! and of where manifests are stored.

pub mod cluster;
pub mod manifest_source;

pub use cluster::{ClusterStateProvider, ListSelector};
pub use manifest_source::{ManifestError, ManifestSource};
