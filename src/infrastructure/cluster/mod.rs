//! Cluster access infrastructure
//!
//! kube-rs implementation of the cluster state provider port plus credential
//! resolution for the supported access modes.

pub mod credentials;
pub mod provider;

pub use credentials::{resolve, CredentialsError};
pub use provider::KubeClusterProvider;
