//! Domain layer for the convergence-verification engine
//!
//! Pure models and the ports through which the engine reaches the cluster
//! and the manifest store.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{
    ApplyError, ClusterError, DocumentFailure, DocumentFailureKind, MonitorError, MonitorFailure,
    SkewError, ToleranceError,
};
