//! kube-invariants - convergence verification for cluster orchestration
//!
//! Applies declarative workloads to a cluster, induces a change (rolling
//! update, pod deletion, autoscaling) and samples cluster state until the
//! change converges, checking availability and placement guarantees on every
//! sample. Per-scenario logs are aggregated into a JSON report at the end of
//! a suite run.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): models, errors and the port traits
//! - **Service Layer** (`services`): dispatcher, convergence monitor, skew
//!   calculator, rollout tracker, report aggregator and scenarios
//! - **Infrastructure Layer** (`infrastructure`): kube-rs provider,
//!   manifests, configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use kube_invariants::domain::models::{invariant, Check, MonitorConfig};
//! use kube_invariants::services::ConvergenceMonitor;
//!
//! let monitor = ConvergenceMonitor::new("pods", MonitorConfig::default())
//!     .invariant(invariant("running >= 5", |n: &u32| Check::ensure(*n >= 5, || format!("{n}"))))
//!     .observe_for(10);
//! let report = monitor.run(|| async { count_running().await }).await?;
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{ApplyError, ClusterError, MonitorError, MonitorFailure};
pub use domain::models::{
    Config, FinalReport, MonitorConfig, Placement, RolloutBounds, RolloutSample, RunOutcome,
    RunReport,
};
pub use domain::ports::{ClusterStateProvider, ListSelector, ManifestSource};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    ConvergenceMonitor, ReportAggregator, ResourceDispatcher, RolloutTracker, ScenarioRunner,
};
