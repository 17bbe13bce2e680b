pub mod config;
pub mod convergence;
pub mod pod;
pub mod report;
pub mod resource;
pub mod rollout;
pub mod topology;

pub use config::{
    AccessConfig, AccessMode, Config, LogFormat, LoggingConfig, ManifestConfig, MonitorSettings,
    ReportConfig,
};
pub use convergence::{
    invariant, Check, ConvergenceRun, Extrema, FnInvariant, Invariant, MonitorConfig, RunOutcome,
    RunPhase, RunReport,
};
pub use pod::PodCensus;
pub use report::{FinalReport, ScenarioLogEntry};
pub use resource::{Resource, ResourceDescriptor, ResourceKind};
pub use rollout::{IntOrPercent, RolloutBounds, RolloutSample};
pub use topology::{Placement, ZoneDistribution};
