//! Service layer: the verification engine and the built-in scenarios.

pub mod convergence_monitor;
pub mod dispatcher;
pub mod namespace;
pub mod report_aggregator;
pub mod rollout_tracker;
pub mod scenario_runner;
pub mod scenarios;
pub mod topology;

pub use convergence_monitor::{ConvergenceMonitor, Termination};
pub use dispatcher::{split_documents, ApplySummary, ResourceDispatcher};
pub use namespace::{clear_namespace, ensure_namespace, Cleanup};
pub use report_aggregator::{ReportAggregator, ReportError, ReportSummary};
pub use rollout_tracker::{RolloutReport, RolloutTracker};
pub use scenario_runner::{Scenario, ScenarioContext, ScenarioOutcome, ScenarioResult, ScenarioRunner};
pub use topology::SkewReport;
