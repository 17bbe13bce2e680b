//! Rollout progress tracker.
//!
//! A [`ConvergenceMonitor`] over [`RolloutSample`]s. The rollout is complete
//! once updated, total and available counts all equal the desired count in
//! the same sample. On every sample the available count must stay at or above
//! `desired - max_unavailable` and the total must stay at or below
//! `desired + max_surge`. The minimum available count is tracked across the
//! whole run and reported whatever the outcome.

use std::fmt;
use std::future::Future;

use k8s_openapi::api::apps::v1::Deployment;
use tokio::time::Instant;

use crate::domain::errors::{MonitorError, MonitorFailure, ToleranceError};
use crate::domain::models::{
    invariant, Check, Invariant, MonitorConfig, RolloutBounds, RolloutSample, RunReport,
};
use crate::services::convergence_monitor::ConvergenceMonitor;

/// Outcome of a tracked rollout.
#[derive(Debug, Clone)]
pub struct RolloutReport {
    pub bounds: RolloutBounds,
    pub run: RunReport<RolloutSample>,
    /// Lowest available count seen in any sample.
    pub min_available: Option<u32>,
}

impl RolloutReport {
    pub const fn is_success(&self) -> bool {
        self.run.is_success()
    }

    pub fn ensure_succeeded(self) -> Result<Self, MonitorFailure> {
        match self.run.failure() {
            Some(failure) => Err(failure),
            None => Ok(self),
        }
    }
}

pub struct RolloutTracker {
    bounds: RolloutBounds,
    monitor: ConvergenceMonitor<RolloutSample>,
}

impl RolloutTracker {
    pub fn new(label: impl Into<String>, bounds: RolloutBounds, config: MonitorConfig) -> Self {
        let monitor = ConvergenceMonitor::new(label, config)
            .invariant(availability_floor(bounds))
            .invariant(surge_ceiling(bounds))
            .until(RolloutSample::is_complete)
            .track(|s: &RolloutSample| i64::from(s.available));
        Self { bounds, monitor }
    }

    /// Bounds taken from the deployment's replica count and rolling-update
    /// strategy.
    pub fn for_deployment(
        label: impl Into<String>,
        deployment: &Deployment,
        config: MonitorConfig,
    ) -> Result<Self, ToleranceError> {
        Ok(Self::new(label, RolloutBounds::from_deployment(deployment)?, config))
    }

    /// Add an invariant checked alongside the rollout bounds.
    #[must_use]
    pub fn with_invariant(mut self, extra: impl Invariant<RolloutSample> + 'static) -> Self {
        self.monitor = self.monitor.invariant(extra);
        self
    }

    #[must_use]
    pub fn tagged(mut self, tag: impl Into<String>) -> Self {
        self.monitor = self.monitor.tagged(tag);
        self
    }

    pub const fn bounds(&self) -> RolloutBounds {
        self.bounds
    }

    pub async fn track<F, Fut, E>(&self, sampler: F) -> Result<RolloutReport, MonitorError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<RolloutSample, E>> + Send,
        E: fmt::Display + Send,
    {
        let run = self.monitor.run(sampler).await?;
        Ok(self.report(run))
    }

    pub async fn track_until<F, Fut, E>(
        &self,
        deadline: Instant,
        sampler: F,
    ) -> Result<RolloutReport, MonitorError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<RolloutSample, E>> + Send,
        E: fmt::Display + Send,
    {
        let run = self.monitor.run_until(deadline, sampler).await?;
        Ok(self.report(run))
    }

    fn report(&self, run: RunReport<RolloutSample>) -> RolloutReport {
        RolloutReport {
            bounds: self.bounds,
            min_available: run.extrema.min.and_then(|v| u32::try_from(v).ok()),
            run,
        }
    }
}

/// Available replicas never drop below `desired - max_unavailable`.
pub fn availability_floor(bounds: RolloutBounds) -> impl Invariant<RolloutSample> {
    let floor = bounds.availability_floor();
    invariant(format!("available >= {floor}"), move |s: &RolloutSample| {
        Check::ensure(s.available >= floor, || {
            format!(
                "available {} below floor {floor} (updated {}, total {}, desired {})",
                s.available, s.updated, s.total, s.desired
            )
        })
    })
}

/// Total replicas never exceed `desired + max_surge`.
pub fn surge_ceiling(bounds: RolloutBounds) -> impl Invariant<RolloutSample> {
    let ceiling = bounds.surge_ceiling();
    invariant(format!("total <= {ceiling}"), move |s: &RolloutSample| {
        Check::ensure(s.total <= ceiling, || {
            format!(
                "total {} above ceiling {ceiling} (updated {}, available {}, desired {})",
                s.total, s.updated, s.available, s.desired
            )
        })
    })
}

/// Running pods behind the workload never drop below a disruption budget's
/// `minAvailable`. Samples without a pod count are not judged.
pub fn running_pods_floor(min_available: u32) -> impl Invariant<RolloutSample> {
    invariant(
        format!("running pods >= {min_available}"),
        move |s: &RolloutSample| match s.running_pods {
            Some(running) => Check::ensure(running >= min_available, || {
                format!("{running} running pods below disruption budget {min_available}")
            }),
            None => Check::held(),
        },
    )
}
