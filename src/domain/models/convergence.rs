//! Convergence run model: invariants, extrema and the per-run state machine.
//!
//! A run moves `Running -> {Succeeded, Violated, TimedOut, ObservationUnavailable}`.
//! It is created when a monitored wait starts, mutated once per sample and
//! discarded once a terminal phase is reached.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::domain::errors::{MonitorError, MonitorFailure};

/// Sampling parameters for one monitored wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Fixed sleep between two samples.
    pub interval: Duration,
    /// Upper bound on the wait, measured from the start of the run.
    pub timeout: Duration,
    /// Consecutive failed reads tolerated within a tick before giving up.
    pub max_observation_failures: u32,
    /// Delay between two reads of the same tick after a failed read.
    pub observation_retry: Duration,
}

impl MonitorConfig {
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            max_observation_failures: 3,
            observation_retry: Duration::from_secs(1),
        }
    }

    #[must_use]
    pub const fn with_observation_retries(mut self, max_failures: u32, delay: Duration) -> Self {
        self.max_observation_failures = max_failures;
        self.observation_retry = delay;
        self
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(300))
    }
}

/// Result of evaluating an invariant over one sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    held: bool,
    detail: Option<String>,
}

impl Check {
    pub const fn held() -> Self {
        Self {
            held: true,
            detail: None,
        }
    }

    pub fn broken(detail: impl Into<String>) -> Self {
        Self {
            held: false,
            detail: Some(detail.into()),
        }
    }

    /// Holds when `ok`; otherwise broken with the lazily built detail.
    pub fn ensure(ok: bool, detail: impl FnOnce() -> String) -> Self {
        if ok {
            Self::held()
        } else {
            Self::broken(detail())
        }
    }

    pub const fn is_held(&self) -> bool {
        self.held
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

/// A pure predicate that must hold on every sample of a monitored wait.
pub trait Invariant<S>: Send + Sync {
    /// Short identifier used in diagnostics.
    fn name(&self) -> &str;

    /// Evaluate the invariant against one state snapshot.
    fn check(&self, sample: &S) -> Check;
}

/// Closure-backed [`Invariant`].
pub struct FnInvariant<F> {
    name: String,
    check: F,
}

impl<S, F> Invariant<S> for FnInvariant<F>
where
    F: Fn(&S) -> Check + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, sample: &S) -> Check {
        (self.check)(sample)
    }
}

/// Build a named invariant from a closure.
pub fn invariant<S, F>(name: impl Into<String>, check: F) -> FnInvariant<F>
where
    F: Fn(&S) -> Check + Send + Sync,
{
    FnInvariant {
        name: name.into(),
        check,
    }
}

/// Minimum, maximum and last value of a tracked metric across samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extrema {
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub last: Option<i64>,
}

impl Extrema {
    pub fn observe(&mut self, value: i64) {
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
        self.last = Some(value);
    }
}

impl fmt::Display for Extrema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.min, self.max, self.last) {
            (Some(min), Some(max), Some(last)) => {
                write!(f, "min observed {min}, max observed {max}, last {last}")
            }
            _ => f.write_str("no metric observed"),
        }
    }
}

/// Phase of a [`ConvergenceRun`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Running,
    Succeeded,
    Violated,
    TimedOut,
    ObservationUnavailable,
}

impl RunPhase {
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// How a monitored wait concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded,
    Violated {
        invariant: String,
        tick: u32,
        detail: String,
    },
    TimedOut,
    ObservationUnavailable {
        attempts: u32,
        last_error: String,
    },
}

impl RunOutcome {
    pub const fn phase(&self) -> RunPhase {
        match self {
            Self::Succeeded => RunPhase::Succeeded,
            Self::Violated { .. } => RunPhase::Violated,
            Self::TimedOut => RunPhase::TimedOut,
            Self::ObservationUnavailable { .. } => RunPhase::ObservationUnavailable,
        }
    }
}

/// Mutable state of one polling session.
#[derive(Debug, Clone)]
pub struct ConvergenceRun {
    started_at: Instant,
    deadline: Instant,
    interval: Duration,
    attempts: u32,
    extrema: Extrema,
    phase: RunPhase,
}

impl ConvergenceRun {
    /// Enter `Running`. Rejects a non-positive interval or a deadline that is
    /// not strictly after `now`.
    pub fn start(interval: Duration, deadline: Instant, now: Instant) -> Result<Self, MonitorError> {
        if interval.is_zero() {
            return Err(MonitorError::ZeroInterval);
        }
        if deadline <= now {
            return Err(MonitorError::DeadlineNotInFuture);
        }
        Ok(Self {
            started_at: now,
            deadline,
            interval,
            attempts: 0,
            extrema: Extrema::default(),
            phase: RunPhase::Running,
        })
    }

    /// Count a new sample and fold its metric (if any) into the extrema.
    pub fn record_sample(&mut self, metric: Option<i64>) -> u32 {
        self.attempts += 1;
        if let Some(value) = metric {
            self.extrema.observe(value);
        }
        self.attempts
    }

    pub fn is_past_deadline(&self, now: Instant) -> bool {
        now > self.deadline
    }

    pub fn conclude(&mut self, outcome: &RunOutcome) {
        self.phase = outcome.phase();
    }

    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    pub const fn extrema(&self) -> Extrema {
        self.extrema
    }

    pub const fn interval(&self) -> Duration {
        self.interval
    }

    pub const fn phase(&self) -> RunPhase {
        self.phase
    }

    pub const fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_at)
    }
}

/// Summary of a concluded run.
#[derive(Debug, Clone)]
pub struct RunReport<S> {
    pub outcome: RunOutcome,
    pub ticks: u32,
    pub extrema: Extrema,
    pub elapsed: Duration,
    pub last_sample: Option<S>,
}

impl<S> RunReport<S> {
    pub const fn is_success(&self) -> bool {
        matches!(self.outcome, RunOutcome::Succeeded)
    }

    /// The failure this report represents, if any.
    pub fn failure(&self) -> Option<MonitorFailure> {
        match &self.outcome {
            RunOutcome::Succeeded => None,
            RunOutcome::Violated {
                invariant,
                tick,
                detail,
            } => Some(MonitorFailure::Violated {
                invariant: invariant.clone(),
                tick: *tick,
                detail: detail.clone(),
                extrema: self.extrema,
            }),
            RunOutcome::TimedOut => Some(MonitorFailure::TimedOut {
                ticks: self.ticks,
                extrema: self.extrema,
            }),
            RunOutcome::ObservationUnavailable {
                attempts,
                last_error,
            } => Some(MonitorFailure::ObservationUnavailable {
                attempts: *attempts,
                last_error: last_error.clone(),
                extrema: self.extrema,
            }),
        }
    }

    /// Turn a non-successful report into an error.
    pub fn ensure_succeeded(self) -> Result<Self, MonitorFailure> {
        match self.failure() {
            Some(failure) => Err(failure),
            None => Ok(self),
        }
    }
}
