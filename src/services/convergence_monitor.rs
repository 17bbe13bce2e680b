//! Convergence monitor.
//!
//! A bounded polling loop over a caller-supplied state sampler. Every tick
//! takes one snapshot, folds the tracked metric into the run's extrema,
//! evaluates every invariant, then the termination condition, then the
//! deadline, and finally sleeps for the configured interval. Ticks never
//! overlap: the next sleep starts only after the current evaluation is done.
//!
//! Invariants are checked on every sample, the first and the last included.
//! A single broken sample ends the run as `Violated`; there is no debouncing.

use std::fmt;
use std::future::Future;

use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::domain::errors::MonitorError;
use crate::domain::models::{ConvergenceRun, Invariant, MonitorConfig, RunOutcome, RunReport};

type Predicate<S> = Box<dyn Fn(&S) -> bool + Send + Sync>;
type Metric<S> = Box<dyn Fn(&S) -> i64 + Send + Sync>;

/// When a run that never broke an invariant counts as successful.
pub enum Termination<S> {
    /// As soon as the terminal predicate holds on a sample.
    WhenSatisfied(Predicate<S>),
    /// After this many samples in which every invariant held.
    AfterSamples(u32),
}

pub struct ConvergenceMonitor<S> {
    label: String,
    tag: Option<String>,
    config: MonitorConfig,
    invariants: Vec<Box<dyn Invariant<S>>>,
    termination: Option<Termination<S>>,
    metric: Option<Metric<S>>,
}

impl<S: Send> ConvergenceMonitor<S> {
    pub fn new(label: impl Into<String>, config: MonitorConfig) -> Self {
        Self {
            label: label.into(),
            tag: None,
            config,
            invariants: Vec::new(),
            termination: None,
            metric: None,
        }
    }

    /// Add an immediate invariant. Invariants are combined with logical AND
    /// and evaluated in insertion order.
    #[must_use]
    pub fn invariant(mut self, invariant: impl Invariant<S> + 'static) -> Self {
        self.invariants.push(Box::new(invariant));
        self
    }

    /// Attach every event of this monitor to a scenario tag, so samples and
    /// verdicts land in that scenario's report slice.
    #[must_use]
    pub fn tagged(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Succeed on the first sample for which `predicate` holds.
    #[must_use]
    pub fn until(mut self, predicate: impl Fn(&S) -> bool + Send + Sync + 'static) -> Self {
        self.termination = Some(Termination::WhenSatisfied(Box::new(predicate)));
        self
    }

    /// Succeed once `samples` samples have been taken without a violation.
    #[must_use]
    pub fn observe_for(mut self, samples: u32) -> Self {
        self.termination = Some(Termination::AfterSamples(samples));
        self
    }

    /// Track a metric whose minimum and maximum are reported with the run.
    #[must_use]
    pub fn track(mut self, metric: impl Fn(&S) -> i64 + Send + Sync + 'static) -> Self {
        self.metric = Some(Box::new(metric));
        self
    }

    pub const fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Run with a deadline of `now + config.timeout`.
    pub async fn run<F, Fut, E>(&self, sampler: F) -> Result<RunReport<S>, MonitorError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<S, E>> + Send,
        E: fmt::Display + Send,
    {
        let deadline = Instant::now() + self.config.timeout;
        self.run_until(deadline, sampler).await
    }

    /// Run until success, violation, observation failure or `deadline`.
    ///
    /// Returns `Err` only for configuration problems detected before the
    /// first sample; every other ending is described by the report's outcome.
    pub async fn run_until<F, Fut, E>(
        &self,
        deadline: Instant,
        mut sampler: F,
    ) -> Result<RunReport<S>, MonitorError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<S, E>> + Send,
        E: fmt::Display + Send,
    {
        let termination = match &self.termination {
            None => return Err(MonitorError::MissingTermination),
            Some(Termination::AfterSamples(0)) => return Err(MonitorError::EmptyObservationWindow),
            Some(t) => t,
        };
        let mut run = ConvergenceRun::start(self.config.interval, deadline, Instant::now())?;

        debug!(
            monitor = %self.label,
            tag = self.tag.as_deref(),
            interval_ms = self.config.interval.as_millis(),
            invariants = self.invariants.len(),
            "monitor started"
        );

        let mut last_sample = None;
        let outcome = loop {
            let snapshot = match self.observe(&mut sampler).await {
                Ok(snapshot) => snapshot,
                Err((attempts, last_error)) => {
                    break RunOutcome::ObservationUnavailable {
                        attempts,
                        last_error,
                    };
                }
            };

            let tick = run.record_sample(self.metric.as_ref().map(|m| m(&snapshot)));

            if let Some((invariant, detail)) = self.first_broken(&snapshot) {
                last_sample = Some(snapshot);
                break RunOutcome::Violated {
                    invariant,
                    tick,
                    detail,
                };
            }

            let done = match termination {
                Termination::WhenSatisfied(predicate) => predicate(&snapshot),
                Termination::AfterSamples(samples) => tick >= *samples,
            };
            last_sample = Some(snapshot);
            if done {
                break RunOutcome::Succeeded;
            }

            if run.is_past_deadline(Instant::now()) {
                break RunOutcome::TimedOut;
            }

            debug!(
                monitor = %self.label,
                tag = self.tag.as_deref(),
                tick,
                extrema = %run.extrema(),
                "sample held"
            );
            sleep(run.interval()).await;
        };

        run.conclude(&outcome);
        let report = RunReport {
            ticks: run.attempts(),
            extrema: run.extrema(),
            elapsed: run.elapsed(Instant::now()),
            last_sample,
            outcome,
        };
        self.log_conclusion(&report);
        Ok(report)
    }

    /// Read one snapshot, retrying failed reads within the tick.
    async fn observe<F, Fut, E>(&self, sampler: &mut F) -> Result<S, (u32, String)>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<S, E>> + Send,
        E: fmt::Display + Send,
    {
        let max_failures = self.config.max_observation_failures.max(1);
        let mut failures = 0;
        loop {
            match sampler().await {
                Ok(snapshot) => return Ok(snapshot),
                Err(err) => {
                    failures += 1;
                    let message = err.to_string();
                    warn!(
                        monitor = %self.label,
                        tag = self.tag.as_deref(),
                        attempt = failures,
                        error = %message,
                        "state observation failed"
                    );
                    if failures >= max_failures {
                        return Err((failures, message));
                    }
                }
            }
            sleep(self.config.observation_retry).await;
        }
    }

    fn first_broken(&self, snapshot: &S) -> Option<(String, String)> {
        self.invariants.iter().find_map(|invariant| {
            let check = invariant.check(snapshot);
            if check.is_held() {
                None
            } else {
                Some((
                    invariant.name().to_string(),
                    check.detail().unwrap_or("invariant did not hold").to_string(),
                ))
            }
        })
    }

    fn log_conclusion(&self, report: &RunReport<S>) {
        match &report.outcome {
            RunOutcome::Succeeded => info!(
                monitor = %self.label,
                tag = self.tag.as_deref(),
                ticks = report.ticks,
                extrema = %report.extrema,
                "monitor succeeded"
            ),
            RunOutcome::Violated {
                invariant,
                tick,
                detail,
            } => warn!(
                monitor = %self.label,
                tag = self.tag.as_deref(),
                invariant = %invariant,
                tick,
                detail = %detail,
                extrema = %report.extrema,
                "invariant violated"
            ),
            RunOutcome::TimedOut => warn!(
                monitor = %self.label,
                tag = self.tag.as_deref(),
                ticks = report.ticks,
                extrema = %report.extrema,
                "monitor timed out"
            ),
            RunOutcome::ObservationUnavailable {
                attempts,
                last_error,
            } => warn!(
                monitor = %self.label,
                tag = self.tag.as_deref(),
                attempts,
                error = %last_error,
                "observation unavailable"
            ),
        }
    }
}
