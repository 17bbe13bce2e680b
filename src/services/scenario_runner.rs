//! Scenario runner.
//!
//! Runs scenarios one after another. Each scenario gets a fresh namespace
//! (created when missing, cleared afterwards) and a logger bound to its tag.
//! Any error or panic raised by a scenario body is turned into a
//! [`ScenarioResult::Failed`] and logged with the failure marker; the runner
//! then moves on to the next scenario.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use futures::FutureExt;
use serde::Serialize;
use tokio::time::Instant;

use crate::domain::models::{Config, MonitorConfig};
use crate::domain::ports::{ClusterStateProvider, ManifestSource};
use crate::infrastructure::logging::ScenarioLogger;
use crate::services::dispatcher::{ApplySummary, ResourceDispatcher};
use crate::services::namespace::{clear_namespace, ensure_namespace, Cleanup, NAMESPACE_DELETION_WAIT};

/// Everything a scenario body needs.
pub struct ScenarioContext {
    pub cluster: Arc<dyn ClusterStateProvider>,
    pub manifests: Arc<dyn ManifestSource>,
    pub namespace: String,
    pub monitor: MonitorConfig,
    pub log: ScenarioLogger,
}

impl ScenarioContext {
    pub fn dispatcher(&self) -> ResourceDispatcher {
        ResourceDispatcher::new(Arc::clone(&self.cluster), self.namespace.clone())
            .tagged(self.log.tag())
    }

    pub fn load_manifest(&self, name: &str) -> anyhow::Result<Vec<u8>> {
        Ok(self.manifests.load(name)?)
    }

    /// Apply a manifest blob through the dispatcher.
    pub async fn apply(&self, name: &str, blob: &[u8]) -> anyhow::Result<ApplySummary> {
        self.log.info(format!("=== Applying {name} manifest ==="));
        let summary = self
            .dispatcher()
            .apply(blob)
            .await
            .with_context(|| format!("failed to apply manifest {name}"))?;
        for (kind, resource) in &summary.created {
            self.log.info(format!("created {kind} {resource}"));
        }
        Ok(summary)
    }
}

/// One self-contained verification flow.
#[async_trait]
pub trait Scenario: Send + Sync {
    fn tag(&self) -> &str;

    async fn run(&self, ctx: &ScenarioContext) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScenarioResult {
    Passed,
    Failed { cause: String },
}

impl ScenarioResult {
    pub const fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioOutcome {
    pub tag: String,
    pub allowed_to_fail: bool,
    pub result: ScenarioResult,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

mod duration_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }
}

pub struct ScenarioRunner {
    cluster: Arc<dyn ClusterStateProvider>,
    manifests: Arc<dyn ManifestSource>,
    config: Config,
    namespace_wait: MonitorConfig,
}

impl ScenarioRunner {
    pub fn new(
        cluster: Arc<dyn ClusterStateProvider>,
        manifests: Arc<dyn ManifestSource>,
        config: Config,
    ) -> Self {
        Self {
            cluster,
            manifests,
            config,
            namespace_wait: NAMESPACE_DELETION_WAIT,
        }
    }

    #[must_use]
    pub const fn with_namespace_wait(mut self, wait: MonitorConfig) -> Self {
        self.namespace_wait = wait;
        self
    }

    /// Run every scenario in order. A failing scenario never stops the ones
    /// after it.
    pub async fn run_all(&self, scenarios: &[Box<dyn Scenario>]) -> Vec<ScenarioOutcome> {
        let mut outcomes = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            outcomes.push(self.run_one(scenario.as_ref()).await);
        }
        outcomes
    }

    pub async fn run_one(&self, scenario: &dyn Scenario) -> ScenarioOutcome {
        let tag = scenario.tag().to_string();
        let log = ScenarioLogger::new(&tag);
        let allowed_to_fail = self.config.is_allowed_to_fail(&tag);
        let started = Instant::now();

        log.info(format!("=== Starting {tag} ==="));
        log.info(format!("{tag}: allowed to fail: {allowed_to_fail}"));

        let result = match ensure_namespace(self.cluster.as_ref(), &self.config.namespace).await {
            Ok(_) => self.execute(scenario, log.clone()).await,
            Err(err) => ScenarioResult::Failed {
                cause: format!("failed to ensure namespace {}: {err}", self.config.namespace),
            },
        };

        match &result {
            ScenarioResult::Passed => log.info(format!("=== {tag} passed ===")),
            ScenarioResult::Failed { cause } => {
                log.failed(&self.config.report.failure_marker, cause);
            }
        }

        log.info("=== Final namespace cleanup ===");
        let cleanup =
            clear_namespace(self.cluster.as_ref(), &self.config.namespace, self.namespace_wait).await;
        match cleanup {
            Cleanup::Deleted => log.info("namespace cleanup: Deleted"),
            other => log.warn(format!("namespace cleanup: {other:?}")),
        }

        ScenarioOutcome {
            tag,
            allowed_to_fail,
            result,
            elapsed: started.elapsed(),
        }
    }

    async fn execute(&self, scenario: &dyn Scenario, log: ScenarioLogger) -> ScenarioResult {
        let ctx = ScenarioContext {
            cluster: Arc::clone(&self.cluster),
            manifests: Arc::clone(&self.manifests),
            namespace: self.config.namespace.clone(),
            monitor: self.config.monitor.to_monitor_config(),
            log,
        };
        match AssertUnwindSafe(scenario.run(&ctx)).catch_unwind().await {
            Ok(Ok(())) => ScenarioResult::Passed,
            Ok(Err(err)) => ScenarioResult::Failed {
                cause: format!("{err:#}"),
            },
            Err(payload) => ScenarioResult::Failed {
                cause: format!("scenario panicked: {}", panic_message(payload.as_ref())),
            },
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
