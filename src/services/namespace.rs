//! Scenario namespace lifecycle.

use std::time::Duration;

use tracing::{error, info, warn};

use crate::domain::errors::ClusterError;
use crate::domain::models::MonitorConfig;
use crate::domain::ports::ClusterStateProvider;
use crate::services::convergence_monitor::ConvergenceMonitor;

/// Poll every 5 seconds for up to 3 minutes per deletion attempt.
pub const NAMESPACE_DELETION_WAIT: MonitorConfig =
    MonitorConfig::new(Duration::from_secs(5), Duration::from_secs(180));

/// Create `name` unless it already exists. Returns whether it was created.
pub async fn ensure_namespace(
    cluster: &dyn ClusterStateProvider,
    name: &str,
) -> Result<bool, ClusterError> {
    match cluster.get_namespace(name).await {
        Ok(_) => {
            info!(namespace = name, "namespace already exists");
            Ok(false)
        }
        Err(err) if err.is_not_found() => match cluster.create_namespace(name).await {
            Ok(_) => {
                info!(namespace = name, "namespace created");
                Ok(true)
            }
            Err(err) if err.is_already_exists() => Ok(false),
            Err(err) => Err(err),
        },
        Err(err) => Err(err),
    }
}

/// How a namespace cleanup ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cleanup {
    Deleted,
    ForceDeleted,
    Lingering,
}

/// Delete `name` and wait for it to disappear, escalating to a forced
/// deletion when the first wait runs out. Failures are logged, never raised.
pub async fn clear_namespace(
    cluster: &dyn ClusterStateProvider,
    name: &str,
    wait: MonitorConfig,
) -> Cleanup {
    info!(namespace = name, "clearing namespace");
    match cluster.delete_namespace(name, false).await {
        Ok(()) => {}
        Err(err) if err.is_not_found() => return Cleanup::Deleted,
        Err(err) => error!(namespace = name, error = %err, "namespace deletion failed"),
    }
    if wait_until_gone(cluster, name, wait).await {
        info!(namespace = name, "namespace deleted");
        return Cleanup::Deleted;
    }

    warn!(namespace = name, "namespace deletion timed out, forcing");
    match cluster.delete_namespace(name, true).await {
        Ok(()) => {}
        Err(err) if err.is_not_found() => return Cleanup::ForceDeleted,
        Err(err) => error!(namespace = name, error = %err, "forced namespace deletion failed"),
    }
    if wait_until_gone(cluster, name, wait).await {
        info!(namespace = name, "namespace force deleted");
        Cleanup::ForceDeleted
    } else {
        error!(namespace = name, "forced namespace deletion timed out");
        Cleanup::Lingering
    }
}

async fn wait_until_gone(cluster: &dyn ClusterStateProvider, name: &str, wait: MonitorConfig) -> bool {
    let monitor = ConvergenceMonitor::new(format!("namespace/{name}"), wait).until(|gone: &bool| *gone);
    let run = monitor
        .run(move || async move {
            match cluster.get_namespace(name).await {
                Ok(_) => Ok(false),
                Err(err) if err.is_not_found() => Ok(true),
                Err(err) => Err(err),
            }
        })
        .await;
    match run {
        Ok(report) => report.is_success(),
        Err(err) => {
            error!(namespace = name, error = %err, "namespace wait misconfigured");
            false
        }
    }
}
