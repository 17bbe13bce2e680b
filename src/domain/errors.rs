//! Domain errors for the convergence-verification engine.

use std::fmt;

use thiserror::Error;

use super::models::convergence::Extrema;

/// Errors surfaced by a [`ClusterStateProvider`](crate::domain::ports::ClusterStateProvider).
///
/// `NotFound` and `AlreadyExists` are kept distinct from every other failure so
/// that idempotent create/delete flows can branch on them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClusterError {
    #[error("{kind} {name} not found")]
    NotFound { kind: String, name: String },

    #[error("{kind} {name} already exists")]
    AlreadyExists { kind: String, name: String },

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),
}

impl ClusterError {
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub fn already_exists(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind: kind.into(),
            name: name.into(),
        }
    }

    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub const fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}

/// Why a single manifest document could not be applied.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DocumentFailureKind {
    #[error("decode failed: {0}")]
    Decode(String),

    #[error("unsupported type {0}")]
    Unsupported(String),

    #[error("apply failed: {0}")]
    Apply(ClusterError),
}

/// A failure tied to one document of a manifest blob (1-based index).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFailure {
    pub index: usize,
    pub kind: DocumentFailureKind,
}

impl fmt::Display for DocumentFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Document {} {}", self.index, self.kind)
    }
}

/// Aggregate failure of a manifest apply. Lists every failing document.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("manifest application errors:\n{}", format_failures(.failures))]
pub struct ApplyError {
    pub failures: Vec<DocumentFailure>,
}

impl ApplyError {
    /// Indices of every failing document, in blob order.
    pub fn indices(&self) -> Vec<usize> {
        self.failures.iter().map(|f| f.index).collect()
    }
}

fn format_failures(failures: &[DocumentFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Configuration errors detected before a monitor starts polling.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MonitorError {
    #[error("Invalid monitor interval: must be strictly positive")]
    ZeroInterval,

    #[error("Invalid monitor deadline: must be strictly in the future")]
    DeadlineNotInFuture,

    #[error("Invalid observation window: must take at least one sample")]
    EmptyObservationWindow,

    #[error("Monitor has no termination condition")]
    MissingTermination,
}

/// A monitored wait that ended without success.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MonitorFailure {
    #[error("Invariant '{invariant}' violated at sample {tick}: {detail} ({extrema})")]
    Violated {
        invariant: String,
        tick: u32,
        detail: String,
        extrema: Extrema,
    },

    #[error("Timed out after {ticks} samples without reaching the terminal condition ({extrema})")]
    TimedOut { ticks: u32, extrema: Extrema },

    #[error("Observation unavailable after {attempts} consecutive failures: {last_error} ({extrema})")]
    ObservationUnavailable {
        attempts: u32,
        last_error: String,
        extrema: Extrema,
    },
}

/// Skew is undefined when no zone holds any entity.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum SkewError {
    #[error("Skew undefined: no populated zones")]
    NoPopulatedZones,
}

/// Errors resolving surge/unavailable tolerances.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToleranceError {
    #[error("Invalid tolerance value '{0}': expected an integer or a percentage")]
    Invalid(String),

    #[error("Negative tolerance value: {0}")]
    Negative(i64),

    #[error("Workload {0} has no desired replica count")]
    MissingReplicas(String),
}
