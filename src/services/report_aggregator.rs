//! Report aggregator.
//!
//! Consumes the scenario log stream once the suite is over, classifies every
//! scenario tag and writes the final report artifact.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::models::{FinalReport, ReportConfig, ScenarioLogEntry};

/// `test_timestamp` format inside the report.
pub const REPORT_TIMESTAMP_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

/// Artifact file name, timestamped so runs never overwrite each other.
pub const REPORT_FILE_FORMAT: &str = "test_suite_log_%Y%m%d-%H%M%S.json";

/// Below this many tags no summary is produced.
pub const SUMMARY_MIN_TAGS: usize = 3;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Report output directory does not exist: {0}")]
    MissingOutputDir(PathBuf),

    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write report {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Counts per bucket, for quick inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub total: usize,
    pub succeeding: usize,
    pub failing: usize,
    pub allowed_to_fail: usize,
    pub failed_but_not_allowed: usize,
    pub success_ratio: String,
}

pub struct ReportAggregator {
    config: ReportConfig,
    allowed_to_fail: BTreeSet<String>,
}

impl ReportAggregator {
    pub fn new(config: ReportConfig, allowed_to_fail: impl IntoIterator<Item = String>) -> Self {
        Self {
            config,
            allowed_to_fail: allowed_to_fail.into_iter().collect(),
        }
    }

    /// Aggregate a newline separated log stream.
    pub fn aggregate_bytes(&self, log: &[u8], generated_at: DateTime<Local>) -> FinalReport {
        let text = String::from_utf8_lossy(log);
        self.aggregate(text.lines(), generated_at)
    }

    /// Classify every tag found in `lines`.
    ///
    /// Lines that do not parse as tagged JSON records are skipped. Records
    /// carrying the bootstrap tag are dropped. A tag fails when any of its
    /// records has the failure marker in its message.
    pub fn aggregate<'a>(
        &self,
        lines: impl IntoIterator<Item = &'a str>,
        generated_at: DateTime<Local>,
    ) -> FinalReport {
        let mut logs_by_tags: BTreeMap<String, Vec<_>> = BTreeMap::new();
        let mut failing = BTreeSet::new();
        let mut skipped = 0_usize;

        for line in lines {
            let Some(entry) = ScenarioLogEntry::parse(line) else {
                if !line.trim().is_empty() {
                    skipped += 1;
                }
                continue;
            };
            if entry.tag() == self.config.bootstrap_tag {
                continue;
            }
            if entry
                .message()
                .is_some_and(|m| m.contains(&self.config.failure_marker))
            {
                failing.insert(entry.tag().to_string());
            }
            let tag = entry.tag().to_string();
            logs_by_tags.entry(tag).or_default().push(entry.into_embedded());
        }

        if skipped > 0 {
            debug!(skipped, "skipped unparseable log records");
        }

        let succeeding: Vec<String> = logs_by_tags
            .keys()
            .filter(|tag| !failing.contains(*tag))
            .cloned()
            .collect();
        let (allowed, not_allowed): (Vec<String>, Vec<String>) = failing
            .iter()
            .cloned()
            .partition(|tag| self.allowed_to_fail.contains(tag));

        FinalReport {
            test_timestamp: generated_at.format(REPORT_TIMESTAMP_FORMAT).to_string(),
            success_ratio: success_ratio(succeeding.len(), failing.len()),
            failing_tests: failing.into_iter().collect(),
            succeeding_tests: succeeding,
            allowed_to_fail_tests: allowed,
            failed_but_not_allowed: not_allowed,
            logs_by_tags,
        }
    }

    /// Write `report` into the configured output directory and return the
    /// artifact path. The directory must already exist.
    pub fn write(
        &self,
        report: &FinalReport,
        generated_at: DateTime<Local>,
    ) -> Result<PathBuf, ReportError> {
        write_report(&self.config.output_dir, report, generated_at)
    }
}

/// `succeeding / (succeeding + failing)` as a percentage with two decimals,
/// or `n/a` when no scenario ran.
#[allow(clippy::cast_precision_loss)]
pub fn success_ratio(succeeding: usize, failing: usize) -> String {
    let total = succeeding + failing;
    if total == 0 {
        return "n/a".to_string();
    }
    format!("{:.2}%", succeeding as f64 / total as f64 * 100.0)
}

/// Serialize with one-space indentation.
pub fn render_report(report: &FinalReport) -> Result<Vec<u8>, ReportError> {
    let mut buf = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b" "));
    report.serialize(&mut serializer)?;
    Ok(buf)
}

pub fn write_report(
    dir: &Path,
    report: &FinalReport,
    generated_at: DateTime<Local>,
) -> Result<PathBuf, ReportError> {
    if !dir.is_dir() {
        return Err(ReportError::MissingOutputDir(dir.to_path_buf()));
    }
    let path = dir.join(generated_at.format(REPORT_FILE_FORMAT).to_string());
    let bytes = render_report(report)?;
    std::fs::write(&path, bytes).map_err(|source| ReportError::Write {
        path: path.clone(),
        source,
    })?;
    info!(path = %path.display(), tags = report.tag_count(), "report written");
    Ok(path)
}

/// Bucket counts, or `None` when fewer than three tags were seen.
pub fn summarize(report: &FinalReport) -> Option<ReportSummary> {
    let total = report.tag_count();
    if total < SUMMARY_MIN_TAGS {
        return None;
    }
    Some(ReportSummary {
        total,
        succeeding: report.succeeding_tests.len(),
        failing: report.failing_tests.len(),
        allowed_to_fail: report.allowed_to_fail_tests.len(),
        failed_but_not_allowed: report.failed_but_not_allowed.len(),
        success_ratio: report.success_ratio.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_ratio() {
        assert_eq!(success_ratio(0, 0), "n/a");
        assert_eq!(success_ratio(1, 0), "100.00%");
        assert_eq!(success_ratio(1, 2), "33.33%");
        assert_eq!(success_ratio(2, 1), "66.67%");
    }

    #[test]
    fn test_render_uses_single_space_indent() {
        let report = FinalReport {
            test_timestamp: "t".into(),
            failing_tests: vec![],
            succeeding_tests: vec![],
            allowed_to_fail_tests: vec![],
            failed_but_not_allowed: vec![],
            success_ratio: "n/a".into(),
            logs_by_tags: BTreeMap::new(),
        };
        let text = String::from_utf8(render_report(&report).unwrap()).unwrap();
        assert!(text.starts_with("{\n \"test_timestamp\": \"t\""));
    }
}
