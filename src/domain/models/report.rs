//! Scenario log records and the final suite report.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One structured log record emitted by a scenario.
///
/// Only `tag` is required; `message`, `level` and `timestamp` are read when
/// present and every other field is carried through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioLogEntry {
    tag: String,
    fields: Map<String, Value>,
}

impl ScenarioLogEntry {
    /// Parse one line of the log stream. Returns `None` for blank lines,
    /// malformed JSON, non-object records and records without a string `tag`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let Value::Object(fields) = serde_json::from_str::<Value>(line).ok()? else {
            return None;
        };
        let tag = fields.get("tag")?.as_str()?.to_string();
        Some(Self { tag, fields })
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn message(&self) -> Option<&str> {
        self.fields.get("message").and_then(Value::as_str)
    }

    pub fn level(&self) -> Option<&str> {
        self.fields.get("level").and_then(Value::as_str)
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.fields.get("timestamp").and_then(Value::as_str)
    }

    /// The record with `tag` and `level` removed, as embedded in the report.
    pub fn into_embedded(mut self) -> Map<String, Value> {
        self.fields.remove("tag");
        self.fields.remove("level");
        self.fields
    }
}

/// Aggregate outcome of a suite run, written once as a JSON artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalReport {
    pub test_timestamp: String,
    pub failing_tests: Vec<String>,
    pub succeeding_tests: Vec<String>,
    pub allowed_to_fail_tests: Vec<String>,
    #[serde(rename = "failed_but_not_allowed_to_fail")]
    pub failed_but_not_allowed: Vec<String>,
    pub success_ratio: String,
    pub logs_by_tags: BTreeMap<String, Vec<Map<String, Value>>>,
}

impl FinalReport {
    /// Number of distinct scenario tags in the report.
    pub fn tag_count(&self) -> usize {
        self.failing_tests.len() + self.succeeding_tests.len()
    }

    /// Whether any scenario failed without being on the allow-list.
    pub fn has_unexpected_failures(&self) -> bool {
        !self.failed_but_not_allowed.is_empty()
    }
}
