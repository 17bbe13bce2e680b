//! Output formatting utilities for the CLI.

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use serde::Serialize;

use crate::services::report_aggregator::ReportSummary;
use crate::services::scenario_runner::{ScenarioOutcome, ScenarioResult};

pub trait CommandOutput: Serialize {
    fn to_human(&self) -> String;
    fn to_json(&self) -> serde_json::Value;
}

pub fn output<T: CommandOutput>(result: &T, json_mode: bool) {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&result.to_json()).unwrap_or_default());
    } else {
        println!("{}", result.to_human());
    }
}

/// Truncate a string to a maximum length, appending "..." if truncated.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

fn base_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|l| Cell::new(l).add_attribute(Attribute::Bold))
        .collect()
}

/// One row per scenario: tag, result, allow-list flag, duration, cause.
pub fn scenario_table(outcomes: &[ScenarioOutcome]) -> String {
    let mut table = base_table();
    table.set_header(header(&["Scenario", "Result", "Allowed to fail", "Duration", "Cause"]));
    for outcome in outcomes {
        let (result, color, cause) = match &outcome.result {
            ScenarioResult::Passed => ("passed", Color::Green, String::new()),
            ScenarioResult::Failed { cause } if outcome.allowed_to_fail => {
                ("failed", Color::Yellow, truncate(cause, 60))
            }
            ScenarioResult::Failed { cause } => ("failed", Color::Red, truncate(cause, 60)),
        };
        table.add_row(vec![
            Cell::new(&outcome.tag),
            Cell::new(result).fg(color),
            Cell::new(if outcome.allowed_to_fail { "yes" } else { "no" }),
            Cell::new(format!("{:.1}s", outcome.elapsed.as_secs_f64())),
            Cell::new(cause),
        ]);
    }
    table.to_string()
}

pub fn summary_table(summary: &ReportSummary) -> String {
    let mut table = base_table();
    table.set_header(header(&["Bucket", "Count"]));
    table.add_row(vec![Cell::new("Total"), Cell::new(summary.total)]);
    table.add_row(vec![Cell::new("Succeeding"), Cell::new(summary.succeeding)]);
    table.add_row(vec![Cell::new("Failing"), Cell::new(summary.failing)]);
    table.add_row(vec![Cell::new("Allowed to fail"), Cell::new(summary.allowed_to_fail)]);
    table.add_row(vec![
        Cell::new("Failed but not allowed"),
        Cell::new(summary.failed_but_not_allowed),
    ]);
    table.add_row(vec![Cell::new("Success ratio"), Cell::new(&summary.success_ratio)]);
    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a longer sentence", 10), "a longe...");
    }

    #[test]
    fn test_summary_table_lists_buckets() {
        let summary = ReportSummary {
            total: 3,
            succeeding: 2,
            failing: 1,
            allowed_to_fail: 1,
            failed_but_not_allowed: 0,
            success_ratio: "66.67%".to_string(),
        };
        let rendered = summary_table(&summary);
        assert!(rendered.contains("Failed but not allowed"));
        assert!(rendered.contains("66.67%"));
    }
}
