//! Implementation of the `kube-invariants scenarios` command.

use anyhow::Result;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;
use crate::services::scenarios;

#[derive(Debug, serde::Serialize)]
pub struct ScenarioEntry {
    pub tag: String,
    pub allowed_to_fail: bool,
}

#[derive(Debug, serde::Serialize)]
pub struct ScenarioListOutput {
    pub scenarios: Vec<ScenarioEntry>,
}

impl CommandOutput for ScenarioListOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!("{} built-in scenario(s):", self.scenarios.len())];
        for entry in &self.scenarios {
            let note = if entry.allowed_to_fail { " (allowed to fail)" } else { "" };
            lines.push(format!("  - {}{note}", entry.tag));
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub fn execute(config: &Config, json_mode: bool) -> Result<()> {
    let scenarios = scenarios::builtin()
        .iter()
        .map(|s| ScenarioEntry {
            tag: s.tag().to_string(),
            allowed_to_fail: config.is_allowed_to_fail(s.tag()),
        })
        .collect();
    output(&ScenarioListOutput { scenarios }, json_mode);
    Ok(())
}
