use std::fmt::Display;

/// Emits tracing events carrying a scenario `tag` field.
#[derive(Debug, Clone)]
pub struct ScenarioLogger {
    tag: String,
}

impl ScenarioLogger {
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn info(&self, message: impl Display) {
        tracing::info!(tag = %self.tag, "{message}");
    }

    pub fn warn(&self, message: impl Display) {
        tracing::warn!(tag = %self.tag, "{message}");
    }

    /// Record the scenario as failed: `"<tag>:<marker>"` with the cause.
    pub fn failed(&self, marker: &str, cause: impl Display) {
        tracing::error!(tag = %self.tag, cause = %cause, "{}:{marker}", self.tag);
    }
}
