mod llm;
mod observability;
mod store;
mod tutor;

pub use llm::*;
pub use observability::*;
pub use store::*;
pub use tutor::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub help: HelpConfig,
    #[serde(default)]
    pub tutor: TutorConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl ConfigError {
    fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Error,
            field: field.into(),
            message: message.into(),
        }
    }

    fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Warning,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.system.model.trim().is_empty() {
            errors.push(ConfigError::error("system.model", "model must not be empty"));
        }

        if self.system.auth.key.is_none() && self.system.auth.env.is_none() {
            errors.push(ConfigError::warning(
                "system.auth",
                "neither key nor env set; system-credential requests will fail",
            ));
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            errors.push(ConfigError::error(
                "llm.temperature",
                "temperature must be between 0.0 and 2.0",
            ));
        }

        if self.llm.max_tokens == 0 {
            errors.push(ConfigError::error(
                "llm.max_tokens",
                "max_tokens must be greater than 0",
            ));
        }

        if self.llm.timeout_ms == Some(0) {
            errors.push(ConfigError::error(
                "llm.timeout_ms",
                "timeout_ms must be greater than 0 (omit it for no timeout)",
            ));
        }

        for kind in ProviderKind::ALL {
            let url = self.llm.base_url(kind);
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                errors.push(ConfigError::error(
                    format!("llm.{}_base_url", kind.as_str()),
                    format!("\"{url}\" is not an http(s) URL"),
                ));
            }
        }

        if self.help.candidates == 0 {
            errors.push(ConfigError::error(
                "help.candidates",
                "at least one candidate is required",
            ));
        }

        if self.tutor.objectives == 0 {
            errors.push(ConfigError::error(
                "tutor.objectives",
                "objectives must be greater than 0",
            ));
        }

        if self.tutor.questions_per_objective == 0 {
            errors.push(ConfigError::error(
                "tutor.questions_per_objective",
                "questions_per_objective must be greater than 0",
            ));
        }

        if self.store.sqlite_path.is_none() {
            errors.push(ConfigError::warning(
                "store.sqlite_path",
                "not set; quota balances are kept in memory and lost on exit",
            ));
        }

        for (i, class) in self.store.classes.iter().enumerate() {
            if class.class_id.trim().is_empty() {
                errors.push(ConfigError::error(
                    format!("store.classes[{i}].class_id"),
                    "class_id must not be empty",
                ));
            }
            if class.query_limit == Some(0) {
                errors.push(ConfigError::warning(
                    format!("store.classes[{i}].query_limit"),
                    "a limit of 0 blocks every student query",
                ));
            }
        }

        errors
    }
}
