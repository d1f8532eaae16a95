//! Server configuration
//!
//! Values are layered: built-in defaults, then the client's
//! `initializationOptions`, then environment variables, then command-line
//! flags. Each layer only overrides what it sets.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::analysis::token::KeywordSet;
use crate::errors::{LspError, LspResult};
use crate::language_regions::MarkupCatalog;

pub const ENV_INTERPRETER: &str = "PIKE_INTERPRETER";
pub const ENV_TIMEOUT_MS: &str = "PIKE_BRIDGE_TIMEOUT_MS";

/// How the interpreter subprocess is launched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InterpreterConfig {
    pub program: String,
    pub args: Vec<String>,
    /// Per-call reply timeout
    pub timeout_ms: u64,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            program: "pike".to_string(),
            args: vec!["analyzer.pike".to_string()],
            timeout_ms: 5_000,
        }
    }
}

impl InterpreterConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Embedded-content detection thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DetectionConfig {
    /// Regions scoring below this are discarded
    pub confidence_floor: f64,
    /// Literals with fewer content chars are never considered
    pub min_literal_length: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            confidence_floor: 0.3,
            min_literal_length: 3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    pub interpreter: InterpreterConfig,
    pub detection: DetectionConfig,
    /// Replaces the built-in keyword list when set
    pub keywords: Option<Vec<String>>,
    /// Replaces the built-in markup tables when set
    pub catalog: Option<MarkupCatalog>,
}

/// Command-line overrides; `None` leaves the value alone.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub program: Option<String>,
    pub args: Option<Vec<String>>,
    pub timeout_ms: Option<u64>,
    pub confidence_floor: Option<f64>,
}

impl ServerConfig {
    /// Overlays `initializationOptions` on this configuration.
    ///
    /// Options may be nested under a `pike` key or given at the top level.
    pub fn merge_initialization_options(&mut self, options: Option<&Value>) -> LspResult<()> {
        let Some(options) = options else {
            return Ok(());
        };
        let options = options.get("pike").unwrap_or(options);
        if options.is_null() {
            return Ok(());
        }

        let mut merged = serde_json::to_value(&*self)
            .map_err(|e| LspError::server(format!("Failed to serialize configuration: {}", e)))?;
        overlay(&mut merged, options);
        *self = serde_json::from_value(merged)
            .map_err(|e| LspError::invalid_input(format!("Invalid initialization options: {}", e)))?;
        debug!("Applied initialization options: {:?}", self);
        Ok(())
    }

    /// Applies `PIKE_INTERPRETER` and `PIKE_BRIDGE_TIMEOUT_MS` from `lookup`.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> LspResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(program) = lookup(ENV_INTERPRETER).filter(|p| !p.trim().is_empty()) {
            debug!("{} overrides interpreter with {}", ENV_INTERPRETER, program);
            self.interpreter.program = program;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            self.interpreter.timeout_ms = raw.trim().parse().map_err(|_| {
                LspError::invalid_input(format!("{} must be a number of milliseconds, got '{}'", ENV_TIMEOUT_MS, raw))
            })?;
        }
        Ok(())
    }

    pub fn apply_env(&mut self) -> LspResult<()> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    pub fn apply_cli(&mut self, cli: &CliOverrides) {
        if let Some(program) = &cli.program {
            self.interpreter.program = program.clone();
        }
        if let Some(args) = &cli.args {
            self.interpreter.args = args.clone();
        }
        if let Some(timeout_ms) = cli.timeout_ms {
            self.interpreter.timeout_ms = timeout_ms;
        }
        if let Some(floor) = cli.confidence_floor {
            self.detection.confidence_floor = floor;
        }
    }

    pub fn validate(&self) -> LspResult<()> {
        if self.interpreter.program.trim().is_empty() {
            return Err(LspError::invalid_input("Interpreter program must not be empty"));
        }
        if self.interpreter.timeout_ms == 0 {
            return Err(LspError::invalid_input("Interpreter timeout must be greater than zero"));
        }
        let floor = self.detection.confidence_floor;
        if !(0.0..=1.0).contains(&floor) {
            return Err(LspError::invalid_input(format!(
                "Confidence floor must be within [0, 1], got {}",
                floor
            )));
        }
        if matches!(&self.keywords, Some(words) if words.is_empty()) {
            warn!("Empty keyword list configured, every word will be treated as an identifier");
        }
        Ok(())
    }

    pub fn keyword_set(&self) -> KeywordSet {
        match &self.keywords {
            Some(words) => KeywordSet::new(words.iter().cloned()),
            None => KeywordSet::default(),
        }
    }

    pub fn markup_catalog(&self) -> MarkupCatalog {
        self.catalog.clone().unwrap_or_default()
    }
}

/// Recursively overlays `patch` object keys onto `base`.
fn overlay(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                match base.get_mut(key) {
                    Some(existing) if existing.is_object() && value.is_object() => overlay(existing, value),
                    _ => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, patch) => *base = patch.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_are_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.detection.confidence_floor, 0.3);
        assert_eq!(config.interpreter.program, "pike");
    }

    #[test]
    fn test_initialization_options_overlay() {
        let mut config = ServerConfig::default();
        config
            .merge_initialization_options(Some(&json!({
                "pike": {"interpreter": {"timeoutMs": 250}, "detection": {"confidenceFloor": 0.5}}
            })))
            .unwrap();

        assert_eq!(config.interpreter.timeout_ms, 250);
        assert_eq!(config.interpreter.program, "pike");
        assert_eq!(config.detection.confidence_floor, 0.5);
        assert_eq!(config.detection.min_literal_length, 3);
    }

    #[test]
    fn test_env_then_cli_precedence() {
        let mut config = ServerConfig::default();
        config
            .apply_env_with(|key| match key {
                ENV_INTERPRETER => Some("/opt/pike/bin/pike".into()),
                ENV_TIMEOUT_MS => Some("900".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.interpreter.program, "/opt/pike/bin/pike");

        config.apply_cli(&CliOverrides {
            timeout_ms: Some(100),
            ..Default::default()
        });
        assert_eq!(config.interpreter.timeout_ms, 100);
        assert_eq!(config.interpreter.program, "/opt/pike/bin/pike");
    }

    #[test]
    fn test_invalid_values_are_server_errors() {
        let mut config = ServerConfig::default();
        let err = config
            .apply_env_with(|key| (key == ENV_TIMEOUT_MS).then(|| "soon".to_string()))
            .unwrap_err();
        assert_eq!(err.layer(), crate::errors::ErrorLayer::Server);

        config.detection.confidence_floor = 1.5;
        assert!(config.validate().is_err());

        let err = ServerConfig::default()
            .merge_initialization_options(Some(&json!({"interpreter": {"timeoutMs": "fast"}})))
            .unwrap_err();
        assert!(err.message().contains("Invalid initialization options"));
    }
}
