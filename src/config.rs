//! Engine configuration, loaded from JSON or the environment.
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub const ENV_ENGINE: &str = "VTL_ENGINE";
pub const ENV_NON_NULL_POLICY: &str = "VTL_NON_NULL_POLICY";
pub const ENV_KEEP_RULE_COMPONENT: &str = "VTL_KEEP_RULE_COMPONENT";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
}

/// How `non_null` hierarchical validation treats a rule with missing items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NonNullPolicy {
    /// Emit a result only when every item is present and non-null.
    #[default]
    SkipIncomplete,
    /// Sum the present contributors; skip only when the left-hand code or
    /// every contributor is missing.
    ComputeAvailable,
}

impl std::str::FromStr for NonNullPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "skip_incomplete" => Ok(NonNullPolicy::SkipIncomplete),
            "compute_available" => Ok(NonNullPolicy::ComputeAvailable),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Processing engine name: `memory` or `parallel`.
    pub engine: String,
    pub non_null_policy: NonNullPolicy,
    /// Keep the rule component (holding the left-hand code) in `check_hierarchy` output.
    pub keep_rule_component: bool,
    pub fold_constants: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            engine: "memory".to_string(),
            non_null_policy: NonNullPolicy::default(),
            keep_rule_component: false,
            fold_constants: true,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// The default configuration with environment overrides applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides for the `VTL_*` keys found by `lookup`.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let invalid = |key: &str, value: &str| ConfigError::InvalidValue { key: key.to_string(), value: value.to_string() };

        if let Some(engine) = lookup(ENV_ENGINE) {
            self.engine = engine.trim().to_string();
        }
        if let Some(policy) = lookup(ENV_NON_NULL_POLICY) {
            self.non_null_policy = policy.parse().map_err(|_| invalid(ENV_NON_NULL_POLICY, &policy))?;
        }
        if let Some(flag) = lookup(ENV_KEEP_RULE_COMPONENT) {
            self.keep_rule_component = match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => return Err(invalid(ENV_KEEP_RULE_COMPONENT, &flag)),
            };
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json_str(r#"{"non_null_policy": "compute_available"}"#).unwrap();
        assert_eq!(config.engine, "memory");
        assert_eq!(config.non_null_policy, NonNullPolicy::ComputeAvailable);
        assert!(config.fold_constants);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"engine": "parallel", "keep_rule_component": true}}"#).unwrap();
        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.engine, "parallel");
        assert!(config.keep_rule_component);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = EngineConfig::from_file(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [(ENV_ENGINE, "parallel"), (ENV_KEEP_RULE_COMPONENT, "yes")].into();
        let config = EngineConfig::default().with_overrides(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.engine, "parallel");
        assert!(config.keep_rule_component);

        let err = EngineConfig::default()
            .with_overrides(|k| (k == ENV_NON_NULL_POLICY).then(|| "sometimes".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
