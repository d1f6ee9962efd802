//! Suite configuration.
//!
//! ```toml
//! name = "signup"
//! mode = "eager"
//! optional = ["nickname"]
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How many tests of one field run in a single pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Every declared test runs.
    #[default]
    All,
    /// Once a field has failed, its remaining tests are skipped.
    Eager,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SuiteConfig {
    pub name: Option<String>,
    pub mode: ExecutionMode,
    /// Fields that may stay untested or pending without invalidating the suite.
    pub optional: Vec<String>,
}

impl SuiteConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_optional(mut self, field: impl Into<String>) -> Self {
        self.optional.push(field.into());
        self
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let config = SuiteConfig::from_toml_str(
            r#"
name = "signup"
mode = "eager"
optional = ["nickname"]
"#,
        )
        .expect("config parses");
        assert_eq!(
            config,
            SuiteConfig::named("signup")
                .with_mode(ExecutionMode::Eager)
                .with_optional("nickname")
        );
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = SuiteConfig::from_toml_str("").expect("empty config parses");
        assert_eq!(config, SuiteConfig::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = SuiteConfig::from_toml_str("colour = \"red\"").expect_err("unknown key");
        assert!(matches!(err, ConfigError::ParseToml(_)));
    }
}
