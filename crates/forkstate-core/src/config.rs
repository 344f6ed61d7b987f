use std::path::Path;

use forkstate_types::Owner;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for a [`Root`](crate::Root).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RootConfig {
    /// Owner tag for the root state when `root()` is called without one.
    pub initial_owner: Option<Owner>,
    /// Refuse to open a scope nested deeper than this. `None` is unlimited.
    pub max_scope_depth: Option<usize>,
}

impl RootConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Set the nesting limit.
    pub fn with_max_scope_depth(mut self, limit: usize) -> Self {
        self.max_scope_depth = Some(limit);
        self
    }

    pub fn with_initial_owner(mut self, owner: impl Into<Owner>) -> Self {
        self.initial_owner = Some(owner.into());
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_scope_depth == Some(0) {
            return Err(ConfigError::Invalid(
                "max_scope_depth must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_unlimited() {
        let c = RootConfig::default();
        assert!(c.initial_owner.is_none());
        assert!(c.max_scope_depth.is_none());
    }

    #[test]
    fn parses_toml() {
        let c = RootConfig::from_toml_str(
            r#"
            initial_owner = "planner"
            max_scope_depth = 16
            "#,
        )
        .unwrap();
        assert_eq!(c.initial_owner, Some(Owner::from("planner")));
        assert_eq!(c.max_scope_depth, Some(16));
    }

    #[test]
    fn empty_toml_yields_default() {
        assert_eq!(RootConfig::from_toml_str("").unwrap(), RootConfig::default());
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = RootConfig::from_toml_str("freeze = false").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_zero_depth() {
        let err = RootConfig::from_toml_str("max_scope_depth = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_scope_depth = 3").unwrap();
        let c = RootConfig::load(file.path()).unwrap();
        assert_eq!(c.max_scope_depth, Some(3));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = RootConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn builder_helpers() {
        let c = RootConfig::default()
            .with_max_scope_depth(4)
            .with_initial_owner("search");
        assert_eq!(c.max_scope_depth, Some(4));
        assert_eq!(c.initial_owner.as_ref().map(Owner::as_str), Some("search"));
    }
}
