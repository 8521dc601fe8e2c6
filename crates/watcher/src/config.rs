//! Watch configuration
//!
//! Loaded from TOML:
//! ```toml
//! recursive = true
//! kinds = ["created", "deleted"]
//!
//! [ignore]
//! use_gitignore = true
//! patterns = ["node_modules/", ".git/"]
//! ```

use crate::event::ChangeKind;
use crate::ignore::IgnoreConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How roots are registered with a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Register whole subtrees (default: true)
    #[serde(default = "default_true")]
    pub recursive: bool,

    /// Kinds of change to deliver (default: all)
    #[serde(default = "default_kinds")]
    pub kinds: Vec<ChangeKind>,

    /// Pruning rules for recursive registration
    #[serde(default)]
    pub ignore: IgnoreConfig,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            kinds: default_kinds(),
            ignore: IgnoreConfig::default(),
        }
    }
}

impl WatchConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::from_toml(&contents)
            .with_context(|| format!("Invalid config: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn default_true() -> bool {
    true
}

fn default_kinds() -> Vec<ChangeKind> {
    ChangeKind::ALL.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = WatchConfig::from_toml("").unwrap();
        assert_eq!(config, WatchConfig::default());
        assert!(config.recursive);
        assert_eq!(config.kinds, ChangeKind::ALL.to_vec());
        assert!(config.ignore.is_noop());
    }

    #[test]
    fn test_parse_full_config() {
        let config = WatchConfig::from_toml(
            r#"
            recursive = false
            kinds = ["created", "deleted"]

            [ignore]
            use_gitignore = true
            patterns = ["node_modules/"]
            "#,
        )
        .unwrap();

        assert!(!config.recursive);
        assert_eq!(config.kinds, vec![ChangeKind::Created, ChangeKind::Deleted]);
        assert!(config.ignore.use_gitignore);
        assert_eq!(config.ignore.patterns, vec!["node_modules/".to_string()]);
    }

    #[test]
    fn test_unknown_kind_rejected() {
        assert!(WatchConfig::from_toml(r#"kinds = ["renamed"]"#).is_err());
    }

    #[test]
    fn test_load_and_serialize() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("dirwatch.toml");

        let config = WatchConfig {
            recursive: false,
            kinds: vec![ChangeKind::Modified],
            ignore: IgnoreConfig::default(),
        };
        std::fs::write(&path, config.to_toml()?)?;

        assert_eq!(WatchConfig::load(&path)?, config);
        assert!(WatchConfig::load(&temp_dir.path().join("missing.toml")).is_err());
        Ok(())
    }
}
