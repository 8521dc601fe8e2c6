//! Shared utilities for CLI commands

use anyhow::Result;
use dirwatch::WatchConfig;
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory
pub const DEFAULT_CONFIG_FILE: &str = "dirwatch.toml";

/// Load configuration
///
/// An explicit path must exist. Without one, `./dirwatch.toml` is used when
/// present, otherwise the defaults. Returns the file the config came from.
pub fn load_config(explicit: Option<&Path>) -> Result<(WatchConfig, Option<PathBuf>)> {
    if let Some(path) = explicit {
        return Ok((WatchConfig::load(path)?, Some(path.to_path_buf())));
    }

    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    if local.is_file() {
        let config = WatchConfig::load(&local)?;
        return Ok((config, Some(local)));
    }

    Ok((WatchConfig::default(), None))
}
