//! Ignore rules for recursive registration
//!
//! Directories matched here are neither watched nor descended into when a
//! tree is registered recursively. Patterns come from two sources:
//! 1. The root's `.gitignore` (optional, disabled by default)
//! 2. Config-based patterns, in gitignore syntax

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Compiled ignore rules, rooted at one registration root
pub struct IgnoreRules {
    root: PathBuf,
    matcher: Gitignore,
}

impl IgnoreRules {
    /// Compile the rules for `root`
    pub fn load(root: &Path, config: &IgnoreConfig) -> Result<Self, ignore::Error> {
        let mut builder = GitignoreBuilder::new(root);

        if config.use_gitignore {
            let gitignore_path = root.join(".gitignore");
            if gitignore_path.exists() {
                if let Some(err) = builder.add(&gitignore_path) {
                    return Err(err);
                }
            }
        }

        for pattern in &config.patterns {
            builder.add_line(None, pattern)?;
        }

        Ok(Self {
            root: root.to_path_buf(),
            matcher: builder.build()?,
        })
    }

    /// Check whether a directory should be skipped
    ///
    /// The root itself is never skipped.
    pub fn should_skip_dir(&self, path: &Path) -> bool {
        if path == self.root {
            return false;
        }
        self.matcher.matched(path, true).is_ignore()
    }

    /// Number of compiled patterns
    pub fn len(&self) -> usize {
        self.matcher.num_ignores() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.matcher.is_empty()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Ignore configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreConfig {
    /// Read the root's .gitignore (default: false)
    #[serde(default)]
    pub use_gitignore: bool,

    /// Additional gitignore-style patterns
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl IgnoreConfig {
    /// True when no source of patterns is enabled
    pub fn is_noop(&self) -> bool {
        !self.use_gitignore && self.patterns.is_empty()
    }
}
