//! `[paths]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [paths]
//! source = "."            # Scanned and watched sources
//! output = ".flint/out"   # Compiled JS written by the transform
//! deps = ".flint/deps"    # Manifest, loader and package bundle
//! ```
//!
//! Relative paths are resolved against the directory holding `flint.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub source: PathBuf,
    pub output: PathBuf,
    pub deps: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("."),
            output: PathBuf::from(".flint/out"),
            deps: PathBuf::from(".flint/deps"),
        }
    }
}

impl PathsConfig {
    /// Resolve every path against `root`.
    pub fn normalize(&mut self, root: &Path) {
        use crate::utils::path::normalize_path;

        self.source = normalize_path(&root.join(&self.source));
        self.output = normalize_path(&root.join(&self.output));
        self.deps = normalize_path(&root.join(&self.deps));
    }
}
