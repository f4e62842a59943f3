//! `[bundle]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [bundle]
//! command = ["npx", "webpack"]                # `--config <generated>` is appended
//! exclude = ["flint-js", "react", "react-dom"] # Provided by the page runtime
//! externals = { react = "React", bluebird = "_bluebird" }
//! ```

use crate::deps::{DEFAULT_EXCLUDE, InstallerOptions};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleConfig {
    /// Bundler invocation.
    pub command: Vec<String>,

    /// Packages never installed nor loaded.
    pub exclude: Vec<String>,

    /// Package → global name the bundle reads it from.
    pub externals: BTreeMap<String, String>,
}

impl Default for BundleConfig {
    fn default() -> Self {
        let options = InstallerOptions::default();
        Self {
            command: ["npx", "webpack"].map(String::from).to_vec(),
            exclude: DEFAULT_EXCLUDE.iter().map(|s| s.to_string()).collect(),
            externals: options.externals,
        }
    }
}

impl BundleConfig {
    pub fn installer_options(&self) -> InstallerOptions {
        InstallerOptions {
            exclude: self.exclude.clone(),
            externals: self.externals.clone(),
        }
    }
}
