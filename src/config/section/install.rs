//! `[install]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [install]
//! command = ["npm", "install", "--save"]   # Package name is appended
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallConfig {
    /// Package manager invocation; the package name is appended.
    pub command: Vec<String>,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            command: ["npm", "install", "--save"].map(String::from).to_vec(),
        }
    }
}
