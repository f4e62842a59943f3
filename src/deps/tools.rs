//! Package manager and bundler seams.
//!
//! Both are blocking calls; the installer runs them on tokio's blocking
//! pool. Production adapters shell out through [`Cmd`].

use super::{BundleError, InstallError, manifest::js_string};
use crate::utils::exec::{Cmd, FilterRule};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

/// npm chatter that is not worth a log line.
pub const NPM_FILTER: FilterRule =
    FilterRule::new(&["npm WARN", "npm notice", "added ", "up to date"]);

/// Installs one package into the project.
pub trait PackageManager: Send + Sync {
    fn install(&self, name: &str) -> Result<(), InstallError>;
}

/// What a bundler run should produce.
#[derive(Debug, Clone)]
pub struct BundleRequest {
    /// Generated loader.
    pub entry: PathBuf,
    /// Staging output; promoted by the installer on success.
    pub output: PathBuf,
    /// Where to write the bundler configuration.
    pub config: PathBuf,
    /// Packages the page provides globally (`react` → `React`).
    pub externals: BTreeMap<String, String>,
}

/// Builds the package bundle from the loader.
pub trait Bundler: Send + Sync {
    fn bundle(&self, request: &BundleRequest) -> Result<(), BundleError>;
}

// ============================================================================
// npm
// ============================================================================

/// `npm install --save <name>` (command configurable).
pub struct NpmCli {
    command: Vec<String>,
    root: PathBuf,
}

impl NpmCli {
    pub fn new(command: Vec<String>, root: &Path) -> Self {
        Self {
            command,
            root: root.to_path_buf(),
        }
    }
}

impl PackageManager for NpmCli {
    fn install(&self, name: &str) -> Result<(), InstallError> {
        Cmd::from_slice(&self.command)
            .arg(name)
            .cwd(&self.root)
            .filter(&NPM_FILTER)
            .run()
            .map(|_| ())
            .map_err(|e| InstallError::Failed {
                name: name.to_string(),
                reason: format!("{e:#}"),
            })
    }
}

// ============================================================================
// webpack
// ============================================================================

/// `npx webpack --config <generated>` (command configurable).
pub struct WebpackCli {
    command: Vec<String>,
    root: PathBuf,
}

impl WebpackCli {
    pub fn new(command: Vec<String>, root: &Path) -> Self {
        Self {
            command,
            root: root.to_path_buf(),
        }
    }
}

impl Bundler for WebpackCli {
    fn bundle(&self, request: &BundleRequest) -> Result<(), BundleError> {
        fs::write(&request.config, webpack_config(request))
            .map_err(|e| super::ManifestError::Io(request.config.clone(), e))?;

        Cmd::from_slice(&self.command)
            .arg("--config")
            .arg(&request.config)
            .cwd(&self.root)
            .filter(&NPM_FILTER)
            .run()
            .map(|_| ())
            .map_err(|e| BundleError::Failed(format!("{e:#}")))
    }
}

/// Bundler configuration for `request`.
pub fn webpack_config(request: &BundleRequest) -> String {
    let dir = request.output.parent().unwrap_or(Path::new("."));
    let filename = request
        .output
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    let externals =
        serde_json::to_string_pretty(&request.externals).unwrap_or_else(|_| "{}".into());

    format!(
        "// generated by flint-runner, do not edit\n\
         module.exports = {{\n  \
           mode: \"development\",\n  \
           entry: {entry},\n  \
           output: {{ path: {dir}, filename: {filename} }},\n  \
           externals: {externals},\n\
         }};\n",
        entry = js_string(&request.entry.to_string_lossy()),
        dir = js_string(&dir.to_string_lossy()),
        filename = js_string(&filename),
        externals = externals.replace('\n', "\n  "),
    )
}
