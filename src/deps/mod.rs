//! Package dependencies of compiled sources.
//!
//! - `scan`: import extraction
//! - `installer`: install gate, sequential installs, bundling with rollback
//! - `manifest`: `deps.json`, generated loader and bundle files
//! - `tools`: npm and webpack adapters
//! - `setup`: installer construction from `flint.toml`

mod error;
mod gate;
mod installer;
mod manifest;
mod scan;
mod setup;
mod tools;

pub use error::{BundleError, InstallError, ManifestError};
pub use gate::{GateState, InstallGate};
pub use installer::{
    BundleOutcome, DEFAULT_EXCLUDE, DependencyInstaller, InstallerOptions, ScanReport,
};
pub use manifest::{
    BUNDLE_FILE, LOADER_FILE, MANIFEST_FILE, Manifest, ManifestPaths, ManifestSnapshot,
    loader_source, read_package_json_deps,
};
pub use scan::{DependencySet, is_internal, package_name, scan_source};
pub use tools::{
    BundleRequest, Bundler, NPM_FILTER, NpmCli, PackageManager, WebpackCli, webpack_config,
};
