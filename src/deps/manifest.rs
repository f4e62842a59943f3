//! Persisted package manifest and generated artifacts.
//!
//! Everything lives in the deps directory (`.flint/deps` by default):
//!
//! ```text
//! deps.json            {"deps": ["left-pad", ...]}     sorted package list
//! deps.js              one guarded require per package (bundler entry)
//! packages.js          bundler output, replaced only on success
//! packages.next.js     bundler staging output
//! webpack.config.js    generated bundler configuration
//! ```

use super::ManifestError;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};

pub const MANIFEST_FILE: &str = "deps.json";
pub const LOADER_FILE: &str = "deps.js";
pub const BUNDLE_FILE: &str = "packages.js";
pub const STAGING_FILE: &str = "packages.next.js";
pub const BUNDLER_CONFIG_FILE: &str = "webpack.config.js";

/// Locations of the manifest artifacts.
#[derive(Debug, Clone)]
pub struct ManifestPaths {
    pub dir: PathBuf,
    pub manifest: PathBuf,
    pub loader: PathBuf,
    pub bundle: PathBuf,
    pub staging: PathBuf,
    pub bundler_config: PathBuf,
}

impl ManifestPaths {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            manifest: dir.join(MANIFEST_FILE),
            loader: dir.join(LOADER_FILE),
            bundle: dir.join(BUNDLE_FILE),
            staging: dir.join(STAGING_FILE),
            bundler_config: dir.join(BUNDLER_CONFIG_FILE),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ManifestFile {
    #[serde(default)]
    deps: Vec<String>,
}

/// Pre-scan state for rollback: raw bytes (or absence) plus the package set.
#[derive(Debug, Clone)]
pub struct ManifestSnapshot {
    bytes: Option<Vec<u8>>,
    packages: BTreeSet<String>,
}

/// In-memory view of `deps.json`.
pub struct Manifest {
    paths: ManifestPaths,
    packages: BTreeSet<String>,
}

impl Manifest {
    /// Load from `dir`; a missing manifest is empty.
    pub fn load(dir: &Path) -> Result<Self, ManifestError> {
        let paths = ManifestPaths::new(dir);
        let packages = match fs::read(&paths.manifest) {
            Ok(bytes) => {
                let file: ManifestFile = serde_json::from_slice(&bytes)
                    .map_err(|e| ManifestError::Json(paths.manifest.clone(), e))?;
                file.deps.into_iter().collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeSet::new(),
            Err(e) => return Err(ManifestError::Io(paths.manifest.clone(), e)),
        };
        Ok(Self { paths, packages })
    }

    pub fn paths(&self) -> &ManifestPaths {
        &self.paths
    }

    pub fn packages(&self) -> &BTreeSet<String> {
        &self.packages
    }

    pub fn contains(&self, name: &str) -> bool {
        self.packages.contains(name)
    }

    /// Add packages known to be installed without touching the disk.
    pub fn seed(&mut self, names: impl IntoIterator<Item = String>) {
        self.packages.extend(names);
    }

    pub fn snapshot(&self) -> Result<ManifestSnapshot, ManifestError> {
        let bytes = match fs::read(&self.paths.manifest) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(ManifestError::Io(self.paths.manifest.clone(), e)),
        };
        Ok(ManifestSnapshot {
            bytes,
            packages: self.packages.clone(),
        })
    }

    /// Put back the exact bytes (or absence) captured by `snapshot`, and
    /// the loader matching them.
    pub fn restore(&mut self, snapshot: ManifestSnapshot) -> Result<(), ManifestError> {
        self.packages = snapshot.packages;
        match snapshot.bytes {
            Some(bytes) => {
                write_file(&self.paths.manifest, &bytes)?;
                write_file(&self.paths.loader, loader_source(&self.packages).as_bytes())
            }
            None => {
                remove_file(&self.paths.manifest)?;
                remove_file(&self.paths.loader)
            }
        }
    }

    /// Roll back to `packages` when no byte snapshot could be taken.
    ///
    /// The in-memory set is replaced even if rewriting the files fails.
    pub fn reset_packages(&mut self, packages: BTreeSet<String>) -> Result<(), ManifestError> {
        self.packages = packages.clone();
        self.persist(packages)
    }

    /// Write `packages` as the manifest and regenerate the loader.
    pub fn persist(&mut self, packages: BTreeSet<String>) -> Result<(), ManifestError> {
        let dir = &self.paths.dir;
        fs::create_dir_all(dir).map_err(|e| ManifestError::Io(dir.clone(), e))?;

        let file = ManifestFile {
            deps: packages.iter().cloned().collect(),
        };
        let mut json = serde_json::to_string_pretty(&file)
            .map_err(|e| ManifestError::Json(self.paths.manifest.clone(), e))?;
        json.push('\n');
        write_file(&self.paths.manifest, json.as_bytes())?;
        write_file(&self.paths.loader, loader_source(&packages).as_bytes())?;

        self.packages = packages;
        Ok(())
    }

    /// Move the bundler's staging output over the live bundle.
    pub fn promote_bundle(&self) -> Result<(), ManifestError> {
        fs::rename(&self.paths.staging, &self.paths.bundle)
            .map_err(|e| ManifestError::Io(self.paths.staging.clone(), e))
    }

    /// Drop a staging file left by a failed bundler run.
    pub fn discard_staging(&self) {
        let _ = fs::remove_file(&self.paths.staging);
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), ManifestError> {
    fs::write(path, bytes).map_err(|e| ManifestError::Io(path.to_path_buf(), e))
}

fn remove_file(path: &Path) -> Result<(), ManifestError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ManifestError::Io(path.to_path_buf(), e)),
    }
}

/// JSON string literal, valid JavaScript as well.
pub(super) fn js_string(s: &str) -> String {
    serde_json::Value::from(s).to_string()
}

/// Loader requiring every package on its own, so one broken package does
/// not take the others down.
pub fn loader_source<'a>(packages: impl IntoIterator<Item = &'a String>) -> String {
    let mut out = String::from(
        "// generated by flint-runner, do not edit\n\
         window.__flintPackages = window.__flintPackages || {};\n",
    );
    for name in packages {
        let quoted = js_string(name);
        out.push_str(&format!(
            "\ntry {{\n  window.__flintPackages[{quoted}] = require({quoted});\n}} catch (e) {{\n  console.error(\"flint: cannot load package \" + {quoted}, e);\n}}\n"
        ));
    }
    out
}

#[derive(Deserialize)]
struct PackageJson {
    #[serde(default)]
    dependencies: serde_json::Map<String, serde_json::Value>,
}

/// Keys of `dependencies` in `<root>/package.json`; empty when absent.
pub fn read_package_json_deps(root: &Path) -> Result<Vec<String>, ManifestError> {
    let path = root.join("package.json");
    match fs::read(&path) {
        Ok(bytes) => {
            let pkg: PackageJson =
                serde_json::from_slice(&bytes).map_err(|e| ManifestError::Json(path, e))?;
            Ok(pkg.dependencies.keys().cloned().collect())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(ManifestError::Io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_missing_manifest_is_empty() {
        let dir = TempDir::new().unwrap();
        let manifest = Manifest::load(&dir.path().join("deps")).unwrap();
        assert!(manifest.packages().is_empty());
    }

    #[test]
    fn test_persist_then_load() {
        let dir = TempDir::new().unwrap();
        let deps_dir = dir.path().join("deps");
        let mut manifest = Manifest::load(&deps_dir).unwrap();
        manifest.persist(set(&["react-router", "left-pad"])).unwrap();

        let content = fs::read_to_string(deps_dir.join(MANIFEST_FILE)).unwrap();
        assert!(content.find("left-pad").unwrap() < content.find("react-router").unwrap());

        let reloaded = Manifest::load(&deps_dir).unwrap();
        assert!(reloaded.contains("left-pad"));
        assert!(reloaded.contains("react-router"));
        assert!(deps_dir.join(LOADER_FILE).exists());
    }

    #[test]
    fn test_restore_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        let mut manifest = Manifest::load(dir.path()).unwrap();
        manifest.persist(set(&["left-pad"])).unwrap();
        let before = fs::read(dir.path().join(MANIFEST_FILE)).unwrap();

        let snapshot = manifest.snapshot().unwrap();
        manifest.persist(set(&["left-pad", "moment"])).unwrap();
        manifest.restore(snapshot).unwrap();

        assert_eq!(fs::read(dir.path().join(MANIFEST_FILE)).unwrap(), before);
        assert!(!manifest.contains("moment"));
        let loader = fs::read_to_string(dir.path().join(LOADER_FILE)).unwrap();
        assert!(loader.contains(r#"require("left-pad")"#));
        assert!(!loader.contains("moment"));
    }

    #[test]
    fn test_restore_absent_removes_file() {
        let dir = TempDir::new().unwrap();
        let mut manifest = Manifest::load(dir.path()).unwrap();
        let snapshot = manifest.snapshot().unwrap();
        manifest.persist(set(&["left-pad"])).unwrap();
        manifest.restore(snapshot).unwrap();
        assert!(!dir.path().join(MANIFEST_FILE).exists());
        assert!(!dir.path().join(LOADER_FILE).exists());
    }

    #[test]
    fn test_reset_packages_rewrites_loader() {
        let dir = TempDir::new().unwrap();
        let mut manifest = Manifest::load(dir.path()).unwrap();
        manifest.persist(set(&["left-pad", "moment"])).unwrap();

        manifest.reset_packages(set(&["left-pad"])).unwrap();
        assert!(!manifest.contains("moment"));
        let loader = fs::read_to_string(dir.path().join(LOADER_FILE)).unwrap();
        assert!(!loader.contains("moment"));
        assert!(Manifest::load(dir.path()).unwrap().contains("left-pad"));
    }

    #[test]
    fn test_malformed_manifest() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), "{not json").unwrap();
        assert!(matches!(
            Manifest::load(dir.path()),
            Err(ManifestError::Json(..))
        ));
    }

    #[test]
    fn test_loader_guards_each_package() {
        let packages = set(&["left-pad", "moment"]);
        let source = loader_source(&packages);
        assert_eq!(source.matches("try {").count(), 2);
        assert!(source.contains(r#"window.__flintPackages["left-pad"] = require("left-pad");"#));
        assert!(source.contains(r#"require("moment")"#));
    }

    #[test]
    fn test_loader_escapes_names() {
        let packages = set(&[r#"we"ird"#]);
        assert!(loader_source(&packages).contains(r#"require("we\"ird")"#));
    }

    #[test]
    fn test_package_json_dependencies() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{"name":"app","dependencies":{"react":"^15","left-pad":"1.0.0"},"devDependencies":{"webpack":"1"}}"#,
        )
        .unwrap();
        let deps = read_package_json_deps(dir.path()).unwrap();
        assert_eq!(deps, vec!["react", "left-pad"]);
    }

    #[test]
    fn test_package_json_absent() {
        let dir = TempDir::new().unwrap();
        assert!(read_package_json_deps(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_promote_bundle() {
        let dir = TempDir::new().unwrap();
        let manifest = Manifest::load(dir.path()).unwrap();
        fs::write(&manifest.paths().staging, "bundle v2").unwrap();
        manifest.promote_bundle().unwrap();
        assert_eq!(fs::read_to_string(&manifest.paths().bundle).unwrap(), "bundle v2");
        assert!(!manifest.paths().staging.exists());
    }
}
