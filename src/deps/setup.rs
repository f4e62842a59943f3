//! Installer wiring from `flint.toml`.

use super::{
    DependencyInstaller, ManifestError, Manifest, NpmCli, WebpackCli, read_package_json_deps,
};
use crate::bus::Notifier;
use crate::config::FlintConfig;
use crate::utils::exec::Cmd;
use crate::{debug, log};
use std::sync::Arc;

impl DependencyInstaller {
    /// Installer backed by npm and webpack, seeded from `deps.json` and the
    /// project's `package.json`.
    pub fn from_config(
        config: &FlintConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ManifestError> {
        let root = config.get_root();
        for command in [&config.install.command, &config.bundle.command] {
            if !Cmd::from_slice(command).is_available() {
                log!("npm"; "`{}` not found on PATH", command.join(" "));
            }
        }

        let mut manifest = Manifest::load(&config.paths.deps)?;

        let declared = read_package_json_deps(root)?;
        debug!("npm"; "{} package(s) declared in package.json", declared.len());
        manifest.seed(declared);

        Ok(Self::new(
            manifest,
            Arc::new(NpmCli::new(config.install.command.clone(), root)),
            Arc::new(WebpackCli::new(config.bundle.command.clone(), root)),
            notifier,
            config.bundle.installer_options(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::NullNotifier;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_seeded_from_manifest_and_package_json() {
        let dir = TempDir::new().unwrap();
        let deps = dir.path().join(".flint/deps");
        fs::create_dir_all(&deps).unwrap();
        fs::write(deps.join("deps.json"), r#"{"deps":["moment"]}"#).unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{"dependencies":{"left-pad":"^1.3.0"}}"#,
        )
        .unwrap();

        let mut config = FlintConfig::default();
        config.set_root(dir.path());

        let installer = DependencyInstaller::from_config(&config, Arc::new(NullNotifier)).unwrap();
        let installed = installer.installed();
        assert!(installed.contains("moment"));
        assert!(installed.contains("left-pad"));
    }

    #[test]
    fn test_malformed_manifest_is_an_error() {
        let dir = TempDir::new().unwrap();
        let deps = dir.path().join(".flint/deps");
        fs::create_dir_all(&deps).unwrap();
        fs::write(deps.join("deps.json"), "not json").unwrap();

        let mut config = FlintConfig::default();
        config.set_root(dir.path());

        let result = DependencyInstaller::from_config(&config, Arc::new(NullNotifier));
        assert!(matches!(result, Err(ManifestError::Json(..))));
    }
}
