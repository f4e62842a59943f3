//! `bundle`: regenerate manifest, loader and bundle.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::bus::NullNotifier;
use crate::config::FlintConfig;
use crate::deps::{BundleOutcome, DependencyInstaller};
use crate::log;

pub fn bundle(config: &FlintConfig) -> Result<()> {
    std::fs::create_dir_all(&config.paths.deps)
        .with_context(|| format!("failed to create {}", config.paths.deps.display()))?;
    let installer = DependencyInstaller::from_config(config, Arc::new(NullNotifier))?;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    match rt.block_on(installer.rebundle()) {
        BundleOutcome::Bundled { packages } => {
            log!("bundle"; "{} package(s) bundled", packages);
            Ok(())
        }
        BundleOutcome::Failed(e) => anyhow::bail!("bundle failed: {}", e),
        other => {
            log!("bundle"; "{:?}", other);
            Ok(())
        }
    }
}
