//! `scan`: one-shot scan of source files, then bundle.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::bus::NullNotifier;
use crate::config::FlintConfig;
use crate::deps::{BundleOutcome, DependencyInstaller, ScanReport};
use crate::logger::ScanProgress;
use crate::sources::Layout;
use crate::utils::path::file_id;
use crate::{debug, log};

use super::common::collect_source_files;

pub fn scan_files(paths: &[PathBuf], config: &FlintConfig) -> Result<()> {
    let layout = Layout::new(&config.paths);
    let files = collect_source_files(paths, &layout)?;
    if files.is_empty() {
        log!("scan"; "no source files");
        return Ok(());
    }

    let installer = DependencyInstaller::from_config(config, Arc::new(NullNotifier))?;
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    let (reports, outcome) = rt.block_on(async {
        let progress = ScanProgress::new(files.len());
        let mut reports = Vec::with_capacity(files.len());
        for path in &files {
            if crate::core::is_shutdown() {
                break;
            }
            let source = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            reports.push(installer.scan(&file_id(&layout.source, path), &source).await);
            progress.inc();
        }
        progress.finish();
        anyhow::Ok((reports, installer.complete_initial_build().await))
    })?;

    summarize(&reports);
    match outcome {
        BundleOutcome::Bundled { packages } => log!("bundle"; "{} package(s) bundled", packages),
        BundleOutcome::Failed(e) => anyhow::bail!("bundle failed: {}", e),
        _ => debug!("bundle"; "nothing new to bundle"),
    }
    Ok(())
}

fn summarize(reports: &[ScanReport]) {
    let installed: Vec<&str> = reports
        .iter()
        .flat_map(|r| r.installed.iter().map(String::as_str))
        .collect();
    let failed: Vec<&str> = reports
        .iter()
        .flat_map(|r| r.failed.iter().map(String::as_str))
        .collect();

    for report in reports {
        debug!("scan"; "{}: {} external, {} internal",
            report.file, report.external.len(), report.internal.len());
    }
    log!("scan"; "{} file(s), {} installed, {} failed",
        reports.len(), installed.len(), failed.len());
    if !failed.is_empty() {
        log!("npm"; "failed: {}", failed.join(", "));
    }
}
