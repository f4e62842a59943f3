//! Actor Coordinator - wires up the serve loop
//!
//! ```text
//! FsActor --Changes--> PipelineActor --scan--> DependencyInstaller
//!                            |                        |
//!                            +-------BusMessage-------+
//!                                        |
//!                                        v
//!                    listener ------> WsActor --> Clients
//! ```
//!
//! The watcher starts before the initial scan so that edits made while
//! scanning are picked up by the pipeline afterwards.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam::channel::Receiver;
use tokio::sync::mpsc;

use super::fs::FsActor;
use super::messages::{PipelineMsg, WsMsg};
use super::pipeline::PipelineActor;
use super::ws::{WsActor, start_ws_server};
use crate::bus::{ChannelNotifier, Notifier};
use crate::config::FlintConfig;
use crate::deps::{BundleOutcome, DependencyInstaller};
use crate::logger::ScanProgress;
use crate::sources::Layout;

const CHANNEL_BUFFER: usize = 32;

/// How long actors get to wind down after shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

pub struct Coordinator {
    config: Arc<FlintConfig>,
    shutdown_rx: Option<Receiver<()>>,
}

impl Coordinator {
    pub fn with_config(config: Arc<FlintConfig>) -> Self {
        Self {
            config,
            shutdown_rx: None,
        }
    }

    pub fn with_shutdown_signal(mut self, rx: Receiver<()>) -> Self {
        self.shutdown_rx = Some(rx);
        self
    }

    pub async fn run(mut self) -> Result<()> {
        let layout = Layout::new(&self.config.paths);
        for dir in [&layout.output, &layout.deps] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }

        let (notifier, bus_rx) = ChannelNotifier::channel();
        let notifier: Arc<dyn Notifier> = Arc::new(notifier);
        let installer = DependencyInstaller::from_config(&self.config, notifier.clone())?;

        let (pipeline_tx, pipeline_rx) = mpsc::channel::<PipelineMsg>(CHANNEL_BUFFER);
        let (ws_tx, ws_rx) = mpsc::channel::<WsMsg>(CHANNEL_BUFFER);

        let port = start_ws_server(self.config.serve.ws_port, ws_tx.clone())?;
        crate::log!("serve"; "websocket on ws://127.0.0.1:{}", port);

        let fs_actor = if self.config.serve.watch {
            let roots = watch_roots(&layout);
            Some(FsActor::new(&roots, pipeline_tx.clone()).context("failed to start watcher")?)
        } else {
            None
        };

        if !initial_scan(&layout, &installer).await {
            return Ok(());
        }

        let pipeline = PipelineActor::new(pipeline_rx, layout, installer, notifier);
        let ws = WsActor::new(bus_rx, ws_rx);

        crate::debug!("actor"; "start");
        let pipeline_handle = tokio::spawn(pipeline.run());
        let ws_handle = tokio::spawn(ws.run());
        let fs_handle = fs_actor.map(|fs| tokio::spawn(fs.run()));

        match self.shutdown_rx.take() {
            Some(rx) => {
                while rx.try_recv().is_err() {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
                crate::debug!("actor"; "shutdown signal received");
            }
            None => {
                while !ws_handle.is_finished() {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }

        let _ = pipeline_tx.send(PipelineMsg::Shutdown).await;
        let _ = ws_tx.send(WsMsg::Shutdown).await;
        let _ = tokio::time::timeout(SHUTDOWN_GRACE, async {
            let _ = pipeline_handle.await;
            let _ = ws_handle.await;
        })
        .await;
        if let Some(handle) = fs_handle {
            handle.abort();
        }

        crate::debug!("actor"; "stopped");
        Ok(())
    }
}

/// Source root, plus the output root when it lives elsewhere.
fn watch_roots(layout: &Layout) -> Vec<PathBuf> {
    let mut roots = vec![layout.source.clone()];
    if !layout.output.starts_with(&layout.source) {
        roots.push(layout.output.clone());
    }
    roots
}

/// Scan every source once, then bundle what the scans recorded.
/// Returns `false` when interrupted.
pub(crate) async fn initial_scan(layout: &Layout, installer: &DependencyInstaller) -> bool {
    let files = layout.collect_sources();
    let progress = ScanProgress::new(files.len());

    for path in &files {
        if crate::core::is_shutdown() {
            return false;
        }
        let id = crate::utils::path::file_id(&layout.source, path);
        match std::fs::read_to_string(path) {
            Ok(source) => {
                let report = installer.scan(&id, &source).await;
                if !report.failed.is_empty() {
                    crate::log!("npm"; "{}: failed {}", id, report.failed.join(", "));
                }
            }
            Err(e) => crate::log!("scan"; "cannot read {}: {}", id, e),
        }
        progress.inc();
    }
    progress.finish();

    match installer.complete_initial_build().await {
        BundleOutcome::Bundled { packages } => {
            crate::log!("bundle"; "{} package(s) bundled", packages)
        }
        BundleOutcome::Failed(e) => crate::log!("bundle"; "failed: {}", e),
        _ => {}
    }
    true
}
