//! Pipeline Actor - routes file changes
//!
//! ```text
//! FsActor --Changes--> PipelineActor --scan--> DependencyInstaller
//!                            |
//!                            +--BusMessage--> WsActor
//! ```
//!
//! Source files are scanned for imports; compiled scripts and stylesheets
//! turn into swap notifications for the page.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;

use super::messages::{ChangeKind, PipelineMsg};
use crate::bus::{BusMessage, Notifier};
use crate::deps::{BundleOutcome, DependencyInstaller, ScanReport};
use crate::sources::{FileRole, Layout};

/// What one change turns into.
#[derive(Debug, PartialEq)]
enum Step {
    /// Read and scan a source file.
    Scan { id: String, path: PathBuf },
    /// Drop the records of a deleted source file.
    Forget { id: String },
    Notify(Vec<BusMessage>),
    Skip,
}

pub struct PipelineActor {
    rx: mpsc::Receiver<PipelineMsg>,
    layout: Layout,
    installer: DependencyInstaller,
    notifier: Arc<dyn Notifier>,
}

impl PipelineActor {
    pub fn new(
        rx: mpsc::Receiver<PipelineMsg>,
        layout: Layout,
        installer: DependencyInstaller,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            rx,
            layout,
            installer,
            notifier,
        }
    }

    pub async fn run(mut self) {
        while let Some(msg) = self.rx.recv().await {
            match msg {
                PipelineMsg::Changes(changes) => {
                    for (path, kind) in changes {
                        self.apply(&path, kind);
                    }
                }
                PipelineMsg::Shutdown => {
                    crate::debug!("pipeline"; "shutting down");
                    break;
                }
            }
        }
    }

    fn apply(&self, path: &Path, kind: ChangeKind) {
        match plan(&self.layout, &self.installer, path, kind) {
            Step::Scan { id, path } => match std::fs::read_to_string(&path) {
                Ok(source) => {
                    // scans serialize on the install gate, not here
                    let installer = self.installer.clone();
                    tokio::spawn(async move {
                        let report = installer.scan(&id, &source).await;
                        log_report(&report);
                    });
                }
                Err(e) => {
                    crate::log!("scan"; "cannot read {}: {}", id, e);
                    self.notifier
                        .notify(BusMessage::compile_error(e.to_string(), Some(id)));
                }
            },
            Step::Forget { id } => {
                crate::debug!("scan"; "forget {}", id);
                self.installer.forget(&id);
            }
            Step::Notify(messages) => {
                for message in messages {
                    crate::debug!("pipeline"; "{} {}", message.kind(), path.display());
                    self.notifier.notify(message);
                }
            }
            Step::Skip => {}
        }
    }
}

fn plan(layout: &Layout, installer: &DependencyInstaller, path: &Path, kind: ChangeKind) -> Step {
    match (layout.classify(path), kind) {
        (FileRole::Source(id), ChangeKind::Removed) => Step::Forget { id },
        (FileRole::Source(id), _) => Step::Scan {
            id,
            path: path.to_path_buf(),
        },
        (FileRole::Script(id), ChangeKind::Removed) => Step::Notify(vec![BusMessage::FileDelete {
            name: format!("/{id}"),
        }]),
        // a fresh compiled script clears the error overlay
        (FileRole::Script(id), _) if installer.is_internal(&id) => {
            Step::Notify(vec![BusMessage::CompileSuccess, BusMessage::InternalsReload])
        }
        (FileRole::Script(id), _) => Step::Notify(vec![
            BusMessage::CompileSuccess,
            BusMessage::script_add(format!("/{id}"), now_millis()),
        ]),
        (FileRole::Stylesheet(view), ChangeKind::Removed) => {
            Step::Notify(vec![BusMessage::StylesheetRemove { view }])
        }
        (FileRole::Stylesheet(view), _) => Step::Notify(vec![BusMessage::StylesheetAdd { view }]),
        (FileRole::Ignored, _) => Step::Skip,
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

fn log_report(report: &ScanReport) {
    if !report.installed.is_empty() {
        crate::log!("npm"; "{}: installed {}", report.file, report.installed.join(", "));
    }
    if !report.failed.is_empty() {
        crate::log!("npm"; "{}: failed {}", report.file, report.failed.join(", "));
    }
    if let BundleOutcome::Failed(e) = &report.bundled {
        crate::debug!("bundle"; "{}: {}", report.file, e);
    }
}
