//! FileSystem Actor
//!
//! Watches the source and compiled-output trees and forwards debounced
//! batches to the `PipelineActor`.
//!
//! ```text
//! notify (thread) → Debouncer → PipelineMsg::Changes
//! ```
//!
//! The watcher is attached in `new`, before the initial scan runs, so edits
//! made during the scan are buffered rather than lost.

mod debouncer;

use std::path::{Path, PathBuf};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use super::messages::PipelineMsg;
use debouncer::Debouncer;

pub struct FsActor {
    /// Sync channel fed by notify
    notify_rx: std::sync::mpsc::Receiver<notify::Result<notify::Event>>,
    /// Watcher handle (must be kept alive)
    watcher: RecommendedWatcher,
    pipeline_tx: mpsc::Sender<PipelineMsg>,
    debouncer: Debouncer,
}

impl FsActor {
    pub fn new(roots: &[PathBuf], pipeline_tx: mpsc::Sender<PipelineMsg>) -> notify::Result<Self> {
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            let _ = notify_tx.send(res);
        })?;

        for root in watch_roots(roots) {
            watcher.watch(&root, RecursiveMode::Recursive)?;
            crate::debug!("watch"; "watching {}", root.display());
        }

        Ok(Self {
            notify_rx,
            watcher,
            pipeline_tx,
            debouncer: Debouncer::new(),
        })
    }

    /// Run until the pipeline goes away.
    pub async fn run(self) {
        let Self {
            notify_rx,
            watcher,
            pipeline_tx,
            mut debouncer,
        } = self;
        // dropped when the loop ends
        let _watcher = watcher;

        let (async_tx, mut async_rx) = mpsc::channel::<notify::Event>(64);
        std::thread::spawn(move || {
            while let Ok(result) = notify_rx.recv() {
                match result {
                    Ok(event) => {
                        if async_tx.blocking_send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => crate::log!("watch"; "notify error: {}", e),
                }
            }
        });

        loop {
            tokio::select! {
                biased;
                event = async_rx.recv() => match event {
                    Some(event) => debouncer.add_event(&event),
                    None => break,
                },
                _ = tokio::time::sleep(debouncer.sleep_duration()) => {
                    let Some(batch) = debouncer.take_if_ready() else {
                        continue;
                    };
                    crate::debug!("watch"; "{} change(s)", batch.len());
                    if pipeline_tx.send(PipelineMsg::Changes(batch)).await.is_err() {
                        break;
                    }
                }
            }
        }
    }
}

/// Existing roots, without those nested in another root.
fn watch_roots(roots: &[PathBuf]) -> Vec<PathBuf> {
    let existing: Vec<&Path> = roots
        .iter()
        .map(PathBuf::as_path)
        .filter(|p| p.is_dir())
        .collect();

    let mut result: Vec<PathBuf> = Vec::new();
    for (i, root) in existing.iter().enumerate() {
        let nested = existing
            .iter()
            .enumerate()
            .any(|(j, other)| i != j && root.starts_with(other) && (root != other || j < i));
        if !nested {
            result.push(root.to_path_buf());
        }
    }
    result
}
