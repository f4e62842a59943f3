//! Event debouncing for the watcher.
//!
//! Editors and the external transform write in several steps. Changes are
//! merged per path and released as one batch once the tree stayed quiet for
//! `QUIET_MS`, with at least `COOLDOWN_MS` between batches.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::EventKind;
use notify::event::ModifyKind;
use rustc_hash::FxHashMap;

use crate::actor::messages::ChangeKind;
use crate::utils::path::normalize_path;

pub(super) const QUIET_MS: u64 = 100;
pub(super) const COOLDOWN_MS: u64 = 200;

pub(super) struct Debouncer {
    pending: FxHashMap<PathBuf, ChangeKind>,
    last_event: Option<Instant>,
    last_flush: Option<Instant>,
}

impl Debouncer {
    pub(super) fn new() -> Self {
        Self {
            pending: FxHashMap::default(),
            last_event: None,
            last_flush: None,
        }
    }

    pub(super) fn add_event(&mut self, event: &notify::Event) {
        let Some(kind) = change_kind(&event.kind) else {
            return;
        };
        for path in event.paths.iter().filter(|p| !is_editor_artifact(p)) {
            crate::debug!("watch"; "{} {}", kind.label(), path.display());
            self.record(normalize_path(path), kind);
        }
    }

    pub(super) fn record(&mut self, path: PathBuf, kind: ChangeKind) {
        let merged = match self.pending.get(&path) {
            Some(&prev) => merge(prev, kind),
            None => Some(kind),
        };
        match merged {
            Some(kind) => {
                self.pending.insert(path, kind);
            }
            None => {
                self.pending.remove(&path);
            }
        }
        self.last_event = Some(Instant::now());
    }

    /// Pending batch, sorted by path, once quiet and cooled down.
    pub(super) fn take_if_ready(&mut self) -> Option<Vec<(PathBuf, ChangeKind)>> {
        if !self.is_ready() {
            return None;
        }
        self.last_event = None;
        self.last_flush = Some(Instant::now());

        let mut batch: Vec<_> = std::mem::take(&mut self.pending).into_iter().collect();
        batch.sort_by(|a, b| a.0.cmp(&b.0));
        Some(batch)
    }

    fn is_ready(&self) -> bool {
        !self.pending.is_empty() && self.remaining() == Some(Duration::ZERO)
    }

    /// Time until the batch may be released; `None` when nothing is pending.
    fn remaining(&self) -> Option<Duration> {
        let last_event = self.last_event?;
        let quiet = Duration::from_millis(QUIET_MS).saturating_sub(last_event.elapsed());
        let cooldown = self
            .last_flush
            .map(|t| Duration::from_millis(COOLDOWN_MS).saturating_sub(t.elapsed()))
            .unwrap_or(Duration::ZERO);
        Some(quiet.max(cooldown))
    }

    /// How long the actor loop may sleep.
    pub(super) fn sleep_duration(&self) -> Duration {
        match self.remaining() {
            Some(remaining) => remaining.max(Duration::from_millis(1)),
            None => Duration::from_secs(86400),
        }
    }
}

fn change_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Created),
        EventKind::Remove(_) => Some(ChangeKind::Removed),
        // mtime/chmod noise
        EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Modify(_) => Some(ChangeKind::Modified),
        _ => None,
    }
}

/// Net effect of `prev` then `next` on one path; `None` when they cancel.
fn merge(prev: ChangeKind, next: ChangeKind) -> Option<ChangeKind> {
    use ChangeKind::*;

    match (prev, next) {
        (Created, Removed) => None,
        (Removed, next) => Some(next),
        (_, Removed) => Some(Removed),
        (prev, _) => Some(prev),
    }
}

/// Swap files, backups and dotfiles.
fn is_editor_artifact(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}
