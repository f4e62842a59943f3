//! Keyed element replacement.

use super::{
    CompletionLatch, ElementHandle, ResourceHost, ResourceId, ResourceKind, Settle, SwapTimings,
    locator,
};
use crate::bus::{BusMessage, Notifier};
use crate::coalesce::{Coalescer, Scheduled};
use crate::debug;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::time::sleep;

/// Result of a removal sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Matching elements found.
    pub matched: usize,
    /// Elements detached.
    pub removed: usize,
    /// Elements that refused detaching and had their locator cleared.
    pub neutralized: usize,
}

/// Swaps live elements, one chain per resource name.
///
/// ```text
/// existing ──clone──► copy(src=…?stamp) ──attach──► race(load│error│200ms)
///                                                        │
///                               remove(existing) ◄─4ms───┘
/// ```
#[derive(Clone)]
pub struct Swapper {
    host: Arc<dyn ResourceHost>,
    notifier: Arc<dyn Notifier>,
    coalescer: Coalescer<String, ElementHandle>,
    timings: SwapTimings,
    last_stamp: Arc<AtomicU64>,
}

impl Swapper {
    pub fn new(host: Arc<dyn ResourceHost>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            host,
            notifier,
            coalescer: Coalescer::new(),
            timings: SwapTimings::default(),
            last_stamp: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_timings(mut self, timings: SwapTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn host(&self) -> &Arc<dyn ResourceHost> {
        &self.host
    }

    pub fn timings(&self) -> &SwapTimings {
        &self.timings
    }

    pub(super) fn coalescer(&self) -> &Coalescer<String, ElementHandle> {
        &self.coalescer
    }

    /// Swap in `source` for the resource called `name`.
    ///
    /// Emits `file:load` now and `file:done` once the swap task finishes.
    /// A request made while `name` is swapping replaces any earlier pending
    /// one.
    pub fn swap(&self, kind: ResourceKind, name: &str, source: &str) -> Scheduled {
        self.notifier.notify(BusMessage::FileLoad {
            name: name.to_string(),
        });

        let this = self.clone();
        let id = ResourceId::new(kind, source);
        let done_name = name.to_string();
        let scheduled = self.coalescer.schedule(name.to_string(), move |prior| async move {
            let handle = this.replace(&id, prior).await;
            this.notifier.notify(BusMessage::FileDone { name: done_name });
            handle
        });

        debug!("swap"; "{} {}: {:?}", kind.label(), name, scheduled);
        scheduled
    }

    /// Resolves once no swap of `name` is running or pending.
    pub fn when_idle(&self, name: &str) -> impl Future<Output = ()> + Send + use<> {
        self.coalescer.when_idle(&name.to_string())
    }

    /// One swap: clone or create, attach, race, then remove the previous
    /// element. Returns the element now serving the resource.
    async fn replace(&self, id: &ResourceId, prior: Option<ElementHandle>) -> ElementHandle {
        let existing = prior
            .filter(|el| self.host.container_of(*el).is_some())
            .or_else(|| self.host.locate(id));

        let fresh = locator::with_cache_bust(&id.locator, self.next_stamp());
        let (element, container) = match existing {
            Some(previous) => {
                let container = self
                    .host
                    .container_of(previous)
                    .unwrap_or(id.kind.default_container());
                (self.clone_element(previous, id.kind, &fresh), container)
            }
            None => (
                self.host.create(id.kind, &fresh),
                id.kind.default_container(),
            ),
        };

        let (latch, settled) = CompletionLatch::new();
        self.host.on_settle(element, latch.clone());

        if let Err(e) = self.host.attach(element, container) {
            crate::log!("swap"; "{}", e);
            self.host.discard(element);
            return existing.unwrap_or(element);
        }

        let timer = {
            let latch = latch.clone();
            let timeout = self.timings.load_timeout;
            tokio::spawn(async move {
                sleep(timeout).await;
                latch.fire(Settle::TimedOut);
            })
        };
        let signal = settled.await.unwrap_or(Settle::TimedOut);
        timer.abort();
        debug!("swap"; "{} settled: {:?}", fresh, signal);

        sleep(self.timings.settle_delay).await;
        if let Some(previous) = existing {
            self.remove(previous, id).await;
        }
        element
    }

    /// Copy every attribute except the locator, which becomes `locator`.
    fn clone_element(
        &self,
        from: ElementHandle,
        kind: ResourceKind,
        locator: &str,
    ) -> ElementHandle {
        let swapped = kind.locator_attr();
        let mut attributes: Vec<_> = self
            .host
            .attributes(from)
            .into_iter()
            .filter(|(key, _)| key != swapped)
            .collect();
        attributes.push((swapped.to_string(), locator.to_string()));
        self.host.create_with(kind, &attributes)
    }

    /// Detach with retries; sweep duplicates once the attempts run out.
    pub(super) async fn remove(
        &self,
        element: ElementHandle,
        id: &ResourceId,
    ) -> Option<SweepReport> {
        let attempts = self.timings.remove_attempts.max(1);
        for attempt in 1..=attempts {
            match self.host.detach(element) {
                Ok(()) => return None,
                Err(e) => {
                    debug!("swap"; "remove attempt {}/{}: {}", attempt, attempts, e);
                    if attempt < attempts {
                        sleep(self.timings.remove_backoff).await;
                    }
                }
            }
        }
        Some(self.sweep(id))
    }

    /// Remove all but the newest `sweep_keep` elements matching `id`.
    pub fn sweep(&self, id: &ResourceId) -> SweepReport {
        let similar = self.host.list_similar(id);
        let excess = similar.len().saturating_sub(self.timings.sweep_keep);
        let mut report = SweepReport {
            matched: similar.len(),
            ..SweepReport::default()
        };

        for element in &similar[..excess] {
            match self.host.detach(*element) {
                Ok(()) => report.removed += 1,
                Err(e) => {
                    debug!("swap"; "sweep: {}, clearing locator", e);
                    self.host.clear_locator(*element);
                    report.neutralized += 1;
                }
            }
        }

        if excess > 0 {
            crate::log!("swap"; "swept {} stale {} element(s) for {}",
                excess, id.kind.label(), id.canonical());
        }
        report
    }

    /// Remove the stylesheet of `view`.
    pub async fn remove_stylesheet(&self, view: &str) {
        let id = ResourceId::new(
            ResourceKind::Stylesheet,
            ResourceKind::Stylesheet.default_locator(view),
        );
        self.remove_resource(view, &id).await;
    }

    /// Remove the script compiled from `name`.
    pub async fn remove_script(&self, name: &str) {
        let key = super::script_name(name);
        let id = ResourceId::new(ResourceKind::Script, ResourceKind::Script.default_locator(key));
        self.remove_resource(key, &id).await;
    }

    async fn remove_resource(&self, key: &str, id: &ResourceId) {
        self.when_idle(key).await;
        let key = key.to_string();
        for element in self.host.list_similar(id) {
            self.remove(element, id).await;
        }
        self.coalescer.clear_last(&key);
    }

    /// Millisecond stamp, strictly increasing within this swapper.
    fn next_stamp(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        let mut last = self.last_stamp.load(Ordering::SeqCst);
        loop {
            let next = now.max(last + 1);
            match self
                .last_stamp
                .compare_exchange(last, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return next,
                Err(actual) => last = actual,
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
