//! Coalescing single-flight scheduler.
//!
//! One task runs per key at a time. Requests arriving while a task is in
//! flight collapse into a single pending follow-up (newest wins), which runs
//! once the in-flight task finishes and receives its result:
//!
//! ```text
//! schedule(k, A) ─► A runs
//! schedule(k, B) ─► pending = B
//! schedule(k, C) ─► pending = C   (B dropped, never invoked)
//! A done         ─► C runs with Some(result of A)
//! C done         ─► idle, last = result of C
//! ```
//!
//! The scheduler imposes no timeouts; a task that never resolves keeps its
//! key busy. A task that panics counts as finished with the prior result, so
//! the chain moves on.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::{future::Future, hash::Hash, pin::Pin, sync::Arc};
use tokio::sync::oneshot;

type TaskFuture<R> = Pin<Box<dyn Future<Output = R> + Send>>;
type Task<R> = Box<dyn FnOnce(Option<R>) -> TaskFuture<R> + Send>;

/// Outcome of a [`Coalescer::schedule`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheduled {
    /// Nothing was in flight; the task started right away.
    Started,
    /// A task is in flight; this one became the pending follow-up.
    /// `replaced` is true when it displaced an older pending task.
    Coalesced { replaced: bool },
}

/// Per-key record.
struct Slot<R> {
    in_flight: bool,
    /// Behind a lock so the slot is `Sync` without requiring it of tasks.
    pending: Mutex<Option<Task<R>>>,
    last: Option<R>,
    idle_waiters: Vec<oneshot::Sender<()>>,
}

impl<R> Default for Slot<R> {
    fn default() -> Self {
        Self {
            in_flight: false,
            pending: Mutex::new(None),
            last: None,
            idle_waiters: Vec::new(),
        }
    }
}

/// Keyed single-flight scheduler with last-writer-wins follow-ups.
///
/// Cloning is cheap and every clone shares the same per-key records.
pub struct Coalescer<K, R> {
    slots: Arc<DashMap<K, Slot<R>>>,
}

impl<K, R> Clone for Coalescer<K, R> {
    fn clone(&self) -> Self {
        Self {
            slots: Arc::clone(&self.slots),
        }
    }
}

impl<K, R> Default for Coalescer<K, R>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
        }
    }
}

impl<K, R> Coalescer<K, R>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    R: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` for `key` now, or park it as the key's follow-up.
    ///
    /// The task receives the key's previous result (`None` before the first
    /// completion). Must be called from within a tokio runtime.
    pub fn schedule<F, Fut>(&self, key: K, task: F) -> Scheduled
    where
        F: FnOnce(Option<R>) -> Fut + Send + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let task: Task<R> = Box::new(move |prior| -> TaskFuture<R> { Box::pin(task(prior)) });

        let prior = {
            let mut slot = self.slots.entry(key.clone()).or_default();
            if slot.in_flight {
                let replaced = slot.pending.get_mut().replace(task).is_some();
                return Scheduled::Coalesced { replaced };
            }
            slot.in_flight = true;
            slot.last.clone()
        };

        tokio::spawn(self.clone().drive(key, task, prior));
        Scheduled::Started
    }

    /// Run the chain for `key` until no follow-up is pending.
    async fn drive(self, key: K, mut task: Task<R>, mut prior: Option<R>) {
        loop {
            // a panicking task must not leave the key in flight
            let result = match tokio::spawn(task(prior.clone())).await {
                Ok(result) => Some(result),
                Err(e) => {
                    crate::log!("error"; "scheduled task failed: {}", e);
                    None
                }
            };

            let next = {
                let Some(mut slot) = self.slots.get_mut(&key) else {
                    return;
                };
                if let Some(result) = &result {
                    slot.last = Some(result.clone());
                }
                let next = slot.pending.get_mut().take();
                if next.is_none() {
                    slot.in_flight = false;
                    for waiter in slot.idle_waiters.drain(..) {
                        let _ = waiter.send(());
                    }
                }
                next
            };

            match next {
                Some(follow_up) => {
                    task = follow_up;
                    prior = result.or(prior);
                }
                None => return,
            }
        }
    }

    /// Last completed result for `key`.
    pub fn last(&self, key: &K) -> Option<R> {
        self.slots.get(key).and_then(|slot| slot.last.clone())
    }

    /// Whether `key` has a task in flight.
    pub fn is_busy(&self, key: &K) -> bool {
        self.slots.get(key).is_some_and(|slot| slot.in_flight)
    }

    /// Resolves once `key` has neither a task in flight nor a follow-up.
    ///
    /// Idle keys resolve immediately. Requests scheduled after the chain
    /// drains are not waited for.
    pub fn when_idle(&self, key: &K) -> impl Future<Output = ()> + Send + use<K, R> {
        let waiter = match self.slots.get_mut(key) {
            Some(mut slot) if slot.in_flight => {
                let (tx, rx) = oneshot::channel();
                slot.idle_waiters.push(tx);
                Some(rx)
            }
            _ => None,
        };

        async move {
            if let Some(rx) = waiter {
                let _ = rx.await;
            }
        }
    }

    /// Forget the cached result of `key` (the element it named is gone).
    ///
    /// A chain in flight keeps running and will store its own result.
    pub fn clear_last(&self, key: &K) {
        if let Some(mut slot) = self.slots.get_mut(key) {
            slot.last = None;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::sleep;

    /// Task that records its label and the prior it saw, then sleeps.
    fn recording_task(
        log: Arc<Mutex<Vec<(&'static str, Option<&'static str>)>>>,
        label: &'static str,
        delay_ms: u64,
    ) -> impl FnOnce(Option<&'static str>) -> TaskFuture<&'static str> + Send + 'static {
        move |prior| {
            Box::pin(async move {
                log.lock().push((label, prior));
                sleep(Duration::from_millis(delay_ms)).await;
                label
            })
        }
    }

    fn panicking_task(
        delay_ms: u64,
    ) -> impl FnOnce(Option<&'static str>) -> TaskFuture<&'static str> + Send + 'static {
        move |_| {
            Box::pin(async move {
                sleep(Duration::from_millis(delay_ms)).await;
                if delay_ms > 0 {
                    panic!("host blew up");
                }
                "unreachable"
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_key_starts_immediately() {
        let coalescer: Coalescer<&str, &str> = Coalescer::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let scheduled = coalescer.schedule("app", recording_task(log.clone(), "a", 10));
        assert_eq!(scheduled, Scheduled::Started);
        assert!(coalescer.is_busy(&"app"));

        coalescer.when_idle(&"app").await;
        assert!(!coalescer.is_busy(&"app"));
        assert_eq!(*log.lock(), vec![("a", None)]);
        assert_eq!(coalescer.last(&"app"), Some("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_runs_exactly_two_tasks() {
        let coalescer: Coalescer<&str, &str> = Coalescer::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        coalescer.schedule("app", recording_task(log.clone(), "a", 50));
        let second = coalescer.schedule("app", recording_task(log.clone(), "b", 10));
        let third = coalescer.schedule("app", recording_task(log.clone(), "c", 10));
        let fourth = coalescer.schedule("app", recording_task(log.clone(), "d", 10));

        assert_eq!(second, Scheduled::Coalesced { replaced: false });
        assert_eq!(third, Scheduled::Coalesced { replaced: true });
        assert_eq!(fourth, Scheduled::Coalesced { replaced: true });

        coalescer.when_idle(&"app").await;
        assert_eq!(*log.lock(), vec![("a", None), ("d", Some("a"))]);
        assert_eq!(coalescer.last(&"app"), Some("d"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_follow_up_receives_prior_result() {
        let coalescer: Coalescer<&str, &str> = Coalescer::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        coalescer.schedule("app", recording_task(log.clone(), "A", 20));
        coalescer.schedule("app", recording_task(log.clone(), "B", 20));
        coalescer.when_idle(&"app").await;

        // A completes first; B sees A's result.
        assert_eq!(*log.lock(), vec![("A", None), ("B", Some("A"))]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_during_follow_up_extends_chain() {
        let coalescer: Coalescer<&str, &str> = Coalescer::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        coalescer.schedule("app", recording_task(log.clone(), "a", 20));
        coalescer.schedule("app", recording_task(log.clone(), "b", 20));

        // a finishes at 20ms, b runs 20..40ms
        sleep(Duration::from_millis(30)).await;
        assert_eq!(log.lock().len(), 2);
        coalescer.schedule("app", recording_task(log.clone(), "c", 20));

        coalescer.when_idle(&"app").await;
        assert_eq!(
            *log.lock(),
            vec![("a", None), ("b", Some("a")), ("c", Some("b"))]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let coalescer: Coalescer<&str, &str> = Coalescer::new();
        let runs = Arc::new(AtomicUsize::new(0));

        for key in ["app", "header", "footer"] {
            let runs = runs.clone();
            let scheduled = coalescer.schedule(key, move |_| async move {
                runs.fetch_add(1, Ordering::SeqCst);
                sleep(Duration::from_millis(10)).await;
                "done"
            });
            assert_eq!(scheduled, Scheduled::Started);
        }

        for key in ["app", "header", "footer"] {
            coalescer.when_idle(&key).await;
        }
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_later_chain_sees_last_result() {
        let coalescer: Coalescer<&str, &str> = Coalescer::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        coalescer.schedule("app", recording_task(log.clone(), "first", 5));
        coalescer.when_idle(&"app").await;
        coalescer.schedule("app", recording_task(log.clone(), "second", 5));
        coalescer.when_idle(&"app").await;

        assert_eq!(log.lock()[1], ("second", Some("first")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_last_resets_prior() {
        let coalescer: Coalescer<&str, &str> = Coalescer::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        coalescer.schedule("app", recording_task(log.clone(), "first", 5));
        coalescer.when_idle(&"app").await;
        coalescer.clear_last(&"app");
        coalescer.schedule("app", recording_task(log.clone(), "second", 5));
        coalescer.when_idle(&"app").await;

        assert_eq!(log.lock()[1], ("second", None));
    }

    #[tokio::test]
    async fn test_when_idle_on_unknown_key() {
        let coalescer: Coalescer<&str, &str> = Coalescer::new();
        coalescer.when_idle(&"nothing").await;
        assert!(coalescer.last(&"nothing").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_task_releases_key() {
        let coalescer: Coalescer<&str, &str> = Coalescer::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        coalescer.schedule("app", recording_task(log.clone(), "first", 5));
        coalescer.when_idle(&"app").await;

        coalescer.schedule("app", panicking_task(5));
        tokio::time::timeout(Duration::from_secs(1), coalescer.when_idle(&"app"))
            .await
            .expect("key stuck after a panicking task");
        assert!(!coalescer.is_busy(&"app"));
        assert_eq!(coalescer.last(&"app"), Some("first"));

        let again = coalescer.schedule("app", recording_task(log.clone(), "second", 5));
        assert_eq!(again, Scheduled::Started);
        coalescer.when_idle(&"app").await;
        assert_eq!(log.lock()[1], ("second", Some("first")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_follow_up_runs_after_panicking_task() {
        let coalescer: Coalescer<&str, &str> = Coalescer::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        coalescer.schedule("app", panicking_task(10));
        coalescer.schedule("app", recording_task(log.clone(), "retry", 5));
        coalescer.when_idle(&"app").await;

        assert_eq!(*log.lock(), vec![("retry", None)]);
        assert_eq!(coalescer.last(&"app"), Some("retry"));
    }

    #[test]
    fn test_coalescer_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Coalescer<String, Option<u64>>>();
    }
}
