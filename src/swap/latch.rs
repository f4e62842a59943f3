//! Single-fire completion latch.
//!
//! A swapped element completes on whichever comes first: its load event,
//! its error event or the timeout. All three hold a clone of the same latch;
//! the first `fire` delivers, later ones are no-ops.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;

/// How a swapped element settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settle {
    Loaded,
    Failed,
    TimedOut,
}

#[derive(Clone)]
pub struct CompletionLatch {
    slot: Arc<Mutex<Option<oneshot::Sender<Settle>>>>,
}

impl CompletionLatch {
    /// New latch and the receiver of its single signal.
    pub fn new() -> (Self, oneshot::Receiver<Settle>) {
        let (tx, rx) = oneshot::channel();
        let latch = Self {
            slot: Arc::new(Mutex::new(Some(tx))),
        };
        (latch, rx)
    }

    /// Deliver `signal` unless another one already won. Returns whether this
    /// call was the first.
    pub fn fire(&self, signal: Settle) -> bool {
        match self.slot.lock().take() {
            Some(tx) => {
                // receiver gone means the swap was abandoned; still counts as fired
                let _ = tx.send(signal);
                true
            }
            None => false,
        }
    }

    pub fn is_fired(&self) -> bool {
        self.slot.lock().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_signal_wins() {
        let (latch, rx) = CompletionLatch::new();
        assert!(latch.fire(Settle::Failed));
        assert!(!latch.fire(Settle::Loaded));
        assert!(!latch.clone().fire(Settle::TimedOut));
        assert_eq!(rx.await.unwrap(), Settle::Failed);
    }

    #[test]
    fn test_is_fired() {
        let (latch, _rx) = CompletionLatch::new();
        assert!(!latch.is_fired());
        latch.fire(Settle::Loaded);
        assert!(latch.is_fired());
    }
}
