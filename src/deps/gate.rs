//! Global install gate.
//!
//! `Idle` or `Installing`, plus the scans that arrived while installing.
//! The holder admits deferred scans in arrival order before it lets go.

use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    Installing,
}

pub struct InstallGate<T> {
    state: GateState,
    deferred: VecDeque<T>,
}

impl<T> Default for InstallGate<T> {
    fn default() -> Self {
        Self {
            state: GateState::Idle,
            deferred: VecDeque::new(),
        }
    }
}

impl<T> InstallGate<T> {
    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn is_held(&self) -> bool {
        self.state == GateState::Installing
    }

    /// Take the gate. Returns false when it is already held.
    pub fn acquire(&mut self) -> bool {
        if self.is_held() {
            return false;
        }
        self.state = GateState::Installing;
        true
    }

    /// Queue a continuation behind the current holder.
    pub fn defer(&mut self, continuation: T) {
        self.deferred.push_back(continuation);
    }

    /// Oldest deferred continuation.
    pub fn next_deferred(&mut self) -> Option<T> {
        self.deferred.pop_front()
    }

    pub fn has_deferred(&self) -> bool {
        !self.deferred.is_empty()
    }

    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    /// Release the gate. Refused (returns false) while continuations are
    /// still queued, since nobody would admit them afterwards.
    pub fn release(&mut self) -> bool {
        if self.has_deferred() {
            return false;
        }
        self.state = GateState::Idle;
        true
    }
}
