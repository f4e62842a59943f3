//! In-memory page model.
//!
//! A minimal head/body element store implementing [`ResourceHost`], plus a
//! scriptable [`Runtime`]. Used to drive the swapper headlessly: load
//! behavior and detach failures can be programmed per test.

use super::{
    CompletionLatch, Container, DetachError, ElementHandle, HostError, ResourceHost, ResourceId,
    ResourceKind, Runtime, Settle, TRACKED_SCRIPT_CLASS, locator,
};
use crate::bus::CompileFailure;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// What an element does once attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleBehavior {
    /// Fires load.
    Load,
    /// Fires error.
    Error,
    /// Fires error, then load (exercises the single-fire guard).
    Both,
    /// Fires nothing; the swap completes on its timeout.
    Never,
}

struct Element {
    kind: ResourceKind,
    attributes: Vec<(String, String)>,
    container: Option<Container>,
    /// Attach sequence number, for oldest-first ordering.
    attached_at: u64,
}

impl Element {
    fn locator(&self) -> Option<&str> {
        let attr = self.kind.locator_attr();
        self.attributes
            .iter()
            .find(|(key, _)| key == attr)
            .map(|(_, value)| value.as_str())
            .filter(|value| !value.is_empty())
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

struct HostState {
    next_id: u64,
    next_order: u64,
    elements: FxHashMap<ElementHandle, Element>,
    latches: FxHashMap<ElementHandle, CompletionLatch>,
    settle: SettleBehavior,
    /// Remaining refused detaches per element.
    refusals: FxHashMap<ElementHandle, usize>,
    /// Remaining refused attaches, any element.
    attach_refusals: usize,
    detach_calls: usize,
}

pub struct MemoryHost {
    state: Mutex<HostState>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HostState {
                next_id: 1,
                next_order: 0,
                elements: FxHashMap::default(),
                latches: FxHashMap::default(),
                settle: SettleBehavior::Load,
                refusals: FxHashMap::default(),
                attach_refusals: 0,
                detach_calls: 0,
            }),
        }
    }

    /// Behavior of elements attached from now on.
    pub fn set_settle(&self, behavior: SettleBehavior) {
        self.state.lock().settle = behavior;
    }

    /// Make the next `times` detaches of `element` fail
    /// (`usize::MAX` for every one).
    pub fn refuse_detach(&self, element: ElementHandle, times: usize) {
        self.state.lock().refusals.insert(element, times);
    }

    /// Make the next `times` attaches fail.
    pub fn refuse_attach(&self, times: usize) {
        self.state.lock().attach_refusals = times;
    }

    /// Elements the host still tracks, attached or not.
    pub fn element_count(&self) -> usize {
        self.state.lock().elements.len()
    }

    /// Create and attach an element in one step (page setup).
    pub fn insert(
        &self,
        kind: ResourceKind,
        attributes: &[(&str, &str)],
        container: Container,
    ) -> ElementHandle {
        let owned: Vec<_> = attributes
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let element = self.create_with(kind, &owned);
        let mut state = self.state.lock();
        Self::place(&mut state, element, container);
        element
    }

    /// Attached elements of `kind`, oldest first.
    pub fn attached(&self, kind: ResourceKind) -> Vec<ElementHandle> {
        let state = self.state.lock();
        Self::ordered(&state, |el| el.kind == kind)
    }

    /// Locator attribute of any element, attached or not.
    pub fn locator_of(&self, element: ElementHandle) -> Option<String> {
        let state = self.state.lock();
        state
            .elements
            .get(&element)
            .and_then(|el| el.locator().map(str::to_string))
    }

    pub fn detach_calls(&self) -> usize {
        self.state.lock().detach_calls
    }

    fn place(state: &mut HostState, element: ElementHandle, container: Container) {
        let order = state.next_order;
        state.next_order += 1;
        if let Some(el) = state.elements.get_mut(&element) {
            el.container = Some(container);
            el.attached_at = order;
        }
    }

    fn ordered(state: &HostState, filter: impl Fn(&Element) -> bool) -> Vec<ElementHandle> {
        let mut found: Vec<_> = state
            .elements
            .iter()
            .filter(|(_, el)| el.container.is_some() && filter(el))
            .map(|(handle, el)| (el.attached_at, *handle))
            .collect();
        found.sort_unstable();
        found.into_iter().map(|(_, handle)| handle).collect()
    }
}

impl ResourceHost for MemoryHost {
    fn locate(&self, id: &ResourceId) -> Option<ElementHandle> {
        self.list_similar(id).pop()
    }

    fn create(&self, kind: ResourceKind, locator: &str) -> ElementHandle {
        let mut attributes = vec![(kind.locator_attr().to_string(), locator.to_string())];
        if kind == ResourceKind::Stylesheet {
            attributes.push(("rel".to_string(), "stylesheet".to_string()));
        }
        self.create_with(kind, &attributes)
    }

    fn attributes(&self, element: ElementHandle) -> Vec<(String, String)> {
        let state = self.state.lock();
        state
            .elements
            .get(&element)
            .map(|el| el.attributes.clone())
            .unwrap_or_default()
    }

    fn create_with(&self, kind: ResourceKind, attributes: &[(String, String)]) -> ElementHandle {
        let mut state = self.state.lock();
        let handle = ElementHandle(state.next_id);
        state.next_id += 1;
        state.elements.insert(
            handle,
            Element {
                kind,
                attributes: attributes.to_vec(),
                container: None,
                attached_at: 0,
            },
        );
        handle
    }

    fn container_of(&self, element: ElementHandle) -> Option<Container> {
        self.state
            .lock()
            .elements
            .get(&element)
            .and_then(|el| el.container)
    }

    fn attach(&self, element: ElementHandle, container: Container) -> Result<(), HostError> {
        let (latch, settle) = {
            let mut state = self.state.lock();
            if !state.elements.contains_key(&element) {
                return Err(HostError::UnknownElement(element));
            }
            if state.attach_refusals > 0 {
                state.attach_refusals -= 1;
                return Err(HostError::Attach(element, "container is locked".to_string()));
            }
            Self::place(&mut state, element, container);
            (state.latches.remove(&element), state.settle)
        };

        // fired outside the lock, like an event loop would
        if let Some(latch) = latch {
            match settle {
                SettleBehavior::Load => {
                    latch.fire(Settle::Loaded);
                }
                SettleBehavior::Error => {
                    latch.fire(Settle::Failed);
                }
                SettleBehavior::Both => {
                    latch.fire(Settle::Failed);
                    latch.fire(Settle::Loaded);
                }
                SettleBehavior::Never => {}
            }
        }
        Ok(())
    }

    fn detach(&self, element: ElementHandle) -> Result<(), DetachError> {
        let mut state = self.state.lock();
        state.detach_calls += 1;

        if let Some(remaining) = state.refusals.get_mut(&element)
            && *remaining > 0
        {
            if *remaining != usize::MAX {
                *remaining -= 1;
            }
            return Err(DetachError::Rejected(element, "node is busy".to_string()));
        }

        match state.elements.get_mut(&element) {
            Some(el) if el.container.is_some() => {
                el.container = None;
                Ok(())
            }
            _ => Err(DetachError::NotAttached(element)),
        }
    }

    fn discard(&self, element: ElementHandle) {
        let mut state = self.state.lock();
        if state.elements.get(&element).is_some_and(|el| el.container.is_none()) {
            state.elements.remove(&element);
            state.latches.remove(&element);
        }
    }

    fn list_similar(&self, id: &ResourceId) -> Vec<ElementHandle> {
        let state = self.state.lock();
        Self::ordered(&state, |el| {
            el.kind == id.kind && el.locator().is_some_and(|l| locator::matches(l, &id.locator))
        })
    }

    fn clear_locator(&self, element: ElementHandle) {
        let mut state = self.state.lock();
        if let Some(el) = state.elements.get_mut(&element) {
            let attr = el.kind.locator_attr();
            for (key, value) in &mut el.attributes {
                if key == attr {
                    value.clear();
                }
            }
        }
    }

    fn find_by_id(&self, id: &str) -> Option<ElementHandle> {
        let state = self.state.lock();
        Self::ordered(&state, |el| el.attr("id") == Some(id)).pop()
    }

    fn tracked_scripts(&self) -> Vec<ElementHandle> {
        let state = self.state.lock();
        Self::ordered(&state, |el| {
            el.kind == ResourceKind::Script
                && el.attr("class").is_some_and(|class| {
                    class
                        .split_whitespace()
                        .any(|c| c == TRACKED_SCRIPT_CLASS)
                })
        })
    }

    fn on_settle(&self, element: ElementHandle, latch: CompletionLatch) {
        self.state.lock().latches.insert(element, latch);
    }
}

// ============================================================================
// Runtime
// ============================================================================

/// Scriptable runtime: becomes available after a number of checks and
/// counts every call.
pub struct MemoryRuntime {
    checks_until_ready: AtomicUsize,
    renders: AtomicUsize,
    resets: AtomicUsize,
    error: Mutex<Option<CompileFailure>>,
    views: Mutex<FxHashMap<String, Vec<String>>>,
    deleted: Mutex<Vec<String>>,
}

impl MemoryRuntime {
    /// Available on the first check.
    pub fn ready() -> Self {
        Self::ready_after(0)
    }

    /// Unavailable for the first `checks` checks.
    pub fn ready_after(checks: usize) -> Self {
        Self {
            checks_until_ready: AtomicUsize::new(checks),
            renders: AtomicUsize::new(0),
            resets: AtomicUsize::new(0),
            error: Mutex::new(None),
            views: Mutex::new(FxHashMap::default()),
            deleted: Mutex::new(Vec::new()),
        }
    }

    /// Never becomes available.
    pub fn absent() -> Self {
        Self::ready_after(usize::MAX)
    }

    /// Declare the views compiled from `file`.
    pub fn define_views(&self, file: &str, views: &[&str]) {
        self.views.lock().insert(
            file.to_string(),
            views.iter().map(|v| v.to_string()).collect(),
        );
    }

    pub fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    pub fn shown_error(&self) -> Option<CompileFailure> {
        self.error.lock().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().clone()
    }
}

impl Runtime for MemoryRuntime {
    fn is_available(&self) -> bool {
        self.checks_until_ready
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                0 => None,
                usize::MAX => Some(usize::MAX),
                n => Some(n - 1),
            })
            .is_err()
    }

    fn render(&self) {
        self.renders.fetch_add(1, Ordering::SeqCst);
    }

    fn reset_view_state(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }

    fn show_error(&self, error: &CompileFailure) {
        *self.error.lock() = Some(error.clone());
    }

    fn clear_error(&self) {
        *self.error.lock() = None;
    }

    fn views_of_file(&self, name: &str) -> Vec<String> {
        self.views.lock().get(name).cloned().unwrap_or_default()
    }

    fn delete_file(&self, name: &str) {
        self.views.lock().remove(name);
        self.deleted.lock().push(name.to_string());
    }
}
