//! Capability interfaces of the live page.

use super::{CompletionLatch, Container, ResourceId, ResourceKind};
use thiserror::Error;

/// Opaque, copyable reference to an element owned by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementHandle(pub u64);

#[derive(Debug, Error)]
pub enum DetachError {
    #[error("element {0:?} is not attached")]
    NotAttached(ElementHandle),
    #[error("element {0:?} refused removal: {1}")]
    Rejected(ElementHandle, String),
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error("unknown element {0:?}")]
    UnknownElement(ElementHandle),
    #[error("cannot attach {0:?}: {1}")]
    Attach(ElementHandle, String),
}

/// Element store of the page (head and body).
///
/// Implementations must be cheap to call; the swapper never holds its own
/// locks across host calls.
pub trait ResourceHost: Send + Sync {
    /// Newest attached element of `id.kind` whose locator matches `id`.
    fn locate(&self, id: &ResourceId) -> Option<ElementHandle>;

    /// Detached element of `kind` with only its locator attribute set.
    fn create(&self, kind: ResourceKind, locator: &str) -> ElementHandle;

    /// Attributes of `element` in document order.
    fn attributes(&self, element: ElementHandle) -> Vec<(String, String)>;

    /// Detached element of `kind` carrying exactly `attributes`.
    fn create_with(&self, kind: ResourceKind, attributes: &[(String, String)]) -> ElementHandle;

    /// Container of an attached element, `None` once detached.
    fn container_of(&self, element: ElementHandle) -> Option<Container>;

    fn attach(&self, element: ElementHandle, container: Container) -> Result<(), HostError>;

    fn detach(&self, element: ElementHandle) -> Result<(), DetachError>;

    /// Release a created element that never got attached.
    fn discard(&self, element: ElementHandle);

    /// Attached elements matching `id`, oldest first.
    fn list_similar(&self, id: &ResourceId) -> Vec<ElementHandle>;

    /// Blank the locator attribute so the element stops matching.
    fn clear_locator(&self, element: ElementHandle);

    /// Attached element by its `id` attribute.
    fn find_by_id(&self, id: &str) -> Option<ElementHandle>;

    /// Attached per-file scripts (see [`super::TRACKED_SCRIPT_CLASS`]).
    fn tracked_scripts(&self) -> Vec<ElementHandle>;

    /// Route the element's load and error events into `latch`.
    fn on_settle(&self, element: ElementHandle, latch: CompletionLatch);

    /// Value of one attribute.
    fn attribute(&self, element: ElementHandle, name: &str) -> Option<String> {
        self.attributes(element)
            .into_iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }
}

/// The framework runtime running inside the page.
pub trait Runtime: Send + Sync {
    /// Whether the runtime finished booting.
    fn is_available(&self) -> bool;

    fn render(&self);

    /// Forget per-view state before every script re-executes.
    fn reset_view_state(&self);

    fn show_error(&self, error: &crate::bus::CompileFailure);

    fn clear_error(&self);

    /// Views defined by the compiled file `name`.
    fn views_of_file(&self, name: &str) -> Vec<String>;

    fn delete_file(&self, name: &str);
}
