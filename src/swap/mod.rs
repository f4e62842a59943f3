//! Live resource swapping.
//!
//! Replaces a script or stylesheet element of a running page without a full
//! reload: clone the element with a cache-busted locator, wait for the clone
//! to settle (load, error or timeout), then remove the previous element.
//!
//! The page itself is reached through [`ResourceHost`]; the framework
//! runtime living in the page through [`Runtime`]. Swaps are keyed by
//! resource name and coalesced, so a burst of saves produces at most one
//! in-flight swap plus one follow-up per name.

mod host;
mod latch;
pub mod locator;
mod memory;
mod reload;
mod swapper;

pub use host::{DetachError, ElementHandle, HostError, ResourceHost, Runtime};
pub use latch::{CompletionLatch, Settle};
pub use memory::{MemoryHost, MemoryRuntime, SettleBehavior};
pub use reload::{ReloadAllMode, ReloadOutcome};
pub use swapper::{SweepReport, Swapper};

use std::time::Duration;

/// Element id of the script carrying the bundled external packages.
pub const EXTERNALS_ELEMENT: &str = "__flintExternals";
/// Element id of the script carrying relatively imported modules.
pub const INTERNALS_ELEMENT: &str = "__flintInternals";
/// Class marking the per-file scripts that reload-all walks over.
pub const TRACKED_SCRIPT_CLASS: &str = "__flintScript";

/// Kind of swappable resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Script,
    Stylesheet,
}

impl ResourceKind {
    /// Attribute carrying the locator.
    pub const fn locator_attr(self) -> &'static str {
        match self {
            Self::Script => "src",
            Self::Stylesheet => "href",
        }
    }

    /// Container a fresh element goes into.
    pub const fn default_container(self) -> Container {
        match self {
            Self::Script => Container::Body,
            Self::Stylesheet => Container::Head,
        }
    }

    /// Locator the dev server publishes a compiled resource under.
    pub fn default_locator(self, name: &str) -> String {
        match self {
            Self::Script => format!("/_/{}.js", script_name(name)),
            Self::Stylesheet => format!("/__/styles/{name}.css"),
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Stylesheet => "stylesheet",
        }
    }
}

/// Strip the leading slash and the `.js` / `.jsf` extension from a
/// compiled file name (`/views/main.js` → `views/main`).
pub fn script_name(name: &str) -> &str {
    let name = name.trim_start_matches('/');
    name.strip_suffix(".jsf")
        .or_else(|| name.strip_suffix(".js"))
        .unwrap_or(name)
}

/// Where an element lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Container {
    Head,
    Body,
}

/// What a swap targets: a kind plus the locator to load.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId {
    pub kind: ResourceKind,
    pub locator: String,
}

impl ResourceId {
    pub fn new(kind: ResourceKind, locator: impl Into<String>) -> Self {
        Self {
            kind,
            locator: locator.into(),
        }
    }

    /// Locator without origin and cache-busting suffix.
    pub fn canonical(&self) -> String {
        locator::canonical(&self.locator)
    }
}

/// Delays and limits of the swap protocol.
#[derive(Debug, Clone, Copy)]
pub struct SwapTimings {
    /// Forced completion when neither load nor error fires.
    pub load_timeout: Duration,
    /// Pause between completion and removing the previous element.
    pub settle_delay: Duration,
    /// Pause between failed detach attempts.
    pub remove_backoff: Duration,
    /// Detach attempts before falling back to a sweep.
    pub remove_attempts: usize,
    /// Matching elements a sweep leaves in place (newest first).
    pub sweep_keep: usize,
    /// Interval between runtime availability checks.
    pub runtime_poll: Duration,
    /// Availability checks before a reload gives up.
    pub runtime_attempts: usize,
    /// Delay before rendering in [`ReloadAllMode::FixedDelay`].
    pub reload_all_delay: Duration,
}

impl Default for SwapTimings {
    fn default() -> Self {
        Self {
            load_timeout: Duration::from_millis(200),
            settle_delay: Duration::from_millis(4),
            remove_backoff: Duration::from_millis(30),
            remove_attempts: 3,
            sweep_keep: 2,
            runtime_poll: Duration::from_millis(50),
            runtime_attempts: 10,
            reload_all_delay: Duration::from_millis(10),
        }
    }
}
