//! Reload modes built on top of swapping.
//!
//! - reload-one: swap one element found by id (the package bundle), then
//!   render once the runtime is up
//! - reload-all: swap the internals bundle, then every tracked per-file
//!   script, then render

use super::{ResourceKind, Runtime, Swapper, script_name};
use crate::debug;
use std::sync::Arc;
use tokio::time::sleep;

/// When reload-all renders after re-swapping the tracked scripts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReloadAllMode {
    /// Render after every script swap has completed.
    #[default]
    AwaitSettled,
    /// Render a fixed delay after the swaps were requested, whether or not
    /// they completed.
    FixedDelay,
}

/// How a reload ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// Swapped and rendered.
    Rendered,
    /// Swapped, but the runtime never became available.
    RuntimeMissing,
    /// No element carries the requested id.
    NotFound,
    /// Nothing tracked to reload.
    Empty,
}

impl Swapper {
    /// Swap the element with id `element_id`, then render.
    pub async fn reload_one(&self, element_id: &str, runtime: Arc<dyn Runtime>) -> ReloadOutcome {
        if !self.swap_by_id(element_id) {
            debug!("reload"; "no element #{}", element_id);
            return ReloadOutcome::NotFound;
        }
        self.when_idle(element_id).await;
        self.render_when_ready(runtime.as_ref()).await
    }

    /// Swap `#{element_id}`, then re-swap every tracked script and render.
    pub async fn reload_all(
        &self,
        element_id: &str,
        runtime: Arc<dyn Runtime>,
        mode: ReloadAllMode,
    ) -> ReloadOutcome {
        if self.swap_by_id(element_id) {
            self.when_idle(element_id).await;
        }

        let scripts = self.host().tracked_scripts();
        if scripts.is_empty() {
            return ReloadOutcome::Empty;
        }

        runtime.reset_view_state();

        let mut names = Vec::with_capacity(scripts.len());
        for script in scripts {
            let Some(src) = self.host().attribute(script, "src") else {
                continue;
            };
            let canonical = super::locator::canonical(&src);
            let name = tracked_name(&canonical).to_string();
            self.swap(ResourceKind::Script, &name, &canonical);
            names.push(name);
        }

        match mode {
            ReloadAllMode::AwaitSettled => {
                for name in &names {
                    self.when_idle(name).await;
                }
            }
            ReloadAllMode::FixedDelay => sleep(self.timings().reload_all_delay).await,
        }

        self.render_when_ready(runtime.as_ref()).await
    }

    /// Schedule a swap of the element carrying `element_id`, keyed by that id.
    fn swap_by_id(&self, element_id: &str) -> bool {
        let host = self.host();
        let Some(element) = host.find_by_id(element_id) else {
            return false;
        };
        let Some(src) = host.attribute(element, "src") else {
            return false;
        };
        self.swap(ResourceKind::Script, element_id, &src);
        true
    }

    /// Poll for the runtime and render once it shows up.
    async fn render_when_ready(&self, runtime: &dyn Runtime) -> ReloadOutcome {
        let timings = self.timings();
        for attempt in 0..timings.runtime_attempts {
            if runtime.is_available() {
                runtime.render();
                return ReloadOutcome::Rendered;
            }
            if attempt + 1 < timings.runtime_attempts {
                sleep(timings.runtime_poll).await;
            }
        }
        debug!("reload"; "runtime not available, skipping render");
        ReloadOutcome::RuntimeMissing
    }
}

/// Swap key of a tracked script: the name it was published under
/// (`/_/views/main.js` → `views/main`), or the locator itself.
fn tracked_name(canonical: &str) -> &str {
    match canonical.strip_prefix("/_/") {
        Some(rest) => script_name(rest),
        None => canonical,
    }
}
