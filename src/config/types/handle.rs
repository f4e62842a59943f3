//! Global config handle.
//!
//! Uses `arc-swap` for lock-free reads from any actor or blocking task.

use crate::config::FlintConfig;
use arc_swap::ArcSwap;
use std::sync::{Arc, LazyLock};

/// Global config storage.
pub static CONFIG: LazyLock<ArcSwap<FlintConfig>> =
    LazyLock::new(|| ArcSwap::from_pointee(FlintConfig::default()));

#[inline]
pub fn cfg() -> Arc<FlintConfig> {
    CONFIG.load_full()
}

/// Publish the loaded config and return it.
#[inline]
pub fn init_config(config: FlintConfig) -> Arc<FlintConfig> {
    let arc = Arc::new(config);
    CONFIG.store(Arc::clone(&arc));
    arc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_config_publishes() {
        let mut config = FlintConfig::default();
        config.serve.ws_port = 6001;
        let published = init_config(config);

        assert_eq!(published.serve.ws_port, 6001);
        assert_eq!(cfg().serve.ws_port, 6001);
    }
}
