//! `[serve]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [serve]
//! ws_port = 5278   # WebSocket port pages connect to
//! watch = true     # Watch sources and compiled output
//! ```
//!
//! When `ws_port` is taken the next free port is used.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    /// WebSocket port number.
    pub ws_port: u16,

    /// Enable file watcher.
    pub watch: bool,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            ws_port: 5278,
            watch: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;

    #[test]
    fn test_serve_config() {
        let config = test_parse_config("[serve]\nws_port = 8080\nwatch = false");

        assert_eq!(config.serve.ws_port, 8080);
        assert!(!config.serve.watch);
    }

    #[test]
    fn test_serve_config_defaults() {
        let config = test_parse_config("");

        assert_eq!(config.serve.ws_port, 5278);
        assert!(config.serve.watch);
    }

    #[test]
    fn test_serve_config_port_range() {
        let config = test_parse_config("[serve]\nws_port = 1");
        assert_eq!(config.serve.ws_port, 1);

        let config = test_parse_config("[serve]\nws_port = 65535");
        assert_eq!(config.serve.ws_port, 65535);
    }
}
