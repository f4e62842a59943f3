//! `serve`: watch, scan, install and broadcast until Ctrl+C.

use anyhow::{Context, Result};
use crossbeam::channel;

use crate::actor::Coordinator;
use crate::config::cfg;
use crate::core::register_shutdown;
use crate::log;

/// Serve with the published config (see [`crate::config::init_config`]).
pub fn serve() -> Result<()> {
    let config = cfg();
    let (shutdown_tx, shutdown_rx) = channel::unbounded::<()>();
    register_shutdown(shutdown_tx);

    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    log!("serve"; "watching {}", config.paths.source.display());
    rt.block_on(
        Coordinator::with_config(config)
            .with_shutdown_signal(shutdown_rx)
            .run(),
    )
}
