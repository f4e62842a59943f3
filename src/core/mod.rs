//! Process-wide state.

mod state;

pub use state::{is_shutdown, register_shutdown, request_shutdown, setup_shutdown_handler};
