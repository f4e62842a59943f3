//! Shared helpers: subprocess execution and path handling.

pub mod exec;
pub mod path;
