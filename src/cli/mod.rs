//! Command-line interface module.

mod args;
pub mod bundle;
pub mod common;
pub mod scan;
pub mod serve;

pub use args::{Cli, Commands};
