//! flint-runner - live-development runner for flint apps.
//!
//! Keeps a page's scripts and stylesheets hot-swapped while sources change,
//! and installs and bundles the npm packages those sources import.

pub mod actor;
pub mod bus;
pub mod cli;
pub mod coalesce;
pub mod config;
pub mod core;
pub mod deps;
pub mod logger;
pub mod sources;
pub mod swap;
pub mod utils;
