//! Actor System for the `serve` command
//!
//! Message-passing concurrency for watch mode:
//!
//! ```text
//! FsActor --> PipelineActor --> DependencyInstaller
//! (watch)      (classify)           │ notifier
//!                  │ notifier        ▼
//!                  └──────────────► WsActor --> pages
//! ```
//!
//! # Module Structure
//!
//! - `messages` - Message types for inter-actor communication
//! - `fs` - File system watcher with debouncing
//! - `pipeline` - Turns file changes into scans and bus messages
//! - `ws` - WebSocket broadcast
//! - `coordinator` - Wires up and runs actors

pub mod coordinator;
pub mod fs;
pub mod messages;
pub mod pipeline;
pub mod ws;

pub use coordinator::Coordinator;
