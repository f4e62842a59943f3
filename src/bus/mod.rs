//! Message bus between the runner and the live page.
//!
//! - [`message`]: the JSON protocol (`BusMessage`)
//! - [`notify`]: outbound seam used by the coordinators
//! - [`session`]: page-side dispatcher that turns inbound messages into
//!   swaps, reloads and runtime calls

pub mod message;
pub mod notify;
pub mod session;

pub use message::{BusMessage, CompileFailure};
#[cfg(test)]
pub use notify::RecordingNotifier;
pub use notify::{ChannelNotifier, Notifier, NullNotifier};
pub use session::LiveSession;
