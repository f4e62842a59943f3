//! Actor Message Definitions
//!
//! ```text
//! FsActor --Changes--> PipelineActor
//! listener --AddClient--> WsActor
//! ```
//!
//! Outbound bus messages reach the `WsActor` through the notifier channel,
//! not through these enums.

use std::net::TcpStream;
use std::path::PathBuf;

/// What happened to a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

impl ChangeKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Removed => "removed",
        }
    }
}

/// Messages to Pipeline Actor
#[derive(Debug)]
pub enum PipelineMsg {
    /// Debounced batch of file changes
    Changes(Vec<(PathBuf, ChangeKind)>),
    /// Shutdown
    Shutdown,
}

/// Messages to WebSocket Actor
pub enum WsMsg {
    /// Accepted connection awaiting handshake
    AddClient(TcpStream),
    /// Close every client and stop
    Shutdown,
}
