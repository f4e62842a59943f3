//! Bus message protocol.
//!
//! Every message is one JSON object tagged by `type`, carried as a single
//! WebSocket text frame:
//!
//! ```json
//! {"type":"script:add","name":"main","timestamp":1700000000000}
//! {"type":"package:error","name":"left-pad","error":"E404"}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Compile failure shown in the page's error overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompileFailure {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// Message exchanged between the runner and the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BusMessage {
    // ------------------------------------------------------------------
    // runner → page (swap and session control)
    // ------------------------------------------------------------------
    /// Editor cursor position; stored by the session, opaque otherwise.
    #[serde(rename = "editor:location")]
    EditorLocation {
        #[serde(flatten)]
        location: Map<String, Value>,
    },

    /// Mapping of views to source locations; stored, opaque.
    #[serde(rename = "view:locations")]
    ViewLocations {
        #[serde(flatten)]
        locations: Map<String, Value>,
    },

    /// A compiled script changed and should be swapped in place.
    #[serde(rename = "script:add")]
    ScriptAdd {
        name: String,
        #[serde(default)]
        timestamp: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        src: Option<String>,
    },

    #[serde(rename = "stylesheet:add")]
    StylesheetAdd { view: String },

    #[serde(rename = "stylesheet:remove")]
    StylesheetRemove { view: String },

    #[serde(rename = "compile:error")]
    CompileError { error: CompileFailure },

    #[serde(rename = "compile:success")]
    CompileSuccess,

    /// The external package bundle was regenerated.
    #[serde(rename = "packages:reload")]
    PackagesReload,

    /// A relatively imported module changed; every tracked script reloads.
    #[serde(rename = "internals:reload")]
    InternalsReload,

    #[serde(rename = "file:delete")]
    FileDelete { name: String },

    // ------------------------------------------------------------------
    // progress notifications
    // ------------------------------------------------------------------
    #[serde(rename = "file:load")]
    FileLoad { name: String },

    #[serde(rename = "file:done")]
    FileDone { name: String },

    #[serde(rename = "package:install")]
    PackageInstall { name: String },

    #[serde(rename = "package:installed")]
    PackageInstalled { name: String },

    #[serde(rename = "package:error")]
    PackageError { name: String, error: String },

    #[serde(rename = "npm:error")]
    NpmError { error: String },

    /// Sent once to each client right after the handshake.
    #[serde(rename = "connected")]
    Connected { version: String },
}

impl BusMessage {
    pub fn script_add(name: impl Into<String>, timestamp: u64) -> Self {
        Self::ScriptAdd {
            name: name.into(),
            timestamp,
            src: None,
        }
    }

    pub fn compile_error(message: impl Into<String>, file: Option<String>) -> Self {
        Self::CompileError {
            error: CompileFailure {
                message: message.into(),
                file,
            },
        }
    }

    pub fn package_error(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self::PackageError {
            name: name.into(),
            error: error.into(),
        }
    }

    pub fn connected() -> Self {
        Self::Connected {
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Event name as it appears in the `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EditorLocation { .. } => "editor:location",
            Self::ViewLocations { .. } => "view:locations",
            Self::ScriptAdd { .. } => "script:add",
            Self::StylesheetAdd { .. } => "stylesheet:add",
            Self::StylesheetRemove { .. } => "stylesheet:remove",
            Self::CompileError { .. } => "compile:error",
            Self::CompileSuccess => "compile:success",
            Self::PackagesReload => "packages:reload",
            Self::InternalsReload => "internals:reload",
            Self::FileDelete { .. } => "file:delete",
            Self::FileLoad { .. } => "file:load",
            Self::FileDone { .. } => "file:done",
            Self::PackageInstall { .. } => "package:install",
            Self::PackageInstalled { .. } => "package:installed",
            Self::PackageError { .. } => "package:error",
            Self::NpmError { .. } => "npm:error",
            Self::Connected { .. } => "connected",
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!(r#"{{"type":"{}"}}"#, self.kind()))
    }

    /// Parse from JSON string
    pub fn from_json(s: &str) -> Option<Self> {
        serde_json::from_str(s).ok()
    }
}
