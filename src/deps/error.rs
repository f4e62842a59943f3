//! Dependency installer error types.

use std::path::PathBuf;
use thiserror::Error;

/// Failures reading or writing the manifest files.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("IO error when accessing `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("malformed JSON in `{0}`")]
    Json(PathBuf, #[source] serde_json::Error),
}

/// One package failed to install. Never stops the queue.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("install of `{name}` failed: {reason}")]
    Failed { name: String, reason: String },

    #[error("install task for `{0}` was aborted")]
    Aborted(String),
}

/// Bundle regeneration failed; the manifest has been rolled back.
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("bundler failed: {0}")]
    Failed(String),

    #[error("bundle task was aborted")]
    Aborted,

    #[error(transparent)]
    Manifest(#[from] ManifestError),
}
