//! Error types for the batch engine.
//!
//! Only [`DiscoveryError`] is allowed to abort a run. Everything else is caught at the
//! job boundary and turned into a failed `JobResult`.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Fatal errors raised before any job is dispatched
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Root directory does not exist: {0}")]
    RootMissing(PathBuf),

    #[error("Root path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Failed to read root directory {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create {path}: {source}")]
    Layout {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Per-file probe failures. Callers map these to "ineligible" or to default geometry.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Failed to run ffprobe: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("ffprobe exited with {status}: {stderr}")]
    Exit { status: String, stderr: String },

    #[error("Failed to parse ffprobe JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No video stream found")]
    NoVideoStream,

    #[error("Failed to parse framerate: {0}")]
    FrameRate(String),
}

/// Failure of a single encoder invocation. Never fatal: the cascade moves on.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("Failed to spawn encoder: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Failed to wait for encoder: {0}")]
    Wait(#[source] std::io::Error),

    #[error("Encoder exceeded timeout of {0:?} and was killed")]
    Timeout(Duration),

    #[error("Failed to prepare {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Reason a successfully transcoded source was not deleted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CleanupRefusal {
    #[error("job did not succeed")]
    NotSucceeded,

    #[error("source no longer exists")]
    Missing,

    #[error("path resolves outside the root directory")]
    OutsideRoot,

    #[error("path is the root directory")]
    IsRoot,

    #[error("file sits directly in the root directory")]
    TopLevel,

    #[error("transcoded output is missing")]
    OutputMissing,

    #[error("transcoded output is claimed by another source")]
    OutputShared,
}
