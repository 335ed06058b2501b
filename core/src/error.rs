//! Error types for the orchestration layer

use std::path::PathBuf;

use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use thiserror::Error;

use crate::controller::Status;
use crate::vfs::FsError;

/// Errors surfaced by launch, state capture and the other public operations.
#[derive(Debug, Error)]
pub enum Error {
    /// An input descriptor could not be turned into a file
    #[error("unresolvable input: {0}")]
    InputResolution(String),

    /// A fetch completed with a failure status; the response headers are kept
    #[error("failed to fetch {url}: HTTP {status}")]
    Fetch {
        url: String,
        status: StatusCode,
        headers: HeaderMap,
    },

    /// A fetch failed before a response arrived
    #[error("network error fetching {url}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// `launch` was called a second time, or after the controller left `Initial`
    #[error("core cannot be launched while {0:?}")]
    AlreadyLaunched(Status),

    /// The requested surface element is missing or of the wrong kind
    #[error("element error: {0}")]
    Element(String),

    /// A file produced by the core never stopped changing within the retry budget
    #[error("timed out waiting for {path} to stabilize")]
    FileSystemTimeout { path: String },

    /// The launch's cancellation token fired
    #[error("launch aborted")]
    Aborted,

    /// A core id has no known display name
    #[error("invalid core name: {0}")]
    InvalidCoreName(String),

    /// The core's filesystem primitive rejected an operation
    #[error(transparent)]
    FileSystem(#[from] FsError),

    /// Reading a local input failed
    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The core module or its loader failed
    #[error(transparent)]
    Core(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
