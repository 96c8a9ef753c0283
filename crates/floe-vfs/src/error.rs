//! VFS error types.

use std::io;
use thiserror::Error;

use crate::store::StoreError;

/// VFS error type.
#[derive(Debug, Error)]
pub enum VfsError {
    /// File, object, or bucket not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Filesystem configuration is invalid (rejected at construction).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Object store call failed for a reason other than absence.
    #[error("{context}: {source}")]
    Backend {
        context: String,
        #[source]
        source: StoreError,
    },

    /// A listing failed after some pages were already fetched.
    ///
    /// Entries gathered before the failure are discarded.
    #[error("listing {path} aborted after {pages_fetched} page(s): {source}")]
    PartialListing {
        path: String,
        pages_fetched: usize,
        #[source]
        source: Box<VfsError>,
    },

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// The operation's deadline passed before the backend answered.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Invalid path.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Byte range cannot be requested from the backend.
    #[error("invalid range: {0}")]
    InvalidRange(String),

    /// No filesystem is configured for the requested site.
    #[error("no site configured for server name: {0}")]
    NoSite(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl VfsError {
    /// Create a NotFound error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create an InvalidConfig error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create an InvalidPath error.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    /// Create an InvalidRange error.
    pub fn invalid_range(msg: impl Into<String>) -> Self {
        Self::InvalidRange(msg.into())
    }

    /// Create an Other error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Wrap an object store failure with the operation that produced it.
    pub fn backend(context: impl Into<String>, source: StoreError) -> Self {
        Self::Backend {
            context: context.into(),
            source,
        }
    }

    /// Whether this error means the addressed resource does not exist.
    ///
    /// Looks through `PartialListing` to its cause. Backend errors count
    /// only when their transport status is 404.
    pub fn is_not_found(&self) -> bool {
        match self {
            VfsError::NotFound(_) => true,
            VfsError::Backend { source, .. } => source.is_not_found(),
            VfsError::PartialListing { source, .. } => source.is_not_found(),
            VfsError::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Convert VfsError to std::io::Error for stream adapters.
impl From<VfsError> for io::Error {
    fn from(e: VfsError) -> Self {
        match e {
            VfsError::NotFound(msg) => io::Error::new(io::ErrorKind::NotFound, msg),
            VfsError::InvalidPath(msg) | VfsError::InvalidRange(msg) => {
                io::Error::new(io::ErrorKind::InvalidInput, msg)
            }
            VfsError::Cancelled => io::Error::new(io::ErrorKind::Interrupted, "operation cancelled"),
            VfsError::DeadlineExceeded => {
                io::Error::new(io::ErrorKind::TimedOut, "deadline exceeded")
            }
            VfsError::Io(e) => e,
            other if other.is_not_found() => {
                io::Error::new(io::ErrorKind::NotFound, other.to_string())
            }
            other => io::Error::other(other),
        }
    }
}

/// VFS result type.
pub type VfsResult<T> = Result<T, VfsError>;
