//! Filesystem operations trait.
//!
//! The read-only surface every backend exposes: path-addressed metadata,
//! directory listing and seekable byte streams.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncSeek};

use crate::context::OpContext;
use crate::error::{VfsError, VfsResult};
use crate::types::{DirEntry, FileInfo};

/// A seekable byte stream returned by [`FileSystem::open`].
pub trait ReadStream: AsyncRead + AsyncSeek + Send + Unpin {}

impl<T: AsyncRead + AsyncSeek + Send + Unpin + ?Sized> ReadStream for T {}

/// Core read-only filesystem trait.
///
/// Paths are slash-separated and interpreted relative to the backend's
/// configured root; `"/"` addresses the root itself. Every I/O operation
/// takes an [`OpContext`] and gives up with `Cancelled` or
/// `DeadlineExceeded` once it fires.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Whether `err` means the addressed path does not exist.
    ///
    /// Permission, network and malformed-request failures are not
    /// "not exist", even when they prevented the lookup.
    fn is_not_exist(&self, err: &VfsError) -> bool {
        err.is_not_found()
    }

    /// Join path segments with this filesystem's separator.
    fn join(&self, segments: &[&str]) -> String;

    /// Metadata for `path`.
    async fn stat(&self, ctx: &OpContext, path: &str) -> VfsResult<FileInfo>;

    /// Children of the directory at `path`.
    async fn read_dir(&self, ctx: &OpContext, path: &str) -> VfsResult<Vec<DirEntry>>;

    /// Open `path` for reading.
    async fn open(&self, ctx: &OpContext, path: &str) -> VfsResult<Box<dyn ReadStream>>;

    /// Size of `path` in bytes.
    async fn size(&self, ctx: &OpContext, path: &str) -> VfsResult<i64> {
        Ok(self.stat(ctx, path).await?.size)
    }
}
