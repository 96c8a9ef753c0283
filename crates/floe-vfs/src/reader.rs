//! Seekable reader over a byte-range fetch function.
//!
//! [`RangeReader`] holds only a position and a size. Every read asks the
//! injected [`RangeFetch`] for the window starting at the current position,
//! so memory use is bounded by one window regardless of object size.

use bytes::Bytes;
use futures::future::BoxFuture;
use std::fmt;
use std::io::{self, SeekFrom};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncSeek, ReadBuf};

use crate::error::VfsResult;

/// Fetches up to `len` bytes starting at `offset`.
///
/// The offset is signed so that a reader positioned before the start can
/// hand the request through and let the backend reject it.
pub type RangeFetch = Box<dyn Fn(i64, usize) -> BoxFuture<'static, VfsResult<Bytes>> + Send + Sync>;

/// Seekable byte stream backed by range fetches.
pub struct RangeReader {
    fetch: RangeFetch,
    offset: i64,
    size: i64,
    pending: Option<BoxFuture<'static, VfsResult<Bytes>>>,
    seeking: bool,
}

impl fmt::Debug for RangeReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RangeReader")
            .field("offset", &self.offset)
            .field("size", &self.size)
            .field("pending", &self.pending.is_some())
            .finish()
    }
}

impl RangeReader {
    /// Create a reader positioned at the start of a `size`-byte stream.
    pub fn new(size: i64, fetch: RangeFetch) -> Self {
        Self {
            fetch,
            offset: 0,
            size,
            pending: None,
            seeking: false,
        }
    }

    /// Total stream size in bytes.
    pub fn size(&self) -> i64 {
        self.size
    }

    /// Current position. May be negative or past the end after a seek.
    pub fn position(&self) -> i64 {
        self.offset
    }

    /// Move the position and return it.
    ///
    /// No bounds are enforced. Seeking past the end makes the next read
    /// return end-of-stream; a negative position fails on the next read.
    pub fn seek_to(&mut self, pos: SeekFrom) -> i64 {
        self.pending = None;
        self.offset = match pos {
            SeekFrom::Start(n) => i64::try_from(n).unwrap_or(i64::MAX),
            SeekFrom::Current(delta) => self.offset.saturating_add(delta),
            SeekFrom::End(delta) => self.size.saturating_add(delta),
        };
        self.offset
    }
}

impl AsyncRead for RangeReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        if this.offset >= this.size || buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        let fut = this
            .pending
            .get_or_insert_with(|| (this.fetch)(this.offset, buf.remaining()));
        let result = match fut.as_mut().poll(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(result) => result,
        };
        this.pending = None;

        let bytes = result.map_err(io::Error::from)?;
        let n = bytes.len().min(buf.remaining());
        buf.put_slice(&bytes[..n]);
        this.offset += n as i64;
        Poll::Ready(Ok(()))
    }
}

impl AsyncSeek for RangeReader {
    fn start_seek(mut self: Pin<&mut Self>, position: SeekFrom) -> io::Result<()> {
        self.seek_to(position);
        self.seeking = true;
        Ok(())
    }

    fn poll_complete(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
        // Only the seek that produced a negative position reports it.
        if !std::mem::take(&mut self.seeking) {
            return Poll::Ready(Ok(self.offset.max(0) as u64));
        }
        Poll::Ready(u64::try_from(self.offset).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("seek to negative position {}", self.offset),
            )
        }))
    }
}
