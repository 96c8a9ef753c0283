//! Object store client abstraction.
//!
//! [`ObjectStore`] is the narrow set of calls the object store backend
//! needs from a flat, key-addressed storage service. Implementations:
//!
//! - [`MemoryStore`] - in-memory account (testing, demos)
//! - `S3Store` - rust-s3 client (behind the `s3` feature)
//!
//! [`RegionRouter`] picks the client that serves a given bucket.

mod memory;
mod routing;
#[cfg(feature = "s3")]
mod s3;

use async_trait::async_trait;
use bytes::Bytes;
use std::time::SystemTime;
use thiserror::Error;

pub use memory::MemoryStore;
pub use routing::RegionRouter;
#[cfg(feature = "s3")]
pub use s3::{S3Store, S3StoreConfig, region_router};

/// Error returned by an object store client.
///
/// `status` is the transport-level HTTP status when the service answered;
/// it is `None` for failures that never produced a response.
#[derive(Debug, Clone, Error)]
#[error("{}", self.describe())]
pub struct StoreError {
    /// HTTP status of the failed response.
    pub status: Option<u16>,
    /// Service error code (e.g. `NoSuchKey`), when known.
    pub code: Option<String>,
    /// Human-readable detail.
    pub message: String,
}

impl StoreError {
    /// An error carrying a response status.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            code: None,
            message: message.into(),
        }
    }

    /// A failure that produced no response (connection, TLS, timeout).
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            code: None,
            message: message.into(),
        }
    }

    /// Attach a service error code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Whether the service reported the resource as absent.
    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }

    fn describe(&self) -> String {
        match (&self.status, &self.code) {
            (Some(status), Some(code)) => format!("{code} (HTTP {status}): {}", self.message),
            (Some(status), None) => format!("HTTP {status}: {}", self.message),
            (None, Some(code)) => format!("{code}: {}", self.message),
            (None, None) => self.message.clone(),
        }
    }
}

/// Object store result type.
pub type StoreResult<T> = Result<T, StoreError>;

/// A bucket visible to the account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketSummary {
    pub name: String,
    /// Region, when the service reports it.
    pub region: Option<String>,
    pub creation_date: SystemTime,
}

/// Metadata returned by a head-object call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHead {
    pub size: i64,
    pub last_modified: SystemTime,
}

/// A leaf object in a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: i64,
    pub last_modified: SystemTime,
}

/// Parameters for one listing page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListObjectsRequest {
    pub bucket: String,
    pub prefix: String,
    /// Group keys into common prefixes at this delimiter.
    pub delimiter: Option<String>,
    /// Opaque cursor from the previous page's `next_cursor`.
    pub cursor: Option<String>,
    /// Page-size hint. `None` leaves the service default.
    pub max_keys: Option<usize>,
}

impl ListObjectsRequest {
    /// List under `prefix` in `bucket`, delimited by `/`.
    pub fn delimited(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: prefix.into(),
            delimiter: Some("/".to_string()),
            cursor: None,
            max_keys: None,
        }
    }

    /// Set the page-size hint.
    pub fn with_max_keys(mut self, max_keys: Option<usize>) -> Self {
        self.max_keys = max_keys;
        self
    }

    /// Resume from a cursor.
    pub fn with_cursor(mut self, cursor: Option<String>) -> Self {
        self.cursor = cursor;
        self
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectListing {
    /// Common prefixes, each ending in the delimiter.
    pub common_prefixes: Vec<String>,
    pub objects: Vec<ObjectSummary>,
    /// More pages are available.
    pub is_truncated: bool,
    /// Cursor for the next page when truncated.
    pub next_cursor: Option<String>,
}

impl ObjectListing {
    /// Whether the page holds no prefixes and no objects.
    pub fn is_empty(&self) -> bool {
        self.common_prefixes.is_empty() && self.objects.is_empty()
    }
}

/// Client for a flat, key-addressed object store.
///
/// Implementations must be safe to share across concurrent requests.
/// None of these calls retry on behalf of the caller beyond what the
/// underlying transport already does.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List every bucket the credentials can see.
    async fn list_buckets(&self) -> StoreResult<Vec<BucketSummary>>;

    /// Probe a bucket for existence and access.
    async fn head_bucket(&self, bucket: &str) -> StoreResult<()>;

    /// Fetch object metadata.
    async fn head_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectHead>;

    /// Fetch one listing page.
    async fn list_objects(&self, request: &ListObjectsRequest) -> StoreResult<ObjectListing>;

    /// Fetch bytes `start..=end` of an object.
    ///
    /// The service may return fewer bytes when the range runs past the end.
    async fn get_range(&self, bucket: &str, key: &str, start: u64, end: u64) -> StoreResult<Bytes>;
}

/// Parse a timestamp as returned by object store APIs.
///
/// Accepts RFC 3339 (listings), RFC 2822 (`Last-Modified` headers) and the
/// `Display` form of a UTC chrono timestamp.
pub fn parse_timestamp(raw: &str) -> Option<SystemTime> {
    use chrono::{DateTime, NaiveDateTime, Utc};

    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc).into());
    }
    if let Ok(ts) = DateTime::parse_from_rfc2822(raw) {
        return Some(ts.with_timezone(&Utc).into());
    }
    let naive = raw.strip_suffix(" UTC").unwrap_or(raw);
    NaiveDateTime::parse_from_str(naive, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|ts| ts.and_utc().into())
}
