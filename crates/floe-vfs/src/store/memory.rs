//! In-memory object store.
//!
//! Used for testing and demos. Models an account with buckets, regions and
//! creation dates, and reproduces the listing semantics of S3 ListObjects:
//! lexicographic key order, delimiter grouping into common prefixes,
//! marker-based cursors, page size limits and truncation.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::{Duration, SystemTime};

use super::{
    BucketSummary, ListObjectsRequest, ObjectHead, ObjectListing, ObjectStore, ObjectSummary,
    StoreError, StoreResult,
};

/// Page size used when a request carries no hint, as S3 does.
const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    last_modified: SystemTime,
}

#[derive(Debug, Clone)]
struct Bucket {
    region: String,
    creation_date: SystemTime,
    objects: BTreeMap<String, StoredObject>,
}

/// One item in a listing, before paging.
enum Item {
    Prefix(String),
    Object(ObjectSummary),
}

impl Item {
    fn cursor(&self) -> &str {
        match self {
            Item::Prefix(prefix) => prefix,
            Item::Object(object) => &object.key,
        }
    }
}

/// In-memory object store.
///
/// Thread-safe via internal locks. All data is lost when dropped.
#[derive(Debug)]
pub struct MemoryStore {
    buckets: RwLock<BTreeMap<String, Bucket>>,
    page_size: usize,
    fail_list_after: Option<usize>,
    latency: Option<Duration>,
    list_calls: AtomicUsize,
    range_calls: AtomicUsize,
    last_max_keys: Mutex<Option<Option<usize>>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            buckets: RwLock::new(BTreeMap::new()),
            page_size: DEFAULT_PAGE_SIZE,
            fail_list_after: None,
            latency: None,
            list_calls: AtomicUsize::new(0),
            range_calls: AtomicUsize::new(0),
            last_max_keys: Mutex::new(None),
        }
    }

    /// Cap every listing page at `page_size` entries, whatever the request asks.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Answer the first `pages` listing calls, then fail every later one with HTTP 500.
    pub fn with_list_failure_after(mut self, pages: usize) -> Self {
        self.fail_list_after = Some(pages);
        self
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Create a bucket. Replaces nothing if it already exists.
    pub fn create_bucket(&self, name: &str, region: &str, creation_date: SystemTime) {
        let mut buckets = self.buckets.write().unwrap_or_else(|e| e.into_inner());
        buckets.entry(name.to_string()).or_insert_with(|| Bucket {
            region: region.to_string(),
            creation_date,
            objects: BTreeMap::new(),
        });
    }

    /// Store an object, creating the bucket in `us-east-1` if needed.
    pub fn put_object(&self, bucket: &str, key: &str, data: impl Into<Bytes>, last_modified: SystemTime) {
        let mut buckets = self.buckets.write().unwrap_or_else(|e| e.into_inner());
        let bucket = buckets.entry(bucket.to_string()).or_insert_with(|| Bucket {
            region: "us-east-1".to_string(),
            creation_date: SystemTime::UNIX_EPOCH,
            objects: BTreeMap::new(),
        });
        bucket.objects.insert(
            key.to_string(),
            StoredObject {
                data: data.into(),
                last_modified,
            },
        );
    }

    /// Region each bucket lives in.
    pub fn bucket_regions(&self) -> BTreeMap<String, String> {
        let buckets = self.buckets.read().unwrap_or_else(|e| e.into_inner());
        buckets
            .iter()
            .map(|(name, bucket)| (name.clone(), bucket.region.clone()))
            .collect()
    }

    /// Number of listing calls served so far.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of range reads served so far.
    pub fn range_calls(&self) -> usize {
        self.range_calls.load(Ordering::SeqCst)
    }

    /// The `max_keys` hint of the most recent listing call, if any call was made.
    pub fn last_max_keys(&self) -> Option<Option<usize>> {
        *self.last_max_keys.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn no_such_bucket(bucket: &str) -> StoreError {
        StoreError::status(404, format!("bucket {bucket} does not exist")).with_code("NoSuchBucket")
    }

    fn no_such_key(bucket: &str, key: &str) -> StoreError {
        StoreError::status(404, format!("key {key} does not exist in {bucket}")).with_code("NoSuchKey")
    }

    /// Every listing item under the request, grouped and deduplicated, after the cursor.
    fn collect_items(bucket: &Bucket, request: &ListObjectsRequest) -> Vec<Item> {
        let prefix = request.prefix.as_str();
        let marker = request.cursor.as_deref().unwrap_or("");
        let delimiter = request.delimiter.as_deref().filter(|d| !d.is_empty());

        let mut items = Vec::new();
        let mut last_prefix: Option<String> = None;

        for (key, object) in bucket.objects.range::<str, _>((
            std::ops::Bound::Excluded(marker),
            std::ops::Bound::Unbounded,
        )) {
            if !key.starts_with(prefix) {
                continue;
            }

            let common = delimiter.and_then(|delim| {
                let rest = &key[prefix.len()..];
                rest.find(delim)
                    .map(|idx| format!("{prefix}{}", &rest[..idx + delim.len()]))
            });

            match common {
                Some(common) => {
                    // Keys rolled up under a prefix handed out on an earlier page stay hidden.
                    if common.as_str() == marker || last_prefix.as_deref() == Some(common.as_str()) {
                        continue;
                    }
                    last_prefix = Some(common.clone());
                    items.push(Item::Prefix(common));
                }
                None => items.push(Item::Object(ObjectSummary {
                    key: key.clone(),
                    size: object.data.len() as i64,
                    last_modified: object.last_modified,
                })),
            }
        }
        items
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_buckets(&self) -> StoreResult<Vec<BucketSummary>> {
        self.delay().await;
        let buckets = self.buckets.read().unwrap_or_else(|e| e.into_inner());
        Ok(buckets
            .iter()
            .map(|(name, bucket)| BucketSummary {
                name: name.clone(),
                region: Some(bucket.region.clone()),
                creation_date: bucket.creation_date,
            })
            .collect())
    }

    async fn head_bucket(&self, bucket: &str) -> StoreResult<()> {
        self.delay().await;
        let buckets = self.buckets.read().unwrap_or_else(|e| e.into_inner());
        if buckets.contains_key(bucket) {
            Ok(())
        } else {
            Err(Self::no_such_bucket(bucket))
        }
    }

    async fn head_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectHead> {
        self.delay().await;
        let buckets = self.buckets.read().unwrap_or_else(|e| e.into_inner());
        let stored = buckets
            .get(bucket)
            .ok_or_else(|| Self::no_such_bucket(bucket))?
            .objects
            .get(key)
            .ok_or_else(|| Self::no_such_key(bucket, key))?;
        Ok(ObjectHead {
            size: stored.data.len() as i64,
            last_modified: stored.last_modified,
        })
    }

    async fn list_objects(&self, request: &ListObjectsRequest) -> StoreResult<ObjectListing> {
        self.delay().await;
        let call = self.list_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_max_keys.lock().unwrap_or_else(|e| e.into_inner()) = Some(request.max_keys);

        if self.fail_list_after.is_some_and(|limit| call >= limit) {
            return Err(StoreError::status(500, "injected listing failure").with_code("InternalError"));
        }

        let buckets = self.buckets.read().unwrap_or_else(|e| e.into_inner());
        let bucket = buckets
            .get(&request.bucket)
            .ok_or_else(|| Self::no_such_bucket(&request.bucket))?;

        let page_size = request
            .max_keys
            .map_or(self.page_size, |hint| hint.min(self.page_size));
        let mut items = Self::collect_items(bucket, request);
        let is_truncated = items.len() > page_size;
        items.truncate(page_size);

        let next_cursor = if is_truncated {
            items.last().map(|item| item.cursor().to_string())
        } else {
            None
        };

        let mut listing = ObjectListing {
            is_truncated,
            next_cursor,
            ..Default::default()
        };
        for item in items {
            match item {
                Item::Prefix(prefix) => listing.common_prefixes.push(prefix),
                Item::Object(object) => listing.objects.push(object),
            }
        }
        Ok(listing)
    }

    async fn get_range(&self, bucket: &str, key: &str, start: u64, end: u64) -> StoreResult<Bytes> {
        self.delay().await;
        self.range_calls.fetch_add(1, Ordering::SeqCst);
        let buckets = self.buckets.read().unwrap_or_else(|e| e.into_inner());
        let stored = buckets
            .get(bucket)
            .ok_or_else(|| Self::no_such_bucket(bucket))?
            .objects
            .get(key)
            .ok_or_else(|| Self::no_such_key(bucket, key))?;

        let len = stored.data.len() as u64;
        if start >= len || end < start {
            return Err(StoreError::status(416, format!("range {start}-{end} not satisfiable"))
                .with_code("InvalidRange"));
        }
        let end = end.min(len - 1);
        Ok(stored.data.slice(start as usize..=end as usize))
    }
}
