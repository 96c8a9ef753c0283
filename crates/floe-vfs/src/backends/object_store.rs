//! Object store backend.
//!
//! Presents a bucket (optionally under a key prefix), or every bucket in an
//! account, as a directory tree. Directories are inferred from delimited
//! listings: common prefixes and zero-byte placeholder objects. Nothing is
//! cached; every call goes to the store.

use async_trait::async_trait;
use bytes::Bytes;
use futures::FutureExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use crate::context::OpContext;
use crate::error::{VfsError, VfsResult};
use crate::ops::{FileSystem, ReadStream};
use crate::path;
use crate::reader::{RangeFetch, RangeReader};
use crate::store::{ListObjectsRequest, ObjectListing, ObjectStore, RegionRouter};
use crate::types::{DirEntry, FileInfo, FileType};

/// Hard ceiling on listing pages fetched by one `read_dir`.
pub const MAX_LIST_PAGES: usize = 20;

/// Largest page the service returns; smaller caps are sent as a hint.
const SERVICE_PAGE_LIMIT: i64 = 1000;

/// What part of the object store the filesystem root maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BucketScope {
    /// Every bucket in the account is a top-level directory.
    Account,
    /// One bucket, optionally narrowed to the keys under `prefix`.
    Bucket {
        bucket: String,
        prefix: Option<String>,
    },
}

impl BucketScope {
    /// Scope from raw bucket and prefix strings.
    ///
    /// An empty bucket selects the whole account. A prefix without a bucket
    /// is rejected.
    pub fn from_parts(bucket: &str, prefix: &str) -> VfsResult<Self> {
        let prefix = prefix.trim_matches('/');
        match (bucket.is_empty(), prefix.is_empty()) {
            (true, true) => Ok(BucketScope::Account),
            (true, false) => Err(VfsError::invalid_config(format!(
                "prefix {prefix:?} given without a bucket"
            ))),
            (false, _) => Ok(BucketScope::Bucket {
                bucket: bucket.to_string(),
                prefix: (!prefix.is_empty()).then(|| path::clean(prefix)),
            }),
        }
    }
}

/// A path resolved against the scope.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Location {
    /// `None` only for the account root.
    bucket: Option<String>,
    /// Key without leading slash; empty for a bucket root.
    key: String,
}

/// Object store filesystem.
///
/// Immutable after construction and safe to share across tasks.
#[derive(Debug)]
pub struct ObjectStoreBackend {
    scope: BucketScope,
    router: RegionRouter,
    creation_dates: HashMap<String, SystemTime>,
    earliest_creation: SystemTime,
    max_entries: i64,
}

impl ObjectStoreBackend {
    /// Create a backend.
    ///
    /// `creation_dates` stamps synthetic directories; buckets missing from
    /// it use the Unix epoch. `max_entries` caps every listing, `-1` means
    /// unlimited.
    pub fn new(
        scope: BucketScope,
        router: RegionRouter,
        creation_dates: HashMap<String, SystemTime>,
        max_entries: i64,
    ) -> VfsResult<Self> {
        if max_entries < -1 {
            return Err(VfsError::invalid_config(format!(
                "max entries must be -1 or non-negative, got {max_entries}"
            )));
        }
        let earliest_creation = creation_dates
            .values()
            .min()
            .copied()
            .unwrap_or(SystemTime::UNIX_EPOCH);
        Ok(Self {
            scope,
            router,
            creation_dates,
            earliest_creation,
            max_entries,
        })
    }

    /// The configured scope.
    pub fn scope(&self) -> &BucketScope {
        &self.scope
    }

    /// The listing cap, `-1` for unlimited.
    pub fn max_entries(&self) -> i64 {
        self.max_entries
    }

    fn resolve(&self, name: &str) -> Location {
        match &self.scope {
            BucketScope::Account => {
                let segments = path::segments(name);
                match segments.split_first() {
                    None => Location {
                        bucket: None,
                        key: String::new(),
                    },
                    Some((bucket, rest)) => Location {
                        bucket: Some(bucket.to_string()),
                        key: path::join(rest),
                    },
                }
            }
            BucketScope::Bucket { bucket, prefix } => {
                let prefix = prefix.as_deref().unwrap_or("");
                let key = path::join(&[prefix, name]);
                Location {
                    bucket: Some(bucket.clone()),
                    key: key.trim_start_matches('/').to_string(),
                }
            }
        }
    }

    fn creation_date(&self, bucket: &str) -> SystemTime {
        self.creation_dates
            .get(bucket)
            .copied()
            .unwrap_or(SystemTime::UNIX_EPOCH)
    }

    fn entry_cap(&self) -> Option<usize> {
        usize::try_from(self.max_entries).ok()
    }

    fn page_hint(&self) -> Option<usize> {
        if (0..SERVICE_PAGE_LIMIT).contains(&self.max_entries) {
            self.entry_cap()
        } else {
            None
        }
    }

    /// Map a listed key or common prefix to an entry name relative to the root.
    fn entry_name(&self, bucket: &str, key: &str) -> String {
        match &self.scope {
            BucketScope::Account => format!("{bucket}/{key}"),
            BucketScope::Bucket { prefix: None, .. } => key.to_string(),
            BucketScope::Bucket {
                prefix: Some(prefix),
                ..
            } => key
                .strip_prefix(prefix.as_str())
                .and_then(|rest| rest.strip_prefix('/'))
                .unwrap_or(key)
                .to_string(),
        }
    }

    async fn probe_bucket(&self, ctx: &OpContext, bucket: &str) -> VfsResult<()> {
        tracing::debug!(bucket, "head bucket");
        let client = self.router.client_for(bucket);
        ctx.run(async {
            client
                .head_bucket(bucket)
                .await
                .map_err(|e| VfsError::backend(format!("head bucket {bucket}"), e))
        })
        .await
    }

    async fn list_page(
        &self,
        ctx: &OpContext,
        client: &Arc<dyn ObjectStore>,
        request: &ListObjectsRequest,
    ) -> VfsResult<ObjectListing> {
        tracing::debug!(
            bucket = %request.bucket,
            prefix = %request.prefix,
            cursor = ?request.cursor,
            max_keys = ?request.max_keys,
            "list objects"
        );
        ctx.run(async {
            client.list_objects(request).await.map_err(|e| {
                VfsError::backend(
                    format!("list objects {}/{}", request.bucket, request.prefix),
                    e,
                )
            })
        })
        .await
    }

    async fn list_buckets(&self, ctx: &OpContext) -> VfsResult<Vec<DirEntry>> {
        tracing::debug!("list buckets");
        let client = self.router.default_client();
        let buckets = ctx
            .run(async {
                client
                    .list_buckets()
                    .await
                    .map_err(|e| VfsError::backend("list buckets", e))
            })
            .await?;

        let cap = self.entry_cap().unwrap_or(usize::MAX);
        Ok(buckets
            .into_iter()
            .take(cap)
            .map(|b| DirEntry::directory(b.name, b.creation_date))
            .collect())
    }

    async fn list_dir(
        &self,
        ctx: &OpContext,
        name: &str,
        bucket: &str,
        key: &str,
    ) -> VfsResult<Vec<DirEntry>> {
        let prefix = if key.is_empty() {
            String::new()
        } else {
            format!("{key}/")
        };
        let client = self.router.client_for(bucket);
        let cap = self.entry_cap();
        let is_full = |entries: &Vec<DirEntry>| cap.is_some_and(|cap| entries.len() >= cap);
        let dir_time = self.creation_date(bucket);

        let mut request = ListObjectsRequest::delimited(bucket, prefix.as_str()).with_max_keys(self.page_hint());
        let mut entries = Vec::new();

        for page_index in 0..MAX_LIST_PAGES {
            let page = match self.list_page(ctx, client, &request).await {
                Ok(page) => page,
                Err(err) if page_index == 0 => return Err(err),
                Err(err @ (VfsError::Cancelled | VfsError::DeadlineExceeded)) => return Err(err),
                Err(err) => {
                    return Err(VfsError::PartialListing {
                        path: name.to_string(),
                        pages_fetched: page_index,
                        source: Box::new(err),
                    });
                }
            };
            let resume = page.next_cursor.clone().or_else(|| last_listed(&page));

            for common in &page.common_prefixes {
                if is_full(&entries) {
                    break;
                }
                entries.push(DirEntry::directory(self.entry_name(bucket, common), dir_time));
            }
            for object in &page.objects {
                // The directory's own placeholder is not one of its children.
                if object.key == prefix {
                    continue;
                }
                if is_full(&entries) {
                    break;
                }
                entries.push(DirEntry::new(
                    self.entry_name(bucket, &object.key),
                    FileType::for_object_size(object.size),
                    object.size,
                    object.last_modified,
                ));
            }

            if is_full(&entries) || !page.is_truncated {
                return Ok(entries);
            }
            if resume.is_none() {
                tracing::warn!(bucket, prefix = %prefix, "truncated listing returned no cursor");
                return Ok(entries);
            }
            request = request.with_cursor(resume);
        }

        tracing::warn!(
            bucket,
            prefix = %prefix,
            pages = MAX_LIST_PAGES,
            entries = entries.len(),
            "listing stopped at page ceiling"
        );
        Ok(entries)
    }
}

/// Greatest key or prefix on a page, the resume point when the store
/// reports truncation without a cursor.
fn last_listed(page: &ObjectListing) -> Option<String> {
    let last_object = page.objects.last().map(|o| o.key.as_str());
    let last_prefix = page.common_prefixes.last().map(String::as_str);
    last_object.max(last_prefix).map(str::to_string)
}

#[async_trait]
impl FileSystem for ObjectStoreBackend {
    fn join(&self, segments: &[&str]) -> String {
        path::join(segments)
    }

    #[tracing::instrument(skip(self, ctx), name = "object_store.stat")]
    async fn stat(&self, ctx: &OpContext, name: &str) -> VfsResult<FileInfo> {
        let location = self.resolve(name);
        let Some(bucket) = location.bucket else {
            return Ok(FileInfo::directory(name, self.earliest_creation));
        };
        let key = location.key;

        let bucket_root = match &self.scope {
            BucketScope::Account => key.is_empty(),
            BucketScope::Bucket { prefix, .. } => key.is_empty() && prefix.is_none(),
        };
        if bucket_root {
            self.probe_bucket(ctx, &bucket).await?;
            return Ok(FileInfo::directory(name, self.creation_date(&bucket)));
        }

        let client = self.router.client_for(&bucket);
        let probe = ListObjectsRequest::delimited(bucket.as_str(), format!("{key}/")).with_max_keys(Some(1));
        let page = self.list_page(ctx, client, &probe).await?;
        if !page.is_empty() {
            return Ok(FileInfo::directory(name, self.creation_date(&bucket)));
        }

        tracing::debug!(bucket = %bucket, key = %key, "head object");
        let head = ctx
            .run(async {
                client
                    .head_object(&bucket, &key)
                    .await
                    .map_err(|e| VfsError::backend(format!("head object {bucket}/{key}"), e))
            })
            .await?;
        Ok(FileInfo {
            name: name.to_string(),
            size: head.size,
            mod_time: head.last_modified,
            kind: FileType::for_object_size(head.size),
        })
    }

    #[tracing::instrument(skip(self, ctx), name = "object_store.read_dir")]
    async fn read_dir(&self, ctx: &OpContext, name: &str) -> VfsResult<Vec<DirEntry>> {
        let location = self.resolve(name);
        match location.bucket {
            None => self.list_buckets(ctx).await,
            Some(bucket) => self.list_dir(ctx, name, &bucket, &location.key).await,
        }
    }

    #[tracing::instrument(skip(self, ctx), name = "object_store.open")]
    async fn open(&self, ctx: &OpContext, name: &str) -> VfsResult<Box<dyn ReadStream>> {
        let size = self.stat(ctx, name).await?.size;
        let location = self.resolve(name);
        let bucket = location.bucket.unwrap_or_default();
        let key = location.key;
        let client = self.router.client_for(&bucket).clone();
        let ctx = ctx.clone();

        let fetch: RangeFetch = Box::new(move |offset: i64, len: usize| {
            let client = client.clone();
            let bucket = bucket.clone();
            let key = key.clone();
            let ctx = ctx.clone();
            async move {
                if offset < 0 {
                    return Err(VfsError::invalid_range(format!(
                        "negative offset {offset} in {bucket}/{key}"
                    )));
                }
                if len == 0 || offset >= size {
                    return Ok(Bytes::new());
                }
                let start = offset as u64;
                let end = (start + len as u64 - 1).min(size as u64 - 1);
                tracing::debug!(bucket = %bucket, key = %key, start, end, "get object range");
                ctx.run(async {
                    client
                        .get_range(&bucket, &key, start, end)
                        .await
                        .map_err(|e| VfsError::backend(format!("get object {bucket}/{key}"), e))
                })
                .await
            }
            .boxed()
        });
        Ok(Box::new(RangeReader::new(size, fetch)))
    }
}
