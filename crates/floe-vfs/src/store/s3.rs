//! S3 client adapter over the `rust-s3` crate.

use async_trait::async_trait;
use bytes::Bytes;
use s3::Bucket;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::region::Region;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use super::{
    BucketSummary, ListObjectsRequest, ObjectHead, ObjectListing, ObjectStore, ObjectSummary,
    RegionRouter, StoreError, StoreResult, parse_timestamp,
};
use crate::config::StoreConfig;
use crate::error::{VfsError, VfsResult};

/// Connection settings for one regional client.
#[derive(Debug, Clone, Default)]
pub struct S3StoreConfig {
    pub region: String,
    /// Custom endpoint (MinIO, Ceph, LocalStack...).
    pub endpoint: Option<String>,
    pub path_style: bool,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
}

impl S3StoreConfig {
    /// Settings for `region` taken from the shared store configuration.
    pub fn for_region(store: &StoreConfig, region: &str) -> Self {
        Self {
            region: region.to_string(),
            endpoint: store.endpoint.clone(),
            path_style: store.path_style,
            access_key_id: store.access_key_id.clone(),
            secret_access_key: store.secret_access_key.clone(),
            session_token: store.session_token.clone(),
        }
    }
}

/// One regional S3 client.
#[derive(Debug, Clone)]
pub struct S3Store {
    region: Region,
    credentials: Credentials,
    path_style: bool,
}

impl S3Store {
    /// Create a client. Without explicit keys, credentials come from the
    /// environment, profile or instance metadata.
    pub fn new(config: S3StoreConfig) -> StoreResult<Self> {
        let region = match &config.endpoint {
            Some(endpoint) => Region::Custom {
                region: config.region.clone(),
                endpoint: endpoint.clone(),
            },
            None => config
                .region
                .parse::<Region>()
                .map_err(|e| StoreError::transport(format!("region {}: {e}", config.region)))?,
        };

        let credentials = match (&config.access_key_id, &config.secret_access_key) {
            (Some(key), Some(secret)) => Credentials::new(
                Some(key),
                Some(secret),
                None,
                config.session_token.as_deref(),
                None,
            ),
            _ => Credentials::default(),
        }
        .map_err(|e| StoreError::transport(format!("credentials: {e}")))?;

        Ok(Self {
            region,
            credentials,
            path_style: config.path_style,
        })
    }

    fn bucket(&self, name: &str) -> StoreResult<Box<Bucket>> {
        let bucket = Bucket::new(name, self.region.clone(), self.credentials.clone()).map_err(map_error)?;
        Ok(if self.path_style {
            bucket.with_path_style()
        } else {
            bucket
        })
    }
}

/// Build one client per configured region.
pub fn region_router(store: &StoreConfig) -> VfsResult<RegionRouter> {
    let default_region = store
        .default_region
        .clone()
        .ok_or_else(|| VfsError::invalid_config("no default region configured"))?;

    let mut clients: HashMap<String, Arc<dyn ObjectStore>> = HashMap::new();
    for region in store.all_regions() {
        let client = S3Store::new(S3StoreConfig::for_region(store, &region))
            .map_err(|e| VfsError::backend(format!("create client for {region}"), e))?;
        clients.insert(region, Arc::new(client));
    }
    RegionRouter::new(default_region, clients, store.bucket_regions.clone())
}

/// Pull `<Code>` out of an S3 XML error body.
fn error_code(body: &str) -> Option<String> {
    let start = body.find("<Code>")? + "<Code>".len();
    let end = body[start..].find("</Code>")? + start;
    Some(body[start..end].to_string())
}

fn map_error(err: S3Error) -> StoreError {
    match err {
        S3Error::HttpFailWithBody(status, body) => {
            let store_err = StoreError::status(status, body.trim().to_string());
            match error_code(&body) {
                Some(code) => store_err.with_code(code),
                None => store_err,
            }
        }
        other => StoreError::transport(other.to_string()),
    }
}

fn timestamp(raw: Option<&str>) -> SystemTime {
    raw.and_then(parse_timestamp).unwrap_or(SystemTime::UNIX_EPOCH)
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list_buckets(&self) -> StoreResult<Vec<BucketSummary>> {
        let response = Bucket::list_buckets(self.region.clone(), self.credentials.clone())
            .await
            .map_err(map_error)?;
        Ok(response
            .buckets
            .bucket
            .into_iter()
            .map(|b| BucketSummary {
                name: b.name,
                region: None,
                creation_date: timestamp(Some(&b.creation_date.to_string())),
            })
            .collect())
    }

    async fn head_bucket(&self, bucket: &str) -> StoreResult<()> {
        // A one-key listing answers 404 for a missing bucket and 403 without access.
        self.bucket(bucket)?
            .list_page(String::new(), None, None, None, Some(1))
            .await
            .map(|_| ())
            .map_err(map_error)
    }

    async fn head_object(&self, bucket: &str, key: &str) -> StoreResult<ObjectHead> {
        let (head, _status) = self.bucket(bucket)?.head_object(key).await.map_err(map_error)?;
        Ok(ObjectHead {
            size: head.content_length.unwrap_or(0),
            last_modified: timestamp(head.last_modified.as_deref()),
        })
    }

    async fn list_objects(&self, request: &ListObjectsRequest) -> StoreResult<ObjectListing> {
        let (page, _status) = self
            .bucket(&request.bucket)?
            .list_page(
                request.prefix.clone(),
                request.delimiter.clone(),
                request.cursor.clone(),
                None,
                request.max_keys,
            )
            .await
            .map_err(map_error)?;

        Ok(ObjectListing {
            common_prefixes: page
                .common_prefixes
                .unwrap_or_default()
                .into_iter()
                .map(|p| p.prefix)
                .collect(),
            objects: page
                .contents
                .into_iter()
                .map(|o| ObjectSummary {
                    size: o.size as i64,
                    last_modified: timestamp(Some(&o.last_modified)),
                    key: o.key,
                })
                .collect(),
            is_truncated: page.is_truncated,
            next_cursor: page.next_continuation_token,
        })
    }

    async fn get_range(&self, bucket: &str, key: &str, start: u64, end: u64) -> StoreResult<Bytes> {
        let response = self
            .bucket(bucket)?
            .get_object_range(key, start, Some(end))
            .await
            .map_err(map_error)?;
        Ok(response.bytes().clone())
    }
}
