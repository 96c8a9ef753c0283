//! Bucket → region → client routing.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use super::ObjectStore;
use crate::error::{VfsError, VfsResult};

/// Picks the regional client that serves a bucket.
///
/// Built once and never mutated. Buckets missing from the bucket map are
/// served by the default region.
#[derive(Clone)]
pub struct RegionRouter {
    default_region: String,
    clients: HashMap<String, Arc<dyn ObjectStore>>,
    bucket_regions: BTreeMap<String, String>,
}

impl fmt::Debug for RegionRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut regions: Vec<_> = self.clients.keys().collect();
        regions.sort();
        f.debug_struct("RegionRouter")
            .field("default_region", &self.default_region)
            .field("regions", &regions)
            .field("bucket_regions", &self.bucket_regions)
            .finish()
    }
}

impl RegionRouter {
    /// Build a router.
    ///
    /// Fails with `InvalidConfig` if the default region, or any region named
    /// in `bucket_regions`, has no client.
    pub fn new(
        default_region: impl Into<String>,
        clients: HashMap<String, Arc<dyn ObjectStore>>,
        bucket_regions: BTreeMap<String, String>,
    ) -> VfsResult<Self> {
        let default_region = default_region.into();
        if !clients.contains_key(&default_region) {
            return Err(VfsError::invalid_config(format!(
                "no client for default region {default_region:?}"
            )));
        }
        for (bucket, region) in &bucket_regions {
            if !clients.contains_key(region) {
                return Err(VfsError::invalid_config(format!(
                    "bucket {bucket:?} is mapped to region {region:?}, which has no client"
                )));
            }
        }
        Ok(Self {
            default_region,
            clients,
            bucket_regions,
        })
    }

    /// A router with one client serving every bucket.
    pub fn single(region: impl Into<String>, client: Arc<dyn ObjectStore>) -> Self {
        let region = region.into();
        let mut clients = HashMap::new();
        clients.insert(region.clone(), client);
        Self {
            default_region: region,
            clients,
            bucket_regions: BTreeMap::new(),
        }
    }

    /// Region serving `bucket`.
    pub fn region_for(&self, bucket: &str) -> &str {
        self.bucket_regions
            .get(bucket)
            .map(String::as_str)
            .unwrap_or(&self.default_region)
    }

    /// Client serving `bucket`.
    pub fn client_for(&self, bucket: &str) -> &Arc<dyn ObjectStore> {
        // Construction guarantees every routed region has a client.
        self.clients
            .get(self.region_for(bucket))
            .unwrap_or_else(|| self.default_client())
    }

    /// The default region.
    pub fn default_region(&self) -> &str {
        &self.default_region
    }

    /// Client for the default region, used for account-wide calls.
    pub fn default_client(&self) -> &Arc<dyn ObjectStore> {
        &self.clients[&self.default_region]
    }
}
