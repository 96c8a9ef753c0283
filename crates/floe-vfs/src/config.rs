//! Configuration: document roots, sites and object store settings.
//!
//! Loaded from TOML. Credentials and region can be overridden from the
//! standard `AWS_*` environment variables.
//!
//! ```toml
//! default_root = "s3://docs"
//! file_systems = ["/srv/www", "s3://media/public"]
//! max_directory_entries = 500
//!
//! [sites]
//! "docs.example.com" = "s3://docs"
//! "www.example.com" = "/srv/www"
//!
//! [store]
//! default_region = "us-east-1"
//! regions = ["us-west-2"]
//! bucket_regions = { media = "us-west-2" }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::SystemTime;

use crate::backends::{BucketScope, LocalBackend, ObjectStoreBackend};
use crate::context::OpContext;
use crate::error::{VfsError, VfsResult};
use crate::ops::FileSystem;
use crate::store::RegionRouter;

/// URL scheme selecting the object store backend.
pub const OBJECT_STORE_SCHEME: &str = "s3://";

/// Where a configured root lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootSpec {
    /// A directory on local disk.
    Local(PathBuf),
    /// One bucket, optionally narrowed to a key prefix.
    Bucket {
        bucket: String,
        prefix: Option<String>,
    },
    /// Every bucket visible to the credentials.
    Account,
}

impl RootSpec {
    /// Whether this root is served from the object store.
    pub fn is_object_store(&self) -> bool {
        !matches!(self, RootSpec::Local(_))
    }
}

impl FromStr for RootSpec {
    type Err = VfsError;

    /// `s3://` is the account, `s3://bucket[/prefix...]` a bucket, anything
    /// else a local path.
    fn from_str(root: &str) -> Result<Self, Self::Err> {
        if root.is_empty() {
            return Err(VfsError::invalid_config("empty root"));
        }
        let Some(rest) = root.strip_prefix(OBJECT_STORE_SCHEME) else {
            return Ok(RootSpec::Local(PathBuf::from(root)));
        };
        let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
        match BucketScope::from_parts(bucket, prefix) {
            Ok(BucketScope::Account) => Ok(RootSpec::Account),
            Ok(BucketScope::Bucket { bucket, prefix }) => Ok(RootSpec::Bucket { bucket, prefix }),
            Err(_) => Err(VfsError::invalid_config(format!(
                "root {root:?} has a prefix but no bucket"
            ))),
        }
    }
}

impl fmt::Display for RootSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RootSpec::Local(path) => write!(f, "{}", path.display()),
            RootSpec::Account => write!(f, "{OBJECT_STORE_SCHEME}"),
            RootSpec::Bucket {
                bucket,
                prefix: None,
            } => write!(f, "{OBJECT_STORE_SCHEME}{bucket}"),
            RootSpec::Bucket {
                bucket,
                prefix: Some(prefix),
            } => write!(f, "{OBJECT_STORE_SCHEME}{bucket}/{prefix}"),
        }
    }
}

/// Object store connection settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Region used for account-wide calls and unmapped buckets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_region: Option<String>,

    /// Extra regions to build clients for.
    #[serde(default)]
    pub regions: Vec<String>,

    /// Buckets that live outside the default region.
    #[serde(default)]
    pub bucket_regions: BTreeMap<String, String>,

    /// Custom endpoint URL (S3-compatible services).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Address buckets by path instead of virtual host.
    #[serde(default)]
    pub path_style: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_access_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
}

impl StoreConfig {
    /// Every region a client is needed for, default first, deduplicated.
    pub fn all_regions(&self) -> Vec<String> {
        let mut regions: Vec<String> = Vec::new();
        let candidates = self
            .default_region
            .iter()
            .chain(self.regions.iter())
            .chain(self.bucket_regions.values());
        for region in candidates {
            if !regions.contains(region) {
                regions.push(region.clone());
            }
        }
        regions
    }

    /// Override settings from `AWS_*` variables found by `lookup`.
    ///
    /// `AWS_REGION` wins over `AWS_DEFAULT_REGION`.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());
        if let Some(region) = var("AWS_REGION").or_else(|| var("AWS_DEFAULT_REGION")) {
            self.default_region = Some(region);
        }
        if let Some(key) = var("AWS_ACCESS_KEY_ID") {
            self.access_key_id = Some(key);
        }
        if let Some(secret) = var("AWS_SECRET_ACCESS_KEY") {
            self.secret_access_key = Some(secret);
        }
        if let Some(token) = var("AWS_SESSION_TOKEN") {
            self.session_token = Some(token);
        }
        if let Some(endpoint) = var("AWS_ENDPOINT_URL") {
            self.endpoint = Some(endpoint);
        }
    }
}

fn default_max_entries() -> i64 {
    -1
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloeConfig {
    /// Root served when no sites are configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_root: Option<String>,

    /// Additional roots to build filesystems for.
    #[serde(default)]
    pub file_systems: Vec<String>,

    /// Server name → root.
    #[serde(default)]
    pub sites: BTreeMap<String, String>,

    /// Listing cap for object store roots, `-1` for unlimited.
    #[serde(default = "default_max_entries")]
    pub max_directory_entries: i64,

    #[serde(default)]
    pub store: StoreConfig,
}

impl Default for FloeConfig {
    fn default() -> Self {
        Self {
            default_root: None,
            file_systems: Vec::new(),
            sites: BTreeMap::new(),
            max_directory_entries: default_max_entries(),
            store: StoreConfig::default(),
        }
    }
}

impl FloeConfig {
    /// Parse from TOML text.
    pub fn from_toml_str(text: &str) -> VfsResult<Self> {
        toml::from_str(text).map_err(|e| VfsError::invalid_config(e.to_string()))
    }

    /// Read and parse a TOML file.
    pub async fn load(path: &Path) -> VfsResult<Self> {
        let text = tokio::fs::read_to_string(path).await?;
        toml::from_str(&text)
            .map_err(|e| VfsError::invalid_config(format!("{}: {e}", path.display())))
    }

    /// Set the default root.
    pub fn with_default_root(mut self, root: impl Into<String>) -> Self {
        self.default_root = Some(root.into());
        self
    }

    /// Set the listing cap.
    pub fn with_max_directory_entries(mut self, max: i64) -> Self {
        self.max_directory_entries = max;
        self
    }

    /// Apply `AWS_*` overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.store.apply_env_with(|name| std::env::var(name).ok());
    }

    /// Every configured root, default first, deduplicated.
    pub fn roots(&self) -> Vec<&str> {
        let mut roots: Vec<&str> = Vec::new();
        for root in self.default_root.iter().chain(self.file_systems.iter()) {
            if !roots.contains(&root.as_str()) {
                roots.push(root);
            }
        }
        roots
    }

    /// Parsed roots, keyed by their configured string.
    pub fn root_specs(&self) -> VfsResult<Vec<(String, RootSpec)>> {
        self.roots()
            .into_iter()
            .map(|root| root.parse::<RootSpec>().map(|spec| (root.to_string(), spec)))
            .collect()
    }

    /// Whether any root is served from the object store.
    pub fn uses_object_store(&self) -> bool {
        self.roots().iter().any(|root| {
            root.parse::<RootSpec>()
                .map_or(root.starts_with(OBJECT_STORE_SCHEME), |spec| spec.is_object_store())
        })
    }

    /// Check the configuration for mistakes that would fail at startup.
    pub fn validate(&self) -> VfsResult<()> {
        let roots = self.roots();
        if roots.is_empty() {
            return Err(VfsError::invalid_config(
                "no roots configured: set default_root or file_systems",
            ));
        }
        self.root_specs()?;

        for (site, root) in &self.sites {
            if !roots.contains(&root.as_str()) {
                return Err(VfsError::invalid_config(format!(
                    "site {site:?} points at {root:?}, which is not a configured root"
                )));
            }
        }

        if self.max_directory_entries < -1 {
            return Err(VfsError::invalid_config(format!(
                "max_directory_entries must be -1 or non-negative, got {}",
                self.max_directory_entries
            )));
        }

        if self.uses_object_store() && self.store.default_region.is_none() {
            return Err(VfsError::invalid_config(
                "an object store root is configured but no region is set",
            ));
        }
        Ok(())
    }
}

/// Build one filesystem per configured root.
///
/// When any root lives in the object store, the account's buckets are listed
/// once through the router's default client to learn creation dates. A failed
/// listing is logged and tolerated; directories then carry the Unix epoch.
pub async fn build_file_systems(
    config: &FloeConfig,
    router: Option<&RegionRouter>,
    ctx: &OpContext,
) -> VfsResult<BTreeMap<String, Arc<dyn FileSystem>>> {
    config.validate()?;
    let specs = config.root_specs()?;

    let creation_dates = match router {
        Some(router) if config.uses_object_store() => discover_buckets(router, ctx).await,
        _ => HashMap::new(),
    };

    let mut file_systems: BTreeMap<String, Arc<dyn FileSystem>> = BTreeMap::new();
    for (root, spec) in specs {
        let fs: Arc<dyn FileSystem> = match spec {
            RootSpec::Local(path) => Arc::new(LocalBackend::new(path)),
            RootSpec::Bucket { .. } | RootSpec::Account => {
                let router = router.ok_or_else(|| {
                    VfsError::invalid_config(format!(
                        "root {root:?} needs an object store client"
                    ))
                })?;
                let scope = match spec {
                    RootSpec::Bucket { bucket, prefix } => BucketScope::Bucket { bucket, prefix },
                    _ => BucketScope::Account,
                };
                Arc::new(ObjectStoreBackend::new(
                    scope,
                    router.clone(),
                    creation_dates.clone(),
                    config.max_directory_entries,
                )?)
            }
        };
        tracing::info!(root = %root, "file system ready");
        file_systems.insert(root, fs);
    }
    Ok(file_systems)
}

async fn discover_buckets(router: &RegionRouter, ctx: &OpContext) -> HashMap<String, SystemTime> {
    let client = router.default_client();
    let listed = ctx
        .run(async {
            client
                .list_buckets()
                .await
                .map_err(|e| VfsError::backend("list buckets", e))
        })
        .await;
    match listed {
        Ok(buckets) => {
            tracing::debug!(count = buckets.len(), "discovered buckets");
            buckets
                .into_iter()
                .map(|b| (b.name, b.creation_date))
                .collect()
        }
        Err(e) => {
            tracing::warn!(error = %e, "could not list buckets; directory times fall back to the epoch");
            HashMap::new()
        }
    }
}
