//! Site table: server name → filesystem.
//!
//! Routes a request to the filesystem serving its virtual host. Built once
//! from configuration and never mutated, so lookups need no locking.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::config::FloeConfig;
use crate::error::{VfsError, VfsResult};
use crate::ops::FileSystem;

/// Information about a configured site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteInfo {
    /// Normalized server name (e.g., "docs.example.com").
    pub server_name: String,
    /// Root the site is served from.
    pub root: String,
}

/// Routes server names to filesystems.
///
/// With no sites configured every server name gets the default root. Once
/// any site is configured, only configured names resolve.
pub struct SiteTable {
    default_root: Option<String>,
    /// Server name → root, keyed by normalized name.
    sites: BTreeMap<String, String>,
    /// Root → filesystem.
    file_systems: BTreeMap<String, Arc<dyn FileSystem>>,
}

impl fmt::Debug for SiteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SiteTable")
            .field("default_root", &self.default_root)
            .field("sites", &self.sites)
            .field("roots", &self.file_systems.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SiteTable {
    /// Build a site table.
    ///
    /// Fails if the default root or any site's root has no filesystem.
    pub fn new(
        default_root: Option<String>,
        sites: BTreeMap<String, String>,
        file_systems: BTreeMap<String, Arc<dyn FileSystem>>,
    ) -> VfsResult<Self> {
        if let Some(root) = &default_root
            && !file_systems.contains_key(root)
        {
            return Err(VfsError::invalid_config(format!(
                "default root {root:?} has no file system"
            )));
        }

        let mut normalized = BTreeMap::new();
        for (name, root) in sites {
            if !file_systems.contains_key(&root) {
                return Err(VfsError::invalid_config(format!(
                    "site {name:?} points at {root:?}, which has no file system"
                )));
            }
            normalized.insert(Self::normalize_server_name(&name), root);
        }

        Ok(Self {
            default_root,
            sites: normalized,
            file_systems,
        })
    }

    /// Build from configuration and the filesystems built for it.
    pub fn from_config(
        config: &FloeConfig,
        file_systems: BTreeMap<String, Arc<dyn FileSystem>>,
    ) -> VfsResult<Self> {
        Self::new(config.default_root.clone(), config.sites.clone(), file_systems)
    }

    /// Lowercase, drop any port and trailing dot.
    fn normalize_server_name(name: &str) -> String {
        let name = name.trim();
        let host = match name.rsplit_once(':') {
            Some((host, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => host,
            _ => name,
        };
        host.trim_end_matches('.').to_ascii_lowercase()
    }

    /// Filesystem serving `server_name`.
    pub fn resolve(&self, server_name: &str) -> VfsResult<Arc<dyn FileSystem>> {
        let root = if self.sites.is_empty() {
            self.default_root.as_ref()
        } else {
            self.sites.get(&Self::normalize_server_name(server_name))
        };
        root.and_then(|root| self.file_systems.get(root))
            .cloned()
            .ok_or_else(|| VfsError::NoSite(server_name.to_string()))
    }

    /// Filesystem for a configured root string.
    pub fn root(&self, root: &str) -> Option<Arc<dyn FileSystem>> {
        self.file_systems.get(root).cloned()
    }

    /// The default root, if configured.
    pub fn default_root(&self) -> Option<&str> {
        self.default_root.as_deref()
    }

    /// Every configured site.
    pub fn list_sites(&self) -> Vec<SiteInfo> {
        self.sites
            .iter()
            .map(|(server_name, root)| SiteInfo {
                server_name: server_name.clone(),
                root: root.clone(),
            })
            .collect()
    }

    /// Every root with a filesystem.
    pub fn roots(&self) -> impl Iterator<Item = &str> {
        self.file_systems.keys().map(String::as_str)
    }
}
