//! Local filesystem backend.
//!
//! Read-only view of a directory tree. Paths are cleaned lexically before
//! being joined to the root, so `..` can never climb above it.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;

use crate::context::OpContext;
use crate::error::{VfsError, VfsResult};
use crate::ops::{FileSystem, ReadStream};
use crate::path;
use crate::types::{DirEntry, FileInfo, FileType};

/// Local filesystem backend.
///
/// All operations are relative to `root`. For example, if `root` is
/// `/srv/www`, then `stat("docs/index.html")` looks at
/// `/srv/www/docs/index.html`. Nothing is cached between calls.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    /// Create a local filesystem rooted at the given path.
    ///
    /// The root is canonicalized at construction time to handle symlinks
    /// (e.g. macOS `/tmp` → `/private/tmp`).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = root.into();
        let root = root.canonicalize().unwrap_or(root);
        Self { root }
    }

    /// Get the root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a virtual path to a host path under the root.
    fn resolve(&self, name: &str) -> PathBuf {
        let cleaned = path::clean(&format!("/{name}"));
        if path::is_root(&cleaned) {
            self.root.clone()
        } else {
            self.root.join(cleaned.trim_start_matches('/'))
        }
    }

    fn mod_time(meta: &std::fs::Metadata) -> SystemTime {
        meta.modified().unwrap_or(SystemTime::UNIX_EPOCH)
    }

    fn kind(meta: &std::fs::Metadata) -> FileType {
        if meta.is_dir() {
            FileType::Directory
        } else {
            FileType::File
        }
    }
}

#[async_trait]
impl FileSystem for LocalBackend {
    fn join(&self, segments: &[&str]) -> String {
        path::join(segments)
    }

    async fn stat(&self, ctx: &OpContext, name: &str) -> VfsResult<FileInfo> {
        let full_path = self.resolve(name);
        let meta = ctx
            .run(async { fs::metadata(&full_path).await.map_err(VfsError::from) })
            .await?;

        let base = full_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "/".to_string());
        Ok(FileInfo {
            name: base,
            size: meta.len() as i64,
            mod_time: Self::mod_time(&meta),
            kind: Self::kind(&meta),
        })
    }

    async fn read_dir(&self, ctx: &OpContext, name: &str) -> VfsResult<Vec<DirEntry>> {
        let full_path = self.resolve(name);
        ctx.run(async {
            let mut entries = Vec::new();
            let mut dir = fs::read_dir(&full_path).await?;

            while let Some(entry) = dir.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                // Follows symlinks like stat; an entry whose target vanished
                // is still listed, with unknown size.
                let entry = match fs::metadata(entry.path()).await {
                    Ok(meta) => DirEntry::new(
                        name,
                        Self::kind(&meta),
                        meta.len() as i64,
                        Self::mod_time(&meta),
                    ),
                    Err(_) => DirEntry::new(name, FileType::File, -1, SystemTime::UNIX_EPOCH),
                };
                entries.push(entry);
            }
            Ok(entries)
        })
        .await
    }

    async fn open(&self, ctx: &OpContext, name: &str) -> VfsResult<Box<dyn ReadStream>> {
        let full_path = self.resolve(name);
        let file = ctx
            .run(async { fs::File::open(&full_path).await.map_err(VfsError::from) })
            .await?;
        Ok(Box::new(file))
    }
}
