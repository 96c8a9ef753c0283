//! Core VFS value types.
//!
//! Both backends produce these fresh on every call. Nothing here is cached
//! or mutated after construction.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// File type enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    /// Regular file.
    File,
    /// Directory, real or synthesized from an object store listing.
    Directory,
}

impl FileType {
    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }

    /// Classify an object store object by its size.
    ///
    /// Zero-byte objects are folder placeholders in the convention used by
    /// most object-storage consoles, so they are reported as directories.
    /// A genuinely empty file is misclassified the same way.
    pub fn for_object_size(size: i64) -> Self {
        if size == 0 {
            FileType::Directory
        } else {
            FileType::File
        }
    }
}

/// Metadata for one path, as returned by `stat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Name as addressed by the caller.
    pub name: String,
    /// Size in bytes. Zero for directories.
    pub size: i64,
    /// Last modification time.
    pub mod_time: SystemTime,
    /// File type.
    pub kind: FileType,
}

impl FileInfo {
    /// Create file metadata.
    pub fn file(name: impl Into<String>, size: i64, mod_time: SystemTime) -> Self {
        Self {
            name: name.into(),
            size,
            mod_time,
            kind: FileType::File,
        }
    }

    /// Create directory metadata.
    pub fn directory(name: impl Into<String>, mod_time: SystemTime) -> Self {
        Self {
            name: name.into(),
            size: 0,
            mod_time,
            kind: FileType::Directory,
        }
    }

    /// Returns true if this is a regular file.
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }
}

/// Directory entry.
///
/// Same shape as [`FileInfo`], scoped to a single `read_dir` result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Entry name, relative to the filesystem root for object stores and
    /// the bare file name for local directories.
    pub name: String,
    /// Size in bytes.
    pub size: i64,
    /// Last modification time.
    pub mod_time: SystemTime,
    /// Entry type.
    pub kind: FileType,
}

impl DirEntry {
    /// Create a new directory entry.
    pub fn new(name: impl Into<String>, kind: FileType, size: i64, mod_time: SystemTime) -> Self {
        Self {
            name: name.into(),
            size,
            mod_time,
            kind,
        }
    }

    /// Create a file entry.
    pub fn file(name: impl Into<String>, size: i64, mod_time: SystemTime) -> Self {
        Self::new(name, FileType::File, size, mod_time)
    }

    /// Create a directory entry.
    pub fn directory(name: impl Into<String>, mod_time: SystemTime) -> Self {
        Self::new(name, FileType::Directory, 0, mod_time)
    }

    /// Returns true if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }
}

impl From<DirEntry> for FileInfo {
    fn from(entry: DirEntry) -> Self {
        Self {
            name: entry.name,
            size: entry.size,
            mod_time: entry.mod_time,
            kind: entry.kind,
        }
    }
}
