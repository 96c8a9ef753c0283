//! Read-only virtual filesystem over local disk and object stores.
//!
//! Callers address content by slash-separated path whether it lives in a
//! directory tree or in a flat, key-addressed object store. Key components:
//!
//! - [`FileSystem`] - the read-only operations every backend supports
//! - [`LocalBackend`] - rooted view of a local directory
//! - [`ObjectStoreBackend`] - a bucket, bucket prefix, or whole account
//! - [`RangeReader`] - seekable stream over byte-range fetches
//! - [`SiteTable`] - routes server names to configured roots
//!
//! ## Design Decisions
//!
//! - **Directories are inferred**: object stores have none, so common
//!   prefixes and zero-byte placeholder objects stand in for them.
//! - **Nothing is cached**: every call reaches the backend.
//! - **Bounded listings**: at most [`MAX_LIST_PAGES`] pages per `read_dir`,
//!   optionally capped further by a configured entry limit.
//! - **Cancellable**: every remote call races the caller's [`OpContext`].

pub mod backends;
pub mod config;
mod context;
mod error;
mod ops;
pub mod path;
mod reader;
mod sites;
pub mod store;
mod types;

pub use backends::{BucketScope, LocalBackend, MAX_LIST_PAGES, ObjectStoreBackend};
pub use config::{FloeConfig, RootSpec, StoreConfig, build_file_systems};
pub use context::OpContext;
pub use error::{VfsError, VfsResult};
pub use ops::{FileSystem, ReadStream};
pub use reader::{RangeFetch, RangeReader};
pub use sites::{SiteInfo, SiteTable};
pub use store::{MemoryStore, ObjectStore, RegionRouter, StoreError};
pub use types::{DirEntry, FileInfo, FileType};
