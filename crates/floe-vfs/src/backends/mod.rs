//! Filesystem backends.
//!
//! Backends implement [`FileSystem`](crate::FileSystem) for different storage types.

mod local;
mod object_store;

pub use local::LocalBackend;
pub use object_store::{BucketScope, MAX_LIST_PAGES, ObjectStoreBackend};
