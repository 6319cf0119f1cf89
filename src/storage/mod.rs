//! Filesystem storage for source images and cached variants.
//!
//! Both the source tree and the cache tree are addressed with slash-separated
//! relative paths. Paths are normalized before they touch the filesystem and
//! any path that would escape the storage root is rejected.

mod local;

pub use local::LocalStorage;
