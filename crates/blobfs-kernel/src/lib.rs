//! blobfs-kernel: filesystem semantics over flat blob storage.
//!
//! This crate provides:
//!
//! - **Store**: the `BlobClient` capability plus in-memory and directory-backed stores
//! - **Cache**: bounded LRU + TTL cache of stat results
//! - **Stream**: open-file handles with local staging for writes
//! - **Dir**: paginated directory iteration with placeholder filtering
//! - **Fs**: stat, mkdir/rmdir, rename, unlink over pseudo-directories
//! - **Wrapper**: the boolean stream-wrapper shim and the protocol registry
//!
//! ```
//! use std::sync::Arc;
//! use blobfs_kernel::{BlobFs, DriverConfig, MemoryBlobStore};
//!
//! let store = Arc::new(MemoryBlobStore::with_containers(["bucket"]));
//! let fs = BlobFs::new(store, DriverConfig::default());
//! fs.write_all("blob://bucket/docs/readme.txt", b"hello").unwrap();
//! assert_eq!(fs.stat("blob://bucket/docs/readme.txt").unwrap().size, 5);
//! assert!(fs.stat("blob://bucket/docs").unwrap().is_dir());
//! ```

pub mod cache;
pub mod config;
pub mod content_type;
pub mod dir;
pub mod fs;
pub mod options;
pub mod store;
pub mod stream;
pub mod wrapper;

pub use cache::{CachedStat, MetadataCache};
pub use config::{ConfigError, DriverConfig};
pub use dir::{DirEntry, DirectoryIterator};
pub use fs::BlobFs;
pub use options::{ListFilter, StreamOptions};
pub use store::{BlobClient, LocalBlobStore, MemoryBlobStore};
pub use stream::StreamHandle;
pub use wrapper::{DriverRegistry, StatFlags, StreamWrapper, Whence};

pub use blobfs_types::{
    AccessTier, BlobEntry, BlobError, BlobPath, BlobProperties, EntryKind, ErrorKind, OpenMode,
    StatRecord, StatResult, VfsError,
};
