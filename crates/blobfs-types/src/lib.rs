//! blobfs-types: pure data types shared by the blobfs driver and its callers.
//!
//! Nothing in here talks to a blob store. The kernel crate builds the driver
//! on top of these:
//!
//! - [`BlobPath`]: a parsed `protocol://bucket/key` path
//! - [`OpenMode`] / [`AccessTier`]: normalized open and mkdir modes
//! - [`StatResult`] / [`StatRecord`]: stat values and their fixed-shape record
//! - [`BlobEntry`] / [`BlobProperties`]: raw records from the remote store
//! - [`VfsError`] / [`BlobError`]: driver and capability errors

mod entry;
mod error;
mod mode;
mod path;
mod stat;

pub use entry::{BlobEntry, BlobProperties};
pub use error::{BlobError, ErrorKind, VfsError};
pub use mode::{AccessTier, OpenMode};
pub use path::{BlobPath, DEFAULT_PROTOCOL};
pub use stat::{DIRECTORY_MODE, EntryKind, FILE_MODE, StatRecord, StatResult};
