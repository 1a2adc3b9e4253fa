//! Blob stores the driver can run against.
//!
//! The driver only ever sees the [`BlobClient`] capability. Two stores ship
//! with the crate:
//!
//! - **MemoryBlobStore**: in-process, ephemeral (tests, embedding)
//! - **LocalBlobStore**: containers as directories under a root (development,
//!   the `blobfs` CLI)
//!
//! Production stores (Azure, S3, ...) implement the same trait outside this
//! crate.

mod local;
mod memory;
mod traits;

pub use local::LocalBlobStore;
pub use memory::MemoryBlobStore;
pub use traits::{
    BlobClient, BlobContent, BlobListing, ByteStream, DEFAULT_MAX_RESULTS, ListItem, ListOptions,
    PutOptions, blob_exists, container_exists,
};
