//! In-memory blob store.
//!
//! Used for tests and embedding. All data is ephemeral.

use std::collections::BTreeMap;
use std::io::Read;

use blobfs_types::{AccessTier, BlobEntry, BlobError, BlobProperties};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::traits::{BlobClient, BlobContent, BlobListing, ByteStream, ListOptions, PutOptions};

/// A stored blob.
#[derive(Debug, Clone)]
struct StoredBlob {
    data: Vec<u8>,
    content_type: Option<String>,
    modified: DateTime<Utc>,
}

impl StoredBlob {
    fn properties(&self) -> BlobProperties {
        BlobProperties {
            content_length: self.data.len() as u64,
            last_modified: self.modified,
            content_type: self.content_type.clone(),
        }
    }

    fn entry(&self, name: &str) -> BlobEntry {
        BlobEntry::new(name, self.data.len() as u64, self.modified)
    }
}

#[derive(Debug, Default)]
struct Container {
    access: Option<AccessTier>,
    blobs: BTreeMap<String, StoredBlob>,
}

/// In-memory blob store.
///
/// Thread-safe via an internal `RwLock`. Keys are kept sorted, so listings
/// come back in key order like a real store's.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    containers: RwLock<BTreeMap<String, Container>>,
}

impl MemoryBlobStore {
    /// Create an empty store with no containers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with the given containers already present.
    pub fn with_containers<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        {
            let mut containers = store.containers.write();
            for name in names {
                containers.insert(name.into(), Container::default());
            }
        }
        store
    }

    /// Number of blobs in a container, placeholders included.
    pub fn blob_count(&self, container: &str) -> usize {
        self.containers
            .read()
            .get(container)
            .map_or(0, |c| c.blobs.len())
    }

    /// Access tier the container was created with. `None` for containers
    /// seeded through [`MemoryBlobStore::with_containers`].
    pub fn access_tier(&self, container: &str) -> Option<AccessTier> {
        self.containers
            .read()
            .get(container)
            .and_then(|c| c.access)
    }

    /// Content type recorded for a blob.
    pub fn content_type(&self, container: &str, key: &str) -> Option<String> {
        self.containers
            .read()
            .get(container)
            .and_then(|c| c.blobs.get(key))
            .and_then(|b| b.content_type.clone())
    }
}

impl BlobClient for MemoryBlobStore {
    fn get_blob(&self, container: &str, key: &str) -> Result<BlobContent, BlobError> {
        let containers = self.containers.read();
        let blob = containers
            .get(container)
            .ok_or_else(|| BlobError::ContainerNotFound(container.to_string()))?
            .blobs
            .get(key)
            .ok_or_else(|| BlobError::blob_not_found(container, key))?;

        Ok(BlobContent {
            properties: blob.properties(),
            body: ByteStream::Buffered(blob.data.clone()),
        })
    }

    fn get_blob_properties(
        &self,
        container: &str,
        key: &str,
    ) -> Result<BlobProperties, BlobError> {
        let containers = self.containers.read();
        containers
            .get(container)
            .ok_or_else(|| BlobError::ContainerNotFound(container.to_string()))?
            .blobs
            .get(key)
            .map(StoredBlob::properties)
            .ok_or_else(|| BlobError::blob_not_found(container, key))
    }

    fn put_blob(
        &self,
        container: &str,
        key: &str,
        body: &mut dyn Read,
        options: &PutOptions,
    ) -> Result<(), BlobError> {
        // Drain the body before taking the lock.
        let mut data = Vec::new();
        body.read_to_end(&mut data)?;

        let mut containers = self.containers.write();
        let target = containers
            .get_mut(container)
            .ok_or_else(|| BlobError::ContainerNotFound(container.to_string()))?;
        target.blobs.insert(
            key.to_string(),
            StoredBlob {
                data,
                content_type: options.content_type.clone(),
                modified: Utc::now(),
            },
        );
        Ok(())
    }

    fn delete_blob(&self, container: &str, key: &str) -> Result<(), BlobError> {
        let mut containers = self.containers.write();
        containers
            .get_mut(container)
            .ok_or_else(|| BlobError::ContainerNotFound(container.to_string()))?
            .blobs
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| BlobError::blob_not_found(container, key))
    }

    fn copy_blob(
        &self,
        dest_container: &str,
        dest_key: &str,
        src_container: &str,
        src_key: &str,
    ) -> Result<(), BlobError> {
        let mut containers = self.containers.write();
        let source = containers
            .get(src_container)
            .ok_or_else(|| BlobError::ContainerNotFound(src_container.to_string()))?
            .blobs
            .get(src_key)
            .cloned()
            .ok_or_else(|| BlobError::blob_not_found(src_container, src_key))?;

        containers
            .get_mut(dest_container)
            .ok_or_else(|| BlobError::ContainerNotFound(dest_container.to_string()))?
            .blobs
            .insert(dest_key.to_string(), source);
        Ok(())
    }

    fn list_blobs(
        &self,
        container: &str,
        options: &ListOptions,
    ) -> Result<BlobListing, BlobError> {
        let containers = self.containers.read();
        let blobs = &containers
            .get(container)
            .ok_or_else(|| BlobError::ContainerNotFound(container.to_string()))?
            .blobs;

        // BTreeMap iteration is already in key order.
        let start = match (options.prefix.as_deref(), options.marker.as_deref()) {
            (Some(prefix), Some(marker)) => prefix.max(marker),
            (Some(prefix), None) => prefix,
            (None, Some(marker)) => marker,
            (None, None) => "",
        };
        let entries = blobs
            .range(start.to_string()..)
            .map(|(name, blob)| blob.entry(name));
        Ok(BlobListing::paginate(entries, options))
    }

    fn list_containers(&self, prefix: &str) -> Result<Vec<String>, BlobError> {
        Ok(self
            .containers
            .read()
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn create_container(&self, container: &str, access: AccessTier) -> Result<(), BlobError> {
        let mut containers = self.containers.write();
        if containers.contains_key(container) {
            return Err(BlobError::ContainerAlreadyExists(container.to_string()));
        }
        containers.insert(
            container.to_string(),
            Container {
                access: Some(access),
                blobs: BTreeMap::new(),
            },
        );
        Ok(())
    }

    fn delete_container(&self, container: &str) -> Result<(), BlobError> {
        self.containers
            .write()
            .remove(container)
            .map(|_| ())
            .ok_or_else(|| BlobError::ContainerNotFound(container.to_string()))
    }
}
