//! Shared test clients.

#![allow(dead_code)]

use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use blobfs_kernel::store::{BlobContent, BlobListing, ByteStream, ListOptions, PutOptions};
use blobfs_kernel::{AccessTier, BlobClient, BlobError, BlobProperties, MemoryBlobStore};

/// Per-operation call counts.
#[derive(Debug, Default)]
pub struct Calls {
    pub get: AtomicUsize,
    pub properties: AtomicUsize,
    pub put: AtomicUsize,
    pub delete: AtomicUsize,
    pub copy: AtomicUsize,
    pub list: AtomicUsize,
    pub containers: AtomicUsize,
}

impl Calls {
    pub fn total(&self) -> usize {
        [
            &self.get,
            &self.properties,
            &self.put,
            &self.delete,
            &self.copy,
            &self.list,
            &self.containers,
        ]
        .iter()
        .map(|c| c.load(Ordering::SeqCst))
        .sum()
    }

    pub fn puts(&self) -> usize {
        self.put.load(Ordering::SeqCst)
    }

    pub fn lists(&self) -> usize {
        self.list.load(Ordering::SeqCst)
    }
}

/// Wraps a store, counting calls and optionally failing every one of them
/// with a service error.
pub struct CountingClient {
    inner: Arc<MemoryBlobStore>,
    pub calls: Calls,
    failing: AtomicBool,
    /// Hand bodies back as forward-only readers.
    streaming: bool,
}

impl CountingClient {
    pub fn new(inner: Arc<MemoryBlobStore>) -> Self {
        Self {
            inner,
            calls: Calls::default(),
            failing: AtomicBool::new(false),
            streaming: false,
        }
    }

    /// Like [`CountingClient::new`], but `get_blob` bodies cannot seek.
    pub fn streaming(inner: Arc<MemoryBlobStore>) -> Self {
        Self {
            streaming: true,
            ..Self::new(inner)
        }
    }

    pub fn inner(&self) -> &Arc<MemoryBlobStore> {
        &self.inner
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn tick(&self, counter: &AtomicUsize) -> Result<(), BlobError> {
        counter.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            Err(BlobError::Service("injected failure".into()))
        } else {
            Ok(())
        }
    }
}

impl BlobClient for CountingClient {
    fn get_blob(&self, container: &str, key: &str) -> Result<BlobContent, BlobError> {
        self.tick(&self.calls.get)?;
        let content = self.inner.get_blob(container, key)?;
        if !self.streaming {
            return Ok(content);
        }
        let data = content.body.into_bytes()?;
        Ok(BlobContent {
            properties: content.properties,
            body: ByteStream::Reader(Box::new(std::io::Cursor::new(data))),
        })
    }

    fn get_blob_properties(
        &self,
        container: &str,
        key: &str,
    ) -> Result<BlobProperties, BlobError> {
        self.tick(&self.calls.properties)?;
        self.inner.get_blob_properties(container, key)
    }

    fn put_blob(
        &self,
        container: &str,
        key: &str,
        body: &mut dyn Read,
        options: &PutOptions,
    ) -> Result<(), BlobError> {
        self.tick(&self.calls.put)?;
        self.inner.put_blob(container, key, body, options)
    }

    fn delete_blob(&self, container: &str, key: &str) -> Result<(), BlobError> {
        self.tick(&self.calls.delete)?;
        self.inner.delete_blob(container, key)
    }

    fn copy_blob(
        &self,
        dest_container: &str,
        dest_key: &str,
        src_container: &str,
        src_key: &str,
    ) -> Result<(), BlobError> {
        self.tick(&self.calls.copy)?;
        self.inner
            .copy_blob(dest_container, dest_key, src_container, src_key)
    }

    fn list_blobs(
        &self,
        container: &str,
        options: &ListOptions,
    ) -> Result<BlobListing, BlobError> {
        self.tick(&self.calls.list)?;
        self.inner.list_blobs(container, options)
    }

    fn list_containers(&self, prefix: &str) -> Result<Vec<String>, BlobError> {
        self.tick(&self.calls.containers)?;
        self.inner.list_containers(prefix)
    }

    fn create_container(&self, container: &str, access: AccessTier) -> Result<(), BlobError> {
        self.tick(&self.calls.containers)?;
        self.inner.create_container(container, access)
    }

    fn delete_container(&self, container: &str) -> Result<(), BlobError> {
        self.tick(&self.calls.containers)?;
        self.inner.delete_container(container)
    }
}

/// A counting client over a fresh store holding `bucket`.
pub fn counting(bucket: &str) -> Arc<CountingClient> {
    Arc::new(CountingClient::new(Arc::new(
        MemoryBlobStore::with_containers([bucket]),
    )))
}
