//! Filesystem operations over a blob store.
//!
//! [`BlobFs`] is one mounted driver: a client, a metadata cache, and the
//! settings from [`DriverConfig`]. Directories do not exist in the store;
//! they are emulated from key prefixes and zero-byte placeholder blobs whose
//! key ends in the delimiter.

use std::io::{self, Read};
use std::sync::Arc;

use blobfs_types::{AccessTier, BlobError, StatResult, VfsError};
use tracing::debug;

use crate::cache::{CachedStat, MetadataCache};
use crate::config::DriverConfig;
use crate::dir::DirectoryIterator;
use crate::options::{ResolvedOptions, StreamOptions};
use crate::store::{BlobClient, ListOptions, blob_exists, container_exists};
use crate::stream::StreamHandle;

/// One mounted blob filesystem.
pub struct BlobFs {
    client: Arc<dyn BlobClient>,
    cache: Arc<MetadataCache>,
    config: DriverConfig,
    defaults: StreamOptions,
}

impl BlobFs {
    /// Mount `client` with a fresh cache sized from `config`.
    pub fn new(client: Arc<dyn BlobClient>, config: DriverConfig) -> Self {
        let cache = Arc::new(MetadataCache::new(config.cache.max_items));
        Self::with_cache(client, config, cache)
    }

    /// Mount `client` sharing an existing cache.
    pub fn with_cache(
        client: Arc<dyn BlobClient>,
        config: DriverConfig,
        cache: Arc<MetadataCache>,
    ) -> Self {
        let defaults = StreamOptions::new()
            .with_client(client.clone())
            .with_cache(cache.clone())
            .seekable(config.seekable)
            .delimiter(config.delimiter.clone());
        Self {
            client,
            cache,
            config,
            defaults,
        }
    }

    pub fn protocol(&self) -> &str {
        &self.config.protocol
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn client(&self) -> &Arc<dyn BlobClient> {
        &self.client
    }

    pub fn cache(&self) -> &Arc<MetadataCache> {
        &self.cache
    }

    /// Parse `path` and merge caller options over the driver defaults.
    pub fn resolve(&self, path: &str, options: Option<&StreamOptions>) -> ResolvedOptions {
        ResolvedOptions::new(
            blobfs_types::BlobPath::parse(path),
            StreamOptions::resolve(options, None, &self.defaults),
        )
    }

    fn invalidate(&self, resolved: &ResolvedOptions) {
        if let Some(cache) = resolved.cache() {
            cache.invalidate(&resolved.path);
        }
    }

    // --- stat ---

    pub fn stat(&self, path: &str) -> Result<StatResult, VfsError> {
        self.stat_with(path, None)
    }

    /// Stat a path, consulting the cache first.
    ///
    /// Hits and misses are both cached; a cached miss answers `NotFound`
    /// without a remote call.
    pub fn stat_with(
        &self,
        path: &str,
        options: Option<&StreamOptions>,
    ) -> Result<StatResult, VfsError> {
        let resolved = self.resolve(path, options);
        let key = resolved.path.cache_key();
        let cache = resolved.cache();

        if let Some(hit) = cache.as_ref().and_then(|c| c.get(&key)) {
            debug!(path = %key, "stat cache hit");
            return match hit {
                CachedStat::Found(stat) => Ok(stat),
                CachedStat::Missing => Err(VfsError::NotFound(resolved.path.to_string())),
            };
        }

        let result = self.stat_remote(&resolved);
        if let Some(cache) = cache {
            let ttl = self.config.cache.stat_ttl();
            match &result {
                Ok(stat) => cache.set(key, CachedStat::Found(*stat), ttl),
                Err(e) if e.is_not_found() => cache.set(key, CachedStat::Missing, ttl),
                Err(_) => {}
            }
        }
        result
    }

    fn stat_remote(&self, resolved: &ResolvedOptions) -> Result<StatResult, VfsError> {
        let path = &resolved.path;
        if path.is_protocol_root() {
            return Ok(StatResult::directory());
        }
        let client = resolved.client()?;
        let bucket = path.bucket.as_str();

        let Some(key) = path.key() else {
            debug!(bucket, "stat bucket");
            return if container_exists(client.as_ref(), bucket)? {
                Ok(StatResult::directory())
            } else {
                Err(VfsError::NotFound(path.to_string()))
            };
        };

        let delimiter = resolved.delimiter();
        let dir_prefix = (!delimiter.is_empty())
            .then(|| path.dir_prefix(delimiter))
            .flatten();

        debug!(bucket, key, "stat key");
        let listing = client.list_blobs(bucket, &ListOptions::with_prefix(key).max_results(1))?;
        if let Some(first) = listing.first_blob() {
            let under_dir = dir_prefix
                .as_deref()
                .is_some_and(|prefix| first.name.starts_with(prefix));
            if first.name != key && under_dir {
                return Ok(StatResult::directory());
            }
            if first.name == key && first.is_placeholder() && under_dir {
                return Ok(StatResult::directory());
            }
        }

        match client.get_blob_properties(bucket, key) {
            Ok(properties) => Ok(properties.to_stat()),
            Err(e) if e.is_not_found() => {
                if let Some(prefix) = dir_prefix.as_deref() {
                    let children =
                        client.list_blobs(bucket, &ListOptions::with_prefix(prefix).max_results(1))?;
                    if !children.is_empty() {
                        return Ok(StatResult::directory());
                    }
                }
                Err(VfsError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// True iff a blob with exactly this key exists.
    pub fn exists_as_blob(&self, path: &str) -> Result<bool, VfsError> {
        let resolved = self.resolve(path, None);
        let (bucket, key) = resolved.path.require_key()?;
        Ok(blob_exists(resolved.client()?.as_ref(), bucket, key)?)
    }

    pub fn container_exists(&self, bucket: &str) -> Result<bool, VfsError> {
        Ok(container_exists(self.client.as_ref(), bucket)?)
    }

    // --- directories ---

    pub fn opendir(&self, path: &str) -> Result<DirectoryIterator, VfsError> {
        self.opendir_with(path, None)
    }

    /// List the children of a bucket or pseudo-directory.
    pub fn opendir_with(
        &self,
        path: &str,
        options: Option<&StreamOptions>,
    ) -> Result<DirectoryIterator, VfsError> {
        let resolved = self.resolve(path, options);
        resolved.path.require_bucket()?;
        let params = resolved.content_only();
        DirectoryIterator::open(
            resolved.client()?,
            params.bucket,
            params.key.as_deref(),
            params.delimiter,
            self.config.page_size,
            resolved.options.list_filter.clone(),
        )
    }

    pub fn mkdir(&self, path: &str, mode: u32, recursive: bool) -> Result<(), VfsError> {
        self.mkdir_with(path, mode, recursive, None)
    }

    /// Create a bucket, or a pseudo-directory placeholder.
    ///
    /// `mode` only picks the access tier. `recursive` is accepted for
    /// signature compatibility; keys need no parent placeholders.
    pub fn mkdir_with(
        &self,
        path: &str,
        mode: u32,
        _recursive: bool,
        options: Option<&StreamOptions>,
    ) -> Result<(), VfsError> {
        let resolved = self.resolve(path, options);
        let bucket = resolved.path.require_bucket()?;
        let client = resolved.client()?;
        let tier = AccessTier::from_mode(mode);
        self.invalidate(&resolved);

        if resolved.path.key().is_none() {
            debug!(bucket, %tier, "creating bucket");
            if container_exists(client.as_ref(), bucket)? {
                return Err(VfsError::AlreadyExists(resolved.path.to_string()));
            }
            return client.create_container(bucket, tier).map_err(|e| match e {
                BlobError::ContainerAlreadyExists(_) => {
                    VfsError::AlreadyExists(resolved.path.to_string())
                }
                other => other.into(),
            });
        }

        let delimiter = resolved.delimiter();
        if delimiter.is_empty() {
            return Err(VfsError::UnsupportedOperation(
                "pseudo-directories need a non-empty delimiter".to_string(),
            ));
        }
        let Some(placeholder) = resolved.path.dir_prefix(delimiter) else {
            return Err(VfsError::InvalidPath(resolved.path.to_string()));
        };
        if blob_exists(client.as_ref(), bucket, &placeholder)? {
            debug!(bucket, %placeholder, "placeholder already present");
            return Ok(());
        }

        debug!(bucket, %placeholder, %tier, "creating placeholder");
        client.put_blob(
            bucket,
            &placeholder,
            &mut io::empty(),
            &resolved.content_only().put_options(Some(tier)),
        )?;
        Ok(())
    }

    pub fn rmdir(&self, path: &str) -> Result<(), VfsError> {
        self.rmdir_with(path, None)
    }

    /// Remove a bucket, or an empty pseudo-directory.
    ///
    /// A directory holding anything besides its own placeholder is rejected
    /// with `DirectoryNotEmpty`.
    pub fn rmdir_with(&self, path: &str, options: Option<&StreamOptions>) -> Result<(), VfsError> {
        let resolved = self.resolve(path, options);
        let bucket = resolved.path.require_bucket()?;
        let client = resolved.client()?;
        self.invalidate(&resolved);

        if resolved.path.key().is_none() {
            debug!(bucket, "deleting bucket");
            client.delete_container(bucket)?;
            if let Some(cache) = resolved.cache() {
                cache.invalidate_tree(&resolved.path);
            }
            return Ok(());
        }

        let delimiter = resolved.delimiter();
        let Some(prefix) = resolved.path.dir_prefix(delimiter) else {
            return Err(VfsError::InvalidPath(resolved.path.to_string()));
        };
        let listing = client.list_blobs(bucket, &ListOptions::with_prefix(&prefix).max_results(2))?;
        let blobs: Vec<_> = listing.blobs().collect();
        match blobs.as_slice() {
            [] => Ok(()),
            [only] if only.name == prefix => {
                debug!(bucket, %prefix, "deleting placeholder");
                client.delete_blob(bucket, &prefix)?;
                Ok(())
            }
            _ => Err(VfsError::DirectoryNotEmpty(resolved.path.to_string())),
        }
    }

    // --- mutation ---

    pub fn rename(&self, from: &str, to: &str) -> Result<(), VfsError> {
        self.rename_with(from, to, None)
    }

    /// Copy `from` to `to` with its metadata, then delete `from`.
    ///
    /// Not atomic: a failure after the copy leaves both blobs in place.
    pub fn rename_with(
        &self,
        from: &str,
        to: &str,
        options: Option<&StreamOptions>,
    ) -> Result<(), VfsError> {
        let source = self.resolve(from, options);
        let dest = self.resolve(to, options);
        if !source.path.protocol.eq_ignore_ascii_case(&dest.path.protocol) {
            return Err(VfsError::UnsupportedOperation(format!(
                "cannot rename across protocols: {} -> {}",
                source.path, dest.path
            )));
        }
        let (Some(src_key), Some(dest_key)) = (source.path.key(), dest.path.key()) else {
            return Err(VfsError::UnsupportedOperation(format!(
                "rename needs a key on both sides: {} -> {}",
                source.path, dest.path
            )));
        };
        let src_bucket = source.path.require_bucket()?;
        let dest_bucket = dest.path.require_bucket()?;
        let client = source.client()?;
        if src_bucket == dest_bucket && src_key == dest_key {
            debug!(path = %source.path, "rename onto itself, nothing to do");
            return Ok(());
        }

        self.invalidate(&source);
        self.invalidate(&dest);

        debug!(from = %source.path, to = %dest.path, "rename via copy+delete");
        client.copy_blob(dest_bucket, dest_key, src_bucket, src_key)?;
        client.delete_blob(src_bucket, src_key)?;
        Ok(())
    }

    pub fn unlink(&self, path: &str) -> Result<(), VfsError> {
        self.unlink_with(path, None)
    }

    pub fn unlink_with(&self, path: &str, options: Option<&StreamOptions>) -> Result<(), VfsError> {
        let resolved = self.resolve(path, options);
        let (bucket, key) = resolved.path.require_key()?;
        let client = resolved.client()?;
        self.invalidate(&resolved);
        debug!(bucket, key, "unlink");
        client.delete_blob(bucket, key)?;
        Ok(())
    }

    // --- streams ---

    pub fn open(&self, path: &str, mode: &str) -> Result<StreamHandle, VfsError> {
        self.open_with(path, mode, None)
    }

    pub fn open_with(
        &self,
        path: &str,
        mode: &str,
        options: Option<&StreamOptions>,
    ) -> Result<StreamHandle, VfsError> {
        let resolved = self.resolve(path, options);
        StreamHandle::open(&resolved, mode, self.config.spool_threshold)
    }

    /// Read a whole blob.
    pub fn read_to_vec(&self, path: &str) -> Result<Vec<u8>, VfsError> {
        let mut handle = self.open(path, "r")?;
        let mut data = Vec::new();
        handle.read_to_end(&mut data)?;
        handle.close()?;
        Ok(data)
    }

    /// Create or replace a blob with `data`.
    pub fn write_all(&self, path: &str, data: &[u8]) -> Result<(), VfsError> {
        let mut handle = self.open(path, "w")?;
        handle.write(data)?;
        handle.close()
    }
}

impl std::fmt::Debug for BlobFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobFs")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .finish()
    }
}
