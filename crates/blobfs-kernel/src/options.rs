//! Per-call stream options and their resolution.
//!
//! Options come from three places: the call itself, the stream context the
//! caller registered, and the driver's defaults. They merge field by field,
//! first set wins in that order.

use std::fmt;
use std::sync::Arc;

use blobfs_types::{AccessTier, BlobEntry, BlobPath, VfsError};

use crate::cache::MetadataCache;
use crate::store::{BlobClient, PutOptions};

/// Predicate applied to blob entries during directory iteration.
pub type ListFilter = Arc<dyn Fn(&BlobEntry) -> bool + Send + Sync>;

/// Options a caller may attach to an operation.
///
/// Every field is optional; unset fields fall through to the next layer in
/// [`StreamOptions::resolve`].
#[derive(Clone, Default)]
pub struct StreamOptions {
    pub client: Option<Arc<dyn BlobClient>>,
    pub cache: Option<Arc<MetadataCache>>,
    pub seekable: Option<bool>,
    pub delimiter: Option<String>,
    pub list_filter: Option<ListFilter>,
    /// Content type for uploads. Inferred from the key when unset.
    pub content_type: Option<String>,
}

impl StreamOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(mut self, client: Arc<dyn BlobClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_cache(mut self, cache: Arc<MetadataCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn seekable(mut self, seekable: bool) -> Self {
        self.seekable = Some(seekable);
        self
    }

    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    pub fn list_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&BlobEntry) -> bool + Send + Sync + 'static,
    {
        self.list_filter = Some(Arc::new(filter));
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Fill unset fields from `fallback`.
    pub fn or(self, fallback: &StreamOptions) -> Self {
        Self {
            client: self.client.or_else(|| fallback.client.clone()),
            cache: self.cache.or_else(|| fallback.cache.clone()),
            seekable: self.seekable.or(fallback.seekable),
            delimiter: self.delimiter.or_else(|| fallback.delimiter.clone()),
            list_filter: self.list_filter.or_else(|| fallback.list_filter.clone()),
            content_type: self.content_type.or_else(|| fallback.content_type.clone()),
        }
    }

    /// Merge with precedence `per_call > context > defaults`.
    pub fn resolve(
        per_call: Option<&StreamOptions>,
        context: Option<&StreamOptions>,
        defaults: &StreamOptions,
    ) -> StreamOptions {
        let mut merged = per_call.cloned().unwrap_or_default();
        if let Some(context) = context {
            merged = merged.or(context);
        }
        merged.or(defaults)
    }
}

impl fmt::Debug for StreamOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamOptions")
            .field("client", &self.client.as_ref().map(|_| "<client>"))
            .field("cache", &self.cache)
            .field("seekable", &self.seekable)
            .field("delimiter", &self.delimiter)
            .field("list_filter", &self.list_filter.as_ref().map(|_| "<fn>"))
            .field("content_type", &self.content_type)
            .finish()
    }
}

/// A parsed path together with the options that apply to it.
#[derive(Debug, Clone)]
pub struct ResolvedOptions {
    pub path: BlobPath,
    pub options: StreamOptions,
}

/// Parameters safe to hand to a remote store call: no client, cache or
/// handle behavior, only what describes the object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentParams {
    pub bucket: String,
    pub key: Option<String>,
    /// Delimiter in effect, default applied.
    pub delimiter: String,
    pub content_type: Option<String>,
}

impl ContentParams {
    pub fn put_options(&self, access_tier: Option<AccessTier>) -> PutOptions {
        PutOptions {
            content_type: self.content_type.clone(),
            access_tier,
        }
    }
}

impl ResolvedOptions {
    pub fn new(path: BlobPath, options: StreamOptions) -> Self {
        Self { path, options }
    }

    pub fn client(&self) -> Result<Arc<dyn BlobClient>, VfsError> {
        self.options.client.clone().ok_or_else(|| {
            VfsError::UnsupportedOperation(format!(
                "no blob client configured for {}",
                self.path.protocol
            ))
        })
    }

    pub fn cache(&self) -> Option<Arc<MetadataCache>> {
        self.options.cache.clone()
    }

    pub fn seekable(&self) -> bool {
        self.options.seekable.unwrap_or(false)
    }

    /// Delimiter in effect; `/` unless overridden.
    pub fn delimiter(&self) -> &str {
        self.options.delimiter.as_deref().unwrap_or("/")
    }

    /// Strip everything that is not a content parameter.
    pub fn content_only(&self) -> ContentParams {
        ContentParams {
            bucket: self.path.bucket.clone(),
            key: self.path.key.clone(),
            delimiter: self.delimiter().to_string(),
            content_type: self.options.content_type.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBlobStore;

    #[test]
    fn test_resolve_precedence() {
        let defaults = StreamOptions::new().seekable(false).delimiter("/");
        let context = StreamOptions::new().seekable(true).content_type("text/plain");
        let per_call = StreamOptions::new().delimiter("|");

        let merged = StreamOptions::resolve(Some(&per_call), Some(&context), &defaults);
        assert_eq!(merged.delimiter.as_deref(), Some("|"));
        assert_eq!(merged.seekable, Some(true));
        assert_eq!(merged.content_type.as_deref(), Some("text/plain"));
    }

    #[test]
    fn test_resolve_defaults_only() {
        let client: Arc<dyn BlobClient> = Arc::new(MemoryBlobStore::new());
        let defaults = StreamOptions::new().with_client(client);
        let merged = StreamOptions::resolve(None, None, &defaults);
        assert!(merged.client.is_some());
        assert!(merged.cache.is_none());
    }

    #[test]
    fn test_content_only_strips_handle_options() {
        let client: Arc<dyn BlobClient> = Arc::new(MemoryBlobStore::new());
        let resolved = ResolvedOptions::new(
            BlobPath::parse("blob://b/k.txt"),
            StreamOptions::new()
                .with_client(client)
                .with_cache(Arc::new(MetadataCache::default()))
                .seekable(true)
                .content_type("text/plain"),
        );
        let params = resolved.content_only();
        assert_eq!(
            params,
            ContentParams {
                bucket: "b".into(),
                key: Some("k.txt".into()),
                delimiter: "/".into(),
                content_type: Some("text/plain".into()),
            }
        );
        assert_eq!(
            params.put_options(Some(AccessTier::Private)),
            PutOptions {
                content_type: Some("text/plain".into()),
                access_tier: Some(AccessTier::Private),
            }
        );
    }

    #[test]
    fn test_missing_client_is_unsupported() {
        let resolved = ResolvedOptions::new(BlobPath::parse("blob://b/k"), StreamOptions::new());
        let err = resolved.client().err().unwrap();
        assert_eq!(err.kind(), blobfs_types::ErrorKind::UnsupportedOperation);
    }
}
