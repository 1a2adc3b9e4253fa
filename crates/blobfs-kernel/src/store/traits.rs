//! The blob-store capability and its request/response types.

use std::fmt;
use std::io::{self, Read};

use blobfs_types::{AccessTier, BlobEntry, BlobError, BlobProperties};

/// Page size a store uses when the caller does not ask for one.
pub const DEFAULT_MAX_RESULTS: usize = 5000;

/// Body of a fetched blob.
pub enum ByteStream {
    /// Fully materialized payload. Natively seekable.
    Buffered(Vec<u8>),
    /// Forward-only reader, e.g. a response body still on the wire.
    Reader(Box<dyn Read + Send>),
}

impl ByteStream {
    pub fn is_seekable(&self) -> bool {
        matches!(self, Self::Buffered(_))
    }

    /// Drain the body into memory.
    pub fn into_bytes(self) -> io::Result<Vec<u8>> {
        match self {
            Self::Buffered(data) => Ok(data),
            Self::Reader(mut reader) => {
                let mut data = Vec::new();
                reader.read_to_end(&mut data)?;
                Ok(data)
            }
        }
    }
}

impl fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buffered(data) => f.debug_tuple("Buffered").field(&data.len()).finish(),
            Self::Reader(_) => f.debug_tuple("Reader").finish(),
        }
    }
}

/// Result of a `get_blob` call.
#[derive(Debug)]
pub struct BlobContent {
    pub properties: BlobProperties,
    pub body: ByteStream,
}

/// Options for creating a blob.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutOptions {
    pub content_type: Option<String>,
    pub access_tier: Option<AccessTier>,
}

/// Parameters of a blob listing call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Only keys starting with this prefix.
    pub prefix: Option<String>,
    /// Group keys sharing `prefix + segment + delimiter` into one common prefix.
    pub delimiter: Option<String>,
    /// Continuation token from a previous page.
    pub marker: Option<String>,
    pub max_results: Option<usize>,
}

impl ListOptions {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            ..Self::default()
        }
    }

    pub fn max_results(mut self, max: usize) -> Self {
        self.max_results = Some(max);
        self
    }

    pub fn marker(mut self, marker: Option<String>) -> Self {
        self.marker = marker;
        self
    }

    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        let delimiter = delimiter.into();
        self.delimiter = if delimiter.is_empty() {
            None
        } else {
            Some(delimiter)
        };
        self
    }
}

/// One record of a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListItem {
    Blob(BlobEntry),
    /// Common prefix (ends with the delimiter). Only produced when the
    /// listing was delimited.
    Prefix(String),
}

impl ListItem {
    pub fn name(&self) -> &str {
        match self {
            Self::Blob(entry) => &entry.name,
            Self::Prefix(prefix) => prefix,
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlobListing {
    /// Blobs and common prefixes, in key order.
    pub items: Vec<ListItem>,
    /// Set when more results remain.
    pub next_marker: Option<String>,
}

impl BlobListing {
    pub fn blobs(&self) -> impl Iterator<Item = &BlobEntry> {
        self.items.iter().filter_map(|item| match item {
            ListItem::Blob(entry) => Some(entry),
            ListItem::Prefix(_) => None,
        })
    }

    pub fn first_blob(&self) -> Option<&BlobEntry> {
        self.blobs().next()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Build a page from entries sorted by name.
    ///
    /// Applies prefix, marker, delimiter grouping and the page limit the way
    /// a remote listing endpoint does. The marker is the key the next page
    /// starts at (inclusive), so pages never overlap.
    pub fn paginate<I>(entries: I, options: &ListOptions) -> Self
    where
        I: IntoIterator<Item = BlobEntry>,
    {
        let prefix = options.prefix.as_deref().unwrap_or("");
        let delimiter = options.delimiter.as_deref().filter(|d| !d.is_empty());
        let max = options.max_results.unwrap_or(DEFAULT_MAX_RESULTS).max(1);

        let mut listing = BlobListing::default();
        let mut last_prefix: Option<String> = None;

        for entry in entries {
            if !entry.name.starts_with(prefix) {
                continue;
            }
            if let Some(marker) = options.marker.as_deref() {
                if entry.name.as_str() < marker {
                    continue;
                }
            }

            let common = delimiter.and_then(|d| {
                entry.name[prefix.len()..]
                    .find(d)
                    .map(|i| entry.name[..prefix.len() + i + d.len()].to_string())
            });
            if common.is_some() && common == last_prefix {
                continue;
            }

            if listing.items.len() == max {
                listing.next_marker = Some(entry.name);
                break;
            }

            match common {
                Some(common) => {
                    last_prefix = Some(common.clone());
                    listing.items.push(ListItem::Prefix(common));
                }
                None => listing.items.push(ListItem::Blob(entry)),
            }
        }

        listing
    }
}

/// Minimal blob-store operations the driver needs.
///
/// Implementations do their own auth, signing, transport and retries. Every
/// call blocks until the store answers.
pub trait BlobClient: Send + Sync {
    /// Fetch a blob's body and properties.
    fn get_blob(&self, container: &str, key: &str) -> Result<BlobContent, BlobError>;

    /// Fetch only a blob's properties.
    fn get_blob_properties(&self, container: &str, key: &str)
    -> Result<BlobProperties, BlobError>;

    /// Create or replace a blob with the full contents of `body`.
    fn put_blob(
        &self,
        container: &str,
        key: &str,
        body: &mut dyn Read,
        options: &PutOptions,
    ) -> Result<(), BlobError>;

    fn delete_blob(&self, container: &str, key: &str) -> Result<(), BlobError>;

    /// Server-side copy, carrying the source's metadata.
    fn copy_blob(
        &self,
        dest_container: &str,
        dest_key: &str,
        src_container: &str,
        src_key: &str,
    ) -> Result<(), BlobError>;

    /// List one page of blobs in a container.
    fn list_blobs(&self, container: &str, options: &ListOptions)
    -> Result<BlobListing, BlobError>;

    /// Names of containers starting with `prefix`.
    fn list_containers(&self, prefix: &str) -> Result<Vec<String>, BlobError>;

    fn create_container(&self, container: &str, access: AccessTier) -> Result<(), BlobError>;

    fn delete_container(&self, container: &str) -> Result<(), BlobError>;
}

/// True iff a blob named exactly `key` exists.
///
/// A one-result prefix listing is cheaper than a properties call that may
/// 404; the exact-name comparison keeps `a.txt.bak` from answering for
/// `a.txt`.
pub fn blob_exists(client: &dyn BlobClient, container: &str, key: &str) -> Result<bool, BlobError> {
    let listing = client.list_blobs(container, &ListOptions::with_prefix(key).max_results(1))?;
    Ok(listing.first_blob().is_some_and(|entry| entry.name == key))
}

/// True iff a container with exactly this name exists.
pub fn container_exists(client: &dyn BlobClient, container: &str) -> Result<bool, BlobError> {
    Ok(client
        .list_containers(container)?
        .iter()
        .any(|name| name == container))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn entries(names: &[&str]) -> Vec<BlobEntry> {
        let ts = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        names.iter().map(|n| BlobEntry::new(*n, 1, ts)).collect()
    }

    fn names(listing: &BlobListing) -> Vec<&str> {
        listing.items.iter().map(ListItem::name).collect()
    }

    #[test]
    fn test_paginate_prefix_filter() {
        let all = entries(&["a/1", "a/2", "b/1"]);
        let page = BlobListing::paginate(all, &ListOptions::with_prefix("a/"));
        assert_eq!(names(&page), vec!["a/1", "a/2"]);
        assert!(page.next_marker.is_none());
    }

    #[test]
    fn test_paginate_marker_is_next_start() {
        let all = entries(&["k1", "k2", "k3", "k4", "k5"]);
        let first = BlobListing::paginate(all.clone(), &ListOptions::default().max_results(2));
        assert_eq!(names(&first), vec!["k1", "k2"]);
        assert_eq!(first.next_marker.as_deref(), Some("k3"));

        let second = BlobListing::paginate(
            all.clone(),
            &ListOptions::default().max_results(2).marker(first.next_marker),
        );
        assert_eq!(names(&second), vec!["k3", "k4"]);

        let third = BlobListing::paginate(
            all,
            &ListOptions::default().max_results(2).marker(second.next_marker),
        );
        assert_eq!(names(&third), vec!["k5"]);
        assert!(third.next_marker.is_none());
    }

    #[test]
    fn test_paginate_delimiter_groups_children() {
        let all = entries(&["d/a.txt", "d/sub/1", "d/sub/2", "d/z.txt"]);
        let page = BlobListing::paginate(all, &ListOptions::with_prefix("d/").delimiter("/"));
        assert_eq!(names(&page), vec!["d/a.txt", "d/sub/", "d/z.txt"]);
        assert!(matches!(page.items[1], ListItem::Prefix(_)));
    }

    #[test]
    fn test_paginate_common_prefix_spans_page_boundary() {
        let all = entries(&["a", "p/1", "p/2", "p/3", "z"]);
        let opts = ListOptions::default().delimiter("/").max_results(2);
        let first = BlobListing::paginate(all.clone(), &opts);
        assert_eq!(names(&first), vec!["a", "p/"]);
        assert_eq!(first.next_marker.as_deref(), Some("z"));

        let second = BlobListing::paginate(all, &opts.clone().marker(first.next_marker));
        assert_eq!(names(&second), vec!["z"]);
    }

    #[test]
    fn test_paginate_zero_max_still_progresses() {
        let all = entries(&["a", "b"]);
        let page = BlobListing::paginate(all, &ListOptions::default().max_results(0));
        assert_eq!(names(&page), vec!["a"]);
        assert_eq!(page.next_marker.as_deref(), Some("b"));
    }

    #[test]
    fn test_byte_stream_into_bytes() {
        let buffered = ByteStream::Buffered(b"abc".to_vec());
        assert!(buffered.is_seekable());
        assert_eq!(buffered.into_bytes().unwrap(), b"abc");

        let reader = ByteStream::Reader(Box::new(io::Cursor::new(b"xyz".to_vec())));
        assert!(!reader.is_seekable());
        assert_eq!(reader.into_bytes().unwrap(), b"xyz");
    }
}
