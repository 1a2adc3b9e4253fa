//! Directory iteration over paginated blob listings.

use std::fmt;
use std::sync::Arc;

use blobfs_types::{BlobEntry, EntryKind, VfsError};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::options::ListFilter;
use crate::store::{BlobClient, ListItem, ListOptions};

/// A directory entry, named relative to the directory being listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Name of the entry (not the full key).
    pub name: String,
    pub kind: EntryKind,
    /// Size in bytes (0 for directories).
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

impl DirEntry {
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Directory,
            size: 0,
            modified: None,
        }
    }

    pub fn file(name: impl Into<String>, size: u64, modified: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
            size,
            modified: Some(modified),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Marker-driven enumeration of the children of a prefix.
///
/// Holds one page of results at a time and fetches the next page when the
/// current one runs out and the store handed back a marker. Zero-length
/// blobs are never yielded: they are directory placeholders.
pub struct DirectoryIterator {
    client: Arc<dyn BlobClient>,
    bucket: String,
    prefix: String,
    delimiter: String,
    page_size: usize,
    filter: Option<ListFilter>,
    marker: Option<String>,
    buffer: Vec<DirEntry>,
    cursor: usize,
    closed: bool,
}

impl DirectoryIterator {
    /// Open a listing of `prefix` in `bucket` and fetch the first page.
    ///
    /// A non-empty prefix is normalized to end with exactly one delimiter.
    pub fn open(
        client: Arc<dyn BlobClient>,
        bucket: impl Into<String>,
        prefix: Option<&str>,
        delimiter: impl Into<String>,
        page_size: usize,
        filter: Option<ListFilter>,
    ) -> Result<Self, VfsError> {
        let delimiter = delimiter.into();
        let prefix = match prefix.filter(|p| !p.is_empty()) {
            Some(p) if !delimiter.is_empty() => {
                format!("{}{delimiter}", p.trim_end_matches(delimiter.as_str()))
            }
            Some(p) => p.to_string(),
            None => String::new(),
        };

        let mut iter = Self {
            client,
            bucket: bucket.into(),
            prefix,
            delimiter,
            page_size: page_size.max(1),
            filter,
            marker: None,
            buffer: Vec::new(),
            cursor: 0,
            closed: false,
        };
        iter.fill_page()?;
        Ok(iter)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Normalized prefix being listed (empty for the bucket root).
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn keep(&self, entry: &BlobEntry) -> bool {
        !entry.is_placeholder() && self.filter.as_ref().is_none_or(|filter| filter(entry))
    }

    fn fill_page(&mut self) -> Result<(), VfsError> {
        let options = ListOptions {
            prefix: (!self.prefix.is_empty()).then(|| self.prefix.clone()),
            delimiter: None,
            marker: self.marker.take(),
            max_results: Some(self.page_size),
        }
        .delimiter(self.delimiter.clone());

        debug!(bucket = %self.bucket, prefix = %self.prefix, marker = ?options.marker, "listing page");
        let listing = self.client.list_blobs(&self.bucket, &options)?;
        self.marker = listing.next_marker;
        self.cursor = 0;
        self.buffer.clear();

        for item in listing.items {
            match item {
                ListItem::Blob(entry) => {
                    if !self.keep(&entry) {
                        continue;
                    }
                    let name = entry
                        .name
                        .strip_prefix(self.prefix.as_str())
                        .unwrap_or(&entry.name);
                    if name.is_empty() {
                        continue;
                    }
                    self.buffer
                        .push(DirEntry::file(name, entry.size, entry.last_modified));
                }
                ListItem::Prefix(common) => {
                    let name = common
                        .strip_prefix(self.prefix.as_str())
                        .unwrap_or(&common)
                        .trim_end_matches(self.delimiter.as_str());
                    if !name.is_empty() {
                        self.buffer.push(DirEntry::directory(name));
                    }
                }
            }
        }
        Ok(())
    }

    /// Next child, fetching further pages as needed.
    ///
    /// Pages that filter down to nothing are skipped as long as a marker
    /// remains.
    pub fn next_entry(&mut self) -> Result<Option<DirEntry>, VfsError> {
        if self.closed {
            return Err(VfsError::HandleClosed);
        }
        loop {
            if let Some(entry) = self.buffer.get(self.cursor) {
                self.cursor += 1;
                return Ok(Some(entry.clone()));
            }
            if self.marker.is_none() {
                return Ok(None);
            }
            self.fill_page()?;
        }
    }

    /// Next child name, or `None` at the end.
    pub fn readdir(&mut self) -> Result<Option<String>, VfsError> {
        Ok(self.next_entry()?.map(|entry| entry.name))
    }

    /// Restart at the beginning of the page currently buffered.
    ///
    /// Earlier pages are not refetched.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    pub fn close(&mut self) {
        self.buffer.clear();
        self.marker = None;
        self.cursor = 0;
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Iterator for DirectoryIterator {
    type Item = Result<DirEntry, VfsError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.closed {
            return None;
        }
        self.next_entry().transpose()
    }
}

impl fmt::Debug for DirectoryIterator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryIterator")
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .field("delimiter", &self.delimiter)
            .field("marker", &self.marker)
            .field("buffered", &self.buffer.len())
            .field("cursor", &self.cursor)
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryBlobStore, PutOptions};
    use std::io::Cursor;

    fn store_with(keys: &[(&str, usize)]) -> Arc<dyn BlobClient> {
        let store = MemoryBlobStore::with_containers(["b"]);
        for (key, size) in keys {
            store
                .put_blob(
                    "b",
                    key,
                    &mut Cursor::new(vec![b'x'; *size]),
                    &PutOptions::default(),
                )
                .unwrap();
        }
        Arc::new(store)
    }

    fn names(iter: DirectoryIterator) -> Vec<String> {
        iter.map(|entry| entry.unwrap().name).collect()
    }

    #[test]
    fn test_lists_direct_children() {
        let client = store_with(&[
            ("docs/", 0),
            ("docs/a.txt", 3),
            ("docs/sub/", 0),
            ("docs/sub/deep.txt", 4),
            ("other.txt", 1),
        ]);
        let iter = DirectoryIterator::open(client, "b", Some("docs"), "/", 500, None).unwrap();
        assert_eq!(iter.prefix(), "docs/");
        assert_eq!(names(iter), vec!["a.txt", "sub"]);
    }

    #[test]
    fn test_flat_listing_with_empty_delimiter() {
        let client = store_with(&[("docs/a.txt", 3), ("docs/sub/deep.txt", 4)]);
        let iter = DirectoryIterator::open(client, "b", Some("docs/"), "", 500, None).unwrap();
        assert_eq!(names(iter), vec!["a.txt", "sub/deep.txt"]);
    }

    #[test]
    fn test_pages_through_marker() {
        let keys: Vec<(String, usize)> = (0..25).map(|i| (format!("d/f{i:03}"), 1)).collect();
        let refs: Vec<(&str, usize)> = keys.iter().map(|(k, s)| (k.as_str(), *s)).collect();
        let client = store_with(&refs);

        let iter = DirectoryIterator::open(client, "b", Some("d"), "/", 10, None).unwrap();
        let listed = names(iter);
        let expected: Vec<String> = (0..25).map(|i| format!("f{i:03}")).collect();
        assert_eq!(listed, expected);
    }

    #[test]
    fn test_filter_skips_empty_pages() {
        let mut keys: Vec<(String, usize)> = (0..30).map(|i| (format!("d/skip{i:02}"), 1)).collect();
        keys.push(("d/zz-keep".to_string(), 1));
        let refs: Vec<(&str, usize)> = keys.iter().map(|(k, s)| (k.as_str(), *s)).collect();
        let client = store_with(&refs);

        let filter: ListFilter = Arc::new(|entry: &BlobEntry| entry.name.ends_with("keep"));
        let iter = DirectoryIterator::open(client, "b", Some("d"), "/", 5, Some(filter)).unwrap();
        assert_eq!(names(iter), vec!["zz-keep"]);
    }

    #[test]
    fn test_rewind_restarts_current_page_only() {
        let client = store_with(&[("d/1", 1), ("d/2", 1), ("d/3", 1)]);
        let mut iter = DirectoryIterator::open(client, "b", Some("d"), "/", 2, None).unwrap();
        assert_eq!(iter.readdir().unwrap().as_deref(), Some("1"));
        iter.rewind();
        assert_eq!(iter.readdir().unwrap().as_deref(), Some("1"));
        assert_eq!(iter.readdir().unwrap().as_deref(), Some("2"));
        assert_eq!(iter.readdir().unwrap().as_deref(), Some("3"));
        iter.rewind();
        assert_eq!(iter.readdir().unwrap().as_deref(), Some("3"));
        assert_eq!(iter.readdir().unwrap(), None);
    }

    #[test]
    fn test_close_releases() {
        let client = store_with(&[("d/1", 1)]);
        let mut iter = DirectoryIterator::open(client, "b", Some("d"), "/", 2, None).unwrap();
        iter.close();
        assert!(iter.is_closed());
        assert!(matches!(iter.readdir(), Err(VfsError::HandleClosed)));
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_missing_bucket_is_not_found() {
        let client = store_with(&[]);
        let err = DirectoryIterator::open(client, "nope", None, "/", 10, None).unwrap_err();
        assert!(err.is_not_found());
    }
}
