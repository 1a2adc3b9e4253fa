//! Driver-qualified paths.
//!
//! A path looks like `blob://bucket/some/key.txt`. The first segment after
//! the protocol separator is the bucket (container); everything after it is
//! the blob key. Parsing never fails: degenerate input just produces an empty
//! bucket or no key.

use std::fmt;

use crate::error::VfsError;

/// Protocol assumed when a path carries no `scheme://` prefix.
pub const DEFAULT_PROTOCOL: &str = "blob";

const SEPARATOR: &str = "://";

/// A parsed `protocol://bucket/key` path.
///
/// `key == None` denotes a bucket-root path, and an empty `bucket` denotes
/// the protocol root (`blob://`). The key never begins with `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobPath {
    pub protocol: String,
    pub bucket: String,
    pub key: Option<String>,
}

impl BlobPath {
    /// Parse a path into protocol, bucket and key.
    pub fn parse(path: &str) -> Self {
        let (protocol, rest) = match path.split_once(SEPARATOR) {
            Some((protocol, rest)) if !protocol.is_empty() => (protocol, rest),
            Some((_, rest)) => (DEFAULT_PROTOCOL, rest),
            None => (DEFAULT_PROTOCOL, path),
        };

        let (bucket, key) = match rest.split_once('/') {
            Some((bucket, key)) => (bucket, key.trim_start_matches('/')),
            None => (rest, ""),
        };

        Self {
            protocol: protocol.to_string(),
            bucket: bucket.to_string(),
            key: if key.is_empty() {
                None
            } else {
                Some(key.to_string())
            },
        }
    }

    /// Build a path from parts.
    pub fn new(
        protocol: impl Into<String>,
        bucket: impl Into<String>,
        key: Option<impl Into<String>>,
    ) -> Self {
        let key = key
            .map(Into::into)
            .map(|k: String| k.trim_start_matches('/').to_string())
            .filter(|k| !k.is_empty());
        Self {
            protocol: protocol.into(),
            bucket: bucket.into(),
            key,
        }
    }

    /// The key, if this is not a bucket-root path.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// True for `protocol://` with no bucket.
    pub fn is_protocol_root(&self) -> bool {
        self.bucket.is_empty()
    }

    /// True when there is no key (bucket root or protocol root).
    pub fn is_bucket_root(&self) -> bool {
        self.key.is_none()
    }

    /// The bucket, or `InvalidPath` if there is none.
    pub fn require_bucket(&self) -> Result<&str, VfsError> {
        if self.bucket.is_empty() {
            Err(VfsError::InvalidPath(format!(
                "you must specify a bucket: {self}"
            )))
        } else {
            Ok(&self.bucket)
        }
    }

    /// Bucket and key, or `InvalidPath` if either is missing.
    pub fn require_key(&self) -> Result<(&str, &str), VfsError> {
        let bucket = self.require_bucket()?;
        match self.key() {
            Some(key) => Ok((bucket, key)),
            None => Err(VfsError::InvalidPath(format!(
                "a key is required, in the form {}://bucket/key: {self}",
                self.protocol
            ))),
        }
    }

    /// The pseudo-directory prefix for this key: the key with any trailing
    /// delimiter collapsed to exactly one.
    ///
    /// `None` for bucket-root paths. An empty delimiter returns the key as-is.
    pub fn dir_prefix(&self, delimiter: &str) -> Option<String> {
        let key = self.key()?;
        if delimiter.is_empty() {
            return Some(key.to_string());
        }
        Some(format!("{}{delimiter}", key.trim_end_matches(delimiter)))
    }

    /// Canonical string used as the metadata cache key.
    ///
    /// The protocol is lowercased; some callers hand us `BLOB://` and
    /// `blob://` for the same object.
    pub fn cache_key(&self) -> String {
        let mut out = format!("{}{SEPARATOR}{}", self.protocol.to_lowercase(), self.bucket);
        if let Some(key) = self.key() {
            out.push('/');
            out.push_str(key);
        }
        out
    }

    /// The containing directory of this path, or `None` at the protocol root.
    ///
    /// `blob://b/a/c.txt` → `blob://b/a` → `blob://b` → `blob://` → `None`.
    pub fn parent(&self) -> Option<BlobPath> {
        match self.key() {
            Some(key) => {
                let trimmed = key.trim_end_matches('/');
                let parent_key = trimmed.rsplit_once('/').map(|(parent, _)| parent);
                Some(BlobPath::new(
                    self.protocol.clone(),
                    self.bucket.clone(),
                    parent_key,
                ))
            }
            None if !self.bucket.is_empty() => Some(BlobPath::new(
                self.protocol.clone(),
                "",
                None::<String>,
            )),
            None => None,
        }
    }

    /// All ancestors, nearest first.
    pub fn ancestors(&self) -> Vec<BlobPath> {
        let mut out = Vec::new();
        let mut current = self.parent();
        while let Some(path) = current {
            current = path.parent();
            out.push(path);
        }
        out
    }
}

impl fmt::Display for BlobPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEPARATOR}{}", self.protocol, self.bucket)?;
        if let Some(key) = self.key() {
            write!(f, "/{key}")?;
        }
        Ok(())
    }
}
