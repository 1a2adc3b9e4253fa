//! Raw records returned by the remote store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::stat::StatResult;

/// One blob from a listing call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobEntry {
    /// Full key within the container.
    pub name: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

impl BlobEntry {
    pub fn new(name: impl Into<String>, size: u64, last_modified: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            size,
            last_modified,
        }
    }

    /// Zero-length entries are pseudo-directory placeholders, not files.
    pub fn is_placeholder(&self) -> bool {
        self.size == 0
    }

    pub fn to_stat(&self) -> StatResult {
        StatResult::file(self.size, self.last_modified.timestamp())
    }
}

/// Metadata of a single blob, as returned by a properties/HEAD call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobProperties {
    pub content_length: u64,
    pub last_modified: DateTime<Utc>,
    pub content_type: Option<String>,
}

impl BlobProperties {
    pub fn to_stat(&self) -> StatResult {
        StatResult::file(self.content_length, self.last_modified.timestamp())
    }
}
