//! Driver configuration.
//!
//! Loaded from TOML. Every key is optional:
//!
//! ```toml
//! protocol = "blob"
//! delimiter = "/"
//! seekable = false
//! page_size = 500
//! spool_threshold = 8388608
//!
//! [cache]
//! max_items = 1000
//! stat_ttl_secs = 0
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::DEFAULT_MAX_ITEMS;

/// Listing page size used by directory iteration.
pub const DEFAULT_PAGE_SIZE: usize = 500;

/// Staging bytes kept in memory before a write handle spills to disk.
pub const DEFAULT_SPOOL_THRESHOLD: usize = 8 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Metadata cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub max_items: usize,
    /// Seconds a stat result stays valid. 0 keeps entries until evicted or
    /// invalidated.
    pub stat_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_items: DEFAULT_MAX_ITEMS,
            stat_ttl_secs: 0,
        }
    }
}

impl CacheConfig {
    pub fn stat_ttl(&self) -> Duration {
        Duration::from_secs(self.stat_ttl_secs)
    }
}

/// Settings for one mounted driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriverConfig {
    /// Scheme this driver answers to, without `://`.
    pub protocol: String,
    /// Pseudo-directory delimiter. Empty means flat listings.
    pub delimiter: String,
    /// Whether read handles are seekable unless a call says otherwise.
    pub seekable: bool,
    pub page_size: usize,
    pub spool_threshold: usize,
    pub cache: CacheConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            protocol: blobfs_types::DEFAULT_PROTOCOL.to_string(),
            delimiter: "/".to_string(),
            seekable: false,
            page_size: DEFAULT_PAGE_SIZE,
            spool_threshold: DEFAULT_SPOOL_THRESHOLD,
            cache: CacheConfig::default(),
        }
    }
}

impl DriverConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol.is_empty() || self.protocol.contains("://") {
            return Err(ConfigError::Invalid(format!(
                "protocol must be a bare scheme name, got {:?}",
                self.protocol
            )));
        }
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be at least 1".into()));
        }
        if self.cache.max_items == 0 {
            return Err(ConfigError::Invalid(
                "cache.max_items must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        let config = DriverConfig::from_toml_str("").unwrap();
        assert_eq!(config, DriverConfig::default());
        assert_eq!(config.page_size, 500);
        assert_eq!(config.cache.max_items, 1000);
        assert_eq!(config.cache.stat_ttl(), Duration::ZERO);
    }

    #[test]
    fn test_partial_override() {
        let config = DriverConfig::from_toml_str(
            r#"
            protocol = "store"
            seekable = true

            [cache]
            stat_ttl_secs = 30
            "#,
        )
        .unwrap();
        assert_eq!(config.protocol, "store");
        assert!(config.seekable);
        assert_eq!(config.delimiter, "/");
        assert_eq!(config.cache.max_items, 1000);
        assert_eq!(config.cache.stat_ttl(), Duration::from_secs(30));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = DriverConfig::from_toml_str("protcol = \"blob\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            DriverConfig::from_toml_str("page_size = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            DriverConfig::from_toml_str("protocol = \"blob://\""),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blobfs.toml");
        std::fs::write(&path, "delimiter = \"\"\n").unwrap();
        let config = DriverConfig::load(&path).unwrap();
        assert_eq!(config.delimiter, "");

        let missing = DriverConfig::load(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Read { .. }));
    }
}
