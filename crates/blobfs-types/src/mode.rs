//! Open modes and mkdir access tiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::VfsError;

/// Mode a stream handle is opened in.
///
/// Parsed once at open time from the host's mode string; everything after
/// that dispatches on the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenMode {
    /// `r`: read an existing blob.
    Read,
    /// `w`: create or truncate.
    Write,
    /// `a`: append to an existing blob, or create it.
    Append,
    /// `x`: create, failing if the blob already exists.
    CreateExclusive,
}

impl OpenMode {
    /// Parse a host mode string.
    ///
    /// Trailing `+`, `b` and `t` flags are ignored: handles are always
    /// binary, and the read/write split is decided by the base mode alone.
    pub fn parse(mode: &str) -> Result<Self, VfsError> {
        match mode.trim_end_matches(['+', 'b', 't']) {
            "r" => Ok(Self::Read),
            "w" => Ok(Self::Write),
            "a" => Ok(Self::Append),
            "x" => Ok(Self::CreateExclusive),
            _ => Err(VfsError::UnsupportedMode(mode.to_string())),
        }
    }

    /// True for every mode that uploads on close.
    pub fn is_write(&self) -> bool {
        !matches!(self, Self::Read)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "r",
            Self::Write => "w",
            Self::Append => "a",
            Self::CreateExclusive => "x",
        }
    }
}

impl FromStr for OpenMode {
    type Err = VfsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse access level for buckets and pseudo-directories.
///
/// Derived from the leading octal digit of a POSIX mode: `7xx` is public,
/// `6xx` is readable by authenticated callers, anything else is private.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessTier {
    #[serde(rename = "public-read")]
    Public,
    #[serde(rename = "authenticated-read")]
    Authenticated,
    Private,
}

impl AccessTier {
    pub fn from_mode(mode: u32) -> Self {
        match format!("{mode:o}").chars().next() {
            Some('7') => Self::Public,
            Some('6') => Self::Authenticated,
            _ => Self::Private,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public-read",
            Self::Authenticated => "authenticated-read",
            Self::Private => "private",
        }
    }
}

impl fmt::Display for AccessTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
