//! Error types.
//!
//! [`BlobError`] is what a blob-store capability reports. [`VfsError`] is
//! what driver operations report; the dispatch shim turns it into a boolean
//! plus a message for filesystem callers.

use std::io;

use thiserror::Error;

use crate::mode::OpenMode;

/// Failure reported by a blob-store client.
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("blob not found: {container}/{key}")]
    BlobNotFound { container: String, key: String },

    #[error("container not found: {0}")]
    ContainerNotFound(String),

    #[error("container already exists: {0}")]
    ContainerAlreadyExists(String),

    /// Transport, auth, throttling, or any other service-side failure.
    #[error("blob service error: {0}")]
    Service(String),

    #[error("blob store i/o error: {0}")]
    Io(#[from] io::Error),
}

impl BlobError {
    pub fn blob_not_found(container: impl Into<String>, key: impl Into<String>) -> Self {
        Self::BlobNotFound {
            container: container.into(),
            key: key.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::BlobNotFound { .. } | Self::ContainerNotFound(_))
    }
}

/// Coarse classification of a [`VfsError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidPath,
    UnsupportedMode,
    AlreadyExists,
    NotFound,
    DirectoryNotEmpty,
    RemoteServiceFailure,
    UnsupportedOperation,
    InvalidHandle,
    Io,
}

/// Failure of a driver operation.
#[derive(Error, Debug)]
pub enum VfsError {
    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("mode not supported: {0:?}; use one of 'r', 'w', 'a', or 'x'")]
    UnsupportedMode(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("file or directory not found: {0}")]
    NotFound(String),

    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("stream handle is closed")]
    HandleClosed,

    #[error("cannot {op} a stream opened in mode '{mode}'")]
    WrongMode { mode: OpenMode, op: &'static str },

    #[error("remote service failure: {0}")]
    Remote(BlobError),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl VfsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPath(_) => ErrorKind::InvalidPath,
            Self::UnsupportedMode(_) => ErrorKind::UnsupportedMode,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::DirectoryNotEmpty(_) => ErrorKind::DirectoryNotEmpty,
            Self::UnsupportedOperation(_) => ErrorKind::UnsupportedOperation,
            Self::HandleClosed | Self::WrongMode { .. } => ErrorKind::InvalidHandle,
            Self::Remote(_) => ErrorKind::RemoteServiceFailure,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl From<BlobError> for VfsError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::BlobNotFound { container, key } => {
                VfsError::NotFound(format!("{container}/{key}"))
            }
            BlobError::ContainerNotFound(container) => VfsError::NotFound(container),
            other => VfsError::Remote(other),
        }
    }
}

impl From<VfsError> for io::Error {
    fn from(err: VfsError) -> Self {
        let kind = match err.kind() {
            ErrorKind::InvalidPath | ErrorKind::UnsupportedMode => io::ErrorKind::InvalidInput,
            ErrorKind::AlreadyExists => io::ErrorKind::AlreadyExists,
            ErrorKind::NotFound => io::ErrorKind::NotFound,
            ErrorKind::DirectoryNotEmpty => io::ErrorKind::DirectoryNotEmpty,
            ErrorKind::UnsupportedOperation => io::ErrorKind::Unsupported,
            ErrorKind::InvalidHandle => io::ErrorKind::PermissionDenied,
            ErrorKind::RemoteServiceFailure | ErrorKind::Io => io::ErrorKind::Other,
        };
        match err {
            VfsError::Io(inner) => inner,
            other => io::Error::new(kind, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_not_found_maps_to_not_found() {
        let err: VfsError = BlobError::blob_not_found("bucket", "a.txt").into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "file or directory not found: bucket/a.txt");
    }

    #[test]
    fn test_service_error_maps_to_remote() {
        let err: VfsError = BlobError::Service("503 slow down".into()).into();
        assert_eq!(err.kind(), ErrorKind::RemoteServiceFailure);
        assert!(err.to_string().contains("503 slow down"));
    }

    #[test]
    fn test_into_io_error_kind() {
        let err: io::Error = VfsError::AlreadyExists("blob://b/k".into()).into();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);

        let err: io::Error = VfsError::HandleClosed.into();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }
}
