//! Directory-backed blob store.
//!
//! Each container is a directory under `root`. Blob keys are flat strings
//! that may contain `/`, so each blob is stored under the URL-safe base64
//! encoding of its key, next to a `<encoded>.meta` JSON sidecar holding the
//! content type. Nothing here mirrors the key hierarchy on disk; the driver
//! does all directory emulation, same as it would against a remote store.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use blobfs_types::{AccessTier, BlobEntry, BlobError, BlobProperties};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use super::traits::{BlobClient, BlobContent, BlobListing, ByteStream, ListOptions, PutOptions};

const META_SUFFIX: &str = ".meta";
const CONTAINER_META: &str = ".container.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct BlobMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content_type: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ContainerMeta {
    access: AccessTier,
}

/// Blob store over a local directory.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    /// Create a store rooted at `root`. The directory is created on first
    /// container creation if it does not exist.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn container_dir(&self, container: &str) -> Result<PathBuf, BlobError> {
        if container.is_empty()
            || container == "."
            || container == ".."
            || container.contains(['/', '\\'])
        {
            return Err(BlobError::Service(format!(
                "invalid container name: {container:?}"
            )));
        }
        Ok(self.root.join(container))
    }

    /// Container directory, failing if it does not exist.
    fn existing_container(&self, container: &str) -> Result<PathBuf, BlobError> {
        let dir = self.container_dir(container)?;
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(BlobError::ContainerNotFound(container.to_string()))
        }
    }

    fn blob_file(dir: &Path, key: &str) -> PathBuf {
        dir.join(URL_SAFE_NO_PAD.encode(key))
    }

    fn meta_file(dir: &Path, key: &str) -> PathBuf {
        dir.join(format!("{}{META_SUFFIX}", URL_SAFE_NO_PAD.encode(key)))
    }

    fn decode_name(file_name: &str) -> Option<String> {
        if file_name.starts_with('.') || file_name.ends_with(META_SUFFIX) {
            return None;
        }
        let bytes = URL_SAFE_NO_PAD.decode(file_name).ok()?;
        String::from_utf8(bytes).ok()
    }

    fn read_meta(dir: &Path, key: &str) -> BlobMeta {
        fs::read(Self::meta_file(dir, key))
            .ok()
            .and_then(|raw| serde_json::from_slice(&raw).ok())
            .unwrap_or_default()
    }

    fn entry_from_metadata(name: String, metadata: &fs::Metadata) -> BlobEntry {
        let modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        BlobEntry::new(name, metadata.len(), modified)
    }

    fn not_found_or(err: io::Error, container: &str, key: &str) -> BlobError {
        if err.kind() == io::ErrorKind::NotFound {
            BlobError::blob_not_found(container, key)
        } else {
            BlobError::Io(err)
        }
    }

    fn write_atomic(dir: &Path, target: &Path, body: &mut dyn Read) -> io::Result<()> {
        let mut tmp = NamedTempFile::new_in(dir)?;
        io::copy(body, &mut tmp)?;
        tmp.as_file_mut().flush()?;
        tmp.persist(target).map_err(|e| e.error)?;
        Ok(())
    }

    fn write_meta(dir: &Path, key: &str, meta: &BlobMeta) -> Result<(), BlobError> {
        let raw = serde_json::to_vec(meta)
            .map_err(|e| BlobError::Service(format!("failed to encode blob metadata: {e}")))?;
        Self::write_atomic(dir, &Self::meta_file(dir, key), &mut raw.as_slice())?;
        Ok(())
    }
}

impl BlobClient for LocalBlobStore {
    fn get_blob(&self, container: &str, key: &str) -> Result<BlobContent, BlobError> {
        let properties = self.get_blob_properties(container, key)?;
        let dir = self.existing_container(container)?;
        let data = fs::read(Self::blob_file(&dir, key))
            .map_err(|e| Self::not_found_or(e, container, key))?;
        Ok(BlobContent {
            properties,
            body: ByteStream::Buffered(data),
        })
    }

    fn get_blob_properties(
        &self,
        container: &str,
        key: &str,
    ) -> Result<BlobProperties, BlobError> {
        let dir = self.existing_container(container)?;
        let metadata = fs::metadata(Self::blob_file(&dir, key))
            .map_err(|e| Self::not_found_or(e, container, key))?;
        let entry = Self::entry_from_metadata(key.to_string(), &metadata);
        Ok(BlobProperties {
            content_length: entry.size,
            last_modified: entry.last_modified,
            content_type: Self::read_meta(&dir, key).content_type,
        })
    }

    fn put_blob(
        &self,
        container: &str,
        key: &str,
        body: &mut dyn Read,
        options: &PutOptions,
    ) -> Result<(), BlobError> {
        let dir = self.existing_container(container)?;
        debug!(container, key, "local put");
        Self::write_atomic(&dir, &Self::blob_file(&dir, key), body)?;
        Self::write_meta(
            &dir,
            key,
            &BlobMeta {
                content_type: options.content_type.clone(),
            },
        )
    }

    fn delete_blob(&self, container: &str, key: &str) -> Result<(), BlobError> {
        let dir = self.existing_container(container)?;
        fs::remove_file(Self::blob_file(&dir, key))
            .map_err(|e| Self::not_found_or(e, container, key))?;
        // A missing sidecar is fine.
        let _ = fs::remove_file(Self::meta_file(&dir, key));
        Ok(())
    }

    fn copy_blob(
        &self,
        dest_container: &str,
        dest_key: &str,
        src_container: &str,
        src_key: &str,
    ) -> Result<(), BlobError> {
        let src_dir = self.existing_container(src_container)?;
        let dest_dir = self.existing_container(dest_container)?;
        let mut source = fs::File::open(Self::blob_file(&src_dir, src_key))
            .map_err(|e| Self::not_found_or(e, src_container, src_key))?;
        let meta = Self::read_meta(&src_dir, src_key);

        Self::write_atomic(&dest_dir, &Self::blob_file(&dest_dir, dest_key), &mut source)?;
        Self::write_meta(&dest_dir, dest_key, &meta)
    }

    fn list_blobs(
        &self,
        container: &str,
        options: &ListOptions,
    ) -> Result<BlobListing, BlobError> {
        let dir = self.existing_container(container)?;
        let mut entries = Vec::new();
        for dirent in fs::read_dir(&dir)? {
            let dirent = dirent?;
            let Some(name) = dirent.file_name().to_str().and_then(Self::decode_name) else {
                continue;
            };
            let metadata = dirent.metadata()?;
            if metadata.is_file() {
                entries.push(Self::entry_from_metadata(name, &metadata));
            }
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(BlobListing::paginate(entries, options))
    }

    fn list_containers(&self, prefix: &str) -> Result<Vec<String>, BlobError> {
        let dirents = match fs::read_dir(&self.root) {
            Ok(dirents) => dirents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for dirent in dirents {
            let dirent = dirent?;
            if !dirent.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = dirent.file_name().to_str() {
                if name.starts_with(prefix) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn create_container(&self, container: &str, access: AccessTier) -> Result<(), BlobError> {
        let dir = self.container_dir(container)?;
        fs::create_dir_all(&self.root)?;
        match fs::create_dir(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(BlobError::ContainerAlreadyExists(container.to_string()));
            }
            Err(e) => return Err(e.into()),
        }
        let raw = serde_json::to_vec(&ContainerMeta { access })
            .map_err(|e| BlobError::Service(format!("failed to encode container metadata: {e}")))?;
        fs::write(dir.join(CONTAINER_META), raw)?;
        Ok(())
    }

    fn delete_container(&self, container: &str) -> Result<(), BlobError> {
        let dir = self.existing_container(container)?;
        fs::remove_dir_all(dir)?;
        Ok(())
    }
}
