//! Open-file handles over blobs.
//!
//! A [`StreamHandle`] is what `open` hands back. Read handles wrap the body
//! fetched from the store; write handles stage bytes locally in a spooled
//! temp file and upload the whole thing as one create call on flush/close.
//! Blob stores have no partial writes, so there is no other way to do it.

use std::fmt;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use blobfs_types::{BlobPath, OpenMode, StatRecord, VfsError};
use chrono::Utc;
use tempfile::SpooledTempFile;
use tracing::{debug, warn};

use crate::cache::MetadataCache;
use crate::content_type;
use crate::options::ResolvedOptions;
use crate::store::{BlobClient, ByteStream, PutOptions, blob_exists};

const FILL_CHUNK: usize = 8 * 1024;

/// Forward-only body with position tracking.
struct ForwardReader {
    inner: Box<dyn Read + Send>,
    pos: u64,
    eof: bool,
}

impl Read for ForwardReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n == 0 && !buf.is_empty() {
            self.eof = true;
        }
        self.pos += n as u64;
        Ok(n)
    }
}

/// Makes a forward-only body seekable by keeping every byte read so far.
///
/// Seeking backwards replays from memory; seeking forwards pulls from the
/// remote body until the target is reached.
struct CachingReader {
    inner: Box<dyn Read + Send>,
    buf: Vec<u8>,
    pos: u64,
    drained: bool,
}

impl CachingReader {
    fn new(inner: Box<dyn Read + Send>) -> Self {
        Self {
            inner,
            buf: Vec::new(),
            pos: 0,
            drained: false,
        }
    }

    fn fill_to(&mut self, target: u64) -> io::Result<()> {
        let mut chunk = [0u8; FILL_CHUNK];
        while !self.drained && (self.buf.len() as u64) < target {
            match self.inner.read(&mut chunk) {
                Ok(0) => self.drained = true,
                Ok(n) => self.buf.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

impl Read for CachingReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        self.fill_to(self.pos.saturating_add(out.len() as u64))?;
        let start = usize::try_from(self.pos)
            .unwrap_or(usize::MAX)
            .min(self.buf.len());
        let n = (self.buf.len() - start).min(out.len());
        out[..n].copy_from_slice(&self.buf[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for CachingReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => i128::from(n),
            SeekFrom::Current(delta) => i128::from(self.pos) + i128::from(delta),
            SeekFrom::End(delta) => {
                self.fill_to(u64::MAX)?;
                self.buf.len() as i128 + i128::from(delta)
            }
        };
        self.pos = u64::try_from(target).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek to a negative position")
        })?;
        Ok(self.pos)
    }
}

/// The byte body behind a handle.
enum Body {
    Buffered(Cursor<Vec<u8>>),
    Forward(ForwardReader),
    Caching(CachingReader),
    Staging(SpooledTempFile),
}

impl Body {
    fn from_stream(stream: ByteStream, want_seekable: bool) -> Self {
        match stream {
            ByteStream::Buffered(data) => Body::Buffered(Cursor::new(data)),
            ByteStream::Reader(inner) if want_seekable => Body::Caching(CachingReader::new(inner)),
            ByteStream::Reader(inner) => Body::Forward(ForwardReader {
                inner,
                pos: 0,
                eof: false,
            }),
        }
    }

    fn is_seekable(&self) -> bool {
        !matches!(self, Body::Forward(_))
    }

    fn position(&mut self) -> io::Result<u64> {
        match self {
            Body::Buffered(c) => Ok(c.position()),
            Body::Forward(f) => Ok(f.pos),
            Body::Caching(c) => Ok(c.pos),
            Body::Staging(s) => s.stream_position(),
        }
    }

    /// Length, when it can be known without consuming the body.
    fn len(&mut self) -> io::Result<Option<u64>> {
        match self {
            Body::Buffered(c) => Ok(Some(c.get_ref().len() as u64)),
            Body::Forward(_) => Ok(None),
            Body::Caching(c) if c.drained => Ok(Some(c.buf.len() as u64)),
            Body::Caching(_) => Ok(None),
            Body::Staging(s) => {
                let pos = s.stream_position()?;
                let len = s.seek(SeekFrom::End(0))?;
                s.seek(SeekFrom::Start(pos))?;
                Ok(Some(len))
            }
        }
    }

    fn at_eof(&mut self, declared: Option<u64>) -> io::Result<bool> {
        let pos = self.position()?;
        if let Body::Forward(f) = self {
            return Ok(f.eof || declared.is_some_and(|size| pos >= size));
        }
        match self.len()?.or(declared) {
            Some(len) => Ok(pos >= len),
            None => Ok(false),
        }
    }
}

impl Read for Body {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Body::Buffered(c) => c.read(buf),
            Body::Forward(f) => f.read(buf),
            Body::Caching(c) => c.read(buf),
            Body::Staging(s) => s.read(buf),
        }
    }
}

impl Seek for Body {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            Body::Buffered(c) => c.seek(pos),
            Body::Forward(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "body is not seekable",
            )),
            Body::Caching(c) => c.seek(pos),
            Body::Staging(s) => s.seek(pos),
        }
    }
}

/// Lifecycle state of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Open(OpenMode),
    Closed,
}

/// One open blob.
///
/// Owned by whoever called open. Write-family handles upload on
/// [`flush`](Self::flush) and [`close`](Self::close); dropping one with
/// unflushed bytes discards them.
pub struct StreamHandle {
    path: BlobPath,
    bucket: String,
    key: String,
    mode: OpenMode,
    body: Option<Body>,
    declared_size: Option<u64>,
    mtime: i64,
    content_type: Option<String>,
    client: Arc<dyn BlobClient>,
    cache: Option<Arc<MetadataCache>>,
    dirty: bool,
}

impl StreamHandle {
    /// Open `resolved.path` in the given host mode string.
    ///
    /// Path and mode are validated before any remote call. `x` checks for
    /// an existing blob and fails without writing anything; `a` on a missing
    /// blob behaves like `w`.
    pub fn open(
        resolved: &ResolvedOptions,
        mode: &str,
        spool_threshold: usize,
    ) -> Result<Self, VfsError> {
        let (bucket, key) = resolved.path.require_key()?;
        let (bucket, key) = (bucket.to_string(), key.to_string());
        let mode = OpenMode::parse(mode)?;
        let client = resolved.client()?;

        let mut handle = Self {
            path: resolved.path.clone(),
            bucket,
            key,
            mode,
            body: None,
            declared_size: None,
            mtime: Utc::now().timestamp(),
            content_type: resolved.options.content_type.clone(),
            client,
            cache: resolved.cache(),
            dirty: false,
        };

        match mode {
            OpenMode::Read => {
                debug!(path = %handle.path, "open for read");
                let content = handle.client.get_blob(&handle.bucket, &handle.key)?;
                handle.declared_size = Some(content.properties.content_length);
                handle.mtime = content.properties.last_modified.timestamp();
                if handle.content_type.is_none() {
                    handle.content_type = content.properties.content_type;
                }
                handle.body = Some(Body::from_stream(content.body, resolved.seekable()));
            }
            OpenMode::Append => {
                let mut staging = SpooledTempFile::new(spool_threshold);
                match handle.client.get_blob(&handle.bucket, &handle.key) {
                    Ok(content) => {
                        debug!(path = %handle.path, "open for append");
                        let mut existing = Body::from_stream(content.body, false);
                        io::copy(&mut existing, &mut staging)?;
                        staging.seek(SeekFrom::End(0))?;
                        handle.declared_size = Some(content.properties.content_length);
                        if handle.content_type.is_none() {
                            handle.content_type = content.properties.content_type;
                        }
                    }
                    Err(e) if e.is_not_found() => {
                        debug!(path = %handle.path, "append target missing, opening for write");
                        handle.mode = OpenMode::Write;
                        handle.dirty = true;
                    }
                    Err(e) => return Err(e.into()),
                }
                handle.body = Some(Body::Staging(staging));
            }
            OpenMode::CreateExclusive => {
                if blob_exists(handle.client.as_ref(), &handle.bucket, &handle.key)? {
                    return Err(VfsError::AlreadyExists(handle.path.to_string()));
                }
                handle.body = Some(Body::Staging(SpooledTempFile::new(spool_threshold)));
                handle.dirty = true;
            }
            OpenMode::Write => {
                handle.body = Some(Body::Staging(SpooledTempFile::new(spool_threshold)));
                handle.dirty = true;
            }
        }

        Ok(handle)
    }

    pub fn path(&self) -> &BlobPath {
        &self.path
    }

    /// Effective mode; `Write` for an append that found no blob.
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn state(&self) -> HandleState {
        match self.body {
            Some(_) => HandleState::Open(self.mode),
            None => HandleState::Closed,
        }
    }

    /// Size the store reported at open time.
    pub fn declared_size(&self) -> Option<u64> {
        self.declared_size
    }

    /// True if bytes were written since the last upload.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn body_mut(&mut self) -> Result<&mut Body, VfsError> {
        self.body.as_mut().ok_or(VfsError::HandleClosed)
    }

    /// Read up to `count` bytes. Fewer means the body ended.
    pub fn read(&mut self, count: usize) -> Result<Vec<u8>, VfsError> {
        if self.mode != OpenMode::Read {
            return Err(VfsError::WrongMode {
                mode: self.mode,
                op: "read",
            });
        }
        let body = self.body_mut()?;
        let mut out = Vec::with_capacity(count.min(FILL_CHUNK));
        Read::take(body, count as u64).read_to_end(&mut out)?;
        Ok(out)
    }

    /// Stage bytes for upload. Returns the number accepted.
    pub fn write(&mut self, data: &[u8]) -> Result<usize, VfsError> {
        let mode = self.mode;
        let wrong_mode = VfsError::WrongMode { mode, op: "write" };
        if !mode.is_write() {
            return Err(wrong_mode);
        }
        let Body::Staging(staging) = self.body_mut()? else {
            return Err(wrong_mode);
        };
        staging.write_all(data)?;
        self.dirty = true;
        Ok(data.len())
    }

    /// Move the position. `Ok(false)` when the body cannot seek or the
    /// target is before the start.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<bool, VfsError> {
        let body = self.body_mut()?;
        if !body.is_seekable() {
            return Ok(false);
        }
        match body.seek(pos) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub fn tell(&mut self) -> Result<u64, VfsError> {
        Ok(self.body_mut()?.position()?)
    }

    pub fn eof(&mut self) -> Result<bool, VfsError> {
        let declared = match self.mode {
            OpenMode::Read => self.declared_size,
            _ => None,
        };
        Ok(self.body_mut()?.at_eof(declared)?)
    }

    /// Upload the staged body without closing.
    pub fn flush(&mut self) -> Result<(), VfsError> {
        if !self.mode.is_write() {
            return Err(VfsError::WrongMode {
                mode: self.mode,
                op: "flush",
            });
        }
        let Some(Body::Staging(staging)) = self.body.as_mut() else {
            return Err(VfsError::HandleClosed);
        };

        let pos = staging.stream_position()?;
        staging.seek(SeekFrom::Start(0))?;

        let content_type = self
            .content_type
            .clone()
            .or_else(|| content_type::from_key(&self.key).map(String::from));
        if let Some(cache) = &self.cache {
            cache.invalidate(&self.path);
        }

        debug!(path = %self.path, ?content_type, "uploading staged body");
        let result = self.client.put_blob(
            &self.bucket,
            &self.key,
            staging,
            &PutOptions {
                content_type,
                access_tier: None,
            },
        );
        staging.seek(SeekFrom::Start(pos))?;
        result?;

        self.dirty = false;
        Ok(())
    }

    /// Upload if needed, then release the body. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<(), VfsError> {
        if self.body.is_none() {
            return Ok(());
        }
        let result = if self.mode.is_write() && self.dirty {
            self.flush()
        } else {
            Ok(())
        };
        self.body = None;
        self.dirty = false;
        result
    }

    /// Stat of the open blob: a file record with the body's current size.
    pub fn stat(&mut self) -> Result<StatRecord, VfsError> {
        let declared = self.declared_size;
        let mtime = self.mtime;
        let body = self.body_mut()?;
        let size = body.len()?.or(declared).unwrap_or(0);
        Ok(StatRecord::file(size, mtime))
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        if self.body.is_some() && self.mode.is_write() && self.dirty {
            warn!(path = %self.path, "stream handle dropped with unflushed writes; discarding");
        }
    }
}

impl fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamHandle")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("state", &self.state())
            .field("declared_size", &self.declared_size)
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl Read for StreamHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.mode != OpenMode::Read {
            return Err(VfsError::WrongMode {
                mode: self.mode,
                op: "read",
            }
            .into());
        }
        self.body_mut()?.read(buf)
    }
}

impl Write for StreamHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(StreamHandle::write(self, buf)?)
    }

    /// Bytes are uploaded by [`StreamHandle::flush`] and
    /// [`StreamHandle::close`]; this only satisfies the trait.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for StreamHandle {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let body = self.body_mut()?;
        body.seek(pos)
    }
}
