//! Dispatch shim: the stream-wrapper calling convention.
//!
//! Filesystem call sites expect booleans, optional values and a readable
//! error message rather than `Result`s. [`StreamWrapper`] routes each call to
//! the [`BlobFs`] registered for the path's protocol, turns every failure
//! into a `false`/`None` plus [`StreamWrapper::last_error`], and logs it at
//! `warn` unless the caller asked for quiet.

use std::collections::HashMap;
use std::io::SeekFrom;
use std::sync::Arc;

use blobfs_types::{BlobPath, ErrorKind, StatRecord, VfsError};
use tracing::{debug, warn};

use crate::dir::DirectoryIterator;
use crate::fs::BlobFs;
use crate::options::StreamOptions;
use crate::stream::StreamHandle;

/// Protocol name → mounted driver.
///
/// Protocols are matched case-insensitively.
#[derive(Debug, Default)]
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<BlobFs>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount a driver under its configured protocol, replacing any driver
    /// already there.
    pub fn register(&mut self, fs: BlobFs) -> Arc<BlobFs> {
        let fs = Arc::new(fs);
        self.register_shared(fs.clone());
        fs
    }

    pub fn register_shared(&mut self, fs: Arc<BlobFs>) -> Option<Arc<BlobFs>> {
        let protocol = fs.protocol().to_lowercase();
        debug!(%protocol, "registering driver");
        self.drivers.insert(protocol, fs)
    }

    pub fn unregister(&mut self, protocol: &str) -> Option<Arc<BlobFs>> {
        self.drivers.remove(&protocol.to_lowercase())
    }

    pub fn get(&self, protocol: &str) -> Option<Arc<BlobFs>> {
        self.drivers.get(&protocol.to_lowercase()).cloned()
    }

    /// Registered protocols, sorted.
    pub fn protocols(&self) -> Vec<String> {
        let mut protocols: Vec<String> = self.drivers.keys().cloned().collect();
        protocols.sort();
        protocols
    }

    /// The driver responsible for `path`.
    pub fn for_path(&self, path: &str) -> Result<Arc<BlobFs>, VfsError> {
        let parsed = BlobPath::parse(path);
        self.get(&parsed.protocol).ok_or_else(|| {
            VfsError::UnsupportedOperation(format!(
                "no driver registered for protocol {:?}",
                parsed.protocol
            ))
        })
    }
}

/// Flags accepted by [`StreamWrapper::url_stat`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatFlags {
    /// Do not report a miss.
    pub quiet: bool,
    /// Caller is stat'ing a link target; a quiet miss answers with the
    /// empty template record instead of `None`.
    pub link: bool,
}

impl StatFlags {
    pub const QUIET: Self = Self {
        quiet: true,
        link: false,
    };
}

/// Origin of a seek offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Current,
    End,
}

impl Whence {
    fn seek_from(self, offset: i64) -> Option<SeekFrom> {
        match self {
            Whence::Set => u64::try_from(offset).ok().map(SeekFrom::Start),
            Whence::Current => Some(SeekFrom::Current(offset)),
            Whence::End => Some(SeekFrom::End(offset)),
        }
    }
}

/// One wrapper instance: at most one open stream and one open directory.
pub struct StreamWrapper {
    registry: Arc<DriverRegistry>,
    context: Option<StreamOptions>,
    handle: Option<StreamHandle>,
    dir: Option<DirectoryIterator>,
    last_error: Option<(ErrorKind, String)>,
}

impl StreamWrapper {
    pub fn new(registry: Arc<DriverRegistry>) -> Self {
        Self {
            registry,
            context: None,
            handle: None,
            dir: None,
            last_error: None,
        }
    }

    /// Options applied to every call below per-call options.
    pub fn with_context(mut self, context: StreamOptions) -> Self {
        self.context = Some(context);
        self
    }

    /// Message of the most recent failure.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_ref().map(|(_, msg)| msg.as_str())
    }

    pub fn last_error_kind(&self) -> Option<ErrorKind> {
        self.last_error.as_ref().map(|(kind, _)| *kind)
    }

    fn call_options(&self, per_call: Option<&StreamOptions>) -> StreamOptions {
        StreamOptions::resolve(per_call, self.context.as_ref(), &StreamOptions::default())
    }

    fn fail(&mut self, op: &str, err: VfsError, quiet: bool) {
        let message = format!("{op}: {err}");
        if quiet {
            debug!(%message, "suppressed failure");
        } else {
            warn!(kind = ?err.kind(), "{message}");
        }
        self.last_error = Some((err.kind(), message));
    }

    fn report<T>(&mut self, op: &str, result: Result<T, VfsError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.fail(op, err, false);
                None
            }
        }
    }

    // --- streams ---

    pub fn stream_open(&mut self, path: &str, mode: &str, options: Option<&StreamOptions>) -> bool {
        if self.handle.is_some() {
            let err = VfsError::UnsupportedOperation("a stream is already open".into());
            self.fail("open", err, false);
            return false;
        }
        let options = self.call_options(options);
        let result = self
            .registry
            .for_path(path)
            .and_then(|fs| fs.open_with(path, mode, Some(&options)));
        match self.report("open", result) {
            Some(handle) => {
                self.handle = Some(handle);
                true
            }
            None => false,
        }
    }

    fn with_handle<T>(
        &mut self,
        op: &str,
        f: impl FnOnce(&mut StreamHandle) -> Result<T, VfsError>,
    ) -> Option<T> {
        let result = match self.handle.as_mut() {
            Some(handle) => f(handle),
            None => Err(VfsError::HandleClosed),
        };
        self.report(op, result)
    }

    /// Up to `count` bytes, or `None` on failure.
    pub fn stream_read(&mut self, count: usize) -> Option<Vec<u8>> {
        self.with_handle("read", |h| h.read(count))
    }

    /// Bytes accepted; 0 on failure.
    pub fn stream_write(&mut self, data: &[u8]) -> usize {
        self.with_handle("write", |h| h.write(data)).unwrap_or(0)
    }

    pub fn stream_seek(&mut self, offset: i64, whence: Whence) -> bool {
        let Some(pos) = whence.seek_from(offset) else {
            return false;
        };
        self.with_handle("seek", |h| h.seek(pos)).unwrap_or(false)
    }

    pub fn stream_tell(&mut self) -> Option<u64> {
        self.with_handle("tell", StreamHandle::tell)
    }

    /// True at end of body, and when no stream is open.
    pub fn stream_eof(&mut self) -> bool {
        if self.handle.is_none() {
            return true;
        }
        self.with_handle("eof", StreamHandle::eof).unwrap_or(true)
    }

    pub fn stream_flush(&mut self) -> bool {
        self.with_handle("flush", StreamHandle::flush).is_some()
    }

    /// Upload if needed and release the stream. Closing with no open stream
    /// succeeds.
    pub fn stream_close(&mut self) -> bool {
        let Some(mut handle) = self.handle.take() else {
            return true;
        };
        let result = handle.close();
        self.report("close", result).is_some()
    }

    pub fn stream_stat(&mut self) -> Option<StatRecord> {
        self.with_handle("fstat", StreamHandle::stat)
    }

    // --- paths ---

    pub fn url_stat(&mut self, path: &str, flags: StatFlags) -> Option<StatRecord> {
        let options = self.call_options(None);
        let result = self
            .registry
            .for_path(path)
            .and_then(|fs| fs.stat_with(path, Some(&options)));
        match result {
            Ok(stat) => Some(stat.to_record()),
            Err(err) => {
                self.fail("stat", err, flags.quiet);
                (flags.quiet && flags.link).then(StatRecord::template)
            }
        }
    }

    pub fn mkdir(&mut self, path: &str, mode: u32, recursive: bool) -> bool {
        let options = self.call_options(None);
        let result = self
            .registry
            .for_path(path)
            .and_then(|fs| fs.mkdir_with(path, mode, recursive, Some(&options)));
        self.report("mkdir", result).is_some()
    }

    pub fn rmdir(&mut self, path: &str) -> bool {
        let options = self.call_options(None);
        let result = self
            .registry
            .for_path(path)
            .and_then(|fs| fs.rmdir_with(path, Some(&options)));
        self.report("rmdir", result).is_some()
    }

    pub fn rename(&mut self, from: &str, to: &str) -> bool {
        let options = self.call_options(None);
        let result = self.registry.for_path(from).and_then(|fs| {
            if self.registry.for_path(to).is_ok_and(|other| Arc::ptr_eq(&fs, &other)) {
                fs.rename_with(from, to, Some(&options))
            } else {
                Err(VfsError::UnsupportedOperation(format!(
                    "cannot rename across drivers: {from} -> {to}"
                )))
            }
        });
        self.report("rename", result).is_some()
    }

    pub fn unlink(&mut self, path: &str) -> bool {
        let options = self.call_options(None);
        let result = self
            .registry
            .for_path(path)
            .and_then(|fs| fs.unlink_with(path, Some(&options)));
        self.report("unlink", result).is_some()
    }

    // --- directories ---

    pub fn dir_opendir(&mut self, path: &str, options: Option<&StreamOptions>) -> bool {
        let options = self.call_options(options);
        let result = self
            .registry
            .for_path(path)
            .and_then(|fs| fs.opendir_with(path, Some(&options)));
        match self.report("opendir", result) {
            Some(iter) => {
                self.dir = Some(iter);
                true
            }
            None => false,
        }
    }

    /// Next child name; `None` at the end or on failure.
    pub fn dir_readdir(&mut self) -> Option<String> {
        let result = match self.dir.as_mut() {
            Some(iter) => iter.readdir(),
            None => Err(VfsError::HandleClosed),
        };
        self.report("readdir", result).flatten()
    }

    pub fn dir_rewinddir(&mut self) -> bool {
        match self.dir.as_mut() {
            Some(iter) => {
                iter.rewind();
                true
            }
            None => false,
        }
    }

    pub fn dir_closedir(&mut self) -> bool {
        if let Some(mut iter) = self.dir.take() {
            iter.close();
        }
        true
    }
}

impl std::fmt::Debug for StreamWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamWrapper")
            .field("protocols", &self.registry.protocols())
            .field("handle", &self.handle)
            .field("dir", &self.dir)
            .field("last_error", &self.last_error)
            .finish()
    }
}
