// Chunked upload engine: create a tus session for one target path, stream
// the local file into it chunk by chunk with explicit offsets, and delete
// the partial target whenever the stream does not finish.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indicatif::ProgressBar;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::api::Transport;
use crate::entry::normalize_remote_path;
use crate::error::{Error, Result};

pub const DEFAULT_CHUNK_SIZE: usize = 10 * 1024 * 1024;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Per-upload knobs shared by single-file and tree uploads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UploadOptions {
    /// Sent to the server as the `override` query flag. It does not bypass
    /// the existence check.
    pub override_existing: bool,
    /// Attempts per chunk, including the first one.
    pub max_attempts: u32,
    pub chunk_size: usize,
}

impl Default for UploadOptions {
    fn default() -> Self {
        UploadOptions {
            override_existing: false,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl UploadOptions {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidArgument(
                "chunk size must be greater than zero".into(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(Error::InvalidArgument(
                "max attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Shared flag set by the interrupt handler.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What a finished upload did.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UploadReport {
    pub target: String,
    pub bytes: u64,
    pub chunks: u64,
    /// Chunk requests sent, retries included.
    pub attempts: u64,
}

/// Where an upload session stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    NotCreated,
    Created,
    /// Bytes acknowledged so far.
    Uploading(u64),
    Completed,
    Aborted,
}

/// Server-side upload target for one file, addressed by its normalized
/// path for the whole transfer.
pub struct UploadSession<'a, T: Transport + ?Sized> {
    transport: &'a T,
    target: String,
    override_existing: bool,
    state: SessionState,
    chunks: u64,
    attempts: u64,
}

impl<'a, T: Transport + ?Sized> UploadSession<'a, T> {
    pub fn new(transport: &'a T, target: &str, override_existing: bool) -> Self {
        UploadSession {
            transport,
            target: normalize_remote_path(target).to_string(),
            override_existing,
            state: SessionState::NotCreated,
            chunks: 0,
            attempts: 0,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Open the session on the server. On failure nothing exists remotely.
    pub fn create(&mut self) -> Result<()> {
        debug_assert_eq!(self.state, SessionState::NotCreated);
        self.transport
            .create_upload(&self.target, self.override_existing)
            .map_err(|e| Error::CreateSession {
                path: self.target.clone(),
                source: Box::new(e),
            })?;
        debug!(remote = %self.target, "upload session created, start uploading chunks");
        self.state = SessionState::Created;
        Ok(())
    }

    /// Bytes acknowledged by the server so far.
    pub fn offset(&self) -> u64 {
        match self.state {
            SessionState::Uploading(offset) => offset,
            _ => 0,
        }
    }

    /// Send one chunk at the current offset, retrying the same bytes up to
    /// `max_attempts` times. The offset only advances on success.
    pub fn send_chunk(&mut self, chunk: &[u8], max_attempts: u32, cancel: &CancelFlag) -> Result<()> {
        let offset = self.offset();
        let mut attempt = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled(self.target.clone()));
            }
            attempt += 1;
            self.attempts += 1;
            match self
                .transport
                .patch_chunk(&self.target, self.override_existing, offset, chunk)
            {
                Ok(()) => break,
                Err(e) => {
                    error!(
                        remote = %self.target,
                        offset,
                        attempt,
                        max_attempts,
                        error = %e,
                        "error while uploading chunk"
                    );
                    if attempt >= max_attempts {
                        return Err(Error::ChunkExhausted {
                            path: self.target.clone(),
                            offset,
                            attempts: attempt,
                            source: Box::new(e),
                        });
                    }
                }
            }
        }
        self.chunks += 1;
        self.state = SessionState::Uploading(offset + chunk.len() as u64);
        Ok(())
    }

    /// Mark the session complete; the last acknowledged chunk is the commit.
    pub fn complete(&mut self) -> UploadReport {
        let bytes = self.offset();
        self.state = SessionState::Completed;
        UploadReport {
            target: self.target.clone(),
            bytes,
            chunks: self.chunks,
            attempts: self.attempts,
        }
    }

    /// Delete the partial target. Runs the delete at most once and only for
    /// a session that was created; a failing delete is logged, not returned.
    pub fn abort(&mut self) {
        match self.state {
            SessionState::Created | SessionState::Uploading(_) => {}
            SessionState::NotCreated | SessionState::Completed | SessionState::Aborted => return,
        }
        self.state = SessionState::Aborted;
        info!(remote = %self.target, "deleting unfinished file because of a failure");
        if let Err(e) = self.transport.delete_upload(&self.target) {
            warn!(remote = %self.target, error = %e, "cleanup of unfinished file failed");
        }
    }
}

/// Read up to `chunk_size` bytes, refilling short reads. Returns an empty
/// buffer at end of file.
fn read_chunk<R: Read>(reader: &mut R, chunk_size: usize, buf: &mut Vec<u8>) -> io::Result<()> {
    buf.clear();
    reader.take(chunk_size as u64).read_to_end(buf)?;
    Ok(())
}

/// Upload one local file to `target`.
///
/// Fails without touching the server when the local file is missing, and
/// without creating a session when the target already exists. Once the
/// session exists, any failure (retries exhausted, local read error,
/// cancellation) deletes the partial target before the error is returned.
pub fn upload_file<T: Transport + ?Sized>(
    transport: &T,
    local_path: &Path,
    target: &str,
    options: &UploadOptions,
    cancel: &CancelFlag,
    progress: &ProgressBar,
) -> Result<UploadReport> {
    options.validate()?;
    let target = normalize_remote_path(target);
    info!(local = %local_path.display(), remote = target, "uploading file");

    let mut file = match File::open(local_path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(Error::LocalMissing(local_path.to_path_buf()))
        }
        Err(e) => {
            return Err(Error::LocalRead {
                path: local_path.to_path_buf(),
                source: e,
            })
        }
    };
    let metadata = file.metadata().map_err(|e| Error::LocalRead {
        path: local_path.to_path_buf(),
        source: e,
    })?;
    if metadata.is_dir() {
        return Err(Error::InvalidArgument(format!(
            "'{}' is a directory, use a tree upload",
            local_path.display()
        )));
    }

    debug!(remote = target, "checking remote existence");
    let existing = transport.stat(target).map_err(|e| Error::FileInfo {
        path: target.to_string(),
        source: Box::new(e),
    })?;
    if existing.is_some() {
        error!(remote = target, "remote path already exists, aborting");
        return Err(Error::RemoteExists(target.to_string()));
    }

    let mut session = UploadSession::new(transport, target, options.override_existing);
    session.create()?;

    progress.set_message(target.to_string());
    progress.set_length(metadata.len());
    progress.set_position(0);

    run_session(&mut session, &mut file, local_path, options, cancel, progress)
}

/// Stream `reader` into a created session, then complete it or, on any
/// failure, delete the partial target before returning the error.
fn run_session<T: Transport + ?Sized, R: Read>(
    session: &mut UploadSession<'_, T>,
    reader: &mut R,
    local_path: &Path,
    options: &UploadOptions,
    cancel: &CancelFlag,
    progress: &ProgressBar,
) -> Result<UploadReport> {
    match stream_file(session, reader, local_path, options, cancel, progress) {
        Ok(()) => {
            let report = session.complete();
            info!(remote = %report.target, bytes = report.bytes, chunks = report.chunks, "file uploaded successfully");
            Ok(report)
        }
        Err(e) => {
            if matches!(e, Error::Cancelled(_)) {
                info!(remote = session.target(), "upload process cancelled by user");
            }
            session.abort();
            Err(e)
        }
    }
}

fn stream_file<T: Transport + ?Sized, R: Read>(
    session: &mut UploadSession<'_, T>,
    reader: &mut R,
    local_path: &Path,
    options: &UploadOptions,
    cancel: &CancelFlag,
    progress: &ProgressBar,
) -> Result<()> {
    let mut buf = Vec::with_capacity(options.chunk_size);
    loop {
        read_chunk(reader, options.chunk_size, &mut buf).map_err(|e| Error::LocalRead {
            path: local_path.to_path_buf(),
            source: e,
        })?;
        if buf.is_empty() {
            return Ok(());
        }
        debug!(offset = session.offset(), len = buf.len(), "processing chunk");
        session.send_chunk(&buf, options.max_attempts, cancel)?;
        progress.set_position(session.offset());
    }
}
