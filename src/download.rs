// Download path: stream a remote file's raw content into a local file.
// No retries and no resumption; a failed download is simply reported.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use indicatif::ProgressBar;
use serde::Serialize;
use tracing::info;

use crate::api::Transport;
use crate::entry::normalize_remote_path;
use crate::error::{Error, Result};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DownloadReport {
    pub source: String,
    pub destination: String,
    pub bytes: u64,
}

/// Download `target` to `local_path`, reading `chunk_size` bytes at a time.
pub fn download_file<T: Transport + ?Sized>(
    transport: &T,
    target: &str,
    local_path: &Path,
    chunk_size: usize,
    progress: &ProgressBar,
) -> Result<DownloadReport> {
    if chunk_size == 0 {
        return Err(Error::InvalidArgument(
            "chunk size must be greater than zero".into(),
        ));
    }
    let target = normalize_remote_path(target);
    info!(remote = target, local = %local_path.display(), "downloading file");

    let wrap = |e: Error| Error::Download {
        path: target.to_string(),
        source: Box::new(e),
    };

    let (mut reader, len) = transport.open_raw(target).map_err(wrap)?;
    if let Some(len) = len {
        progress.set_length(len);
    }
    let file = File::create(local_path).map_err(|e| wrap(e.into()))?;
    let mut writer = BufWriter::new(file);
    let bytes = copy_chunked(&mut reader, &mut writer, chunk_size, progress)
        .and_then(|n| writer.flush().map(|()| n))
        .map_err(|e| wrap(e.into()))?;

    info!(remote = target, bytes, "file downloaded successfully");
    Ok(DownloadReport {
        source: target.to_string(),
        destination: local_path.display().to_string(),
        bytes,
    })
}

fn copy_chunked<R: Read + ?Sized, W: Write>(
    reader: &mut R,
    writer: &mut W,
    chunk_size: usize,
    progress: &ProgressBar,
) -> std::io::Result<u64> {
    let mut buf = vec![0u8; chunk_size];
    let mut total = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buf[..n])?;
        total += n as u64;
        progress.set_position(total);
    }
}
