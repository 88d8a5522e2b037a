// Tree walker: maps a local directory onto remote folder creations and
// file uploads, one entry at a time.
//
// At every level the files are uploaded before the subdirectories are
// created. Uploading a file auto-creates its missing remote parents, while
// creating a folder requires its parent to exist already, so this order is
// what lets a fresh remote root come into being.

use std::fs;
use std::path::{Path, PathBuf};

use indicatif::ProgressBar;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::Transport;
use crate::entry::{join_remote, normalize_remote_path};
use crate::error::{Error, Result};
use crate::upload::{upload_file, CancelFlag, UploadOptions, UploadReport};

/// What to do after an entry fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop at the first failed entry.
    #[default]
    Halt,
    /// Record the failure and keep walking.
    Continue,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Folder,
}

/// Result of one remote operation performed by the walk.
#[derive(Debug)]
pub struct EntryOutcome {
    pub kind: EntryKind,
    pub local: PathBuf,
    pub remote: String,
    pub result: Result<Option<UploadReport>>,
}

impl EntryOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Every outcome of one tree upload, in the order the operations ran.
#[derive(Debug, Default)]
pub struct TreeReport {
    pub outcomes: Vec<EntryOutcome>,
    /// Set when the walk stopped early because of a cancellation.
    pub cancelled: bool,
}

impl TreeReport {
    pub fn failures(&self) -> impl Iterator<Item = &EntryOutcome> {
        self.outcomes.iter().filter(|o| !o.is_ok())
    }

    pub fn first_error(&self) -> Option<&Error> {
        self.outcomes.iter().find_map(|o| o.result.as_ref().err())
    }

    /// Total bytes of all successful file uploads.
    pub fn uploaded_bytes(&self) -> u64 {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().and_then(|r| r.as_ref()))
            .map(|r| r.bytes)
            .sum()
    }
}

/// Uploads a local file or directory tree.
pub struct TreeUploader<'a, T: Transport + ?Sized> {
    transport: &'a T,
    options: UploadOptions,
    policy: FailurePolicy,
    cancel: CancelFlag,
    progress: ProgressBar,
}

impl<'a, T: Transport + ?Sized> TreeUploader<'a, T> {
    pub fn new(transport: &'a T, options: UploadOptions, cancel: CancelFlag) -> Self {
        TreeUploader {
            transport,
            options,
            policy: FailurePolicy::default(),
            cancel,
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Progress bar reused for each file upload.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Upload `local_root` to `remote_root`.
    ///
    /// A regular file is uploaded directly to `remote_root`. A directory's
    /// content lands under `remote_root`, which itself is only created
    /// implicitly by the first file upload. Local traversal errors are
    /// returned directly; remote failures end up in the report.
    pub fn upload(&self, local_root: &Path, remote_root: &str) -> Result<TreeReport> {
        self.options.validate()?;
        let metadata = match fs::metadata(local_root) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::LocalMissing(local_root.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };
        let remote_root = normalize_remote_path(remote_root);
        let mut report = TreeReport::default();

        if metadata.is_dir() {
            info!(local = %local_root.display(), remote = remote_root, "uploading directory tree");
            self.walk(local_root, remote_root, &mut report)?;
        } else {
            self.upload_one(local_root, remote_root.to_string(), &mut report);
        }
        Ok(report)
    }

    /// Process one level, then descend. Returns `false` once the walk must
    /// stop.
    fn walk(&self, dir: &Path, remote: &str, report: &mut TreeReport) -> Result<bool> {
        let (files, dirs) = list_dir(dir)?;

        for (name, path) in files {
            if !self.upload_one(&path, join_remote(remote, &name), report) {
                return Ok(false);
            }
        }

        let mut descend = Vec::with_capacity(dirs.len());
        for (name, path, is_symlink) in dirs {
            let remote_dir = join_remote(remote, &name);
            if !self.create_one(&path, remote_dir.clone(), report) {
                return Ok(false);
            }
            if is_symlink {
                debug!(local = %path.display(), "not descending into symlinked directory");
            } else {
                descend.push((path, remote_dir));
            }
        }

        for (path, remote_dir) in descend {
            if !self.walk(&path, &remote_dir, report)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn upload_one(&self, local: &Path, remote: String, report: &mut TreeReport) -> bool {
        if self.stop_for_cancel(report) {
            return false;
        }
        info!(remote = %remote, "uploading file to remote path");
        let result = upload_file(
            self.transport,
            local,
            &remote,
            &self.options,
            &self.cancel,
            &self.progress,
        )
        .map(Some);
        self.record(EntryKind::File, local, remote, result, report)
    }

    fn create_one(&self, local: &Path, remote: String, report: &mut TreeReport) -> bool {
        if self.stop_for_cancel(report) {
            return false;
        }
        info!(remote = %remote, "creating directory at remote path");
        let result = self
            .transport
            .create_folder(&remote, self.options.override_existing)
            .map(|()| None)
            .map_err(|e| Error::CreateFolder {
                path: remote.clone(),
                source: Box::new(e),
            });
        self.record(EntryKind::Folder, local, remote, result, report)
    }

    fn stop_for_cancel(&self, report: &mut TreeReport) -> bool {
        if self.cancel.is_cancelled() {
            report.cancelled = true;
            return true;
        }
        false
    }

    /// Store an outcome; returns whether the walk goes on.
    fn record(
        &self,
        kind: EntryKind,
        local: &Path,
        remote: String,
        result: Result<Option<UploadReport>>,
        report: &mut TreeReport,
    ) -> bool {
        let cancelled = matches!(result, Err(Error::Cancelled(_)));
        let failed = result.is_err();
        if let Err(e) = &result {
            warn!(remote = %remote, error = %e, "entry failed");
        }
        report.outcomes.push(EntryOutcome {
            kind,
            local: local.to_path_buf(),
            remote,
            result,
        });
        if cancelled {
            report.cancelled = true;
            return false;
        }
        !(failed && self.policy == FailurePolicy::Halt)
    }
}

type FileList = Vec<(String, PathBuf)>;
type DirList = Vec<(String, PathBuf, bool)>;

/// Split a directory's children into files and directories, each sorted by
/// name. Symlinks are classified by their target; dangling ones are skipped.
fn list_dir(dir: &Path) -> Result<(FileList, DirList)> {
    let mut files = Vec::new();
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_symlink = entry.file_type()?.is_symlink();
        let metadata = match fs::metadata(&path) {
            Ok(m) => m,
            Err(e) if is_symlink => {
                warn!(local = %path.display(), error = %e, "skipping dangling symlink");
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        if metadata.is_dir() {
            dirs.push((name, path, is_symlink));
        } else if metadata.is_file() {
            files.push((name, path));
        } else {
            debug!(local = %path.display(), "skipping special file");
        }
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    dirs.sort_by(|a, b| a.0.cmp(&b.0));
    Ok((files, dirs))
}
