//! In-memory File Browser used by the integration tests.
//!
//! Behaves like the real server where the transfer logic cares: uploads
//! create missing parent folders, folder creation does not, and chunks must
//! arrive at the current end of the file.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::{Cursor, Read};

use filebrowser_cli::entry::{Listing, RemoteEntry};
use filebrowser_cli::{CancelFlag, Error, Result, Transport};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Stat(String),
    CreateFolder(String),
    CreateUpload(String),
    Patch { path: String, offset: u64, len: usize },
    Delete(String),
    Raw(String),
}

#[derive(Default)]
pub struct MockServer {
    calls: RefCell<Vec<Call>>,
    files: RefCell<BTreeMap<String, Vec<u8>>>,
    folders: RefCell<BTreeSet<String>>,
    /// Offset -> number of upcoming patch attempts at that offset to fail.
    patch_failures: RefCell<HashMap<u64, u32>>,
    fail_all_patches: RefCell<bool>,
    fail_create_upload: RefCell<bool>,
    fail_delete: RefCell<bool>,
    /// Cancel the flag once this many chunks were accepted.
    cancel_after: RefCell<Option<(usize, CancelFlag)>>,
    accepted: RefCell<usize>,
}

fn status(code: u16) -> Error {
    Error::Status {
        status: code,
        body: format!("{code}"),
    }
}

fn parent(path: &str) -> Option<&str> {
    path.rsplit_once('/').map(|(p, _)| p)
}

impl MockServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: &str, content: &[u8]) -> Self {
        self.add_ancestors(path);
        self.files.borrow_mut().insert(path.to_string(), content.to_vec());
        self
    }

    pub fn with_folder(self, path: &str) -> Self {
        self.add_ancestors(path);
        self.folders.borrow_mut().insert(path.to_string());
        self
    }

    pub fn fail_patch_at(&self, offset: u64, times: u32) {
        self.patch_failures.borrow_mut().insert(offset, times);
    }

    pub fn fail_all_patches(&self) {
        *self.fail_all_patches.borrow_mut() = true;
    }

    pub fn fail_create_upload(&self) {
        *self.fail_create_upload.borrow_mut() = true;
    }

    pub fn fail_delete(&self) {
        *self.fail_delete.borrow_mut() = true;
    }

    pub fn cancel_after(&self, chunks: usize, flag: CancelFlag) {
        *self.cancel_after.borrow_mut() = Some((chunks, flag));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    /// Offsets of every patch attempt, in order.
    pub fn patch_offsets(&self) -> Vec<u64> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                Call::Patch { offset, .. } => Some(*offset),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.borrow().iter().filter(|c| pred(c)).count()
    }

    /// Create / folder / delete calls as short strings, stat and patch left out.
    pub fn mutations(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                Call::CreateFolder(p) => Some(format!("mkdir {p}")),
                Call::CreateUpload(p) => Some(format!("upload {p}")),
                Call::Delete(p) => Some(format!("delete {p}")),
                _ => None,
            })
            .collect()
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.borrow().get(path).cloned()
    }

    pub fn has_folder(&self, path: &str) -> bool {
        self.folders.borrow().contains(path)
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }

    fn add_ancestors(&self, path: &str) {
        let mut folders = self.folders.borrow_mut();
        let mut current = parent(path);
        while let Some(p) = current {
            if p.is_empty() {
                break;
            }
            folders.insert(p.to_string());
            current = parent(p);
        }
    }

    fn entry(&self, path: &str, is_dir: bool, size: i64) -> RemoteEntry {
        let name = path.rsplit('/').next().unwrap_or(path).to_string();
        RemoteEntry {
            extension: name
                .rsplit_once('.')
                .map(|(_, ext)| format!(".{ext}"))
                .unwrap_or_default(),
            name,
            size,
            path: format!("/{path}"),
            modified: "2024-01-01T00:00:00Z".into(),
            mode: if is_dir { 2147484141 } else { 420 },
            is_dir,
            is_symlink: false,
            kind: if is_dir { String::new() } else { "blob".into() },
            extra: BTreeMap::new(),
        }
    }
}

impl Transport for MockServer {
    fn stat(&self, path: &str) -> Result<Option<Listing>> {
        self.record(Call::Stat(path.to_string()));
        if let Some(content) = self.files.borrow().get(path) {
            return Ok(Some(Listing {
                entry: self.entry(path, false, content.len() as i64),
                items: Vec::new(),
            }));
        }
        if self.folders.borrow().contains(path) {
            let prefix = format!("{path}/");
            let is_child = |p: &&String| {
                p.strip_prefix(&prefix)
                    .map(|rest| !rest.contains('/'))
                    .unwrap_or(false)
            };
            let mut items: Vec<RemoteEntry> = self
                .folders
                .borrow()
                .iter()
                .filter(is_child)
                .map(|p| self.entry(p, true, -1))
                .collect();
            items.extend(
                self.files
                    .borrow()
                    .iter()
                    .filter(|(p, _)| is_child(p))
                    .map(|(p, c)| self.entry(p, false, c.len() as i64)),
            );
            return Ok(Some(Listing {
                entry: self.entry(path, true, -1),
                items,
            }));
        }
        Ok(None)
    }

    fn create_folder(&self, path: &str, _override_existing: bool) -> Result<()> {
        self.record(Call::CreateFolder(path.to_string()));
        if let Some(p) = parent(path) {
            if !p.is_empty() && !self.folders.borrow().contains(p) {
                return Err(status(404));
            }
        }
        self.folders.borrow_mut().insert(path.to_string());
        Ok(())
    }

    fn create_upload(&self, path: &str, _override_existing: bool) -> Result<()> {
        self.record(Call::CreateUpload(path.to_string()));
        if *self.fail_create_upload.borrow() {
            return Err(status(500));
        }
        self.add_ancestors(path);
        self.files.borrow_mut().insert(path.to_string(), Vec::new());
        Ok(())
    }

    fn patch_chunk(
        &self,
        path: &str,
        _override_existing: bool,
        offset: u64,
        chunk: &[u8],
    ) -> Result<()> {
        self.record(Call::Patch {
            path: path.to_string(),
            offset,
            len: chunk.len(),
        });
        if *self.fail_all_patches.borrow() {
            return Err(status(503));
        }
        if let Some(remaining) = self.patch_failures.borrow_mut().get_mut(&offset) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(status(503));
            }
        }
        let mut files = self.files.borrow_mut();
        let content = files.get_mut(path).ok_or_else(|| status(404))?;
        if content.len() as u64 != offset {
            return Err(status(409));
        }
        content.extend_from_slice(chunk);
        drop(files);

        *self.accepted.borrow_mut() += 1;
        if let Some((after, flag)) = self.cancel_after.borrow().as_ref() {
            if *self.accepted.borrow() >= *after {
                flag.cancel();
            }
        }
        Ok(())
    }

    fn delete_upload(&self, path: &str) -> Result<()> {
        self.record(Call::Delete(path.to_string()));
        if *self.fail_delete.borrow() {
            return Err(status(500));
        }
        self.files.borrow_mut().remove(path);
        Ok(())
    }

    fn open_raw(&self, path: &str) -> Result<(Box<dyn Read + '_>, Option<u64>)> {
        self.record(Call::Raw(path.to_string()));
        let content = self.files.borrow().get(path).cloned().ok_or_else(|| status(404))?;
        let len = content.len() as u64;
        Ok((Box::new(Cursor::new(content)), Some(len)))
    }
}

/// Deterministic test payload of `len` bytes.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
