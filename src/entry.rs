// Remote entry model: one file or folder as reported by the server's
// `/resources` endpoint. Entries are built from a response and never
// mutated afterwards, except for the free-form extra properties.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata of one remote file or folder.
///
/// Equality and hashing cover the base fields only; `extra` carries every
/// other field the server sent and does not take part in identity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub name: String,
    /// Byte size. Negative when the server did not compute it (folders).
    #[serde(default = "unknown_size")]
    pub size: i64,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub extension: String,
    #[serde(default)]
    pub modified: String,
    #[serde(default)]
    pub mode: u32,
    #[serde(rename = "isDir", default)]
    pub is_dir: bool,
    #[serde(rename = "isSymlink", default)]
    pub is_symlink: bool,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn unknown_size() -> i64 {
    -1
}

impl RemoteEntry {
    /// Size in bytes, or `None` when the server reports it as unknown.
    pub fn size_hint(&self) -> Option<u64> {
        u64::try_from(self.size).ok()
    }

    /// Extra property sent by the server, e.g. `numFiles` on folders.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: Value) {
        self.extra.insert(key.into(), value);
    }

    pub fn remove_property(&mut self, key: &str) -> Option<Value> {
        self.extra.remove(key)
    }

    /// One-line JSON representation.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.name.clone())
    }

    fn base_fields(&self) -> (&str, i64, &str, &str, &str, u32, bool, bool, &str) {
        (
            self.name.as_str(),
            self.size,
            self.path.as_str(),
            self.extension.as_str(),
            self.modified.as_str(),
            self.mode,
            self.is_dir,
            self.is_symlink,
            self.kind.as_str(),
        )
    }
}

impl PartialEq for RemoteEntry {
    fn eq(&self, other: &Self) -> bool {
        self.base_fields() == other.base_fields()
    }
}

impl Eq for RemoteEntry {}

impl Hash for RemoteEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.base_fields().hash(state);
    }
}

// Names sort first; the remaining fields only break ties so that the
// ordering agrees with `Eq`.
impl Ord for RemoteEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.base_fields().cmp(&other.base_fields())
    }
}

impl PartialOrd for RemoteEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for RemoteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Full answer of `GET /resources/{path}`: the entry itself plus its
/// children when it is a folder.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Listing {
    #[serde(flatten)]
    pub entry: RemoteEntry,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<RemoteEntry>,
}

impl Listing {
    pub fn from_json(body: &str) -> serde_json::Result<Self> {
        serde_json::from_str(body)
    }
}

/// Strip one leading slash from a remote path.
pub fn normalize_remote_path(path: &str) -> &str {
    path.strip_prefix('/').unwrap_or(path)
}

/// Join a remote directory path and a child name with a single slash.
pub fn join_remote(parent: &str, name: &str) -> String {
    if parent.is_empty() || parent.ends_with('/') {
        format!("{parent}{name}")
    } else {
        format!("{parent}/{name}")
    }
}
