//! Normalized tree entries and snapshots.

use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// A file or directory of one tree, keyed by its "/"-rooted relative path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Entry {
    File { path: String, digest: String },
    Directory { path: String },
}

impl Entry {
    pub fn file(path: impl Into<String>, digest: impl Into<String>) -> Self {
        Entry::File {
            path: path.into(),
            digest: digest.into(),
        }
    }

    pub fn directory(path: impl Into<String>) -> Self {
        Entry::Directory { path: path.into() }
    }

    pub fn path(&self) -> &str {
        match self {
            Entry::File { path, .. } | Entry::Directory { path } => path,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Entry::Directory { .. })
    }

    /// Content digest; always empty for directories.
    pub fn digest(&self) -> &str {
        match self {
            Entry::File { digest, .. } => digest,
            Entry::Directory { .. } => "",
        }
    }
}

/// Every entry of one tree at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: HashMap<String, Entry>,
}

impl Snapshot {
    /// Build from a list; a later duplicate path replaces an earlier one.
    pub fn from_entries(entries: impl IntoIterator<Item = Entry>) -> Self {
        let entries = entries
            .into_iter()
            .map(|e| (e.path().to_string(), e))
            .collect();
        Self { entries }
    }

    pub fn get(&self, path: &str) -> Option<&Entry> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn remove(&mut self, path: &str) -> Option<Entry> {
        self.entries.remove(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    /// Entries ordered by path.
    pub fn sorted(&self) -> Vec<&Entry> {
        let mut sorted: Vec<&Entry> = self.entries.values().collect();
        sorted.sort_by(|a, b| a.path().cmp(b.path()));
        sorted
    }
}

/// Lowercase hex SHA-256 of `data`.
pub fn digest_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
