use crate::fs::{Entry, Snapshot};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Upload,
    Change,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Upload => write!(f, "upload"),
            Action::Change => write!(f, "change"),
            Action::Delete => write!(f, "delete"),
        }
    }
}

/// One change needed to bring the remote tree in line with the local one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffResult {
    /// Local entry for `Upload`/`Change`, remote entry for `Delete`.
    pub entry: Entry,
    pub action: Action,
    /// Remote entry replaced by a `Change`.
    pub previous: Option<Entry>,
}

impl DiffResult {
    pub fn upload(entry: Entry) -> Self {
        Self {
            entry,
            action: Action::Upload,
            previous: None,
        }
    }

    pub fn change(entry: Entry, previous: Entry) -> Self {
        Self {
            entry,
            action: Action::Change,
            previous: Some(previous),
        }
    }

    pub fn delete(entry: Entry) -> Self {
        Self {
            entry,
            action: Action::Delete,
            previous: None,
        }
    }
}

/// Classify every path of `local` and `remote`. Paths whose digests agree do
/// not appear; two directories always agree.
pub fn compare(local: &Snapshot, remote: &Snapshot) -> Vec<DiffResult> {
    let mut results = Vec::new();

    for entry in local.entries() {
        match remote.get(entry.path()) {
            None => results.push(DiffResult::upload(entry.clone())),
            Some(existing) if differs(entry, existing) => {
                results.push(DiffResult::change(entry.clone(), existing.clone()))
            }
            Some(_) => {}
        }
    }

    for entry in remote.entries() {
        if !local.contains(entry.path()) {
            results.push(DiffResult::delete(entry.clone()));
        }
    }

    results
}

fn differs(local: &Entry, remote: &Entry) -> bool {
    match (local, remote) {
        (Entry::Directory { .. }, Entry::Directory { .. }) => false,
        (Entry::File { digest: a, .. }, Entry::File { digest: b, .. }) => a != b,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::digest_bytes;

    fn sorted(mut results: Vec<DiffResult>) -> Vec<(Action, String)> {
        results.sort_by(|a, b| a.entry.path().cmp(b.entry.path()));
        results
            .into_iter()
            .map(|r| (r.action, r.entry.path().to_string()))
            .collect()
    }

    #[test]
    fn test_upload_and_delete_scenario() {
        let local = Snapshot::from_entries(vec![
            Entry::file("/a.txt", digest_bytes(b"hello")),
            Entry::directory("/dir"),
            Entry::file("/dir/b.txt", digest_bytes(b"world")),
        ]);
        let remote = Snapshot::from_entries(vec![
            Entry::file("/a.txt", digest_bytes(b"hello")),
            Entry::file("/c.txt", digest_bytes(b"stale")),
        ]);

        assert_eq!(
            sorted(compare(&local, &remote)),
            vec![
                (Action::Delete, "/c.txt".to_string()),
                (Action::Upload, "/dir".to_string()),
                (Action::Upload, "/dir/b.txt".to_string()),
            ]
        );
    }

    #[test]
    fn test_changed_digest() {
        let local = Snapshot::from_entries(vec![Entry::file("/a.txt", "new")]);
        let remote = Snapshot::from_entries(vec![Entry::file("/a.txt", "old")]);

        let results = compare(&local, &remote);
        assert_eq!(results, vec![DiffResult::change(Entry::file("/a.txt", "new"), Entry::file("/a.txt", "old"))]);
    }

    #[test]
    fn test_kind_mismatch_is_change_with_previous() {
        let local = Snapshot::from_entries(vec![Entry::directory("/x")]);
        let remote = Snapshot::from_entries(vec![Entry::file("/x", "abc")]);

        let results = compare(&local, &remote);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].action, Action::Change);
        assert_eq!(results[0].previous, Some(Entry::file("/x", "abc")));
    }

    #[test]
    fn test_identical_trees_produce_nothing() {
        let snapshot = Snapshot::from_entries(vec![
            Entry::directory("/app"),
            Entry::file("/app/index.php", "aa"),
        ]);
        assert!(compare(&snapshot, &snapshot.clone()).is_empty());
        assert!(compare(&Snapshot::default(), &Snapshot::default()).is_empty());
    }

    #[test]
    fn test_every_path_appears_once() {
        let local = Snapshot::from_entries((0..20).map(|i| Entry::file(format!("/f{}", i), format!("{}", i % 3))));
        let remote = Snapshot::from_entries((10..30).map(|i| Entry::file(format!("/f{}", i), "0")));

        let results = compare(&local, &remote);
        let mut paths: Vec<&str> = results.iter().map(|r| r.entry.path()).collect();
        let total = paths.len();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), total);

        // 0..10 uploads, 20..30 deletes, 10..20 changed unless digest is "0".
        let changes = (10..20).filter(|i| i % 3 != 0).count();
        assert_eq!(total, 10 + 10 + changes);
        assert!(results
            .iter()
            .filter(|r| r.action == Action::Change)
            .all(|r| r.entry.digest() != "0"));
    }
}
