use super::compare::{Action, DiffResult};
use super::pool::{run_workers, DEFAULT_WORKERS};
use crate::fs::{join_path, Creator, Deleter, Entry, Reader, Writer};
use crate::utils::Context;
use crate::Result;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Applies a diff to the remote tree.
#[derive(Clone)]
pub struct Resolver {
    local_reader: Arc<dyn Reader>,
    remote_writer: Arc<dyn Writer>,
    remote_creator: Arc<dyn Creator>,
    remote_deleter: Arc<dyn Deleter>,
    local_root: String,
    remote_root: String,
}

impl Resolver {
    pub fn new(
        local_reader: Arc<dyn Reader>,
        remote_writer: Arc<dyn Writer>,
        remote_creator: Arc<dyn Creator>,
        remote_deleter: Arc<dyn Deleter>,
        local_root: impl Into<String>,
        remote_root: impl Into<String>,
    ) -> Self {
        Self {
            local_reader,
            remote_writer,
            remote_creator,
            remote_deleter,
            local_root: local_root.into(),
            remote_root: remote_root.into(),
        }
    }

    /// Apply `diff`: every directory action completes before any file action.
    ///
    /// Returns the relative paths of files that were not uploaded because the
    /// local file was unreadable or the server refused the write.
    pub async fn resolve(&self, diff: Vec<DiffResult>, cancel: &CancellationToken) -> Result<Vec<String>> {
        let diff = without_nested_deletes(diff);
        let (directories, files): (Vec<_>, Vec<_>) = diff.into_iter().partition(|r| r.entry.is_dir());

        info!(directories = directories.len(), files = files.len(), "Resolving diff");

        let mut skipped = self
            .resolve_partition(directories, cancel)
            .await
            .context("resolving directories")?;
        skipped.extend(
            self.resolve_partition(files, cancel)
                .await
                .context("resolving files")?,
        );

        if !skipped.is_empty() {
            warn!(count = skipped.len(), "Some files were not uploaded");
        }
        Ok(skipped)
    }

    async fn resolve_partition(&self, items: Vec<DiffResult>, cancel: &CancellationToken) -> Result<Vec<String>> {
        let resolver = self.clone();
        run_workers(cancel, DEFAULT_WORKERS, items, move |item: DiffResult| {
            let resolver = resolver.clone();
            async move { resolver.apply(item).await }
        })
        .await
    }

    /// Apply one item. `Ok(Some(path))` names a file that was skipped.
    async fn apply(&self, item: DiffResult) -> Result<Option<String>> {
        let path = item.entry.path().to_string();
        debug!(path = %path, action = %item.action, "Applying");

        match item.action {
            Action::Upload => self
                .upload(&item.entry)
                .await
                .with_context(|| format!("uploading {}", path)),
            Action::Change => {
                let replaced = item.previous.as_ref().unwrap_or(&item.entry);
                self.delete(replaced)
                    .await
                    .with_context(|| format!("deleting {} before replacing it", path))?;
                self.upload(&item.entry)
                    .await
                    .with_context(|| format!("uploading {}", path))
            }
            Action::Delete => self
                .delete(&item.entry)
                .await
                .with_context(|| format!("deleting {}", path))
                .map(|()| None),
        }
    }

    async fn upload(&self, entry: &Entry) -> Result<Option<String>> {
        let remote_path = join_path(&self.remote_root, entry.path());
        if entry.is_dir() {
            self.remote_creator.create_dir(&remote_path).await?;
            return Ok(None);
        }

        let local_path = join_path(&self.local_root, entry.path());
        let Some(content) = self.local_reader.read(&local_path).await? else {
            warn!(path = %local_path, "Local file is not readable, not uploading");
            return Ok(Some(entry.path().to_string()));
        };

        match self.remote_writer.write(&remote_path, content).await {
            Ok(()) => Ok(None),
            Err(e) if e.is_permission_denied() => {
                warn!(path = %remote_path, "No permission to write remote file, skipping");
                Ok(Some(entry.path().to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn delete(&self, entry: &Entry) -> Result<()> {
        let remote_path = join_path(&self.remote_root, entry.path());
        if entry.is_dir() {
            self.remote_deleter.delete_dir(&remote_path).await
        } else {
            self.remote_deleter.delete(&remote_path).await
        }
    }
}

/// Drop deletions that a recursive directory removal in the same diff already
/// covers. Running both at once races the walk of the outer removal.
fn without_nested_deletes(diff: Vec<DiffResult>) -> Vec<DiffResult> {
    let removed: HashSet<String> = diff
        .iter()
        .filter_map(|r| match r.action {
            Action::Delete if r.entry.is_dir() => Some(r.entry.path().to_string()),
            Action::Change => r
                .previous
                .as_ref()
                .filter(|p| p.is_dir())
                .map(|p| p.path().to_string()),
            _ => None,
        })
        .collect();
    if removed.is_empty() {
        return diff;
    }

    diff.into_iter()
        .filter(|r| {
            let covered = r.action == Action::Delete && has_ancestor_in(r.entry.path(), &removed);
            if covered {
                debug!(path = r.entry.path(), "Removed with its parent directory");
            }
            !covered
        })
        .collect()
}

fn has_ancestor_in(path: &str, dirs: &HashSet<String>) -> bool {
    let mut current = path;
    while let Some(idx) = current.rfind('/') {
        current = &current[..idx];
        if current.is_empty() {
            return false;
        }
        if dirs.contains(current) {
            return true;
        }
    }
    false
}

/// Apply `diff` against the remote tree at `remote_root`, reading file
/// content from `local_root`.
#[allow(clippy::too_many_arguments)]
pub async fn resolve_diff(
    diff: Vec<DiffResult>,
    local_reader: Arc<dyn Reader>,
    remote_writer: Arc<dyn Writer>,
    remote_creator: Arc<dyn Creator>,
    remote_deleter: Arc<dyn Deleter>,
    local_root: &str,
    remote_root: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    Resolver::new(
        local_reader,
        remote_writer,
        remote_creator,
        remote_deleter,
        local_root,
        remote_root,
    )
    .resolve(diff, cancel)
    .await
    .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::local::LocalFs;
    use crate::fs::memory::{MemoryTransport, Op};
    use crate::fs::remote::{RemoteFs, Transport};
    use crate::fs::{digest_bytes, ListEntry};
    use crate::utils::DeployError;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Removes directories the way a real server client does: list, recurse,
    /// then remove the emptied directory, with a pause that widens races.
    struct WalkingRemove(MemoryTransport);

    impl Transport for WalkingRemove {
        fn list(&self, dir: &str) -> Result<Vec<ListEntry>> {
            self.0.list(dir)
        }

        fn read(&self, path: &str) -> Result<Vec<u8>> {
            self.0.read(path)
        }

        fn write(&self, path: &str, data: &[u8]) -> Result<()> {
            self.0.write(path, data)
        }

        fn delete(&self, path: &str) -> Result<()> {
            self.0.delete(path)
        }

        fn remove_dir_all(&self, path: &str) -> Result<()> {
            let children = self.0.list(path)?;
            std::thread::sleep(Duration::from_millis(20));
            for child in children {
                let child_path = format!("{}/{}", path, child.name);
                if child.is_dir {
                    self.remove_dir_all(&child_path)?;
                } else {
                    self.0.delete(&child_path)?;
                }
            }
            self.0.remove_dir_all(path)
        }

        fn make_dir(&self, path: &str, mode: u32) -> Result<()> {
            self.0.make_dir(path, mode)
        }

        fn change_mode(&self, path: &str, mode: u32) -> Result<()> {
            self.0.change_mode(path, mode)
        }
    }

    struct Fixture {
        _local_dir: TempDir,
        local_root: String,
        remote: Arc<RemoteFs<MemoryTransport>>,
    }

    fn fixture(files: &[(&str, &str)]) -> Fixture {
        let local_dir = TempDir::new().unwrap();
        for (path, content) in files {
            let target = local_dir.path().join(path.trim_start_matches('/'));
            std::fs::create_dir_all(target.parent().unwrap()).unwrap();
            std::fs::write(target, content).unwrap();
        }
        Fixture {
            local_root: local_dir.path().to_string_lossy().to_string(),
            _local_dir: local_dir,
            remote: Arc::new(RemoteFs::new(MemoryTransport::with_dirs(&["/www"]), 0o644, 0o755)),
        }
    }

    async fn resolve(f: &Fixture, diff: Vec<DiffResult>) -> Result<()> {
        resolve_diff(
            diff,
            Arc::new(LocalFs::new()),
            f.remote.clone(),
            f.remote.clone(),
            f.remote.clone(),
            &f.local_root,
            "/www",
            &CancellationToken::new(),
        )
        .await
    }

    #[tokio::test]
    async fn test_upload_change_delete() -> Result<()> {
        let f = fixture(&[("/dir/b.txt", "world"), ("/a.txt", "new")]);
        f.remote.transport().put_file("/www/a.txt", b"old");
        f.remote.transport().put_file("/www/c.txt", b"stale");

        resolve(
            &f,
            vec![
                DiffResult::upload(Entry::directory("/dir")),
                DiffResult::upload(Entry::file("/dir/b.txt", digest_bytes(b"world"))),
                DiffResult::change(Entry::file("/a.txt", digest_bytes(b"new")), Entry::file("/a.txt", "x")),
                DiffResult::delete(Entry::file("/c.txt", "x")),
            ],
        )
        .await?;

        let t = f.remote.transport();
        assert_eq!(t.file("/www/dir/b.txt"), Some(b"world".to_vec()));
        assert_eq!(t.file("/www/a.txt"), Some(b"new".to_vec()));
        assert_eq!(t.file("/www/c.txt"), None);
        assert_eq!(t.mode("/www/dir"), Some(0o755));
        assert_eq!(t.mode("/www/a.txt"), Some(0o644));
        Ok(())
    }

    #[tokio::test]
    async fn test_directories_before_files() -> Result<()> {
        let files: Vec<(String, String)> = (0..15)
            .map(|i| (format!("/d{}/f.txt", i), i.to_string()))
            .collect();
        let refs: Vec<(&str, &str)> = files.iter().map(|(p, c)| (p.as_str(), c.as_str())).collect();
        let f = fixture(&refs);

        let mut diff = Vec::new();
        for (path, content) in &files {
            diff.push(DiffResult::upload(Entry::file(path.clone(), digest_bytes(content.as_bytes()))));
            diff.push(DiffResult::upload(Entry::directory(path.trim_end_matches("/f.txt"))));
        }
        resolve(&f, diff).await?;

        let ops = f.remote.transport().ops();
        let last_mkdir = ops.iter().rposition(|(op, _)| *op == Op::MakeDir).unwrap();
        let first_write = ops.iter().position(|(op, _)| *op == Op::Write).unwrap();
        assert!(last_mkdir < first_write);
        assert_eq!(f.remote.transport().count(Op::Write), 15);
        Ok(())
    }

    #[tokio::test]
    async fn test_kind_change_removes_previous_kind() -> Result<()> {
        let f = fixture(&[("/x/inner.txt", "inner"), ("/y", "now a file")]);
        f.remote.transport().put_file("/www/x", b"was a file");
        f.remote.transport().add_dir("/www/y");
        f.remote.transport().put_file("/www/y/old.txt", b"old");

        resolve(
            &f,
            vec![
                DiffResult::change(Entry::directory("/x"), Entry::file("/x", "h")),
                DiffResult::upload(Entry::file("/x/inner.txt", digest_bytes(b"inner"))),
                DiffResult::change(Entry::file("/y", digest_bytes(b"now a file")), Entry::directory("/y")),
                DiffResult::delete(Entry::file("/y/old.txt", "h")),
            ],
        )
        .await?;

        let t = f.remote.transport();
        assert!(t.is_dir("/www/x"));
        assert_eq!(t.file("/www/x/inner.txt"), Some(b"inner".to_vec()));
        assert!(!t.is_dir("/www/y"));
        assert_eq!(t.file("/www/y"), Some(b"now a file".to_vec()));
        Ok(())
    }

    #[tokio::test]
    async fn test_permission_denied_does_not_abort() -> Result<()> {
        let f = fixture(&[("/a.txt", "a")]);
        f.remote.transport().put_file("/www/locked.txt", b"x");
        f.remote.transport().deny(Op::Delete, "/www/locked.txt");
        f.remote.transport().deny(Op::Chmod, "/www/a.txt");
        f.remote.transport().deny(Op::MakeDir, "/www");

        resolve(
            &f,
            vec![
                DiffResult::upload(Entry::directory("/cache")),
                DiffResult::upload(Entry::file("/a.txt", digest_bytes(b"a"))),
                DiffResult::delete(Entry::file("/locked.txt", "x")),
            ],
        )
        .await?;

        assert!(f.remote.transport().is_dir("/www/cache"));
        assert_eq!(f.remote.transport().file("/www/a.txt"), Some(b"a".to_vec()));
        assert!(f.remote.transport().file("/www/locked.txt").is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_transport_error_aborts_with_context() {
        let f = fixture(&[("/a.txt", "a")]);
        f.remote.transport().fail(Op::Write, "/www/a.txt");

        let err = resolve(&f, vec![DiffResult::upload(Entry::file("/a.txt", "h"))])
            .await
            .unwrap_err();

        assert!(matches!(err.root(), DeployError::Transport(_)));
        assert!(err.to_string().starts_with("resolving files: uploading /a.txt"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_nested_directory_deletes_remove_whole_tree() -> Result<()> {
        let inner = MemoryTransport::with_dirs(&["/www", "/www/old", "/www/old/sub"]);
        inner.put_file("/www/old/b.txt", b"b");
        inner.put_file("/www/old/sub/a.txt", b"a");
        let remote = Arc::new(RemoteFs::new(WalkingRemove(inner), 0o644, 0o755));

        resolve_diff(
            vec![
                DiffResult::delete(Entry::directory("/old")),
                DiffResult::delete(Entry::directory("/old/sub")),
                DiffResult::delete(Entry::file("/old/b.txt", "h")),
                DiffResult::delete(Entry::file("/old/sub/a.txt", "h")),
            ],
            Arc::new(LocalFs::new()),
            remote.clone(),
            remote.clone(),
            remote.clone(),
            "/unused",
            "/www",
            &CancellationToken::new(),
        )
        .await?;

        let t = &remote.transport().0;
        assert!(!t.is_dir("/www/old"));
        assert!(!t.is_dir("/www/old/sub"));
        assert!(t.file("/www/old/b.txt").is_none());
        // Only the walk of /old touched its contents.
        assert_eq!(t.count(Op::Delete), 2);
        Ok(())
    }

    #[test]
    fn test_deletes_inside_removed_directories_are_dropped() {
        let diff = without_nested_deletes(vec![
            DiffResult::delete(Entry::directory("/old")),
            DiffResult::delete(Entry::directory("/old/sub")),
            DiffResult::delete(Entry::file("/old/sub/a.txt", "h")),
            DiffResult::delete(Entry::file("/older.txt", "h")),
            DiffResult::change(Entry::file("/y", "new"), Entry::directory("/y")),
            DiffResult::delete(Entry::file("/y/stale.txt", "h")),
        ]);

        let mut kept: Vec<(Action, &str)> = diff.iter().map(|r| (r.action, r.entry.path())).collect();
        kept.sort_by_key(|(_, path)| *path);
        assert_eq!(
            kept,
            vec![
                (Action::Delete, "/old"),
                (Action::Delete, "/older.txt"),
                (Action::Change, "/y"),
            ]
        );
    }

    #[tokio::test]
    async fn test_denied_upload_is_skipped_and_reported() -> Result<()> {
        let f = fixture(&[("/a.txt", "a"), ("/b.txt", "b")]);
        f.remote.transport().deny(Op::Write, "/www/a.txt");

        let resolver = Resolver::new(
            Arc::new(LocalFs::new()),
            f.remote.clone(),
            f.remote.clone(),
            f.remote.clone(),
            f.local_root.clone(),
            "/www",
        );
        let skipped = resolver
            .resolve(
                vec![
                    DiffResult::upload(Entry::file("/a.txt", digest_bytes(b"a"))),
                    DiffResult::upload(Entry::file("/b.txt", digest_bytes(b"b"))),
                ],
                &CancellationToken::new(),
            )
            .await?;

        assert_eq!(skipped, vec!["/a.txt".to_string()]);
        assert!(f.remote.transport().file("/www/a.txt").is_none());
        assert_eq!(f.remote.transport().file("/www/b.txt"), Some(b"b".to_vec()));
        Ok(())
    }
}
