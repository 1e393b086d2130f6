use super::filter::Filter;
use super::pool::{run_workers, DEFAULT_WORKERS};
use crate::fs::{join_path, Entry, HashReader, ListEntry, Lister, Snapshot};
use crate::utils::Context;
use crate::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Read the tree under `root` into a [`Snapshot`].
///
/// `lister` must return "/"-rooted relative names for the whole tree. Paths
/// the filter excludes, and files whose digest cannot be read, are left out.
pub async fn read_tree(
    lister: Arc<dyn Lister>,
    hash_reader: Arc<dyn HashReader>,
    filter: Arc<dyn Filter>,
    root: &str,
    cancel: &CancellationToken,
) -> Result<Snapshot> {
    let listing = lister
        .list(root)
        .await
        .with_context(|| format!("listing tree {}", root))?;
    let listed = listing.len();

    let root_owned = root.to_string();
    let entries = run_workers(cancel, DEFAULT_WORKERS, listing, move |item: ListEntry| {
        let hash_reader = Arc::clone(&hash_reader);
        let filter = Arc::clone(&filter);
        let root = root_owned.clone();

        async move { read_entry(item, &root, hash_reader.as_ref(), filter.as_ref()).await }
    })
    .await
    .with_context(|| format!("reading tree {}", root))?;

    let snapshot = Snapshot::from_entries(entries);
    info!(root, listed, entries = snapshot.len(), "Read tree");
    Ok(snapshot)
}

async fn read_entry(
    item: ListEntry,
    root: &str,
    hash_reader: &dyn HashReader,
    filter: &dyn Filter,
) -> Result<Option<Entry>> {
    if filter.is_excluded(&item.name) {
        return Ok(None);
    }
    if item.is_dir {
        return Ok(Some(Entry::directory(item.name)));
    }
    if !item.is_regular {
        return Ok(None);
    }

    let path = join_path(root, &item.name);
    let digest = hash_reader
        .read_hash(&path)
        .await
        .with_context(|| format!("hashing {}", path))?;

    match digest {
        Some(digest) => Ok(Some(Entry::file(item.name, digest))),
        None => {
            debug!(path, "Skipping unreadable file");
            Ok(None)
        }
    }
}
