//! Manifest of the last deployed tree.
//!
//! Stored zstd-compressed on the remote side. When present it replaces the
//! live remote listing and supplies remote digests, so a run only transfers
//! the listing of the manifest itself.

use crate::fs::compression::{CompressionReader, CompressionWriter};
use crate::fs::{parent_path, relative_path, Creator, Entry, HashReader, ListEntry, Lister, Reader, Snapshot, Writer};
use crate::utils::{Context, DeployError};
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub objects: Vec<ManifestObject>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestObject {
    pub path: String,
    #[serde(rename = "isDir")]
    pub is_dir: bool,
    #[serde(rename = "isRegular")]
    pub is_regular: bool,
    pub hash: String,
}

impl Manifest {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let objects = snapshot
            .sorted()
            .into_iter()
            .map(|entry| ManifestObject {
                path: entry.path().to_string(),
                is_dir: entry.is_dir(),
                is_regular: !entry.is_dir(),
                hash: entry.digest().to_string(),
            })
            .collect();
        Self { objects }
    }

    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot::from_entries(self.objects.iter().map(|o| {
            if o.is_dir {
                Entry::directory(o.path.clone())
            } else {
                Entry::file(o.path.clone(), o.hash.clone())
            }
        }))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Read the manifest at `path`. `Ok(None)` when there is none yet.
pub async fn load_manifest(reader: Arc<dyn Reader>, path: &str) -> Result<Option<Manifest>> {
    let content = match CompressionReader::new(reader).read(path).await {
        Ok(Some(content)) => content,
        Ok(None) => {
            info!(path, "Manifest is not readable, falling back to a full listing");
            return Ok(None);
        }
        Err(e) if e.is_not_found() => {
            info!(path, "No manifest found, falling back to a full listing");
            return Ok(None);
        }
        Err(e) => return Err(e).with_context(|| format!("reading manifest {}", path)),
    };

    let manifest: Manifest = serde_json::from_slice(&content)
        .map_err(DeployError::from)
        .with_context(|| format!("parsing manifest {}", path))?;

    info!(path, objects = manifest.len(), "Loaded manifest");
    Ok(Some(manifest))
}

/// Persist `snapshot` as the manifest at `path`, creating its directory.
pub async fn save_manifest(
    creator: Arc<dyn Creator>,
    writer: Arc<dyn Writer>,
    path: &str,
    snapshot: &Snapshot,
) -> Result<()> {
    if let Some(parent) = parent_path(path) {
        creator
            .create_dir(parent)
            .await
            .with_context(|| format!("creating manifest directory {}", parent))?;
    }

    let manifest = Manifest::from_snapshot(snapshot);
    let json = serde_json::to_vec(&manifest)?;

    CompressionWriter::new(writer)
        .write(path, json)
        .await
        .with_context(|| format!("writing manifest {}", path))?;

    info!(path, objects = manifest.len(), "Saved manifest");
    Ok(())
}

/// Lists the manifest's objects when one is loaded, otherwise delegates.
pub struct ManifestLister {
    manifest: Option<Arc<Manifest>>,
    fallback: Arc<dyn Lister>,
}

impl ManifestLister {
    pub fn new(manifest: Option<Arc<Manifest>>, fallback: Arc<dyn Lister>) -> Self {
        Self { manifest, fallback }
    }
}

#[async_trait]
impl Lister for ManifestLister {
    async fn list(&self, dir: &str) -> Result<Vec<ListEntry>> {
        let Some(manifest) = &self.manifest else {
            return self.fallback.list(dir).await;
        };

        Ok(manifest
            .objects
            .iter()
            .map(|o| ListEntry {
                name: o.path.clone(),
                is_dir: o.is_dir,
                is_regular: o.is_regular,
            })
            .collect())
    }
}

/// Answers digests from the manifest for the paths it lists.
///
/// Paths are backend paths under `root`; anything outside the manifest goes
/// to `inner`.
pub struct ManifestHashReader {
    root: String,
    hashes: HashMap<String, String>,
    inner: Arc<dyn HashReader>,
}

impl ManifestHashReader {
    pub fn new(manifest: &Manifest, root: impl Into<String>, inner: Arc<dyn HashReader>) -> Self {
        let hashes = manifest
            .objects
            .iter()
            .filter(|o| !o.is_dir)
            .map(|o| (o.path.clone(), o.hash.clone()))
            .collect();
        Self {
            root: root.into(),
            hashes,
            inner,
        }
    }
}

#[async_trait]
impl HashReader for ManifestHashReader {
    async fn read_hash(&self, path: &str) -> Result<Option<String>> {
        if let Some(hash) = relative_path(&self.root, path).and_then(|rel| self.hashes.get(&rel)) {
            return Ok(Some(hash.clone()));
        }

        debug!(path, "Digest not in manifest, reading remote file");
        self.inner.read_hash(path).await
    }
}
