//! Deploy executor - Orchestrates a full deployment run.
//!
//! A run is: before steps, sync, folder provisioning, readable folders, after
//! steps. The first error aborts the run; whatever was already applied stays
//! and is repaired by the next run.

pub mod generator;
pub mod http_action;
mod steps;

use crate::config::Config;
use crate::fs::hash::StandardHashReader;
use crate::fs::local::LocalFs;
use crate::fs::recursive::RecursiveLister;
use crate::fs::remote::{RemoteFs, Transport};
use crate::fs::{parent_path, relative_path, Creator, HashReader, Snapshot};
use crate::sync::{
    compare, load_manifest, read_tree, save_manifest, Action, Filter, IgnoreFilter,
    ManifestHashReader, ManifestLister, Resolver,
};
use crate::utils::{Context, DeployError};
use crate::Result;
use generator::EnvironmentGenerator;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Outcome of one sync.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub local_entries: usize,
    pub remote_entries: usize,
    pub uploads: usize,
    pub changes: usize,
    pub deletes: usize,
    /// Files left out of the upload (unreadable locally or refused remotely)
    pub skipped: usize,
    pub manifest_used: bool,
    pub duration: Duration,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        self.uploads == 0 && self.changes == 0 && self.deletes == 0
    }
}

pub struct Deployer<T: Transport> {
    config: Config,
    local: Arc<LocalFs>,
    remote: Arc<RemoteFs<T>>,
    filter: Arc<IgnoreFilter>,
    generator: EnvironmentGenerator,
    http: reqwest::Client,
}

impl<T: Transport> Deployer<T> {
    pub fn new(config: Config, transport: T, generator: EnvironmentGenerator) -> Result<Self> {
        let remote = RemoteFs::new(transport, config.file_mode()?, config.dir_mode()?);
        let filter = config.ignore_filter()?;

        Ok(Self {
            config,
            local: Arc::new(LocalFs::new()),
            remote: Arc::new(remote),
            filter: Arc::new(filter),
            generator,
            http: reqwest::Client::new(),
        })
    }

    pub fn remote(&self) -> &RemoteFs<T> {
        &self.remote
    }

    /// Run the whole deployment.
    pub async fn deploy(&self, cancel: &CancellationToken) -> Result<SyncReport> {
        info!("Running before steps");
        self.run_step(&self.config.before, cancel)
            .await
            .context("before step")?;

        let report = self.sync(cancel).await.context("sync")?;

        ensure_active(cancel)?;
        self.create_folders().await.context("creating folders")?;

        ensure_active(cancel)?;
        self.make_readable(cancel)
            .await
            .context("changing mode of readable folders")?;

        info!("Running after steps");
        self.run_step(&self.config.after, cancel)
            .await
            .context("after step")?;

        Ok(report)
    }

    /// Bring the remote tree in line with the local one and record the result
    /// in the manifest.
    pub async fn sync(&self, cancel: &CancellationToken) -> Result<SyncReport> {
        let started = Instant::now();
        let source = self.config.sync.source.as_str();
        let destination = self.config.sync.destination.as_str();
        let manifest_path = self.config.sync.manifest_path.as_str();
        let filter: Arc<dyn Filter> = self.filter.clone();

        info!(source, "Reading local tree");
        let local = read_tree(
            Arc::new(RecursiveLister::new(self.local.clone()).with_filter(filter.clone())),
            Arc::new(StandardHashReader::new(self.local.clone())),
            filter.clone(),
            source,
            cancel,
        )
        .await
        .context("reading local tree")?;

        ensure_active(cancel)?;
        let manifest = load_manifest(self.remote.clone(), manifest_path)
            .await?
            .map(Arc::new);
        let manifest_used = manifest.is_some();

        let live_hashes: Arc<dyn HashReader> = Arc::new(StandardHashReader::new(self.remote.clone()));
        let hash_reader: Arc<dyn HashReader> = match &manifest {
            Some(m) => Arc::new(ManifestHashReader::new(m, destination, live_hashes)),
            None => live_hashes,
        };
        let lister = ManifestLister::new(
            manifest,
            Arc::new(RecursiveLister::new(self.remote.clone()).with_filter(filter.clone())),
        );

        info!(destination, manifest_used, "Reading remote tree");
        let mut remote = read_tree(Arc::new(lister), hash_reader, filter, destination, cancel)
            .await
            .context("reading remote tree")?;
        self.hide_manifest(&local, &mut remote);

        let diff = compare(&local, &remote);
        let mut report = SyncReport {
            local_entries: local.len(),
            remote_entries: remote.len(),
            manifest_used,
            ..SyncReport::default()
        };
        for item in &diff {
            match item.action {
                Action::Upload => report.uploads += 1,
                Action::Change => report.changes += 1,
                Action::Delete => report.deletes += 1,
            }
        }
        info!(
            uploads = report.uploads,
            changes = report.changes,
            deletes = report.deletes,
            "Computed diff"
        );

        ensure_active(cancel)?;
        self.remote
            .create_dir(destination)
            .await
            .with_context(|| format!("creating remote root {}", destination))?;

        let skipped = Resolver::new(
            self.local.clone(),
            self.remote.clone(),
            self.remote.clone(),
            self.remote.clone(),
            source,
            destination,
        )
        .resolve(diff, cancel)
        .await?;
        report.skipped = skipped.len();

        // Files that never arrived stay out of the manifest so the next run
        // uploads them again.
        let mut deployed = local;
        for path in &skipped {
            deployed.remove(path);
        }
        save_manifest(self.remote.clone(), self.remote.clone(), manifest_path, &deployed).await?;

        report.duration = started.elapsed();
        info!(
            local = report.local_entries,
            remote = report.remote_entries,
            uploads = report.uploads,
            changes = report.changes,
            deletes = report.deletes,
            skipped = report.skipped,
            manifest_used = report.manifest_used,
            duration_ms = report.duration.as_millis() as u64,
            "Sync completed"
        );
        Ok(report)
    }

    /// Keep the manifest, and directories that exist only to hold it, out of
    /// the remote snapshot.
    fn hide_manifest(&self, local: &Snapshot, remote: &mut Snapshot) {
        let Some(rel) = relative_path(&self.config.sync.destination, &self.config.sync.manifest_path) else {
            return;
        };
        if rel.is_empty() {
            return;
        }

        remote.remove(&rel);
        let mut current = rel.as_str();
        while let Some(parent) = parent_path(current) {
            if parent == "/" || local.contains(parent) {
                break;
            }
            if remote.remove(parent).is_some() {
                debug!(path = parent, "Ignoring manifest directory");
            }
            current = parent;
        }
    }
}

fn ensure_active(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(DeployError::Cancelled);
    }
    Ok(())
}
