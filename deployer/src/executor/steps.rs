//! Before/after steps and post-sync folder handling.

use super::http_action::HttpAction;
use super::{ensure_active, Deployer};
use crate::config::{ActionStep, CleanStep, GenerateStep, MoveStep, StepConfig};
use crate::fs::recursive::RecursiveLister;
use crate::fs::remote::Transport;
use crate::fs::{join_path, parent_path, Creator, Deleter, Lister, ModeChanger, Reader, Writer};
use crate::sync::{run_workers, DEFAULT_WORKERS};
use crate::utils::{Context, DeployError};
use crate::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

impl<T: Transport> Deployer<T> {
    pub(super) async fn run_step(&self, step: &StepConfig, cancel: &CancellationToken) -> Result<()> {
        for generate in &step.generate {
            ensure_active(cancel)?;
            self.generate(generate).await?;
        }
        for mv in &step.moves {
            ensure_active(cancel)?;
            self.move_file(mv).await?;
        }
        for action in &step.action {
            ensure_active(cancel)?;
            self.action(action).await?;
        }

        ensure_active(cancel)?;
        self.clean(&step.clean).await
    }

    async fn generate(&self, step: &GenerateStep) -> Result<()> {
        match step {
            GenerateStep::Environment { template, destination } => {
                let source = &self.config.sync.source;
                let template_path = join_path(source, template);
                let target = join_path(source, destination);
                info!(template = %template_path, destination = %target, "Generating environment file");

                let content = self
                    .local
                    .read(&template_path)
                    .await
                    .and_then(|c| c.ok_or_else(|| DeployError::PermissionDenied(template_path.clone())))
                    .with_context(|| format!("reading template {}", template_path))?;
                let rendered = self
                    .generator
                    .render_bytes(&content)
                    .with_context(|| format!("rendering template {}", template_path))?;

                self.local.delete(&target).await?;
                self.local
                    .write(&target, rendered)
                    .await
                    .with_context(|| format!("writing environment file {}", target))
            }
        }
    }

    async fn move_file(&self, step: &MoveStep) -> Result<()> {
        let source = join_path(&self.config.sync.source, &step.source);
        let target = join_path(&self.config.sync.destination, &step.destination);
        info!(source = %source, destination = %target, "Moving file");

        let content = self
            .local
            .read(&source)
            .await
            .and_then(|c| c.ok_or_else(|| DeployError::PermissionDenied(source.clone())))
            .with_context(|| format!("reading {}", source))?;

        if let Some(parent) = parent_path(&target) {
            self.remote
                .create_dir(parent)
                .await
                .with_context(|| format!("creating directory {}", parent))?;
        }
        match self.remote.write(&target, content).await {
            Err(e) if e.is_permission_denied() => {
                warn!(path = %target, "No permission to write remote file, skipping move");
                Ok(())
            }
            other => other.with_context(|| format!("writing {}", target)),
        }
    }

    async fn action(&self, step: &ActionStep) -> Result<()> {
        match step {
            ActionStep::Http {
                url,
                method,
                headers,
                body,
            } => {
                let action = HttpAction {
                    url: self.generator.render(url).context("rendering action url")?,
                    method: self.generator.render(method).context("rendering action method")?,
                    headers: headers
                        .iter()
                        .map(|(name, value)| {
                            self.generator
                                .render(value)
                                .with_context(|| format!("rendering header {}", name))
                                .map(|value| (name.clone(), value))
                        })
                        .collect::<Result<_>>()?,
                    body: self.generator.render(body).context("rendering action body")?,
                };

                info!(method = %action.method, "Calling HTTP action");
                action.execute(&self.http).await
            }
        }
    }

    async fn clean(&self, step: &CleanStep) -> Result<()> {
        let destination = &self.config.sync.destination;

        for file in &step.files {
            let path = join_path(destination, file);
            info!(path = %path, "Cleaning file");
            self.remote
                .delete(&path)
                .await
                .with_context(|| format!("deleting {}", path))?;
        }

        for folder in &step.folders {
            let dir = join_path(destination, folder);
            let children = match self.remote.list(&dir).await {
                Ok(children) => children,
                Err(e) if e.is_not_found() => {
                    warn!(path = %dir, "Folder to clean does not exist");
                    continue;
                }
                Err(e) => return Err(e).with_context(|| format!("listing {}", dir)),
            };

            info!(path = %dir, entries = children.len(), "Cleaning folder");
            for child in children {
                let path = format!("{}/{}", dir.trim_end_matches('/'), child.name);
                let result = if child.is_dir {
                    self.remote.delete_dir(&path).await
                } else {
                    self.remote.delete(&path).await
                };
                result.with_context(|| format!("deleting {}", path))?;
            }
        }
        Ok(())
    }

    pub(super) async fn create_folders(&self) -> Result<()> {
        for folder in &self.config.folders {
            let path = join_path(&self.config.sync.destination, folder);
            info!(path = %path, "Creating folder");
            self.remote
                .create_dir(&path)
                .await
                .with_context(|| format!("creating folder {}", path))?;
        }
        Ok(())
    }

    /// Apply the readable mode to each configured folder and everything
    /// below it.
    pub(super) async fn make_readable(&self, cancel: &CancellationToken) -> Result<()> {
        let mode = self.config.readable_mode()?;

        for folder in &self.config.readable_folders {
            let root = join_path(&self.config.sync.destination, folder);
            let entries = RecursiveLister::new(self.remote.clone())
                .list(&root)
                .await
                .with_context(|| format!("listing {}", root))?;

            match self.remote.change_mode(&root, mode).await {
                Err(e) if e.is_not_found() => {
                    warn!(path = %root, "Readable folder does not exist");
                    continue;
                }
                other => other.with_context(|| format!("changing mode of {}", root))?,
            }

            info!(path = %root, entries = entries.len(), mode = %format!("{:o}", mode), "Making folder readable");
            let paths: Vec<String> = entries.iter().map(|e| join_path(&root, &e.name)).collect();
            let remote = Arc::clone(&self.remote);
            run_workers(cancel, DEFAULT_WORKERS, paths, move |path: String| {
                let remote = Arc::clone(&remote);
                async move {
                    remote
                        .change_mode(&path, mode)
                        .await
                        .with_context(|| format!("changing mode of {}", path))
                        .map(|()| None::<()>)
                }
            })
            .await?;
        }
        Ok(())
    }
}
