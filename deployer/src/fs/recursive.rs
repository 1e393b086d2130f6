use super::{join_path, ListEntry, Lister};
use crate::sync::filter::Filter;
use crate::utils::Context;
use crate::Result;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::sync::Arc;

/// Depth-first walk built on a one-level [`Lister`].
///
/// Names in the result are "/"-rooted paths relative to the walk root, and a
/// directory always comes before its contents. Entries that are neither
/// directories nor regular files are dropped.
pub struct RecursiveLister {
    inner: Arc<dyn Lister>,
    prune: Option<Arc<dyn Filter>>,
}

impl RecursiveLister {
    pub fn new(inner: Arc<dyn Lister>) -> Self {
        Self { inner, prune: None }
    }

    /// Skip excluded directories without descending into them.
    pub fn with_filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.prune = Some(filter);
        self
    }

    fn walk<'a>(
        &'a self,
        root: &'a str,
        rel: String,
        out: &'a mut Vec<ListEntry>,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            let dir = join_path(root, &rel);
            let children = self
                .inner
                .list(&dir)
                .await
                .with_context(|| format!("listing {}", dir))?;

            for child in children {
                let path = format!("{}/{}", rel, child.name);

                if child.is_dir {
                    if self.pruned(&path) {
                        continue;
                    }
                    out.push(ListEntry::dir(path.clone()));
                    self.walk(root, path, out).await?;
                } else if child.is_regular {
                    out.push(ListEntry::file(path));
                }
            }
            Ok(())
        }
        .boxed()
    }

    fn pruned(&self, path: &str) -> bool {
        self.prune
            .as_ref()
            .is_some_and(|filter| filter.is_excluded(path))
    }
}

#[async_trait]
impl Lister for RecursiveLister {
    async fn list(&self, dir: &str) -> Result<Vec<ListEntry>> {
        let mut out = Vec::new();
        match self.walk(dir, String::new(), &mut out).await {
            Ok(()) => Ok(out),
            // Nothing deployed yet.
            Err(e) if e.is_not_found() && out.is_empty() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}
