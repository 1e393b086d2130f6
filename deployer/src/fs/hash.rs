use super::{digest_bytes, HashReader, Reader};
use crate::utils::Context;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Digests file content fetched through a [`Reader`].
pub struct StandardHashReader {
    reader: Arc<dyn Reader>,
}

impl StandardHashReader {
    pub fn new(reader: Arc<dyn Reader>) -> Self {
        Self { reader }
    }
}

#[async_trait]
impl HashReader for StandardHashReader {
    async fn read_hash(&self, path: &str) -> Result<Option<String>> {
        let content = self
            .reader
            .read(path)
            .await
            .with_context(|| format!("reading {} for hashing", path))?;

        Ok(content.map(|bytes| digest_bytes(&bytes)))
    }
}
