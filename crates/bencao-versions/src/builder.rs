//! Batched snapshot construction.

use crate::types::DEFAULT_BATCH_SIZE;
use bencao_core::{Error, Result};
use bencao_vector::{Document, VectorEngine};
use std::path::Path;
use std::sync::Arc;

/// Builds a persisted index from documents in fixed-size batches.
///
/// The first batch creates the index; each later batch is appended to it.
/// On failure the target directory is left as-is for the caller to discard.
pub struct IndexBuilder {
    engine: Arc<dyn VectorEngine>,
    batch_size: usize,
}

impl IndexBuilder {
    /// Create a builder with the default batch size of 50.
    pub fn new(engine: Arc<dyn VectorEngine>) -> Self {
        Self {
            engine,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Set the batch size. Zero is treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Documents per engine call.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Build an index at `target` containing every document.
    ///
    /// `target` must not exist or must be an empty directory.
    pub async fn build(&self, documents: &[Document], target: &Path) -> Result<()> {
        if documents.is_empty() {
            return Err(Error::invalid_data("no documents to index"));
        }
        if target.exists() && !is_empty_dir(target)? {
            return Err(Error::invalid_data(format!(
                "build target {} is not empty",
                target.display()
            )));
        }

        let total_batches = documents.len().div_ceil(self.batch_size);
        let mut chunks = documents.chunks(self.batch_size);
        let Some(first) = chunks.next() else {
            return Err(Error::invalid_data("no documents to index"));
        };

        log::debug!(
            "Building {} with {} engine: batch 1/{total_batches} ({} documents)",
            target.display(),
            self.engine.name(),
            first.len()
        );
        let mut store = self.engine.build(first, target).await?;

        for (index, chunk) in chunks.enumerate() {
            log::debug!(
                "Adding batch {}/{total_batches} ({} documents)",
                index + 2,
                chunk.len()
            );
            store.add(chunk).await?;
        }

        log::info!(
            "Built index at {} with {} documents",
            target.display(),
            store.document_count()
        );
        Ok(())
    }
}

fn is_empty_dir(path: &Path) -> Result<bool> {
    if !path.is_dir() {
        return Ok(false);
    }
    let mut entries = std::fs::read_dir(path).map_err(|e| Error::io_with_path(e, path))?;
    Ok(entries.next().is_none())
}
