//! The vector engine seam.
//!
//! A [`VectorEngine`] turns documents into a persisted index under a
//! directory (`build`) and reopens such a directory (`load`). Both return a
//! [`VectorStore`] handle that can grow (`add`) and answer similarity
//! queries. Engines own everything inside the directory they are given and
//! nothing outside it.

use crate::embedding::{EmbeddingProvider, HashingEmbeddingProvider};
use crate::flat::FlatFileEngine;
use crate::types::{Document, SearchHit, VectorConfig};
use async_trait::async_trait;
use bencao_core::{Error, Result};
use std::path::Path;
use std::sync::Arc;

/// A vector index engine.
#[async_trait]
pub trait VectorEngine: Send + Sync {
    /// Create a new persisted index at `path` from `documents`.
    ///
    /// `path` must not already hold an index. On failure the directory may
    /// be left partially written; discarding it is the caller's job.
    async fn build(&self, documents: &[Document], path: &Path) -> Result<Box<dyn VectorStore>>;

    /// Open an existing persisted index.
    async fn load(&self, path: &Path) -> Result<Box<dyn VectorStore>>;

    /// Engine name for diagnostics.
    fn name(&self) -> &str;
}

/// Handle to one persisted index.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Append documents to the index and persist them.
    async fn add(&mut self, documents: &[Document]) -> Result<()>;

    /// Return up to `k` documents most similar to `query`, best first.
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>>;

    /// Number of documents in the index.
    fn document_count(&self) -> usize;

    /// Directory holding the index.
    fn path(&self) -> &Path;
}

/// Create the embedding provider selected by `config.provider`.
pub fn create_embedding_provider(config: &VectorConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "hashing" => Ok(Arc::new(HashingEmbeddingProvider::new(config.dimension))),
        #[cfg(feature = "vector-fastembed")]
        "fastembed" => {
            let provider = crate::fastembed::FastEmbedProvider::with_fallback(
                &config.model,
                config.fallback_model.as_deref(),
                config.cache_path.as_deref(),
            )?;
            Ok(Arc::new(provider))
        }
        #[cfg(not(feature = "vector-fastembed"))]
        "fastembed" => Err(Error::config(
            "provider 'fastembed' requires the vector-fastembed feature",
        )),
        other => Err(Error::config(format!(
            "Unknown embedding provider: '{other}'. Supported: hashing, fastembed"
        ))),
    }
}

/// Create the engine selected by `config.engine`, with its embedding provider.
pub fn create_engine(config: &VectorConfig) -> Result<Arc<dyn VectorEngine>> {
    let provider = create_embedding_provider(config)?;
    match config.engine.as_str() {
        "flat" => Ok(Arc::new(FlatFileEngine::new(provider))),
        #[cfg(feature = "vector-lancedb")]
        "lancedb" => Ok(Arc::new(crate::lancedb::LancedbEngine::new(
            provider,
            &config.table_name,
        ))),
        #[cfg(not(feature = "vector-lancedb"))]
        "lancedb" => Err(Error::config(
            "engine 'lancedb' requires the vector-lancedb feature",
        )),
        other => Err(Error::config(format!(
            "Unknown vector engine: '{other}'. Supported: flat, lancedb"
        ))),
    }
}
