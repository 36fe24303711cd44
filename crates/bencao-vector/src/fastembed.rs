//! FastEmbed embedding provider.
//!
//! Wraps the `fastembed` crate for local embedding generation. The default
//! model is the Chinese BGE small model; an English MiniLM model is the usual
//! fallback when the primary model cannot be initialized (missing cache,
//! failed download).
//!
//! `fastembed::TextEmbedding` is not `Sync`, so it lives behind
//! `Arc<Mutex<>>` and embedding calls run on `spawn_blocking`.
//!
//! # Feature Gate
//!
//! This module requires the `vector-fastembed` feature.

use crate::embedding::EmbeddingProvider;
use async_trait::async_trait;
use bencao_core::{Error, Result};
use std::sync::{Arc, Mutex};

/// Map a model name string to a fastembed `EmbeddingModel` variant.
fn resolve_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "bge-small-zh-v1.5" | "BGESmallZHV15" => Ok(fastembed::EmbeddingModel::BGESmallZHV15),
        "bge-large-zh-v1.5" | "BGELargeZHV15" => Ok(fastembed::EmbeddingModel::BGELargeZHV15),
        "bge-small-en-v1.5" | "BGESmallENV15" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "all-minilm-l6-v2" | "AllMiniLML6V2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "multilingual-e5-small" | "MultilingualE5Small" => {
            Ok(fastembed::EmbeddingModel::MultilingualE5Small)
        }
        other => Err(Error::config(format!(
            "Unknown embedding model: '{other}'. Supported: bge-small-zh-v1.5, bge-large-zh-v1.5, \
             bge-small-en-v1.5, all-minilm-l6-v2, multilingual-e5-small"
        ))),
    }
}

/// FastEmbed-based embedding provider.
///
/// | Name | Dimension |
/// |------|-----------|
/// | `bge-small-zh-v1.5` | 512 |
/// | `bge-large-zh-v1.5` | 1024 |
/// | `bge-small-en-v1.5` | 384 |
/// | `all-minilm-l6-v2` | 384 |
/// | `multilingual-e5-small` | 384 |
pub struct FastEmbedProvider {
    model: Arc<Mutex<fastembed::TextEmbedding>>,
    dimension: usize,
    model_name: String,
}

impl FastEmbedProvider {
    /// Create a provider for `model_name`, downloading the model if needed.
    pub fn new(model_name: &str, cache_path: Option<&str>) -> Result<Self> {
        let model_enum = resolve_model(model_name)?;

        let mut init = fastembed::InitOptions::new(model_enum);
        if let Some(path) = cache_path {
            init = init.with_cache_dir(std::path::PathBuf::from(path));
        }

        let mut text_embedding = fastembed::TextEmbedding::try_new(init)
            .map_err(|e| Error::operation(format!("Failed to initialize fastembed model: {e}")))?;

        let probe = text_embedding
            .embed(vec!["dimension probe"], None)
            .map_err(|e| Error::operation(format!("Failed to probe embedding dimension: {e}")))?;
        let dimension = probe
            .first()
            .map(|v| v.len())
            .ok_or_else(|| Error::operation("Empty probe embedding"))?;

        log::info!("Initialized fastembed model {model_name} ({dimension} dimensions)");
        Ok(Self {
            model: Arc::new(Mutex::new(text_embedding)),
            dimension,
            model_name: model_name.to_string(),
        })
    }

    /// Create a provider for `primary`, falling back to `fallback` if the
    /// primary model fails to initialize.
    pub fn with_fallback(
        primary: &str,
        fallback: Option<&str>,
        cache_path: Option<&str>,
    ) -> Result<Self> {
        match (Self::new(primary, cache_path), fallback) {
            (Ok(provider), _) => Ok(provider),
            (Err(e), Some(fallback)) => {
                log::warn!("Embedding model {primary} unavailable ({e}), falling back to {fallback}");
                Self::new(fallback, cache_path)
            }
            (Err(e), None) => Err(e),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let model = self.model.clone();
        let text = text.to_string();

        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|e| Error::operation(format!("Mutex poisoned: {e}")))?;
            model
                .embed(vec![text], None)
                .map_err(|e| Error::operation(format!("Embedding failed: {e}")))?
                .into_iter()
                .next()
                .ok_or_else(|| Error::operation("No embedding returned"))
        })
        .await
        .map_err(|e| Error::operation(format!("spawn_blocking failed: {e}")))?
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let model = self.model.clone();
        let texts: Vec<String> = texts.iter().map(|t| t.to_string()).collect();

        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|e| Error::operation(format!("Mutex poisoned: {e}")))?;
            model
                .embed(texts, None)
                .map_err(|e| Error::operation(format!("Batch embedding failed: {e}")))
        })
        .await
        .map_err(|e| Error::operation(format!("spawn_blocking failed: {e}")))?
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}

impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("model", &self.model_name)
            .field("dimension", &self.dimension)
            .finish()
    }
}
