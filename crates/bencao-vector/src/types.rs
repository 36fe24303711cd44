//! Common types shared by every engine and embedding provider.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// Configuration
// ============================================================================

/// Vector engine configuration.
///
/// Selects the storage engine and embedding provider used to build and load
/// snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorConfig {
    /// Engine type: "flat" or "lancedb".
    pub engine: String,

    /// Embedding provider: "hashing" or "fastembed".
    pub provider: String,

    /// Embedding model name for model-backed providers.
    pub model: String,

    /// Model to fall back to when `model` fails to initialize.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_model: Option<String>,

    /// Embedding dimension for the hashing provider.
    pub dimension: usize,

    /// Directory for downloaded model files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_path: Option<String>,

    /// Table name used by table-oriented engines.
    pub table_name: String,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            engine: "flat".to_string(),
            provider: "hashing".to_string(),
            model: "bge-small-zh-v1.5".to_string(),
            fallback_model: Some("all-minilm-l6-v2".to_string()),
            dimension: 384,
            cache_path: None,
            table_name: "documents".to_string(),
        }
    }
}

// ============================================================================
// Documents
// ============================================================================

/// A unit of source text to be embedded and indexed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Text content.
    pub content: String,

    /// Arbitrary metadata key-value pairs (e.g. `source`).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl Document {
    /// Create a document with no metadata.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: HashMap::new(),
        }
    }

    /// Add a metadata key-value pair.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The `source` metadata entry, if any.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").map(String::as_str)
    }
}

// ============================================================================
// Search
// ============================================================================

/// A single similarity search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    /// Content of the matched document.
    pub content: String,

    /// Metadata of the matched document.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,

    /// Similarity score, higher is more similar.
    pub score: f32,

    /// Raw distance from the query vector.
    pub distance: f32,
}

/// Order hits by descending score and keep the best `k`.
pub(crate) fn rank_hits(mut hits: Vec<SearchHit>, k: usize) -> Vec<SearchHit> {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(k);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(content: &str, score: f32) -> SearchHit {
        SearchHit {
            content: content.to_string(),
            metadata: HashMap::new(),
            score,
            distance: 1.0 - score,
        }
    }

    #[test]
    fn test_vector_config_default() {
        let config = VectorConfig::default();
        assert_eq!(config.engine, "flat");
        assert_eq!(config.provider, "hashing");
        assert_eq!(config.model, "bge-small-zh-v1.5");
        assert_eq!(config.fallback_model.as_deref(), Some("all-minilm-l6-v2"));
        assert_eq!(config.dimension, 384);
        assert!(config.cache_path.is_none());
        assert_eq!(config.table_name, "documents");
    }

    #[test]
    fn test_vector_config_partial_deserialization() {
        let json = r#"{"engine": "lancedb", "dimension": 64}"#;
        let config: VectorConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.engine, "lancedb");
        assert_eq!(config.dimension, 64);
        assert_eq!(config.provider, "hashing");
    }

    #[test]
    fn test_document_builder() {
        let doc = Document::new("黄芪补气升阳")
            .with_metadata("source", "herbs/huangqi.txt")
            .with_metadata("page", "12");

        assert_eq!(doc.content, "黄芪补气升阳");
        assert_eq!(doc.source(), Some("herbs/huangqi.txt"));
        assert_eq!(doc.metadata.len(), 2);
    }

    #[test]
    fn test_document_serialization_skips_empty_metadata() {
        let json = serde_json::to_string(&Document::new("text")).unwrap();
        assert!(!json.contains("metadata"));
    }

    #[test]
    fn test_rank_hits_orders_and_truncates() {
        let hits = vec![hit("a", 0.2), hit("b", 0.9), hit("c", 0.5)];
        let ranked = rank_hits(hits, 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].content, "b");
        assert_eq!(ranked[1].content, "c");
    }

    #[test]
    fn test_rank_hits_k_larger_than_len() {
        let ranked = rank_hits(vec![hit("only", 0.3)], 10);
        assert_eq!(ranked.len(), 1);
    }
}
