//! Snapshot validation gate.
//!
//! A snapshot is only published if it can be reopened from disk and answer
//! a query. Validators report a plain pass/fail; the reason for a failure
//! is logged, never raised.

use async_trait::async_trait;
use bencao_vector::VectorEngine;
use std::path::Path;
use std::sync::Arc;

/// Query issued against a freshly built snapshot ("test").
pub const PROBE_QUERY: &str = "测试";

/// Decides whether a snapshot directory is fit to become active.
#[async_trait]
pub trait SnapshotValidator: Send + Sync {
    /// Return `true` when the snapshot at `path` is usable.
    async fn validate(&self, path: &Path) -> bool;
}

/// Loads the snapshot through the engine and runs one probe query.
///
/// Passing requires only that the query completes; zero hits is fine.
pub struct SmokeValidator {
    engine: Arc<dyn VectorEngine>,
    probe: String,
}

impl SmokeValidator {
    /// Validate with the default probe query.
    pub fn new(engine: Arc<dyn VectorEngine>) -> Self {
        Self {
            engine,
            probe: PROBE_QUERY.to_string(),
        }
    }

    /// Use a different probe query.
    pub fn with_probe(mut self, probe: impl Into<String>) -> Self {
        self.probe = probe.into();
        self
    }

    /// The probe query.
    pub fn probe(&self) -> &str {
        &self.probe
    }
}

#[async_trait]
impl SnapshotValidator for SmokeValidator {
    async fn validate(&self, path: &Path) -> bool {
        let store = match self.engine.load(path).await {
            Ok(store) => store,
            Err(e) => {
                log::error!("Validation failed: cannot open {}: {e}", path.display());
                return false;
            }
        };

        match store.similarity_search(&self.probe, 1).await {
            Ok(hits) => {
                log::debug!(
                    "Validated {} ({} documents, {} probe hits)",
                    path.display(),
                    store.document_count(),
                    hits.len()
                );
                true
            }
            Err(e) => {
                log::error!("Validation failed: probe query on {}: {e}", path.display());
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{flat_engine, FailingQueryEngine};
    use bencao_vector::Document;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_valid_snapshot_passes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chroma_v001");
        let engine = flat_engine();
        engine
            .build(&[Document::new("黄芪补气升阳")], &path)
            .await
            .unwrap();

        let validator = SmokeValidator::new(engine);
        assert_eq!(validator.probe(), PROBE_QUERY);
        assert!(validator.validate(&path).await);
    }

    #[tokio::test]
    async fn test_unrelated_probe_passes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chroma_v001");
        let engine = flat_engine();
        engine
            .build(&[Document::new("abc")], &path)
            .await
            .unwrap();

        let validator = SmokeValidator::new(engine).with_probe("完全无关");
        assert!(validator.validate(&path).await);
    }

    #[tokio::test]
    async fn test_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let validator = SmokeValidator::new(flat_engine());
        assert!(!validator.validate(&dir.path().join("chroma_v404")).await);
    }

    #[tokio::test]
    async fn test_empty_directory_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chroma_v001");
        std::fs::create_dir(&path).unwrap();
        let validator = SmokeValidator::new(flat_engine());
        assert!(!validator.validate(&path).await);
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chroma_v001");
        let engine = flat_engine();
        engine
            .build(&[Document::new("当归补血")], &path)
            .await
            .unwrap();
        std::fs::write(path.join("records.jsonl"), "{truncated").unwrap();

        assert!(!SmokeValidator::new(engine).validate(&path).await);
    }

    #[tokio::test]
    async fn test_query_error_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chroma_v001");
        let engine = flat_engine();
        engine
            .build(&[Document::new("甘草调和诸药")], &path)
            .await
            .unwrap();

        let validator = SmokeValidator::new(Arc::new(FailingQueryEngine::new(engine)));
        assert!(!validator.validate(&path).await);
    }
}
