//! Index manifest persistence.
//!
//! Engines that write their own on-disk format record a small JSON manifest
//! next to the data so a later `load` can check it is reading an index built
//! with a compatible embedding provider.

use bencao_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File name of the manifest inside an index directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Metadata stored alongside a persisted index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    /// Engine that wrote the index.
    pub engine: String,

    /// Embedding provider name.
    pub provider: String,

    /// Embedding dimension.
    pub dimension: usize,

    /// Number of documents indexed.
    pub document_count: usize,

    /// Build timestamp (RFC 3339).
    pub built_at: String,

    /// Timestamp of the last append (RFC 3339).
    pub updated_at: String,
}

impl IndexManifest {
    /// Create a manifest for a freshly built index.
    pub fn new(engine: &str, provider: &str, dimension: usize, document_count: usize) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            engine: engine.to_string(),
            provider: provider.to_string(),
            dimension,
            document_count,
            built_at: now.clone(),
            updated_at: now,
        }
    }

    /// Record that `added` documents were appended.
    pub fn record_append(&mut self, added: usize) {
        self.document_count += added;
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}

/// Save a manifest, replacing any previous one atomically.
///
/// The JSON is written to a sibling temp file and renamed into place, so a
/// reader never sees a half-written manifest.
pub fn save_manifest(path: &Path, manifest: &IndexManifest) -> Result<()> {
    let json = serde_json::to_string_pretty(manifest)?;
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, json).map_err(|e| Error::io_with_path(e, &tmp_path))?;
    std::fs::rename(&tmp_path, path).map_err(|e| Error::io_with_path(e, path))?;
    Ok(())
}

/// Load a manifest from a JSON file.
pub fn load_manifest(path: &Path) -> Result<IndexManifest> {
    let json = std::fs::read_to_string(path).map_err(|e| Error::io_with_path(e, path))?;
    let manifest: IndexManifest = serde_json::from_str(&json)?;
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load_manifest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);

        let manifest = IndexManifest::new("flat", "hashing", 384, 50);
        save_manifest(&path, &manifest).unwrap();

        let loaded = load_manifest(&path).unwrap();
        assert_eq!(loaded, manifest);
        assert!(!dir.path().join("manifest.json.tmp").exists());
    }

    #[test]
    fn test_record_append() {
        let mut manifest = IndexManifest::new("flat", "hashing", 8, 50);
        manifest.record_append(7);
        assert_eq!(manifest.document_count, 57);
        assert!(manifest.updated_at >= manifest.built_at);
    }

    #[test]
    fn test_save_overwrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);

        let mut manifest = IndexManifest::new("flat", "hashing", 8, 1);
        save_manifest(&path, &manifest).unwrap();
        manifest.record_append(2);
        save_manifest(&path, &manifest).unwrap();

        assert_eq!(load_manifest(&path).unwrap().document_count, 3);
    }

    #[test]
    fn test_load_manifest_invalid_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        std::fs::write(&path, "not valid json").unwrap();
        assert!(load_manifest(&path).is_err());
    }

    #[test]
    fn test_load_manifest_missing() {
        let dir = tempdir().unwrap();
        let err = load_manifest(&dir.path().join(MANIFEST_FILE)).unwrap_err();
        assert!(err.is_io());
    }

    #[test]
    fn test_save_manifest_invalid_path() {
        let manifest = IndexManifest::new("flat", "hashing", 8, 1);
        assert!(save_manifest(Path::new("/nonexistent/dir/manifest.json"), &manifest).is_err());
    }
}
