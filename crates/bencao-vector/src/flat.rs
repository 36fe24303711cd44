//! File-backed flat vector engine.
//!
//! Each index directory holds two files:
//!
//! | File | Contents |
//! |------|----------|
//! | `records.jsonl` | One JSON record per document: content, metadata, embedding |
//! | `manifest.json` | [`IndexManifest`] written after the records |
//!
//! Search is an exhaustive cosine scan over all records held in memory,
//! which is adequate for corpora of a few hundred thousand chunks.

use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::engine::{VectorEngine, VectorStore};
use crate::persistence::{load_manifest, save_manifest, IndexManifest, MANIFEST_FILE};
use crate::types::{rank_hits, Document, SearchHit};
use async_trait::async_trait;
use bencao_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File name of the record log inside an index directory.
pub const RECORDS_FILE: &str = "records.jsonl";

const ENGINE_NAME: &str = "flat";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRecord {
    id: usize,
    content: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    metadata: HashMap<String, String>,
    embedding: Vec<f32>,
}

/// Engine persisting embeddings as JSON lines.
pub struct FlatFileEngine {
    provider: Arc<dyn EmbeddingProvider>,
}

impl FlatFileEngine {
    /// Create an engine that embeds with `provider`.
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { provider }
    }
}

impl std::fmt::Debug for FlatFileEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlatFileEngine")
            .field("provider", &self.provider.name())
            .field("dimension", &self.provider.dimension())
            .finish()
    }
}

#[async_trait]
impl VectorEngine for FlatFileEngine {
    async fn build(&self, documents: &[Document], path: &Path) -> Result<Box<dyn VectorStore>> {
        let manifest_path = path.join(MANIFEST_FILE);
        if manifest_path.exists() {
            return Err(Error::invalid_data(format!(
                "{} already contains an index",
                path.display()
            )));
        }
        std::fs::create_dir_all(path).map_err(|e| Error::io_with_path(e, path))?;

        let records = embed_records(self.provider.as_ref(), documents, 0).await?;
        let records_path = path.join(RECORDS_FILE);
        let file = File::create(&records_path).map_err(|e| Error::io_with_path(e, &records_path))?;
        write_records(file, &records_path, &records)?;

        let manifest = IndexManifest::new(
            ENGINE_NAME,
            self.provider.name(),
            self.provider.dimension(),
            records.len(),
        );
        save_manifest(&manifest_path, &manifest)?;
        log::debug!(
            "Built flat index at {} with {} documents",
            path.display(),
            records.len()
        );

        Ok(Box::new(FlatStore {
            path: path.to_path_buf(),
            provider: self.provider.clone(),
            manifest,
            records,
        }))
    }

    async fn load(&self, path: &Path) -> Result<Box<dyn VectorStore>> {
        if !is_non_empty_dir(path) {
            return Err(Error::not_found(format!(
                "vector index directory {} does not exist or is empty",
                path.display()
            )));
        }

        let manifest = load_manifest(&path.join(MANIFEST_FILE))?;
        if manifest.dimension != self.provider.dimension() {
            return Err(Error::invalid_data(format!(
                "index at {} has dimension {} but provider '{}' produces {}",
                path.display(),
                manifest.dimension,
                self.provider.name(),
                self.provider.dimension()
            )));
        }
        if manifest.provider != self.provider.name() {
            log::warn!(
                "Index at {} was built with provider '{}', loading with '{}'",
                path.display(),
                manifest.provider,
                self.provider.name()
            );
        }

        let records = read_records(&path.join(RECORDS_FILE))?;
        if records.len() < manifest.document_count {
            return Err(Error::invalid_data(format!(
                "index at {} lists {} documents but only {} records are stored",
                path.display(),
                manifest.document_count,
                records.len()
            )));
        }

        Ok(Box::new(FlatStore {
            path: path.to_path_buf(),
            provider: self.provider.clone(),
            manifest,
            records,
        }))
    }

    fn name(&self) -> &str {
        ENGINE_NAME
    }
}

/// An open flat index.
struct FlatStore {
    path: PathBuf,
    provider: Arc<dyn EmbeddingProvider>,
    manifest: IndexManifest,
    records: Vec<StoredRecord>,
}

#[async_trait]
impl VectorStore for FlatStore {
    async fn add(&mut self, documents: &[Document]) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }

        let records = embed_records(self.provider.as_ref(), documents, self.records.len()).await?;
        let records_path = self.path.join(RECORDS_FILE);
        let file = OpenOptions::new()
            .append(true)
            .open(&records_path)
            .map_err(|e| Error::io_with_path(e, &records_path))?;
        write_records(file, &records_path, &records)?;

        self.manifest.record_append(records.len());
        save_manifest(&self.path.join(MANIFEST_FILE), &self.manifest)?;
        self.records.extend(records);
        Ok(())
    }

    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 || self.records.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self.provider.embed(query).await?;
        let hits = self
            .records
            .iter()
            .map(|record| {
                let score = cosine_similarity(&query_embedding, &record.embedding);
                SearchHit {
                    content: record.content.clone(),
                    metadata: record.metadata.clone(),
                    score,
                    distance: 1.0 - score,
                }
            })
            .collect();

        Ok(rank_hits(hits, k))
    }

    fn document_count(&self) -> usize {
        self.records.len()
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

// ============================================================================
// Record helpers
// ============================================================================

async fn embed_records(
    provider: &dyn EmbeddingProvider,
    documents: &[Document],
    first_id: usize,
) -> Result<Vec<StoredRecord>> {
    let texts: Vec<&str> = documents.iter().map(|d| d.content.as_str()).collect();
    let embeddings = provider.embed_batch(&texts).await?;
    if embeddings.len() != documents.len() {
        return Err(Error::operation(format!(
            "provider '{}' returned {} embeddings for {} documents",
            provider.name(),
            embeddings.len(),
            documents.len()
        )));
    }

    documents
        .iter()
        .zip(embeddings)
        .enumerate()
        .map(|(offset, (doc, embedding))| {
            if embedding.len() != provider.dimension() {
                return Err(Error::operation(format!(
                    "provider '{}' returned a {}-dimensional embedding, expected {}",
                    provider.name(),
                    embedding.len(),
                    provider.dimension()
                )));
            }
            Ok(StoredRecord {
                id: first_id + offset,
                content: doc.content.clone(),
                metadata: doc.metadata.clone(),
                embedding,
            })
        })
        .collect()
}

fn write_records(file: File, path: &Path, records: &[StoredRecord]) -> Result<()> {
    let mut writer = BufWriter::new(file);
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer
            .write_all(b"\n")
            .map_err(|e| Error::io_with_path(e, path))?;
    }
    writer.flush().map_err(|e| Error::io_with_path(e, path))?;
    writer
        .get_ref()
        .sync_all()
        .map_err(|e| Error::io_with_path(e, path))?;
    Ok(())
}

fn read_records(path: &Path) -> Result<Vec<StoredRecord>> {
    let file = File::open(path).map_err(|e| Error::io_with_path(e, path))?;
    let mut records = Vec::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| Error::io_with_path(e, path))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: StoredRecord = serde_json::from_str(&line).map_err(|e| {
            Error::parse(format!("{} line {}: {e}", path.display(), line_no + 1))
        })?;
        records.push(record);
    }
    Ok(records)
}

fn is_non_empty_dir(path: &Path) -> bool {
    std::fs::read_dir(path)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}
