//! LanceDB vector engine.
//!
//! Each snapshot directory is a LanceDB database holding one table.
//!
//! # Schema
//!
//! | Column | Type | Purpose |
//! |--------|------|---------|
//! | `content` | Utf8 | Document text |
//! | `metadata` | Utf8 | JSON-serialized metadata |
//! | `vector` | FixedSizeList<Float32> | Embedding vector |
//!
//! # Feature Gate
//!
//! This module requires the `vector-lancedb` feature.

use crate::embedding::EmbeddingProvider;
use crate::engine::{VectorEngine, VectorStore};
use crate::types::{rank_hits, Document, SearchHit};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use bencao_core::{Error, Result};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// LanceDB-backed engine.
pub struct LancedbEngine {
    provider: Arc<dyn EmbeddingProvider>,
    table_name: String,
}

impl LancedbEngine {
    /// Create an engine storing documents in `table_name`.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, table_name: &str) -> Self {
        Self {
            provider,
            table_name: table_name.to_string(),
        }
    }

    async fn connect(path: &Path) -> Result<lancedb::Connection> {
        let uri = path
            .to_str()
            .ok_or_else(|| Error::invalid_data(format!("non UTF-8 path {}", path.display())))?;
        lancedb::connect(uri)
            .execute()
            .await
            .map_err(|e| Error::operation(format!("Failed to connect to LanceDB: {e}")))
    }
}

#[async_trait]
impl VectorEngine for LancedbEngine {
    async fn build(&self, documents: &[Document], path: &Path) -> Result<Box<dyn VectorStore>> {
        if documents.is_empty() {
            return Err(Error::invalid_data("cannot create a LanceDB table without documents"));
        }
        let connection = Self::connect(path).await?;
        let batch = embed_batch(self.provider.as_ref(), documents).await?;
        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        // Create mode fails if the table already exists.
        let table = connection
            .create_table(&self.table_name, Box::new(batches))
            .mode(lancedb::database::CreateTableMode::Create)
            .execute()
            .await
            .map_err(|e| Error::operation(format!("Failed to create LanceDB table: {e}")))?;

        Ok(Box::new(LancedbStore {
            path: path.to_path_buf(),
            table,
            provider: self.provider.clone(),
            document_count: documents.len(),
        }))
    }

    async fn load(&self, path: &Path) -> Result<Box<dyn VectorStore>> {
        if !path.is_dir() {
            return Err(Error::not_found(format!(
                "vector index directory {} does not exist",
                path.display()
            )));
        }
        let connection = Self::connect(path).await?;
        let table = connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| Error::operation(format!("Failed to open table: {e}")))?;
        let document_count = table
            .count_rows(None)
            .await
            .map_err(|e| Error::operation(format!("Failed to count rows: {e}")))?;

        Ok(Box::new(LancedbStore {
            path: path.to_path_buf(),
            table,
            provider: self.provider.clone(),
            document_count,
        }))
    }

    fn name(&self) -> &str {
        "lancedb"
    }
}

struct LancedbStore {
    path: PathBuf,
    table: lancedb::Table,
    provider: Arc<dyn EmbeddingProvider>,
    document_count: usize,
}

#[async_trait]
impl VectorStore for LancedbStore {
    async fn add(&mut self, documents: &[Document]) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }
        let batch = embed_batch(self.provider.as_ref(), documents).await?;
        let schema = batch.schema();
        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        self.table
            .add(Box::new(batches))
            .execute()
            .await
            .map_err(|e| Error::operation(format!("Failed to append to LanceDB table: {e}")))?;
        self.document_count += documents.len();
        Ok(())
    }

    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 || self.document_count == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self.provider.embed(query).await?;
        let results = self
            .table
            .vector_search(query_embedding)
            .map_err(|e| Error::operation(format!("Failed to create vector search: {e}")))?
            .limit(k)
            .execute()
            .await
            .map_err(|e| Error::operation(format!("Vector search failed: {e}")))?;

        let batches: Vec<RecordBatch> = results
            .try_collect()
            .await
            .map_err(|e| Error::operation(format!("Failed to collect results: {e}")))?;

        let mut hits = Vec::new();
        for batch in &batches {
            hits.extend(parse_search_results(batch)?);
        }
        Ok(rank_hits(hits, k))
    }

    fn document_count(&self) -> usize {
        self.document_count
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

// ============================================================================
// Arrow schema and batch construction
// ============================================================================

fn make_schema(dimension: i32) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("content", DataType::Utf8, false),
        Field::new("metadata", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                dimension,
            ),
            false,
        ),
    ]))
}

async fn embed_batch(provider: &dyn EmbeddingProvider, documents: &[Document]) -> Result<RecordBatch> {
    let texts: Vec<&str> = documents.iter().map(|d| d.content.as_str()).collect();
    let embeddings = provider.embed_batch(&texts).await?;
    build_record_batch(documents, &embeddings, provider.dimension() as i32)
}

fn build_record_batch(
    documents: &[Document],
    embeddings: &[Vec<f32>],
    dimension: i32,
) -> Result<RecordBatch> {
    if embeddings.iter().any(|e| e.len() != dimension as usize) {
        return Err(Error::operation(format!(
            "embedding dimension mismatch, expected {dimension}"
        )));
    }

    let contents: Vec<&str> = documents.iter().map(|d| d.content.as_str()).collect();
    let metadata_strings = documents
        .iter()
        .map(|d| serde_json::to_string(&d.metadata))
        .collect::<std::result::Result<Vec<String>, _>>()?;
    let metadata_refs: Vec<&str> = metadata_strings.iter().map(String::as_str).collect();

    let values: Vec<f32> = embeddings.iter().flatten().copied().collect();
    let vector_array = FixedSizeListArray::try_new(
        Arc::new(Field::new("item", DataType::Float32, true)),
        dimension,
        Arc::new(Float32Array::from(values)),
        None,
    )
    .map_err(|e| Error::operation(format!("Failed to create vector array: {e}")))?;

    RecordBatch::try_new(
        make_schema(dimension),
        vec![
            Arc::new(StringArray::from(contents)),
            Arc::new(StringArray::from(metadata_refs)),
            Arc::new(vector_array),
        ],
    )
    .map_err(|e| Error::operation(format!("Failed to create RecordBatch: {e}")))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| Error::operation(format!("Missing '{name}' column in results")))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| Error::operation(format!("'{name}' column is not StringArray")))
}

fn parse_search_results(batch: &RecordBatch) -> Result<Vec<SearchHit>> {
    let content_col = string_column(batch, "content")?;
    let metadata_col = string_column(batch, "metadata")?;
    let distance_col = batch
        .column_by_name("_distance")
        .and_then(|c| c.as_any().downcast_ref::<Float32Array>());

    let mut hits = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let metadata: HashMap<String, String> =
            serde_json::from_str(metadata_col.value(i)).unwrap_or_default();
        let distance = distance_col.map(|c| c.value(i)).unwrap_or(0.0);

        hits.push(SearchHit {
            content: content_col.value(i).to_string(),
            metadata,
            score: 1.0 / (1.0 + distance),
            distance,
        });
    }
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbeddingProvider;

    fn docs() -> Vec<Document> {
        vec![
            Document::new("桂枝汤调和营卫").with_metadata("source", "shanghan.txt"),
            Document::new("四君子汤益气健脾").with_metadata("source", "fangji.txt"),
        ]
    }

    fn engine() -> LancedbEngine {
        LancedbEngine::new(Arc::new(HashingEmbeddingProvider::new(8)), "documents")
    }

    #[test]
    fn test_make_schema() {
        let schema = make_schema(8);
        assert_eq!(schema.fields().len(), 3);
        match schema.field(2).data_type() {
            DataType::FixedSizeList(_, size) => assert_eq!(*size, 8),
            other => panic!("Expected FixedSizeList, got {:?}", other),
        }
    }

    #[test]
    fn test_build_record_batch() {
        let embeddings = vec![vec![0.1; 4], vec![0.2; 4]];
        let batch = build_record_batch(&docs(), &embeddings, 4).unwrap();
        assert_eq!(batch.num_rows(), 2);

        let metadata = string_column(&batch, "metadata").unwrap();
        let parsed: serde_json::Value = serde_json::from_str(metadata.value(0)).unwrap();
        assert_eq!(parsed["source"], "shanghan.txt");
    }

    #[test]
    fn test_build_record_batch_dimension_mismatch() {
        let embeddings = vec![vec![0.1; 3], vec![0.2; 4]];
        assert!(build_record_batch(&docs(), &embeddings, 4).is_err());
    }

    #[test]
    fn test_parse_search_results_without_distance() {
        let embeddings = vec![vec![0.1; 4], vec![0.2; 4]];
        let batch = build_record_batch(&docs(), &embeddings, 4).unwrap();
        let hits = parse_search_results(&batch).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].score, 1.0);
        assert_eq!(hits[1].metadata.get("source").unwrap(), "fangji.txt");
    }

    #[tokio::test]
    async fn test_build_add_load_search() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chroma_v001");
        let engine = engine();

        let mut store = engine.build(&docs()[..1], &path).await.unwrap();
        store.add(&docs()[1..]).await.unwrap();
        assert_eq!(store.document_count(), 2);

        let loaded = engine.load(&path).await.unwrap();
        assert_eq!(loaded.document_count(), 2);
        let hits = loaded.similarity_search("益气健脾", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_load_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = engine()
            .load(&dir.path().join("missing"))
            .await
            .err()
            .unwrap();
        assert!(err.is_not_found());
    }
}
