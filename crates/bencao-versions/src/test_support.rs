//! Engine and validator doubles for failure injection.

use crate::validator::SnapshotValidator;
use async_trait::async_trait;
use bencao_core::{Error, Result};
use bencao_vector::{
    Document, FlatFileEngine, HashingEmbeddingProvider, SearchHit, VectorEngine, VectorStore,
};
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub(crate) fn flat_engine() -> Arc<dyn VectorEngine> {
    Arc::new(FlatFileEngine::new(Arc::new(HashingEmbeddingProvider::new(16))))
}

pub(crate) fn documents(count: usize) -> Vec<Document> {
    (0..count)
        .map(|i| {
            Document::new(format!("方剂 {i}: 补中益气"))
                .with_metadata("source", format!("doc{i}.txt"))
        })
        .collect()
}

/// Deletes snapshot directories, except that `chroma_v001` always fails.
pub(crate) fn remove_except_v001(path: &Path) -> io::Result<()> {
    if path.ends_with("chroma_v001") {
        return Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "injected removal failure",
        ));
    }
    std::fs::remove_dir_all(path)
}

/// Fails the `fail_on`-th batch (1-based; batch 1 is the initial build).
pub(crate) struct FailingBatchEngine {
    inner: Arc<dyn VectorEngine>,
    fail_on: usize,
}

impl FailingBatchEngine {
    pub(crate) fn new(inner: Arc<dyn VectorEngine>, fail_on: usize) -> Self {
        Self { inner, fail_on }
    }
}

#[async_trait]
impl VectorEngine for FailingBatchEngine {
    async fn build(&self, documents: &[Document], path: &Path) -> Result<Box<dyn VectorStore>> {
        if self.fail_on == 1 {
            std::fs::create_dir_all(path)?;
            std::fs::write(path.join("partial.bin"), b"half written")?;
            return Err(Error::operation("injected failure on batch 1"));
        }
        let inner = self.inner.build(documents, path).await?;
        Ok(Box::new(FailingBatchStore {
            inner,
            batches_seen: 1,
            fail_on: self.fail_on,
        }))
    }

    async fn load(&self, path: &Path) -> Result<Box<dyn VectorStore>> {
        self.inner.load(path).await
    }

    fn name(&self) -> &str {
        "failing-batch"
    }
}

struct FailingBatchStore {
    inner: Box<dyn VectorStore>,
    batches_seen: usize,
    fail_on: usize,
}

#[async_trait]
impl VectorStore for FailingBatchStore {
    async fn add(&mut self, documents: &[Document]) -> Result<()> {
        self.batches_seen += 1;
        if self.batches_seen == self.fail_on {
            return Err(Error::operation(format!(
                "injected failure on batch {}",
                self.fail_on
            )));
        }
        self.inner.add(documents).await
    }

    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        self.inner.similarity_search(query, k).await
    }

    fn document_count(&self) -> usize {
        self.inner.document_count()
    }

    fn path(&self) -> &Path {
        self.inner.path()
    }
}

/// Builds and loads normally; every query fails.
pub(crate) struct FailingQueryEngine {
    inner: Arc<dyn VectorEngine>,
}

impl FailingQueryEngine {
    pub(crate) fn new(inner: Arc<dyn VectorEngine>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl VectorEngine for FailingQueryEngine {
    async fn build(&self, documents: &[Document], path: &Path) -> Result<Box<dyn VectorStore>> {
        self.inner.build(documents, path).await
    }

    async fn load(&self, path: &Path) -> Result<Box<dyn VectorStore>> {
        let inner = self.inner.load(path).await?;
        Ok(Box::new(FailingQueryStore { inner }))
    }

    fn name(&self) -> &str {
        "failing-query"
    }
}

struct FailingQueryStore {
    inner: Box<dyn VectorStore>,
}

#[async_trait]
impl VectorStore for FailingQueryStore {
    async fn add(&mut self, documents: &[Document]) -> Result<()> {
        self.inner.add(documents).await
    }

    async fn similarity_search(&self, _query: &str, _k: usize) -> Result<Vec<SearchHit>> {
        Err(Error::operation("injected query failure"))
    }

    fn document_count(&self) -> usize {
        self.inner.document_count()
    }

    fn path(&self) -> &Path {
        self.inner.path()
    }
}

/// Passes the first `passes` calls, fails every call after that.
pub(crate) struct CountingValidator {
    passes: usize,
    calls: AtomicUsize,
}

impl CountingValidator {
    pub(crate) fn always_fail() -> Self {
        Self::passing_first(0)
    }

    pub(crate) fn passing_first(passes: usize) -> Self {
        Self {
            passes,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotValidator for CountingValidator {
    async fn validate(&self, _path: &Path) -> bool {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        call < self.passes
    }
}

/// Shares a validator between the manager and the test body.
#[async_trait]
impl<V: SnapshotValidator> SnapshotValidator for Arc<V> {
    async fn validate(&self, path: &Path) -> bool {
        self.as_ref().validate(path).await
    }
}
