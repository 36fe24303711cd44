//! Vector engine seam for Bencao.
//!
//! The versioning crate treats the vector index as an opaque service with
//! four operations: `build`, `load`, `add` and `similarity_search`. This crate
//! defines that seam as the [`VectorEngine`] and [`VectorStore`] traits and
//! ships the engines behind it.
//!
//! # Features
//!
//! - `vector-lancedb`: Enable the LanceDB-backed engine
//! - `vector-fastembed`: Enable local embedding generation via fastembed
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     bencao-vector                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider trait                                    │
//! │  ├── HashingEmbeddingProvider (always available)            │
//! │  └── FastEmbedProvider (feature: vector-fastembed)          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  VectorEngine / VectorStore traits                          │
//! │  ├── FlatFileEngine (JSON lines + manifest)                 │
//! │  └── LancedbEngine (feature: vector-lancedb)                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Persistence (index manifest)                               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use bencao_vector::{Document, FlatFileEngine, HashingEmbeddingProvider, VectorEngine};
//! use std::sync::Arc;
//!
//! let provider = Arc::new(HashingEmbeddingProvider::new(384));
//! let engine = FlatFileEngine::new(provider);
//!
//! let docs = vec![Document::new("当归补血活血").with_metadata("source", "herbs.txt")];
//! let store = engine.build(&docs, "chroma_db/chroma_v001".as_ref()).await?;
//! let hits = store.similarity_search("补血", 1).await?;
//! ```

pub mod embedding;
pub mod engine;
pub mod flat;
pub mod persistence;
pub mod types;

#[cfg(feature = "vector-fastembed")]
pub mod fastembed;

#[cfg(feature = "vector-lancedb")]
pub mod lancedb;

// Re-exports: core types
pub use types::{Document, SearchHit, VectorConfig};

// Re-exports: traits
pub use embedding::{EmbeddingProvider, HashingEmbeddingProvider};
pub use engine::{VectorEngine, VectorStore};

// Re-exports: engines
pub use flat::FlatFileEngine;

// Re-exports: factories
pub use engine::{create_embedding_provider, create_engine};

#[cfg(feature = "vector-fastembed")]
pub use fastembed::FastEmbedProvider;

#[cfg(feature = "vector-lancedb")]
pub use lancedb::LancedbEngine;
