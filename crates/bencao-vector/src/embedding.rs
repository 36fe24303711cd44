//! Embedding provider trait and the built-in hashing provider.
//!
//! # Providers
//!
//! - `HashingEmbeddingProvider`: Deterministic feature-hashing vectors, no
//!   model download required
//! - `FastEmbedProvider`: Local transformer models via fastembed (requires
//!   the `vector-fastembed` feature)

use async_trait::async_trait;
use bencao_core::Result;

/// Trait for generating text embeddings.
///
/// Implementations must be `Send + Sync` so one provider can be shared by the
/// engine that builds snapshots and the engine that loads them for queries.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for a batch of texts.
    ///
    /// Default implementation calls `embed` for each text sequentially.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// The embedding dimension.
    fn dimension(&self) -> usize;

    /// The provider name, recorded in snapshot manifests.
    fn name(&self) -> &str;
}

/// Feature-hashing embedding provider.
///
/// Every character and every pair of adjacent characters is hashed with
/// blake3 into one of `dimension` buckets with a signed weight, and the
/// result is normalized to a unit vector. Texts sharing characters land close
/// together, which is enough for smoke queries and tests, and works for CJK
/// text without a tokenizer.
#[derive(Debug, Clone)]
pub struct HashingEmbeddingProvider {
    dimension: usize,
}

const UNIGRAM_WEIGHT: f32 = 1.0;
const BIGRAM_WEIGHT: f32 = 1.5;

impl HashingEmbeddingProvider {
    /// Create a provider producing vectors of the given dimension (min 1).
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn accumulate(&self, embedding: &mut [f32], feature: &str, weight: f32) {
        let hash = blake3::hash(feature.as_bytes());
        let bytes = hash.as_bytes();
        let mut bucket_bytes = [0u8; 8];
        bucket_bytes.copy_from_slice(&bytes[..8]);
        let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
        let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
        embedding[bucket] += sign * weight;
    }

    fn hashed_embedding(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimension];
        let chars: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();

        for c in &chars {
            let mut buf = [0u8; 4];
            self.accumulate(&mut embedding, c.encode_utf8(&mut buf), UNIGRAM_WEIGHT);
        }
        for pair in chars.windows(2) {
            let bigram: String = pair.iter().collect();
            self.accumulate(&mut embedding, &bigram, BIGRAM_WEIGHT);
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for val in &mut embedding {
                *val /= norm;
            }
        }
        embedding
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.hashed_embedding(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.hashed_embedding(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

/// Cosine similarity of two vectors of equal length.
///
/// Returns 0.0 when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashing_provider_creation() {
        let provider = HashingEmbeddingProvider::new(128);
        assert_eq!(provider.dimension(), 128);
        assert_eq!(provider.name(), "hashing");
    }

    #[test]
    fn test_zero_dimension_clamped() {
        assert_eq!(HashingEmbeddingProvider::new(0).dimension(), 1);
    }

    #[tokio::test]
    async fn test_embed_is_unit_length() {
        let provider = HashingEmbeddingProvider::new(64);
        let embedding = provider.embed("人参大补元气").await.unwrap();

        assert_eq!(embedding.len(), 64);
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_embed_deterministic() {
        let provider = HashingEmbeddingProvider::new(64);
        let e1 = provider.embed("当归").await.unwrap();
        let e2 = provider.embed("当归").await.unwrap();
        assert_eq!(e1, e2);
    }

    #[tokio::test]
    async fn test_shared_characters_score_higher() {
        let provider = HashingEmbeddingProvider::new(256);
        let query = provider.embed("补气养血").await.unwrap();
        let related = provider.embed("黄芪补气，当归养血").await.unwrap();
        let unrelated = provider.embed("weather report for tuesday").await.unwrap();

        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[tokio::test]
    async fn test_embed_empty_text_is_zero_vector() {
        let provider = HashingEmbeddingProvider::new(8);
        let embedding = provider.embed("   ").await.unwrap();
        assert!(embedding.iter().all(|v| *v == 0.0));
    }

    #[tokio::test]
    async fn test_embed_batch() {
        let provider = HashingEmbeddingProvider::new(16);
        let embeddings = provider.embed_batch(&["甘草", "生姜", "大枣"]).await.unwrap();
        assert_eq!(embeddings.len(), 3);
        assert!(embeddings.iter().all(|e| e.len() == 16));
    }

    #[test]
    fn test_cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_trait_object_safety() {
        fn _assert_object_safe(_: &dyn EmbeddingProvider) {}
    }
}
