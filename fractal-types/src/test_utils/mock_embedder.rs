//! A deterministic embedder for tests.

use async_trait::async_trait;

use crate::error::EmbeddingError;
use crate::provider::Embedder;

/// An embedder that hashes character n-grams into a fixed-dimension
/// vector. Deterministic: identical input yields bit-identical output,
/// and near-identical strings land near each other often enough for
/// ranking tests.
pub struct MockEmbedder {
    dimension: usize,
    /// When set, every call fails — used to exercise degradation paths.
    failing: bool,
}

impl MockEmbedder {
    /// Create an embedder producing vectors of the given dimension.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            failing: false,
        }
    }

    /// Create an embedder whose every call fails with a network error.
    #[must_use]
    pub fn failing(dimension: usize) -> Self {
        Self {
            dimension,
            failing: true,
        }
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for window in text.as_bytes().windows(3) {
            let mut hash: u64 = 1469598103934665603;
            for &byte in window {
                hash ^= u64::from(byte);
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if self.failing {
            return Err(EmbeddingError::Network("mock embedder offline".into()));
        }
        Ok(self.embed_sync(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if self.failing {
            return Err(EmbeddingError::Network("mock embedder offline".into()));
        }
        Ok(texts.iter().map(|t| self.embed_sync(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
