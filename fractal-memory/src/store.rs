//! In-memory vector store backing L4.
//!
//! A `HashMap` behind a `RwLock` (concurrent reads, exclusive writes).
//! Suitable for testing and single-process deployments; production
//! backends implement the same [`VectorStore`] contract.

use std::collections::HashMap;

use async_trait::async_trait;
use fractal_types::{MemoryError, MetadataFilter, VectorHit, VectorStore};
use tokio::sync::RwLock;

/// In-memory cosine-similarity vector store.
pub struct MemoryVectorStore {
    dimension: usize,
    data: RwLock<HashMap<String, (Vec<f32>, serde_json::Value)>>,
}

impl MemoryVectorStore {
    /// Create a store for vectors of the given dimension.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: RwLock::new(HashMap::new()),
        }
    }

    /// The store's vector dimension.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn add(
        &self,
        id: &str,
        embedding: &[f32],
        metadata: serde_json::Value,
    ) -> Result<bool, MemoryError> {
        if embedding.len() != self.dimension {
            return Err(MemoryError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }
        let mut data = self.data.write().await;
        let fresh = data
            .insert(id.to_string(), (embedding.to_vec(), metadata))
            .is_none();
        Ok(fresh)
    }

    async fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<VectorHit>, MemoryError> {
        if query.len() != self.dimension {
            return Err(MemoryError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        let data = self.data.read().await;
        let mut hits: Vec<VectorHit> = data
            .iter()
            .map(|(id, (vector, metadata))| VectorHit {
                id: id.clone(),
                score: cosine(query, vector),
                metadata: metadata.clone(),
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn delete(&self, id: &str) -> Result<bool, MemoryError> {
        let mut data = self.data.write().await;
        Ok(data.remove(id).is_some())
    }

    async fn delete_by_metadata(&self, filter: &MetadataFilter) -> Result<usize, MemoryError> {
        let mut data = self.data.write().await;
        let doomed: Vec<String> = data
            .iter()
            .filter(|(id, (_, metadata))| filter.matches(id, metadata))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &doomed {
            data.remove(id);
        }
        Ok(doomed.len())
    }

    async fn clear(&self) -> Result<bool, MemoryError> {
        self.data.write().await.clear();
        Ok(true)
    }

    async fn len(&self) -> usize {
        self.data.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn add_search_round_trip() {
        let store = MemoryVectorStore::new(3);
        store.add("a", &[1.0, 0.0, 0.0], json!({})).await.unwrap();
        store.add("b", &[0.0, 1.0, 0.0], json!({})).await.unwrap();

        let hits = store.search(&[1.0, 0.0, 0.0], 2).await.unwrap();
        assert_eq!(hits[0].id, "a");
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn dimension_mismatch_changes_nothing() {
        let store = MemoryVectorStore::new(3);
        let err = store.add("a", &[1.0, 0.0], json!({})).await.unwrap_err();
        assert!(matches!(err, MemoryError::DimensionMismatch { expected: 3, actual: 2 }));
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryVectorStore::new(2);
        store.add("a", &[1.0, 0.0], json!({})).await.unwrap();
        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());
    }

    #[tokio::test]
    async fn delete_by_metadata_filter() {
        let store = MemoryVectorStore::new(2);
        store
            .add("a", &[1.0, 0.0], json!({"session_id": "s1"}))
            .await
            .unwrap();
        store
            .add("b", &[0.0, 1.0], json!({"session_id": "s2"}))
            .await
            .unwrap();

        let raw = json!({"session_id": "s1"});
        let filter = MetadataFilter::parse(raw.as_object().unwrap());
        let removed = store.delete_by_metadata(&filter).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn clear_empties_the_store() {
        let store = MemoryVectorStore::new(2);
        store.add("a", &[1.0, 0.0], json!({})).await.unwrap();
        assert!(store.clear().await.unwrap());
        assert_eq!(store.len().await, 0);
        assert!(store.search(&[1.0, 0.0], 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reinsert_same_id_replaces() {
        let store = MemoryVectorStore::new(2);
        assert!(store.add("a", &[1.0, 0.0], json!({})).await.unwrap());
        assert!(!store.add("a", &[0.0, 1.0], json!({})).await.unwrap());
        assert_eq!(store.len().await, 1);
    }
}
