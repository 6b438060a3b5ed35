//! `EmbeddingProvider`: the port consumed by semantic queries to turn query
//! text into a vector of the index's configured dimensionality.

use async_trait::async_trait;

use crate::error::{Result, SearchError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingMode {
    Query,
    Passage,
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// One vector per input text, in order, each of `dimensions()` length.
    /// A provider failure surfaces to the caller verbatim — it never poisons
    /// index state.
    async fn embed(&self, texts: &[String], mode: EmbeddingMode) -> Result<Vec<Vec<f32>>>;

    fn dimensions(&self) -> usize;
}

/// Always fails. Useful for wiring a coordinator in configurations where
/// semantic search is intentionally unavailable (e.g. text-only deployments).
pub struct NullEmbeddingProvider {
    dimensions: usize,
}

impl NullEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

#[async_trait]
impl EmbeddingProvider for NullEmbeddingProvider {
    async fn embed(&self, _texts: &[String], _mode: EmbeddingMode) -> Result<Vec<Vec<f32>>> {
        Err(SearchError::provider("no embedding provider configured"))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// A deterministic hash-based embedding, for tests and local development
/// without a real model. Not suitable for production semantic quality.
pub struct DeterministicEmbeddingProvider {
    dimensions: usize,
}

impl DeterministicEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for (i, byte) in text.bytes().enumerate() {
            let slot = i % self.dimensions;
            vector[slot] += (byte as f32) / 255.0;
        }
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for DeterministicEmbeddingProvider {
    async fn embed(&self, texts: &[String], _mode: EmbeddingMode) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_null_provider_always_fails() {
        let provider = NullEmbeddingProvider::new(8);
        let result = provider.embed(&["hello".to_string()], EmbeddingMode::Query).await;
        assert!(matches!(result, Err(SearchError::Provider(_))));
    }

    #[tokio::test]
    async fn test_deterministic_provider_is_stable() {
        let provider = DeterministicEmbeddingProvider::new(16);
        let a = provider.embed(&["hello world".to_string()], EmbeddingMode::Query).await.unwrap();
        let b = provider.embed(&["hello world".to_string()], EmbeddingMode::Passage).await.unwrap();
        assert_eq!(a, b, "embedding must not depend on mode for this deterministic backend");
        assert_eq!(a[0].len(), 16);
    }

    #[tokio::test]
    async fn test_deterministic_provider_distinguishes_inputs() {
        let provider = DeterministicEmbeddingProvider::new(16);
        let results = provider
            .embed(&["alpha".to_string(), "beta".to_string()], EmbeddingMode::Query)
            .await
            .unwrap();
        assert_ne!(results[0], results[1]);
    }
}
