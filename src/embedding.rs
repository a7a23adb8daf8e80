use crate::llm::{LlmError, Provider};
use async_trait::async_trait;
use reqwest::Client;

/// Embedding seam used by the index
#[async_trait]
pub trait Embedder: Send + Sync {
    /// One vector per input text, in input order
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError>;
}

/// A provider bound to one embedding model
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    http: Client,
    provider: Provider,
    model: String,
}

impl EmbeddingClient {
    pub fn new(provider: Provider, model: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            provider,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        tracing::debug!(
            provider = self.provider.name(),
            model = %self.model,
            count = texts.len(),
            "embedding request"
        );
        self.provider.embed(&self.http, texts, &self.model).await
    }
}

/// Cosine similarity between two vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// The `top_k` items most similar to `query_embedding`, best first
pub fn search_similar<'a, T>(
    query_embedding: &[f32],
    items: &'a [T],
    embedding_of: impl Fn(&T) -> &[f32],
    top_k: usize,
) -> Vec<(&'a T, f32)> {
    let mut scored: Vec<(&T, f32)> = items
        .iter()
        .map(|item| (item, cosine_similarity(query_embedding, embedding_of(item))))
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_search_similar_orders_and_truncates() {
        let items = vec![
            ("east", vec![1.0, 0.0]),
            ("north", vec![0.0, 1.0]),
            ("north-east", vec![1.0, 1.0]),
        ];

        let hits = search_similar(&[0.0, 1.0], &items, |(_, e)| e.as_slice(), 2);
        let names: Vec<&str> = hits.iter().map(|(item, _)| item.0).collect();
        assert_eq!(names, vec!["north", "north-east"]);
        assert!(hits[0].1 > hits[1].1);
    }
}
