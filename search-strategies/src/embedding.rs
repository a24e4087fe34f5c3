//! Pluggable embedding capability: `embed(text) -> vector` plus batch and
//! discovery methods, modeled as a single async trait so any provider
//! (local model, hosted API) can be swapped in behind it.

use async_trait::async_trait;
use hybrid_search_core::SearchResult as Outcome;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn model_id(&self) -> &str;
    fn dimensions(&self) -> usize;
    /// Cheap availability check; does not guarantee the next call succeeds.
    fn is_available(&self) -> bool;

    async fn embed(&self, text: &str) -> Outcome<Vec<f32>>;

    /// Default batches sequentially; providers with a native batch
    /// endpoint should override this.
    async fn embed_batch(&self, texts: &[String]) -> Outcome<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
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
    fn identical_vectors_have_similarity_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn mismatched_dimensions_return_zero() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }
}
