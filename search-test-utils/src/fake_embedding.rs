//! A deterministic fake embedding provider: hashes the input text into a
//! fixed-size vector so equal text always embeds identically without
//! calling out to a real model.

use async_trait::async_trait;
use hybrid_search_core::SearchResult as Outcome;
use hybrid_search_strategies::embedding::EmbeddingProvider;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

pub struct FakeEmbeddingProvider {
    dimensions: usize,
    available: bool,
}

impl FakeEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions, available: true }
    }

    pub fn unavailable(dimensions: usize) -> Self {
        Self { dimensions, available: false }
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbeddingProvider {
    fn model_id(&self) -> &str {
        "fake-embedding-v1"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn embed(&self, text: &str) -> Outcome<Vec<f32>> {
        let mut vector = Vec::with_capacity(self.dimensions);
        for i in 0..self.dimensions {
            let mut hasher = DefaultHasher::new();
            text.hash(&mut hasher);
            i.hash(&mut hasher);
            let bits = hasher.finish();
            vector.push(((bits % 2000) as f32 / 1000.0) - 1.0);
        }
        Ok(vector)
    }
}
