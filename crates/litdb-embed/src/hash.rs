//! Deterministic hashed bag-of-words embedder for offline operation and
//! tests. Not semantically meaningful, but stable: the same text always
//! maps to the same L2-normalized vector.

use async_trait::async_trait;
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use litdb_core::error::CollaboratorError;
use litdb_core::traits::EmbeddingProvider;

pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, CollaboratorError> {
        Ok(self.embed_sync(text))
    }

    async fn embed_batch(
        &self,
        texts: &[String],
    ) -> Result<Vec<Option<Vec<f32>>>, CollaboratorError> {
        Ok(texts.iter().map(|t| Some(self.embed_sync(t))).collect())
    }
}
