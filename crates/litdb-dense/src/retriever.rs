//! The dense retriever: query embedding + ANN search, with a brute-force
//! cosine fallback over locally cached embeddings when the oracle is
//! unavailable. Failures degrade to empty results; they never propagate.

use std::sync::Arc;
use tracing::{debug, warn};

use litdb_core::traits::{EmbeddingProvider, VectorIndex};
use litdb_core::types::{Chunk, ChunkId, Meta};

/// A dense hit with its similarity already normalized into [0, 1].
#[derive(Debug, Clone)]
pub struct DenseHit {
    pub id: ChunkId,
    pub score: f32,
    pub text: String,
    pub metadata: Meta,
    pub from_fallback: bool,
}

/// Map a native cosine-family score into [0, 1]: non-negative scores pass
/// through, negative ones are shifted out of [-1, 0].
pub fn normalize_dense_score(score: f32) -> f32 {
    let mapped = if score < 0.0 { (score + 1.0) / 2.0 } else { score };
    mapped.clamp(0.0, 1.0)
}

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

pub struct DenseRetriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
}

impl DenseRetriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    /// Search the ANN oracle, falling back to brute-force cosine over the
    /// provided corpus snapshot. An unavailable embedder yields an empty
    /// result set so dense mode contributes nothing.
    pub async fn search(&self, query: &str, top_k: usize, corpus: &[Chunk]) -> Vec<DenseHit> {
        if corpus.is_empty() {
            return Vec::new();
        }

        let query_vec = match self.embedder.embed(query).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "query embedding unavailable, dense search returns nothing");
                return Vec::new();
            }
        };

        match self.index.query(&query_vec, top_k).await {
            Ok(points) => {
                debug!(hits = points.len(), "ann search succeeded");
                points
                    .into_iter()
                    .map(|p| DenseHit {
                        id: p.id,
                        score: normalize_dense_score(p.score),
                        text: p.text,
                        metadata: p.metadata,
                        from_fallback: false,
                    })
                    .collect()
            }
            Err(e) => {
                warn!(error = %e, "ann search failed, falling back to local cosine scan");
                brute_force(&query_vec, top_k, corpus)
            }
        }
    }

    /// Rehydrate local chunks from the oracle so the fallback path has
    /// data even if the oracle later fails.
    pub async fn scroll_chunks(&self) -> Result<Vec<Chunk>, litdb_core::error::CollaboratorError> {
        let points = self.index.scroll_all().await?;
        Ok(points
            .into_iter()
            .map(|p| {
                let embedding = if p.vector.is_empty() { None } else { Some(p.vector) };
                Chunk::new(p.id, p.text, embedding, p.metadata)
            })
            .collect())
    }
}

/// Cosine scan over every cached chunk that has an embedding; chunks
/// without one are silently excluded.
fn brute_force(query_vec: &[f32], top_k: usize, corpus: &[Chunk]) -> Vec<DenseHit> {
    let mut hits: Vec<DenseHit> = corpus
        .iter()
        .filter_map(|chunk| {
            let embedding = chunk.embedding.as_ref()?;
            let score = normalize_dense_score(cosine_similarity(query_vec, embedding));
            Some(DenseHit {
                id: chunk.id.clone(),
                score,
                text: chunk.text.clone(),
                metadata: chunk.metadata.clone(),
                from_fallback: true,
            })
        })
        .collect();
    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(top_k);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_bounds_and_mapping() {
        assert_eq!(normalize_dense_score(-1.0), 0.0);
        assert_eq!(normalize_dense_score(-0.5), 0.25);
        assert_eq!(normalize_dense_score(0.0), 0.0);
        assert_eq!(normalize_dense_score(0.5), 0.5);
        assert_eq!(normalize_dense_score(1.0), 1.0);
        assert_eq!(normalize_dense_score(1.5), 1.0);
    }

    #[test]
    fn cosine_handles_degenerate_vectors() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn brute_force_skips_chunks_without_embeddings() {
        let corpus = vec![
            Chunk::new("a".into(), "text a".into(), Some(vec![1.0, 0.0]), Meta::new()),
            Chunk::new("b".into(), "text b".into(), None, Meta::new()),
            Chunk::new("c".into(), "text c".into(), Some(vec![0.0, 1.0]), Meta::new()),
        ];
        let hits = brute_force(&[1.0, 0.0], 10, &corpus);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "a");
        assert!(hits[0].score > hits[1].score);
        assert!(hits.iter().all(|h| (0.0..=1.0).contains(&h.score)));
    }

    #[test]
    fn brute_force_truncates_to_top_k() {
        let corpus: Vec<Chunk> = (0..5)
            .map(|i| {
                Chunk::new(
                    format!("c{i}"),
                    format!("text {i}"),
                    Some(vec![1.0, i as f32 * 0.1]),
                    Meta::new(),
                )
            })
            .collect();
        let hits = brute_force(&[1.0, 0.0], 2, &corpus);
        assert_eq!(hits.len(), 2);
    }
}
