//! Collaborator contracts for the retrieval core.
//!
//! Everything external (embedding API, vector index, term suggestion) is a
//! trait object returning typed [`CollaboratorError`]s, so the engine can
//! match on failures and pick the documented fallback instead of relying
//! on exception suppression.

use async_trait::async_trait;

use crate::error::CollaboratorError;
use crate::types::{ChunkId, Meta};

/// External text -> vector function.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn dim(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, CollaboratorError>;

    /// Batch variant preserving input order. A `None` slot means that one
    /// text failed to embed while the request as a whole succeeded.
    async fn embed_batch(
        &self,
        texts: &[String],
    ) -> Result<Vec<Option<Vec<f32>>>, CollaboratorError>;
}

/// A point stored in (or scrolled out of) the external vector index.
#[derive(Debug, Clone)]
pub struct StoredPoint {
    pub id: ChunkId,
    pub vector: Vec<f32>,
    pub text: String,
    pub metadata: Meta,
}

/// A nearest-neighbour hit as returned by the index, carrying the native
/// similarity score.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub id: ChunkId,
    pub score: f32,
    pub text: String,
    pub metadata: Meta,
}

/// Collection health reported by the index.
#[derive(Debug, Clone)]
pub struct IndexInfo {
    pub points_count: usize,
    pub status: String,
}

/// External approximate-nearest-neighbour oracle.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the backing collection if it does not exist yet.
    async fn ensure_ready(&self) -> Result<(), CollaboratorError>;

    async fn upsert_batch(&self, points: &[StoredPoint]) -> Result<(), CollaboratorError>;

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredPoint>, CollaboratorError>;

    /// Full scan used to rehydrate the local cache so the brute-force
    /// fallback has data even if the oracle later becomes unreachable.
    async fn scroll_all(&self) -> Result<Vec<StoredPoint>, CollaboratorError>;

    /// Bulk clear: drop and re-create the collection.
    async fn recreate(&self) -> Result<(), CollaboratorError>;

    async fn info(&self) -> Result<IndexInfo, CollaboratorError>;
}

/// External term-suggestion collaborator used for query expansion.
/// Returns a comma-separated candidate list for the raw query.
#[async_trait]
pub trait TermSuggester: Send + Sync {
    async fn suggest(&self, query: &str) -> Result<String, CollaboratorError>;
}
