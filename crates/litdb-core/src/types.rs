//! Domain types shared by the sparse and dense retrieval engines.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use crate::error::Error;

pub type ChunkId = String;
pub type Meta = HashMap<String, String>;

/// The atomic retrievable unit: a bounded slice of a source paper.
///
/// - `id`: unique for the lifetime of the corpus store; also the point id
///   in the external vector index
/// - `text`: chunk content produced by the chunker
/// - `embedding`: dense vector once computed; `None` means the embedding
///   collaborator failed or was skipped, in which case the chunk only
///   participates in sparse search
/// - `metadata`: opaque key/value pass-through (pmid, title, journal,
///   section, chunk_index, ...) echoed back in results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub text: String,
    pub embedding: Option<Vec<f32>>,
    pub metadata: Meta,
}

impl Chunk {
    pub fn new(id: ChunkId, text: String, embedding: Option<Vec<f32>>, metadata: Meta) -> Self {
        Self { id, text, embedding, metadata }
    }
}

/// A query term with its expansion weight. Original-query terms carry the
/// highest weight and always precede expansion terms.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedTerm {
    pub term: String,
    pub weight: f32,
}

impl WeightedTerm {
    pub fn new(term: impl Into<String>, weight: f32) -> Self {
        Self { term: term.into(), weight }
    }

    /// Multi-word terms are matched as exact phrases rather than scored
    /// token-by-token.
    pub fn is_phrase(&self) -> bool {
        self.term.split_whitespace().nth(1).is_some()
    }
}

/// Retrieval mode. A query runs in exactly one mode; unknown mode strings
/// are rejected at the parse boundary with [`Error::InvalidMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Dense,
    Sparse,
    Hybrid,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Dense => "dense",
            SearchMode::Sparse => "sparse",
            SearchMode::Hybrid => "hybrid",
        }
    }
}

impl FromStr for SearchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dense" => Ok(SearchMode::Dense),
            "sparse" => Ok(SearchMode::Sparse),
            "hybrid" => Ok(SearchMode::Hybrid),
            other => Err(Error::InvalidMode(other.to_string())),
        }
    }
}

impl std::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which engine produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceEngine {
    Ann,
    InMemory,
    Sparse,
    Hybrid,
}

/// One ranked search hit.
///
/// `dense_score` is normalized cosine similarity in [0, 1]. `sparse_score`
/// is the rescaled lexical score on the [0, 30] display scale. `score` is
/// the mode's final ranking value: for dense and hybrid it is bounded by
/// [0, 1]; for sparse it equals the display-scale sparse score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub id: ChunkId,
    pub text: String,
    pub dense_score: Option<f32>,
    pub sparse_score: Option<f32>,
    pub score: f32,
    pub matched_terms: Vec<String>,
    pub metadata: Meta,
    pub engine: SourceEngine,
}

/// Snapshot of engine health reported by `stats()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStats {
    pub collection_name: String,
    pub corpus_size: usize,
    pub with_embeddings: usize,
    pub vocabulary_size: usize,
    pub sparse_built: bool,
    pub dense_available: bool,
    pub dense_engine: String,
    pub sparse_engine: String,
    pub ann_points: Option<usize>,
}
