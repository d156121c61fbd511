//! Corpus store + fusion engine.
//!
//! The corpus, the lexical index built from it and the locally cached
//! embeddings form one logical unit guarded by a single `RwLock`:
//! mutations (add/clear) hold the write lock and rebuild the lexical
//! index before releasing it, queries hold the read lock for their whole
//! duration. Within one hybrid query the dense and sparse sub-searches
//! run concurrently over the same snapshot and are joined before fusion.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use litdb_core::traits::{EmbeddingProvider, StoredPoint, TermSuggester, VectorIndex};
use litdb_core::types::{
    Chunk, ChunkId, EngineStats, Meta, RetrievalResult, SearchMode, SourceEngine,
};
use litdb_dense::DenseRetriever;
use litdb_sparse::{BmIndex, QueryExpander};

pub const DEFAULT_DENSE_WEIGHT: f32 = 0.7;

/// Display-scale ceiling for sparse scores.
const SPARSE_DISPLAY_MAX: f32 = 30.0;
/// Multiplier mapping typical raw BM25 scores onto the display scale.
const SPARSE_DISPLAY_SCALE: f32 = 3.0;
/// Bonus factor when a chunk is matched by both modalities.
const SYNERGY_FACTOR: f32 = 0.1;

struct CorpusState {
    chunks: Vec<Chunk>,
    sparse: BmIndex,
}

impl CorpusState {
    fn empty() -> Self {
        Self { chunks: Vec::new(), sparse: BmIndex::new() }
    }

    fn rebuild_sparse(&mut self) {
        let texts: Vec<String> = self.chunks.iter().map(|c| c.text.clone()).collect();
        self.sparse.fit(&texts);
    }
}

struct SparseHit {
    id: ChunkId,
    chunk_idx: usize,
    raw_score: f32,
    display_score: f32,
    matched_terms: Vec<String>,
}

pub struct HybridEngine {
    state: RwLock<CorpusState>,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    retriever: DenseRetriever,
    expander: QueryExpander,
    collection: String,
}

impl HybridEngine {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        suggester: Option<Arc<dyn TermSuggester>>,
        collection: impl Into<String>,
    ) -> Self {
        let retriever = DenseRetriever::new(embedder.clone(), index.clone());
        Self {
            state: RwLock::new(CorpusState::empty()),
            embedder,
            index,
            retriever,
            expander: QueryExpander::new(suggester),
            collection: collection.into(),
        }
    }

    /// Rehydrate the local corpus from the vector index on startup so the
    /// brute-force fallback and the lexical index have data. An
    /// unreachable index is not fatal; the engine just starts empty.
    pub async fn sync_from_index(&self) {
        match self.retriever.scroll_chunks().await {
            Ok(chunks) if chunks.is_empty() => {
                info!("no documents in the vector index to sync");
            }
            Ok(chunks) => {
                let mut state = self.state.write().await;
                state.chunks = chunks;
                state.rebuild_sparse();
                info!(count = state.chunks.len(), "synced corpus from vector index");
            }
            Err(e) => {
                info!(error = %e, "vector index unavailable, starting with empty corpus");
            }
        }
    }

    /// Ingest chunk texts with their metadata. Ids are assigned when not
    /// supplied. Embeddings are computed up front (outside the lock, so a
    /// cancelled call leaves no partial state); chunks whose embedding
    /// failed still enter the corpus for sparse search.
    pub async fn add_documents(
        &self,
        texts: Vec<String>,
        metadatas: Vec<Meta>,
        ids: Option<Vec<ChunkId>>,
    ) -> Result<Vec<ChunkId>> {
        anyhow::ensure!(
            texts.len() == metadatas.len(),
            "texts and metadatas must have equal length"
        );
        let ids = match ids {
            Some(ids) => {
                anyhow::ensure!(ids.len() == texts.len(), "ids must match texts length");
                ids
            }
            None => texts.iter().map(|_| Uuid::new_v4().to_string()).collect(),
        };

        let embeddings = match self.embedder.embed_batch(&texts).await {
            Ok(embeddings) => embeddings,
            Err(e) => {
                warn!(error = %e, "embedding collaborator unavailable, indexing sparse-only");
                vec![None; texts.len()]
            }
        };

        let points: Vec<StoredPoint> = ids
            .iter()
            .zip(texts.iter())
            .zip(embeddings.iter())
            .zip(metadatas.iter())
            .filter_map(|(((id, text), embedding), meta)| {
                embedding.as_ref().map(|vector| StoredPoint {
                    id: id.clone(),
                    vector: vector.clone(),
                    text: text.clone(),
                    metadata: meta.clone(),
                })
            })
            .collect();
        if !points.is_empty() {
            if let Err(e) = self.index.ensure_ready().await {
                warn!(error = %e, "vector index not ready, skipping upsert");
            } else if let Err(e) = self.index.upsert_batch(&points).await {
                warn!(error = %e, "vector index upsert failed, dense search will rely on local cache");
            }
        }

        let mut state = self.state.write().await;
        for ((id, text), (embedding, meta)) in ids
            .iter()
            .zip(texts.into_iter())
            .zip(embeddings.into_iter().zip(metadatas.into_iter()))
        {
            if state.chunks.iter().any(|c| &c.id == id) {
                warn!(id = %id, "duplicate chunk id, skipping");
                continue;
            }
            state.chunks.push(Chunk::new(id.clone(), text, embedding, meta));
        }
        state.rebuild_sparse();
        info!(total = state.chunks.len(), added = ids.len(), "corpus updated");
        Ok(ids)
    }

    /// Bulk clear: the only deletion primitive. Local state is dropped
    /// even when the vector index cannot be cleared.
    pub async fn clear(&self) {
        {
            let mut state = self.state.write().await;
            *state = CorpusState::empty();
        }
        if let Err(e) = self.index.recreate().await {
            warn!(error = %e, "failed to clear vector index collection");
        }
        info!("corpus cleared");
    }

    /// Run a query in the given mode. All collaborator failures degrade to
    /// an empty contribution from that modality; an empty corpus yields an
    /// empty result list.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        mode: SearchMode,
        dense_weight: f32,
    ) -> Vec<RetrievalResult> {
        let dense_weight = dense_weight.clamp(0.0, 1.0);
        let state = self.state.read().await;
        match mode {
            SearchMode::Dense => self.search_dense(query, top_k, &state).await,
            SearchMode::Sparse => {
                let hits = self.search_sparse(query, top_k, &state).await;
                hits.into_iter()
                    .map(|h| {
                        let chunk = &state.chunks[h.chunk_idx];
                        RetrievalResult {
                            id: h.id,
                            text: chunk.text.clone(),
                            dense_score: None,
                            sparse_score: Some(h.display_score),
                            score: h.display_score,
                            matched_terms: h.matched_terms,
                            metadata: chunk.metadata.clone(),
                            engine: SourceEngine::Sparse,
                        }
                    })
                    .collect()
            }
            SearchMode::Hybrid => self.search_hybrid(query, top_k, dense_weight, &state).await,
        }
    }

    async fn search_dense(
        &self,
        query: &str,
        top_k: usize,
        state: &CorpusState,
    ) -> Vec<RetrievalResult> {
        self.retriever
            .search(query, top_k, &state.chunks)
            .await
            .into_iter()
            .map(|h| RetrievalResult {
                id: h.id,
                text: h.text,
                dense_score: Some(round4(h.score)),
                sparse_score: None,
                score: round4(h.score),
                matched_terms: Vec::new(),
                metadata: h.metadata,
                engine: if h.from_fallback { SourceEngine::InMemory } else { SourceEngine::Ann },
            })
            .collect()
    }

    /// Sparse scoring over every chunk: keep positive scores, order by raw
    /// score descending (stable, so ties keep corpus insertion order),
    /// truncate, then rescale onto the [0, 30] display range.
    async fn search_sparse(&self, query: &str, top_k: usize, state: &CorpusState) -> Vec<SparseHit> {
        if state.chunks.is_empty() || !state.sparse.is_fitted() {
            return Vec::new();
        }
        let query_terms = self.expander.expand(query).await;
        if query_terms.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<SparseHit> = Vec::new();
        for (idx, chunk) in state.chunks.iter().enumerate() {
            let (raw_score, term_scores) = state.sparse.score(&query_terms, idx, &chunk.text);
            if raw_score > 0.0 {
                hits.push(SparseHit {
                    id: chunk.id.clone(),
                    chunk_idx: idx,
                    raw_score,
                    display_score: rescale_sparse(raw_score),
                    matched_terms: term_scores.into_iter().take(5).map(|(t, _)| t).collect(),
                });
            }
        }
        hits.sort_by(|a, b| {
            b.raw_score.partial_cmp(&a.raw_score).unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);
        hits
    }

    /// Hybrid fusion: both modalities are evaluated over the entire
    /// corpus so they score the same candidate universe, the sparse batch
    /// is normalized by its maximum, and the weighted components are
    /// combined with a synergy bonus for chunks both modalities matched.
    async fn search_hybrid(
        &self,
        query: &str,
        top_k: usize,
        dense_weight: f32,
        state: &CorpusState,
    ) -> Vec<RetrievalResult> {
        if state.chunks.is_empty() {
            return Vec::new();
        }
        let sparse_weight = 1.0 - dense_weight;
        let universe = state.chunks.len();

        let (dense_hits, sparse_hits) = tokio::join!(
            self.retriever.search(query, universe, &state.chunks),
            self.search_sparse(query, universe, state),
        );

        let max_sparse = sparse_hits.iter().map(|h| h.display_score).fold(0.0f32, f32::max);
        let sparse_by_id: HashMap<&str, &SparseHit> =
            sparse_hits.iter().map(|h| (h.id.as_str(), h)).collect();
        let dense_by_id: HashMap<&str, f32> =
            dense_hits.iter().map(|h| (h.id.as_str(), h.score)).collect();
        let chunk_by_id: HashMap<&str, &Chunk> =
            state.chunks.iter().map(|c| (c.id.as_str(), c)).collect();

        // Union in first-seen order (dense list, then sparse-only ids) so
        // equal fused scores keep a deterministic order run-to-run.
        let mut union_ids: Vec<&str> = Vec::new();
        for h in &dense_hits {
            if !union_ids.contains(&h.id.as_str()) {
                union_ids.push(h.id.as_str());
            }
        }
        for h in &sparse_hits {
            if !union_ids.contains(&h.id.as_str()) {
                union_ids.push(h.id.as_str());
            }
        }

        let mut fused: Vec<RetrievalResult> = Vec::with_capacity(union_ids.len());
        for id in union_ids {
            let dense_component = dense_by_id.get(id).copied().unwrap_or(0.0);
            let sparse_hit = sparse_by_id.get(id);
            let sparse_display = sparse_hit.map(|h| h.display_score).unwrap_or(0.0);
            let sparse_component =
                if max_sparse > 0.0 { sparse_display / max_sparse } else { 0.0 };

            let mut score =
                dense_component * dense_weight + sparse_component * sparse_weight;
            if dense_component > 0.0 && sparse_display > 0.0 {
                score = (score + SYNERGY_FACTOR * dense_component.min(sparse_component)).min(1.0);
            }

            // Prefer the local chunk for text/metadata; a dense hit for an
            // id the local store does not know yet falls back to its
            // payload.
            let (text, metadata) = match chunk_by_id.get(id) {
                Some(chunk) => (chunk.text.clone(), chunk.metadata.clone()),
                None => match dense_hits.iter().find(|h| h.id == id) {
                    Some(h) => (h.text.clone(), h.metadata.clone()),
                    None => continue,
                },
            };

            fused.push(RetrievalResult {
                id: id.to_string(),
                text,
                dense_score: Some(round4(dense_component)),
                sparse_score: Some(sparse_display),
                score: round4(score),
                matched_terms: sparse_hit.map(|h| h.matched_terms.clone()).unwrap_or_default(),
                metadata,
                engine: SourceEngine::Hybrid,
            });
        }

        fused.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        fused.truncate(top_k);
        fused
    }

    /// Engine health snapshot: corpus and vocabulary sizes plus live
    /// availability of each modality, so operators can see degraded modes.
    pub async fn stats(&self) -> EngineStats {
        let state = self.state.read().await;
        let with_embeddings = state.chunks.iter().filter(|c| c.embedding.is_some()).count();
        let (dense_available, ann_points) = match self.index.info().await {
            Ok(info) => (true, Some(info.points_count)),
            Err(_) => (false, None),
        };
        EngineStats {
            collection_name: self.collection.clone(),
            corpus_size: state.chunks.len(),
            with_embeddings,
            vocabulary_size: state.sparse.vocabulary_size(),
            sparse_built: state.sparse.is_fitted(),
            dense_available,
            dense_engine: if dense_available { "ann".into() } else { "in_memory".into() },
            sparse_engine: if state.sparse.is_fitted() { "bm25".into() } else { "none".into() },
            ann_points,
        }
    }

    /// Every chunk currently in the corpus (snapshot copy).
    pub async fn chunks(&self) -> Vec<Chunk> {
        self.state.read().await.chunks.clone()
    }
}

/// Compress a raw BM25 score onto the [0, 30] display range. The factor is
/// a fixed heuristic kept for score compatibility, not a true logarithm.
fn rescale_sparse(raw: f32) -> f32 {
    if raw <= 0.0 {
        return 0.0;
    }
    round2((raw * SPARSE_DISPLAY_SCALE).min(SPARSE_DISPLAY_MAX))
}

fn round2(x: f32) -> f32 {
    (x * 100.0).round() / 100.0
}

fn round4(x: f32) -> f32 {
    (x * 10000.0).round() / 10000.0
}
