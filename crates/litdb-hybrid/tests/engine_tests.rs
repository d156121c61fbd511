use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use litdb_core::error::CollaboratorError;
use litdb_core::traits::{
    EmbeddingProvider, IndexInfo, ScoredPoint, StoredPoint, VectorIndex,
};
use litdb_core::types::{Meta, SearchMode};
use litdb_dense::cosine_similarity;
use litdb_embed::HashEmbedder;
use litdb_hybrid::HybridEngine;

const DIM: usize = 64;

/// In-memory stand-in for the external vector index.
struct StaticIndex {
    points: Mutex<Vec<StoredPoint>>,
}

impl StaticIndex {
    fn new() -> Self {
        Self { points: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl VectorIndex for StaticIndex {
    async fn ensure_ready(&self) -> Result<(), CollaboratorError> {
        Ok(())
    }

    async fn upsert_batch(&self, points: &[StoredPoint]) -> Result<(), CollaboratorError> {
        self.points.lock().expect("lock").extend(points.iter().cloned());
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredPoint>, CollaboratorError> {
        let points = self.points.lock().expect("lock");
        let mut hits: Vec<ScoredPoint> = points
            .iter()
            .map(|p| ScoredPoint {
                id: p.id.clone(),
                score: cosine_similarity(vector, &p.vector),
                text: p.text.clone(),
                metadata: p.metadata.clone(),
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn scroll_all(&self) -> Result<Vec<StoredPoint>, CollaboratorError> {
        Ok(self.points.lock().expect("lock").clone())
    }

    async fn recreate(&self) -> Result<(), CollaboratorError> {
        self.points.lock().expect("lock").clear();
        Ok(())
    }

    async fn info(&self) -> Result<IndexInfo, CollaboratorError> {
        Ok(IndexInfo {
            points_count: self.points.lock().expect("lock").len(),
            status: "green".into(),
        })
    }
}

/// Index whose every call fails, as if the server were unreachable.
struct DeadIndex;

#[async_trait]
impl VectorIndex for DeadIndex {
    async fn ensure_ready(&self) -> Result<(), CollaboratorError> {
        Err(CollaboratorError::Transport("connection refused".into()))
    }
    async fn upsert_batch(&self, _points: &[StoredPoint]) -> Result<(), CollaboratorError> {
        Err(CollaboratorError::Transport("connection refused".into()))
    }
    async fn query(
        &self,
        _vector: &[f32],
        _top_k: usize,
    ) -> Result<Vec<ScoredPoint>, CollaboratorError> {
        Err(CollaboratorError::Transport("connection refused".into()))
    }
    async fn scroll_all(&self) -> Result<Vec<StoredPoint>, CollaboratorError> {
        Err(CollaboratorError::Transport("connection refused".into()))
    }
    async fn recreate(&self) -> Result<(), CollaboratorError> {
        Err(CollaboratorError::Transport("connection refused".into()))
    }
    async fn info(&self) -> Result<IndexInfo, CollaboratorError> {
        Err(CollaboratorError::Transport("connection refused".into()))
    }
}

/// Index that returns one fixed score per id, regardless of the query
/// vector. Lets tests pin the dense side of a fusion exactly.
struct FixedScoreIndex {
    scores: HashMap<String, f32>,
    texts: HashMap<String, String>,
}

#[async_trait]
impl VectorIndex for FixedScoreIndex {
    async fn ensure_ready(&self) -> Result<(), CollaboratorError> {
        Ok(())
    }
    async fn upsert_batch(&self, _points: &[StoredPoint]) -> Result<(), CollaboratorError> {
        Ok(())
    }
    async fn query(
        &self,
        _vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredPoint>, CollaboratorError> {
        let mut hits: Vec<ScoredPoint> = self
            .scores
            .iter()
            .map(|(id, score)| ScoredPoint {
                id: id.clone(),
                score: *score,
                text: self.texts.get(id).cloned().unwrap_or_default(),
                metadata: Meta::new(),
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        Ok(hits)
    }
    async fn scroll_all(&self) -> Result<Vec<StoredPoint>, CollaboratorError> {
        Ok(Vec::new())
    }
    async fn recreate(&self) -> Result<(), CollaboratorError> {
        Ok(())
    }
    async fn info(&self) -> Result<IndexInfo, CollaboratorError> {
        Ok(IndexInfo { points_count: self.scores.len(), status: "green".into() })
    }
}

/// Embedding collaborator that always fails.
struct DeadEmbedder;

#[async_trait]
impl EmbeddingProvider for DeadEmbedder {
    fn dim(&self) -> usize {
        DIM
    }
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, CollaboratorError> {
        Err(CollaboratorError::Unconfigured("embedding API key"))
    }
    async fn embed_batch(
        &self,
        _texts: &[String],
    ) -> Result<Vec<Option<Vec<f32>>>, CollaboratorError> {
        Err(CollaboratorError::Unconfigured("embedding API key"))
    }
}

fn meta(pmid: &str, title: &str) -> Meta {
    let mut m = Meta::new();
    m.insert("pmid".into(), pmid.into());
    m.insert("title".into(), title.into());
    m
}

fn working_engine() -> HybridEngine {
    HybridEngine::new(
        Arc::new(HashEmbedder::new(DIM)),
        Arc::new(StaticIndex::new()),
        None,
        "papers_test",
    )
}

async fn seed_two_papers(engine: &HybridEngine) {
    engine
        .add_documents(
            vec![
                "CRISPR gene editing reduces symptoms".into(),
                "Unrelated topic about finance".into(),
            ],
            vec![meta("1", "CRISPR study"), meta("2", "Finance notes")],
            None,
        )
        .await
        .expect("add_documents");
}

#[tokio::test]
async fn empty_corpus_is_safe_in_every_mode() {
    let engine = working_engine();
    for mode in [SearchMode::Dense, SearchMode::Sparse, SearchMode::Hybrid] {
        let results = engine.search("anything", 5, mode, 0.7).await;
        assert!(results.is_empty(), "mode {mode} must return [] on an empty corpus");
    }
}

#[tokio::test]
async fn sparse_mode_ranks_matching_chunk_and_excludes_nonmatching() {
    let engine = working_engine();
    seed_two_papers(&engine).await;

    let results = engine.search("CRISPR gene editing", 5, SearchMode::Sparse, 0.7).await;
    assert_eq!(results.len(), 1, "only the matching chunk has a positive score");
    assert_eq!(results[0].metadata.get("pmid"), Some(&"1".to_string()));
    let sparse = results[0].sparse_score.expect("sparse score present");
    assert!(sparse > 0.0);
    assert!(sparse <= 30.0, "display scale is capped at 30");
    assert!(results[0].dense_score.is_none());
    assert!(!results[0].matched_terms.is_empty());
}

#[tokio::test]
async fn dense_mode_returns_bounded_scores() {
    let engine = working_engine();
    seed_two_papers(&engine).await;

    let results = engine.search("CRISPR gene editing", 5, SearchMode::Dense, 0.7).await;
    assert!(!results.is_empty());
    for r in &results {
        let dense = r.dense_score.expect("dense score present");
        assert!((0.0..=1.0).contains(&dense));
        assert!((0.0..=1.0).contains(&r.score));
        assert!(r.sparse_score.is_none());
    }
}

#[tokio::test]
async fn hybrid_scores_are_bounded_and_favor_cross_modal_agreement() {
    let engine = working_engine();
    seed_two_papers(&engine).await;

    let results = engine.search("CRISPR gene editing", 5, SearchMode::Hybrid, 0.7).await;
    assert!(!results.is_empty());
    for r in &results {
        assert!((0.0..=1.0).contains(&r.score), "fused score stays in [0,1]");
        assert!((0.0..=1.0).contains(&r.dense_score.expect("dense component")));
    }
    // The chunk matched by both modalities must lead.
    assert_eq!(results[0].metadata.get("pmid"), Some(&"1".to_string()));
}

#[tokio::test]
async fn ann_failure_falls_back_to_local_cosine_scan() {
    let engine = HybridEngine::new(
        Arc::new(HashEmbedder::new(DIM)),
        Arc::new(DeadIndex),
        None,
        "papers_test",
    );
    seed_two_papers(&engine).await;

    let results = engine.search("CRISPR gene editing reduces symptoms", 5, SearchMode::Dense, 0.7).await;
    assert!(!results.is_empty(), "fallback path serves results from the local cache");
    for r in &results {
        assert!((0.0..=1.0).contains(&r.score));
    }

    let stats = engine.stats().await;
    assert!(!stats.dense_available);
    assert_eq!(stats.corpus_size, 2);
}

#[tokio::test]
async fn dead_embedder_degrades_dense_to_empty_and_hybrid_to_sparse_only() {
    let engine = HybridEngine::new(
        Arc::new(DeadEmbedder),
        Arc::new(StaticIndex::new()),
        None,
        "papers_test",
    );
    seed_two_papers(&engine).await;

    let dense = engine.search("CRISPR gene editing", 5, SearchMode::Dense, 0.7).await;
    assert!(dense.is_empty(), "dense mode returns [] when embedding is unavailable");

    let sparse = engine.search("CRISPR gene editing", 5, SearchMode::Sparse, 0.7).await;
    let hybrid = engine.search("CRISPR gene editing", 5, SearchMode::Hybrid, 0.7).await;

    assert_eq!(hybrid.len(), sparse.len());
    let max_sparse = sparse
        .iter()
        .filter_map(|r| r.sparse_score)
        .fold(0.0f32, f32::max);
    for (h, s) in hybrid.iter().zip(sparse.iter()) {
        assert_eq!(h.id, s.id, "hybrid ordering matches sparse-only ordering");
        assert_eq!(h.dense_score, Some(0.0), "dense component is zero for every chunk");
        let expected = (s.sparse_score.expect("sparse") / max_sparse) * 0.3;
        assert!((h.score - expected).abs() < 1e-3);
    }
}

#[tokio::test]
async fn increasing_dense_weight_never_demotes_the_dense_favorite() {
    // Chunk "a" has a fixed high dense score and a low sparse affinity;
    // chunk "b" is the opposite.
    let texts = vec![
        "meta analysis of unrelated cardiology outcomes".to_string(),
        "CRISPR gene editing reduces symptoms".to_string(),
    ];
    let index = FixedScoreIndex {
        scores: HashMap::from([("a".to_string(), 0.9), ("b".to_string(), 0.1)]),
        texts: HashMap::from([
            ("a".to_string(), texts[0].clone()),
            ("b".to_string(), texts[1].clone()),
        ]),
    };
    let engine = HybridEngine::new(
        Arc::new(HashEmbedder::new(DIM)),
        Arc::new(index),
        None,
        "papers_test",
    );
    engine
        .add_documents(
            texts,
            vec![meta("10", "Cardio"), meta("11", "CRISPR")],
            Some(vec!["a".to_string(), "b".to_string()]),
        )
        .await
        .expect("add_documents");

    let rank_of = |results: &[litdb_core::types::RetrievalResult], id: &str| {
        results.iter().position(|r| r.id == id).expect("id present")
    };

    let low = engine.search("CRISPR gene editing", 5, SearchMode::Hybrid, 0.3).await;
    let high = engine.search("CRISPR gene editing", 5, SearchMode::Hybrid, 0.9).await;

    assert!(rank_of(&high, "a") <= rank_of(&low, "a"));
    assert_eq!(high[0].id, "a", "dense favorite leads at dense_weight 0.9");
    assert_eq!(low[0].id, "b", "sparse favorite leads at dense_weight 0.3");
}

#[tokio::test]
async fn clear_empties_corpus_and_subsequent_searches() {
    let engine = working_engine();
    seed_two_papers(&engine).await;
    engine.clear().await;

    let results = engine.search("anything", 5, SearchMode::Hybrid, 0.7).await;
    assert!(results.is_empty());

    let stats = engine.stats().await;
    assert_eq!(stats.corpus_size, 0);
    assert_eq!(stats.vocabulary_size, 0);
    assert_eq!(stats.ann_points, Some(0));
}

#[tokio::test]
async fn sync_from_index_rehydrates_local_cache() {
    let shared = Arc::new(StaticIndex::new());
    let seeder = HybridEngine::new(
        Arc::new(HashEmbedder::new(DIM)),
        shared.clone(),
        None,
        "papers_test",
    );
    seed_two_papers(&seeder).await;

    // A fresh engine over the same index starts empty and rehydrates.
    let engine = HybridEngine::new(
        Arc::new(HashEmbedder::new(DIM)),
        shared,
        None,
        "papers_test",
    );
    assert!(engine.chunks().await.is_empty());
    engine.sync_from_index().await;
    assert_eq!(engine.chunks().await.len(), 2);

    let results = engine.search("CRISPR gene editing", 5, SearchMode::Sparse, 0.7).await;
    assert_eq!(results.len(), 1, "sparse index was rebuilt from the synced corpus");
}

#[tokio::test]
async fn stats_reflect_embedding_coverage() {
    let engine = HybridEngine::new(
        Arc::new(DeadEmbedder),
        Arc::new(StaticIndex::new()),
        None,
        "papers_test",
    );
    seed_two_papers(&engine).await;

    let stats = engine.stats().await;
    assert_eq!(stats.corpus_size, 2);
    assert_eq!(stats.with_embeddings, 0, "embedding failures leave chunks sparse-only");
    assert!(stats.sparse_built);
    assert!(stats.vocabulary_size > 0);
}
