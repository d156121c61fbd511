//! Paper-level views over chunk results: collapse chunk hits to one row
//! per `pmid` and list the distinct papers currently indexed. The core
//! treats metadata as opaque; only these display helpers look at keys.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use litdb_core::types::{Chunk, RetrievalResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperHit {
    pub pmid: String,
    pub title: String,
    pub excerpt: String,
    pub score: f32,
    pub journal: String,
    pub authors: Vec<String>,
    pub keywords: Vec<String>,
}

fn split_csv(value: Option<&String>) -> Vec<String> {
    value
        .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}

/// Aggregate chunk-level results by paper, keeping the best-scoring chunk
/// for each pmid. Results without a pmid are dropped. Output is ordered by
/// score descending, ties keeping first-seen order.
pub fn aggregate_by_paper(results: &[RetrievalResult]) -> Vec<PaperHit> {
    let mut order: Vec<&str> = Vec::new();
    let mut best: HashMap<&str, PaperHit> = HashMap::new();

    for result in results {
        let Some(pmid) = result.metadata.get("pmid").filter(|p| !p.is_empty()) else {
            continue;
        };
        match best.get_mut(pmid.as_str()) {
            Some(existing) => {
                if result.score > existing.score {
                    existing.score = result.score;
                }
            }
            None => {
                order.push(pmid.as_str());
                best.insert(
                    pmid.as_str(),
                    PaperHit {
                        pmid: pmid.clone(),
                        title: result.metadata.get("title").cloned().unwrap_or_default(),
                        excerpt: result.text.clone(),
                        score: result.score,
                        journal: result.metadata.get("journal").cloned().unwrap_or_default(),
                        authors: split_csv(result.metadata.get("authors")),
                        keywords: split_csv(result.metadata.get("keywords")),
                    },
                );
            }
        }
    }

    let mut papers: Vec<PaperHit> =
        order.into_iter().filter_map(|pmid| best.remove(pmid)).collect();
    papers.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    papers
}

/// Distinct papers currently in the corpus, first chunk wins.
pub fn papers_in_corpus(chunks: &[Chunk]) -> Vec<PaperHit> {
    let mut seen: Vec<String> = Vec::new();
    let mut papers = Vec::new();
    for chunk in chunks {
        let Some(pmid) = chunk.metadata.get("pmid").filter(|p| !p.is_empty()) else {
            continue;
        };
        if seen.contains(pmid) {
            continue;
        }
        seen.push(pmid.clone());
        papers.push(PaperHit {
            pmid: pmid.clone(),
            title: chunk.metadata.get("title").cloned().unwrap_or_default(),
            excerpt: chunk.text.chars().take(500).collect(),
            score: 0.0,
            journal: chunk.metadata.get("journal").cloned().unwrap_or_default(),
            authors: split_csv(chunk.metadata.get("authors")),
            keywords: split_csv(chunk.metadata.get("keywords")),
        });
    }
    papers
}
