//! Self-built sparse lexical index: document-frequency statistics over the
//! corpus plus BM25 scoring of weighted query terms.
//!
//! The index is a projection of the corpus store, never the source of
//! truth: `fit` is always a full rebuild over every current chunk, and
//! callers re-fit after every corpus mutation before the next search.

use std::collections::{HashMap, HashSet};

use litdb_core::types::WeightedTerm;

use crate::tokenize::tokenize;

const DEFAULT_K1: f32 = 1.5;
const DEFAULT_B: f32 = 0.75;

/// Boost multiplier for an exact phrase match of a multi-word query term.
const PHRASE_BOOST: f32 = 2.0;

#[derive(Debug)]
pub struct BmIndex {
    k1: f32,
    b: f32,
    doc_lens: Vec<usize>,
    doc_freqs: HashMap<String, usize>,
    idf: HashMap<String, f32>,
    avg_doc_len: f32,
    n_docs: usize,
    fitted: bool,
}

impl Default for BmIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl BmIndex {
    pub fn new() -> Self {
        Self {
            k1: DEFAULT_K1,
            b: DEFAULT_B,
            doc_lens: Vec::new(),
            doc_freqs: HashMap::new(),
            idf: HashMap::new(),
            avg_doc_len: 0.0,
            n_docs: 0,
            fitted: false,
        }
    }

    /// Full, non-incremental rebuild over the current corpus snapshot.
    pub fn fit(&mut self, documents: &[String]) {
        self.n_docs = documents.len();
        self.doc_lens = Vec::with_capacity(documents.len());
        self.doc_freqs = HashMap::new();
        self.idf = HashMap::new();

        for doc in documents {
            let tokens = tokenize(doc);
            self.doc_lens.push(tokens.len());

            let unique: HashSet<&String> = tokens.iter().collect();
            for token in unique {
                *self.doc_freqs.entry(token.clone()).or_insert(0) += 1;
            }
        }

        self.avg_doc_len = if self.n_docs > 0 {
            self.doc_lens.iter().sum::<usize>() as f32 / self.n_docs as f32
        } else {
            0.0
        };

        let n = self.n_docs as f32;
        for (term, df) in &self.doc_freqs {
            let df = *df as f32;
            self.idf.insert(term.clone(), ((n - df + 0.5) / (df + 0.5) + 1.0).ln());
        }
        self.fitted = true;
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    pub fn vocabulary_size(&self) -> usize {
        self.idf.len()
    }

    /// Score one document against a weighted query-term list.
    ///
    /// Phrase terms contribute `weight * 2.0` on an exact lowercased
    /// substring match and nothing otherwise. Single-token terms
    /// contribute weighted BM25, or zero when out of vocabulary or absent
    /// from the document. Returns the total plus per-term contributions in
    /// query-term order.
    pub fn score(
        &self,
        query_terms: &[WeightedTerm],
        doc_idx: usize,
        doc_text: &str,
    ) -> (f32, Vec<(String, f32)>) {
        debug_assert!(self.fitted, "score() before fit()");

        let doc_tokens = tokenize(doc_text);
        let doc_len = self.doc_lens.get(doc_idx).copied().unwrap_or(doc_tokens.len());
        let mut term_freqs: HashMap<&str, usize> = HashMap::new();
        for t in &doc_tokens {
            *term_freqs.entry(t.as_str()).or_insert(0) += 1;
        }

        let mut score = 0.0f32;
        let mut term_scores: Vec<(String, f32)> = Vec::new();

        for wt in query_terms {
            if wt.is_phrase() {
                // No partial credit: the exact phrase must appear.
                if doc_text.to_lowercase().contains(&wt.term) {
                    let phrase_score = wt.weight * PHRASE_BOOST;
                    score += phrase_score;
                    term_scores.push((wt.term.clone(), phrase_score));
                }
                continue;
            }

            let Some(idf) = self.idf.get(&wt.term) else {
                continue;
            };
            let tf = term_freqs.get(wt.term.as_str()).copied().unwrap_or(0) as f32;
            if tf == 0.0 {
                continue;
            }

            let numerator = tf * (self.k1 + 1.0);
            let denominator = tf
                + self.k1
                    * (1.0 - self.b
                        + self.b
                            * if self.avg_doc_len > 0.0 {
                                doc_len as f32 / self.avg_doc_len
                            } else {
                                0.0
                            });
            let term_score = if denominator > 0.0 {
                idf * (numerator / denominator) * wt.weight
            } else {
                0.0
            };

            score += term_score;
            term_scores.push((wt.term.clone(), term_score));
        }

        (score, term_scores)
    }
}
