//! Query expansion: the raw query tokens always lead with the highest
//! weight; a term-suggestion collaborator may append related terms with
//! decaying weights. Collaborator failure degrades to the original terms
//! and is never surfaced to the caller.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use litdb_core::traits::TermSuggester;
use litdb_core::types::WeightedTerm;

use crate::tokenize::tokenize;

/// Hard cap on the expanded term list.
const MAX_TERMS: usize = 20;
/// Weight assigned to every original-query token.
const ORIGINAL_WEIGHT: f32 = 2.0;
/// Decay rate for expansion terms: the i-th added term gets 1/(1 + 0.15*i).
const EXPANSION_DECAY: f32 = 0.15;

const SUGGEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct QueryExpander {
    suggester: Option<Arc<dyn TermSuggester>>,
}

impl QueryExpander {
    pub fn new(suggester: Option<Arc<dyn TermSuggester>>) -> Self {
        Self { suggester }
    }

    /// Expand a raw query into an ordered weighted term list of at most
    /// [`MAX_TERMS`] entries. Duplicates are suppressed first-wins, so
    /// original terms can never be displaced by expansion terms.
    pub async fn expand(&self, query: &str) -> Vec<WeightedTerm> {
        let mut terms: Vec<WeightedTerm> = Vec::new();
        for token in tokenize(query) {
            if !terms.iter().any(|t| t.term == token) {
                terms.push(WeightedTerm::new(token, ORIGINAL_WEIGHT));
            }
        }

        let Some(suggester) = &self.suggester else {
            return terms;
        };

        let raw = match tokio::time::timeout(SUGGEST_TIMEOUT, suggester.suggest(query)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                warn!(error = %e, "term suggestion failed, using original terms only");
                return terms;
            }
            Err(_) => {
                warn!("term suggestion timed out, using original terms only");
                return terms;
            }
        };

        let mut added = 0usize;
        for candidate in parse_suggestions(&raw) {
            if terms.len() >= MAX_TERMS {
                break;
            }
            if terms.iter().any(|t| t.term == candidate) {
                continue;
            }
            let weight = 1.0 / (1.0 + EXPANSION_DECAY * added as f32);
            terms.push(WeightedTerm::new(candidate, weight));
            added += 1;
        }
        debug!(total = terms.len(), expanded = added, "query expanded");

        terms.truncate(MAX_TERMS);
        terms
    }
}

/// Parse a comma-separated suggestion string: trim whitespace and quotes,
/// lowercase, drop empties. Multi-word entries survive as phrase terms.
fn parse_suggestions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|t| t.trim().trim_matches(|c| c == '"' || c == '\'').trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}
