//! Biomedical-aware tokenization for the lexical index.

/// Lowercase, strip punctuation except hyphens (compound terms like
/// "CRISPR-Cas9" survive as one token), split on whitespace and drop
/// one-character tokens. Deterministic and locale-independent.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let cleaned: String = lowered
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    cleaned
        .split_whitespace()
        .filter(|t| t.chars().count() > 1)
        .map(|t| t.to_string())
        .collect()
}
