//! Text chunking for embedding and retrieval.
//!
//! Pure functions: identical input always yields the identical ordered
//! chunk sequence. Splitting happens on whitespace-delimited word
//! boundaries, never on byte offsets.

use regex::Regex;
use std::sync::OnceLock;

fn citation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[\d+(?:,\s*\d+)*\]").expect("static regex"))
}

fn figure_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\((?:Fig(?:ure)?|Table)\s*\.?\s*\d+[a-zA-Z]?\)").expect("static regex")
    })
}

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https?://\S+").expect("static regex"))
}

/// Clean and normalize paper text before chunking: drop bracketed
/// citation numbers, figure/table references and URLs, then collapse
/// whitespace.
pub fn clean_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let text = citation_re().replace_all(text, "");
    let text = figure_re().replace_all(&text, "");
    let text = url_re().replace_all(&text, "");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split text into overlapping word windows.
///
/// Returns the whole text as one chunk when it has at most `chunk_size`
/// words. Otherwise windows of `chunk_size` words advance by
/// `chunk_size - overlap`; the final chunk is the remainder and is not
/// extended backwards. `overlap` must be smaller than `chunk_size` for the
/// windows to make forward progress, so it is clamped below it.
pub fn chunk_words(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    if text.is_empty() || chunk_size == 0 {
        return Vec::new();
    }
    let overlap = overlap.min(chunk_size - 1);

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }
    if words.len() <= chunk_size {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;
    while start < words.len() {
        let end = (start + chunk_size).min(words.len());
        chunks.push(words[start..end].join(" "));
        start = end - overlap;
        if start >= words.len() - overlap {
            break;
        }
    }
    chunks
}

/// Rough token estimate used for sentence packing (~1.3 tokens per word).
pub fn estimate_tokens(text: &str) -> usize {
    (text.split_whitespace().count() as f32 * 1.3) as usize
}

fn split_sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let bytes = text.as_bytes();
    let mut start = 0usize;
    let mut i = 0usize;
    while i < bytes.len() {
        let c = bytes[i] as char;
        if matches!(c, '.' | '!' | '?') {
            let mut j = i + 1;
            while j < bytes.len() && (bytes[j] as char).is_whitespace() {
                j += 1;
            }
            if j > i + 1 {
                out.push(&text[start..=i]);
                start = j;
                i = j;
                continue;
            }
        }
        i += 1;
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}

/// Split text into chunks along sentence boundaries, packing sentences
/// until the estimated token count would exceed `max_tokens`.
pub fn chunk_sentences(text: &str, max_tokens: usize) -> Vec<String> {
    let text = clean_text(text);
    if text.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_size = 0usize;

    for sentence in split_sentences(&text) {
        let sentence_tokens = estimate_tokens(sentence);
        if current_size + sentence_tokens > max_tokens && !current.is_empty() {
            chunks.push(current.join(" "));
            current.clear();
            current_size = 0;
        }
        current.push(sentence);
        current_size += sentence_tokens;
    }
    if !current.is_empty() {
        chunks.push(current.join(" "));
    }
    chunks
}
