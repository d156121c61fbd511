//! Paper ingestion: walk a data directory of JSON paper records and turn
//! each paper into chunk texts plus pass-through metadata, ready for the
//! retrieval engine's `add_documents`.

use anyhow::Result;
use chrono::Utc;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::chunk::{chunk_words, clean_text};
use crate::config::ChunkingConfig;
use crate::types::Meta;

/// One paper as found in the ingest directory.
#[derive(Debug, Clone, Deserialize)]
pub struct PaperRecord {
    pub pmid: String,
    pub title: String,
    #[serde(rename = "abstract", default)]
    pub abstract_text: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub journal: String,
    #[serde(default)]
    pub publication_date: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Chunk texts plus one metadata map per chunk.
pub struct PreparedPaper {
    pub texts: Vec<String>,
    pub metadatas: Vec<Meta>,
}

#[derive(Default)]
pub struct PaperLoader {
    chunking: ChunkingConfig,
}

impl PaperLoader {
    pub fn new(chunking: ChunkingConfig) -> Self {
        Self { chunking }
    }

    /// Read every `.json` file under `data_dir`. A file may hold a single
    /// paper object or an array of papers.
    pub fn read_directory(&self, data_dir: &Path) -> Result<Vec<PaperRecord>> {
        let files = list_json_files(data_dir);
        if files.is_empty() {
            info!(dir = %data_dir.display(), "no .json paper files found");
            return Ok(vec![]);
        }
        let mut papers = Vec::new();
        for path in &files {
            let raw = fs::read_to_string(path)?;
            match serde_json::from_str::<Vec<PaperRecord>>(&raw) {
                Ok(batch) => papers.extend(batch),
                Err(_) => papers.push(serde_json::from_str::<PaperRecord>(&raw)?),
            }
            debug!(file = %path.display(), total = papers.len(), "parsed paper file");
        }
        info!(files = files.len(), papers = papers.len(), "ingest directory read");
        Ok(papers)
    }

    /// Turn one paper into chunk texts and per-chunk metadata. Title and
    /// abstract are combined, cleaned and split into overlapping word
    /// windows; metadata mirrors what the search results echo back.
    pub fn prepare(&self, paper: &PaperRecord) -> PreparedPaper {
        let full_text = if paper.abstract_text.is_empty() {
            paper.title.clone()
        } else {
            format!("{}. {}", paper.title, paper.abstract_text)
        };
        let cleaned = clean_text(&full_text);
        let chunks = chunk_words(&cleaned, self.chunking.chunk_size, self.chunking.chunk_overlap);

        let indexed_at = Utc::now().to_rfc3339();
        let mut texts = Vec::with_capacity(chunks.len());
        let mut metadatas = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.into_iter().enumerate() {
            let mut meta = Meta::new();
            meta.insert("pmid".into(), paper.pmid.clone());
            meta.insert("title".into(), paper.title.clone());
            meta.insert("journal".into(), paper.journal.clone());
            meta.insert(
                "publication_date".into(),
                paper.publication_date.clone().unwrap_or_default(),
            );
            meta.insert("section".into(), "abstract".into());
            meta.insert("chunk_index".into(), i.to_string());
            meta.insert(
                "authors".into(),
                paper.authors.iter().take(3).cloned().collect::<Vec<_>>().join(", "),
            );
            meta.insert(
                "keywords".into(),
                paper.keywords.iter().take(5).cloned().collect::<Vec<_>>().join(", "),
            );
            meta.insert("indexed_at".into(), indexed_at.clone());
            texts.push(chunk);
            metadatas.push(meta);
        }
        PreparedPaper { texts, metadatas }
    }
}

fn list_json_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn reads_single_object_and_array_files() {
        let tmp = TempDir::new().expect("tempdir");
        fs::write(
            tmp.path().join("one.json"),
            r#"{"pmid":"1","title":"Alpha","abstract":"CRISPR editing."}"#,
        )
        .expect("write");
        fs::write(
            tmp.path().join("two.json"),
            r#"[{"pmid":"2","title":"Beta"},{"pmid":"3","title":"Gamma","abstract":"x"}]"#,
        )
        .expect("write");

        let loader = PaperLoader::default();
        let papers = loader.read_directory(tmp.path()).expect("read");
        assert_eq!(papers.len(), 3);
        assert_eq!(papers[0].pmid, "1");
        assert!(papers[1].abstract_text.is_empty());
    }

    #[test]
    fn prepare_builds_one_meta_per_chunk() {
        let loader = PaperLoader::default();
        let paper = PaperRecord {
            pmid: "42".into(),
            title: "Stem cell therapy".into(),
            abstract_text: "A short abstract.".into(),
            authors: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            journal: "Cell".into(),
            publication_date: Some("2024-01-01".into()),
            keywords: vec!["stem".into()],
        };
        let prepared = loader.prepare(&paper);
        assert_eq!(prepared.texts.len(), 1);
        assert_eq!(prepared.metadatas.len(), 1);
        let meta = &prepared.metadatas[0];
        assert_eq!(meta.get("pmid"), Some(&"42".to_string()));
        assert_eq!(meta.get("authors"), Some(&"A, B, C".to_string()));
        assert_eq!(meta.get("section"), Some(&"abstract".to_string()));
    }
}
