use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use litdb_core::config::Config;
use litdb_core::ingest::PaperLoader;
use litdb_core::traits::TermSuggester;
use litdb_core::types::SearchMode;
use litdb_dense::QdrantIndex;
use litdb_embed::{default_provider, ChatSuggester};
use litdb_hybrid::engine::DEFAULT_DENSE_WEIGHT;
use litdb_hybrid::{aggregate_by_paper, HybridEngine};

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().collect();
    let prog = args.remove(0);
    if args.is_empty() {
        eprintln!("Usage: {} <ingest|query|stats|papers|clear> [args...]", prog);
        std::process::exit(1);
    }
    let cmd = args.remove(0);
    (cmd, args)
}

async fn build_engine(config: &Config) -> HybridEngine {
    let model_cfg = config.model_api();
    let ann_cfg = config.ann();

    let embedder = default_provider(&model_cfg);
    let index = Arc::new(QdrantIndex::new(&ann_cfg, model_cfg.embed_dim));
    let suggester: Option<Arc<dyn TermSuggester>> = if model_cfg.api_key.is_some() {
        Some(Arc::new(ChatSuggester::new(&model_cfg)))
    } else {
        None
    };

    let engine = HybridEngine::new(embedder, index, suggester, ann_cfg.collection.clone());
    engine.sync_from_index().await;
    engine
}

fn truncate_display(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;
    let (cmd, args) = parse_args();

    match cmd.as_str() {
        "ingest" => {
            let data_dir = args.get(0).map(PathBuf::from).unwrap_or_else(|| {
                let dir: String = config
                    .get("data.papers_dir")
                    .unwrap_or_else(|_| "./data/papers".to_string());
                litdb_core::config::expand_path(dir)
            });
            println!("Ingesting papers from {}", data_dir.display());

            let chunking = config.chunking();
            chunking.validate()?;
            let loader = PaperLoader::new(chunking);
            let papers = loader.read_directory(&data_dir)?;
            if papers.is_empty() {
                println!("Nothing to ingest.");
                return Ok(());
            }

            let pb = ProgressBar::new(papers.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} papers {msg}")
                    .expect("progress template")
                    .progress_chars("#>-"),
            );
            let mut all_texts = Vec::new();
            let mut all_metas = Vec::new();
            for paper in &papers {
                let prepared = loader.prepare(paper);
                all_texts.extend(prepared.texts);
                all_metas.extend(prepared.metadatas);
                pb.inc(1);
            }
            pb.finish_with_message("chunked");

            let engine = build_engine(&config).await;
            let ids = engine.add_documents(all_texts, all_metas, None).await?;
            println!("✅ Ingested {} papers as {} chunks", papers.len(), ids.len());
        }
        "query" => {
            let query_text = args.get(0).cloned().unwrap_or_else(|| {
                eprintln!("Usage: litdb query \"<query>\" [top_k] [mode] [dense_weight]");
                std::process::exit(1)
            });
            let top_k: usize = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(5);
            let mode = match args.get(2) {
                Some(s) => SearchMode::from_str(s)?,
                None => SearchMode::Hybrid,
            };
            let dense_weight: f32 =
                args.get(3).and_then(|s| s.parse().ok()).unwrap_or(DEFAULT_DENSE_WEIGHT);

            let engine = build_engine(&config).await;
            let results = engine.search(&query_text, top_k, mode, dense_weight).await;
            if results.is_empty() {
                println!("No results.");
                return Ok(());
            }

            println!("Mode: {} | {} results", mode, results.len());
            for (i, r) in results.iter().enumerate() {
                let pmid = r.metadata.get("pmid").map(String::as_str).unwrap_or("-");
                let title = r.metadata.get("title").map(String::as_str).unwrap_or("-");
                println!(
                    "{:2}. [{:.4}] pmid={} dense={} sparse={} {}",
                    i + 1,
                    r.score,
                    pmid,
                    r.dense_score.map(|s| format!("{s:.4}")).unwrap_or_else(|| "-".into()),
                    r.sparse_score.map(|s| format!("{s:.2}")).unwrap_or_else(|| "-".into()),
                    title,
                );
                println!("      {}", truncate_display(&r.text, 300));
                if !r.matched_terms.is_empty() {
                    println!("      matched: {}", r.matched_terms.join(", "));
                }
            }

            let papers = aggregate_by_paper(&results);
            if papers.len() > 1 {
                println!("\nBy paper:");
                for p in &papers {
                    println!("  [{:.4}] pmid={} {}", p.score, p.pmid, p.title);
                }
            }
        }
        "stats" => {
            let engine = build_engine(&config).await;
            let stats = engine.stats().await;
            println!("collection:      {}", stats.collection_name);
            println!("corpus size:     {}", stats.corpus_size);
            println!("with embeddings: {}", stats.with_embeddings);
            println!("vocabulary:      {}", stats.vocabulary_size);
            println!("sparse engine:   {} (built: {})", stats.sparse_engine, stats.sparse_built);
            println!("dense engine:    {} (available: {})", stats.dense_engine, stats.dense_available);
            if let Some(points) = stats.ann_points {
                println!("ann points:      {}", points);
            }
        }
        "papers" => {
            let engine = build_engine(&config).await;
            let chunks = engine.chunks().await;
            let papers = litdb_hybrid::papers::papers_in_corpus(&chunks);
            println!("{} papers indexed", papers.len());
            for p in &papers {
                println!("  pmid={} {} [{}]", p.pmid, p.title, p.journal);
            }
        }
        "clear" => {
            let engine = build_engine(&config).await;
            engine.clear().await;
            println!("✅ Corpus cleared");
        }
        _ => {
            eprintln!("Unknown command: {}", cmd);
            std::process::exit(1);
        }
    }
    Ok(())
}
