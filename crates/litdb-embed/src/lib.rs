#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! Model collaborators: embedding providers (HTTP + deterministic hashed
//! fallback) and the term-suggestion client used for query expansion.

pub mod hash;
pub mod http;
pub mod suggest;

use std::sync::Arc;

use litdb_core::config::ModelApiConfig;
use litdb_core::traits::EmbeddingProvider;

pub use hash::HashEmbedder;
pub use http::HttpEmbedder;
pub use suggest::ChatSuggester;

/// Pick the embedding provider: the hashed offline embedder when
/// `APP_USE_FAKE_EMBEDDINGS` is set, otherwise the HTTP provider (which
/// reports itself unconfigured when no API key is present, so dense
/// search degrades instead of failing).
pub fn default_provider(config: &ModelApiConfig) -> Arc<dyn EmbeddingProvider> {
    let use_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if use_fake {
        tracing::info!("using hashed offline embedder");
        return Arc::new(HashEmbedder::new(config.embed_dim));
    }
    Arc::new(HttpEmbedder::new(config))
}
