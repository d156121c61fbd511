//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env
//! vars, plus typed accessors for the sections the retrieval stack needs.
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative
//! paths against a known base directory.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Word-window chunking parameters for paper ingestion.
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 500, chunk_overlap: 100 }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be > 0".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Connection settings for the external vector index.
#[derive(Debug, Clone, Deserialize)]
pub struct AnnConfig {
    pub url: String,
    pub collection: String,
    pub timeout_secs: u64,
}

impl Default for AnnConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6333".to_string(),
            collection: "biomedical_papers".to_string(),
            timeout_secs: 5,
        }
    }
}

/// Settings for the OpenAI-compatible model collaborators (embeddings and
/// term suggestion). The API key is never read from config files, only
/// from the environment.
#[derive(Debug, Clone)]
pub struct ModelApiConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub embed_model: String,
    pub embed_dim: usize,
    pub chat_model: String,
    pub timeout_secs: u64,
}

impl Default for ModelApiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            embed_model: "text-embedding-ada-002".to_string(),
            embed_dim: 1536,
            chat_model: "gpt-4o-mini".to_string(),
            timeout_secs: 15,
        }
    }
}

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment })
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    pub fn get_or<T>(&self, key: &str, default: T) -> T
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment.extract_inner(key).unwrap_or(default)
    }

    pub fn chunking(&self) -> ChunkingConfig {
        let defaults = ChunkingConfig::default();
        ChunkingConfig {
            chunk_size: self.get_or("retrieval.chunk_size", defaults.chunk_size),
            chunk_overlap: self.get_or("retrieval.chunk_overlap", defaults.chunk_overlap),
        }
    }

    pub fn ann(&self) -> AnnConfig {
        let defaults = AnnConfig::default();
        AnnConfig {
            url: self.get_or("qdrant.url", defaults.url),
            collection: self.get_or("qdrant.collection", defaults.collection),
            timeout_secs: self.get_or("qdrant.timeout_secs", defaults.timeout_secs),
        }
    }

    pub fn model_api(&self) -> ModelApiConfig {
        let defaults = ModelApiConfig::default();
        ModelApiConfig {
            endpoint: self.get_or("openai.endpoint", defaults.endpoint),
            api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            embed_model: self.get_or("openai.embed_model", defaults.embed_model),
            embed_dim: self.get_or("openai.embed_dim", defaults.embed_dim),
            chat_model: self.get_or("openai.chat_model", defaults.chat_model),
            timeout_secs: self.get_or("openai.timeout_secs", defaults.timeout_secs),
        }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after
/// expansion. If `p` is absolute, it's returned as-is; otherwise
/// `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() {
        p
    } else {
        base.join(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunking_rejects_overlap_not_smaller_than_size() {
        let bad = ChunkingConfig { chunk_size: 100, chunk_overlap: 100 };
        assert!(bad.validate().is_err());
        let good = ChunkingConfig { chunk_size: 100, chunk_overlap: 20 };
        assert!(good.validate().is_ok());
    }

    #[test]
    fn resolve_with_base_keeps_absolute_paths() {
        let base = Path::new("/data");
        assert_eq!(resolve_with_base(base, "/tmp/x"), PathBuf::from("/tmp/x"));
        assert_eq!(resolve_with_base(base, "papers"), PathBuf::from("/data/papers"));
    }
}
