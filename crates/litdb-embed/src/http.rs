//! HTTP embedding provider for OpenAI-compatible `/embeddings` endpoints.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use litdb_core::config::ModelApiConfig;
use litdb_core::error::CollaboratorError;
use litdb_core::traits::EmbeddingProvider;

/// Inputs longer than this are truncated before the request, matching the
/// embedding model's context budget.
const MAX_INPUT_CHARS: usize = 8000;

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    index: usize,
    embedding: Vec<f32>,
}

pub struct HttpEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    dim: usize,
}

impl HttpEmbedder {
    pub fn new(config: &ModelApiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: format!("{}/embeddings", config.endpoint.trim_end_matches('/')),
            model: config.embed_model.clone(),
            api_key: config.api_key.clone(),
            dim: config.embed_dim,
        }
    }

    async fn request(&self, inputs: Vec<String>) -> Result<EmbedResponse, CollaboratorError> {
        let Some(api_key) = &self.api_key else {
            return Err(CollaboratorError::Unconfigured("embedding API key"));
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&EmbedRequest { model: &self.model, input: inputs })
            .send()
            .await
            .map_err(|e| CollaboratorError::transport(&e, e.is_timeout()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Http { status: status.as_u16(), body });
        }
        response
            .json::<EmbedResponse>()
            .await
            .map_err(|e| CollaboratorError::BadResponse(e.to_string()))
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect()
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, CollaboratorError> {
        let response = self.request(vec![truncate_chars(text, MAX_INPUT_CHARS)]).await?;
        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| CollaboratorError::BadResponse("empty embedding data".into()))
    }

    async fn embed_batch(
        &self,
        texts: &[String],
    ) -> Result<Vec<Option<Vec<f32>>>, CollaboratorError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let inputs: Vec<String> =
            texts.iter().map(|t| truncate_chars(t, MAX_INPUT_CHARS)).collect();
        let response = self.request(inputs).await?;

        // Order-preserving: slot embeddings by the response index so one
        // missing item shows up as None rather than shifting the rest.
        let mut out: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        for item in response.data {
            if let Some(slot) = out.get_mut(item.index) {
                *slot = Some(item.embedding);
            }
        }
        debug!(requested = texts.len(), "embedding batch completed");
        Ok(out)
    }
}
