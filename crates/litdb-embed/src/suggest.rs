//! Term-suggestion collaborator: asks a chat-completion model for related
//! biomedical terms, returned as one comma-separated string. The query
//! expander parses and weights the result.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

use litdb_core::config::ModelApiConfig;
use litdb_core::error::CollaboratorError;
use litdb_core::traits::TermSuggester;

const EXPANSION_PROMPT: &str = r#"Expand this biomedical search query with closely related scientific terms.
IMPORTANT: Focus on synonyms and directly related terms. Do NOT include unrelated concepts.

Query: "{query}"

Rules:
1. Include the EXACT original query terms first
2. Add only synonyms and closely related terms
3. Do NOT add tangentially related concepts
4. Maximum 15 terms total

Example:
Query: "CRISPR gene editing"
Output: CRISPR, gene, editing, Cas9, genome, nuclease, guide RNA, genetic, modification, CRISPR-Cas9, gene therapy

Your output (terms only, comma-separated):"#;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<serde_json::Value>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

pub struct ChatSuggester {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl ChatSuggester {
    pub fn new(config: &ModelApiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: format!("{}/chat/completions", config.endpoint.trim_end_matches('/')),
            model: config.chat_model.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl TermSuggester for ChatSuggester {
    async fn suggest(&self, query: &str) -> Result<String, CollaboratorError> {
        let Some(api_key) = &self.api_key else {
            return Err(CollaboratorError::Unconfigured("term-suggestion API key"));
        };

        let prompt = EXPANSION_PROMPT.replace("{query}", query);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![json!({"role": "user", "content": prompt})],
            temperature: 0.2,
            max_tokens: 100,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| CollaboratorError::transport(&e, e.is_timeout()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Http { status: status.as_u16(), body });
        }

        let parsed = response
            .json::<ChatResponse>()
            .await
            .map_err(|e| CollaboratorError::BadResponse(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .ok_or_else(|| CollaboratorError::BadResponse("no completion choices".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_api_key_reports_unconfigured() {
        let config = ModelApiConfig { api_key: None, ..ModelApiConfig::default() };
        let suggester = ChatSuggester::new(&config);
        let err = suggester.suggest("CRISPR").await.unwrap_err();
        assert!(matches!(err, CollaboratorError::Unconfigured(_)));
    }
}
