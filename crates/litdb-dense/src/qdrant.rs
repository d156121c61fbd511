//! Qdrant REST client implementing the [`VectorIndex`] collaborator
//! contract: cosine collection management, point upsert, top-k search,
//! full scroll for cache rehydration, and delete+recreate for bulk clear.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, info};

use litdb_core::config::AnnConfig;
use litdb_core::error::CollaboratorError;
use litdb_core::traits::{IndexInfo, ScoredPoint, StoredPoint, VectorIndex};
use litdb_core::types::Meta;

const SCROLL_PAGE: usize = 256;

pub struct QdrantIndex {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    dim: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    result: Vec<RawScoredPoint>,
}

#[derive(Deserialize)]
struct RawScoredPoint {
    id: Value,
    score: f32,
    #[serde(default)]
    payload: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
struct ScrollResponse {
    result: ScrollResult,
}

#[derive(Deserialize)]
struct ScrollResult {
    points: Vec<RawStoredPoint>,
    #[serde(default)]
    next_page_offset: Option<Value>,
}

#[derive(Deserialize)]
struct RawStoredPoint {
    id: Value,
    #[serde(default)]
    vector: Option<Vec<f32>>,
    #[serde(default)]
    payload: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
struct CollectionResponse {
    result: CollectionResult,
}

#[derive(Deserialize)]
struct CollectionResult {
    #[serde(default)]
    points_count: Option<usize>,
    #[serde(default)]
    status: Option<String>,
}

impl QdrantIndex {
    pub fn new(config: &AnnConfig, dim: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
            dim,
        }
    }

    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}/collections/{}{}", self.base_url, self.collection, suffix)
    }

    async fn post_json(&self, url: &str, body: Value) -> Result<Value, CollaboratorError> {
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CollaboratorError::transport(&e, e.is_timeout()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Http { status: status.as_u16(), body });
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| CollaboratorError::BadResponse(e.to_string()))
    }

    async fn create_collection(&self) -> Result<(), CollaboratorError> {
        let body = json!({ "vectors": { "size": self.dim, "distance": "Cosine" } });
        let response = self
            .client
            .put(self.url(""))
            .json(&body)
            .send()
            .await
            .map_err(|e| CollaboratorError::transport(&e, e.is_timeout()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Http { status: status.as_u16(), body });
        }
        info!(collection = %self.collection, "created vector collection");
        Ok(())
    }
}

fn id_to_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn payload_to_parts(payload: Option<Map<String, Value>>) -> (String, Meta) {
    let mut text = String::new();
    let mut meta = Meta::new();
    if let Some(payload) = payload {
        for (key, value) in payload {
            let rendered = match &value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            if key == "text" {
                text = rendered;
            } else {
                meta.insert(key, rendered);
            }
        }
    }
    (text, meta)
}

fn meta_to_payload(text: &str, meta: &Meta) -> Value {
    let mut payload = Map::new();
    payload.insert("text".to_string(), Value::String(text.to_string()));
    for (k, v) in meta {
        payload.insert(k.clone(), Value::String(v.clone()));
    }
    Value::Object(payload)
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn ensure_ready(&self) -> Result<(), CollaboratorError> {
        let response = self
            .client
            .get(self.url(""))
            .send()
            .await
            .map_err(|e| CollaboratorError::transport(&e, e.is_timeout()))?;
        if response.status().is_success() {
            return Ok(());
        }
        if response.status().as_u16() == 404 {
            return self.create_collection().await;
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(CollaboratorError::Http { status, body })
    }

    async fn upsert_batch(&self, points: &[StoredPoint]) -> Result<(), CollaboratorError> {
        if points.is_empty() {
            return Ok(());
        }
        let body = json!({
            "points": points
                .iter()
                .map(|p| json!({
                    "id": p.id,
                    "vector": p.vector,
                    "payload": meta_to_payload(&p.text, &p.metadata),
                }))
                .collect::<Vec<_>>()
        });
        let url = format!("{}?wait=true", self.url("/points"));
        let response = self
            .client
            .put(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CollaboratorError::transport(&e, e.is_timeout()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Http { status: status.as_u16(), body });
        }
        debug!(count = points.len(), "upserted points");
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredPoint>, CollaboratorError> {
        let body = json!({ "vector": vector, "limit": top_k, "with_payload": true });
        let raw = self.post_json(&self.url("/points/search"), body).await?;
        let parsed: SearchResponse = serde_json::from_value(raw)
            .map_err(|e| CollaboratorError::BadResponse(e.to_string()))?;
        Ok(parsed
            .result
            .into_iter()
            .map(|p| {
                let id = id_to_string(&p.id);
                let (text, metadata) = payload_to_parts(p.payload);
                ScoredPoint { id, score: p.score, text, metadata }
            })
            .collect())
    }

    async fn scroll_all(&self) -> Result<Vec<StoredPoint>, CollaboratorError> {
        let mut points = Vec::new();
        let mut offset: Option<Value> = None;
        loop {
            let mut body = json!({
                "limit": SCROLL_PAGE,
                "with_payload": true,
                "with_vector": true,
            });
            if let (Some(obj), Some(off)) = (body.as_object_mut(), offset.take()) {
                obj.insert("offset".to_string(), off);
            }
            let raw = self.post_json(&self.url("/points/scroll"), body).await?;
            let parsed: ScrollResponse = serde_json::from_value(raw)
                .map_err(|e| CollaboratorError::BadResponse(e.to_string()))?;
            for p in parsed.result.points {
                let id = id_to_string(&p.id);
                let (text, metadata) = payload_to_parts(p.payload);
                points.push(StoredPoint {
                    id,
                    vector: p.vector.unwrap_or_default(),
                    text,
                    metadata,
                });
            }
            match parsed.result.next_page_offset {
                Some(next) if !next.is_null() => offset = Some(next),
                _ => break,
            }
        }
        debug!(count = points.len(), "scrolled collection");
        Ok(points)
    }

    async fn recreate(&self) -> Result<(), CollaboratorError> {
        let response = self
            .client
            .delete(self.url(""))
            .send()
            .await
            .map_err(|e| CollaboratorError::transport(&e, e.is_timeout()))?;
        // 404 just means there was nothing to delete.
        if !response.status().is_success() && response.status().as_u16() != 404 {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Http { status, body });
        }
        self.create_collection().await
    }

    async fn info(&self) -> Result<IndexInfo, CollaboratorError> {
        let response = self
            .client
            .get(self.url(""))
            .send()
            .await
            .map_err(|e| CollaboratorError::transport(&e, e.is_timeout()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::Http { status: status.as_u16(), body });
        }
        let parsed = response
            .json::<CollectionResponse>()
            .await
            .map_err(|e| CollaboratorError::BadResponse(e.to_string()))?;
        Ok(IndexInfo {
            points_count: parsed.result.points_count.unwrap_or(0),
            status: parsed.result.status.unwrap_or_else(|| "unknown".to_string()),
        })
    }
}
