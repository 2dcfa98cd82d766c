//! Qdrant-backed vector store, driven over its REST API.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{IndexDocument, ScoredNode, VectorStore};
use crate::embeddings::EmbeddingModel;
use crate::error::{KbError, KbResult};

/// Vector store client for a Qdrant instance.
pub struct QdrantStore {
    client: reqwest::Client,
    base_url: String,
}

impl QdrantStore {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/collections/{}", self.base_url, collection)
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    score: f32,
    #[serde(default)]
    payload: serde_json::Value,
}

async fn check(response: reqwest::Response, what: &str) -> KbResult<()> {
    if response.status().is_success() {
        return Ok(());
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(KbError::VectorStore(format!(
        "{} returned {}: {}",
        what, status, body
    )))
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn collection_exists(&self, collection: &str) -> KbResult<bool> {
        let response = self
            .client
            .get(self.collection_url(collection))
            .send()
            .await
            .map_err(|e| KbError::VectorStore(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(true),
            reqwest::StatusCode::NOT_FOUND => Ok(false),
            status => Err(KbError::VectorStore(format!(
                "collection lookup returned {}",
                status
            ))),
        }
    }

    async fn delete_collection(&self, collection: &str) -> KbResult<()> {
        let response = self
            .client
            .delete(self.collection_url(collection))
            .send()
            .await
            .map_err(|e| KbError::VectorStore(e.to_string()))?;

        // Deleting an absent collection is not an error.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        check(response, "delete collection").await
    }

    async fn create_index(
        &self,
        collection: &str,
        documents: &[IndexDocument],
        embedder: &dyn EmbeddingModel,
    ) -> KbResult<()> {
        if documents.is_empty() {
            return Ok(());
        }

        let mut points = Vec::with_capacity(documents.len());
        for doc in documents {
            let vector = embedder.embed(&doc.text).await?;
            points.push(json!({
                "id": doc.id,
                "vector": vector,
                "payload": {
                    "text": doc.text,
                    "metadata": doc.metadata,
                },
            }));
        }

        let dimensions = points[0]["vector"]
            .as_array()
            .map(|v| v.len())
            .unwrap_or_default();

        let response = self
            .client
            .put(self.collection_url(collection))
            .json(&json!({
                "vectors": { "size": dimensions, "distance": "Cosine" },
            }))
            .send()
            .await
            .map_err(|e| KbError::VectorStore(e.to_string()))?;
        check(response, "create collection").await?;

        let response = self
            .client
            .put(format!("{}/points?wait=true", self.collection_url(collection)))
            .json(&json!({ "points": points }))
            .send()
            .await
            .map_err(|e| KbError::VectorStore(e.to_string()))?;
        check(response, "upsert points").await?;

        tracing::info!(
            collection = %collection,
            points = points.len(),
            dimensions,
            "Created vector index"
        );
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        text: &str,
        top_k: usize,
        embedder: &dyn EmbeddingModel,
    ) -> KbResult<Vec<ScoredNode>> {
        let vector = embedder.embed(text).await?;

        let response = self
            .client
            .post(format!("{}/points/search", self.collection_url(collection)))
            .json(&json!({
                "vector": vector,
                "limit": top_k,
                "with_payload": true,
            }))
            .send()
            .await
            .map_err(|e| KbError::VectorStore(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(KbError::VectorStore(format!(
                "search returned {}: {}",
                status, body
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| KbError::VectorStore(e.to_string()))?;

        Ok(parsed
            .result
            .into_iter()
            .map(|hit| ScoredNode {
                text: hit.payload["text"].as_str().unwrap_or_default().to_string(),
                score: hit.score,
                metadata: hit.payload["metadata"].clone(),
            })
            .collect())
    }
}
