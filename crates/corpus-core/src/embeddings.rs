//! Embedding model contract and the Ollama-backed implementation.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{KbError, KbResult};

/// Contract for the embedding model: text in, vector out. Model name and
/// base URL are supplied via configuration.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    async fn embed(&self, text: &str) -> KbResult<Vec<f32>>;

    /// The model identifier, for logging.
    fn model_id(&self) -> &str;
}

/// Embeddings served by an Ollama-compatible endpoint.
pub struct OllamaEmbedding {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaEmbedding {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingModel for OllamaEmbedding {
    async fn embed(&self, text: &str) -> KbResult<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "model": self.model,
                "prompt": text,
            }))
            .send()
            .await
            .map_err(|e| KbError::Embedding(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(KbError::Embedding(format!(
                "embedding endpoint returned {}: {}",
                status, body
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| KbError::Embedding(e.to_string()))?;
        Ok(parsed.embedding)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
