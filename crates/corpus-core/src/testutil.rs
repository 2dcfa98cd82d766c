//! Test doubles for the external collaborators.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::embeddings::EmbeddingModel;
use crate::error::KbResult;
use crate::llm::{Completion, Delta, DeltaStream, Llm};
use crate::vector::{IndexDocument, ScoredNode, VectorStore};

/// Returns a constant vector for any input.
pub struct StubEmbedding;

#[async_trait]
impl EmbeddingModel for StubEmbedding {
    async fn embed(&self, _text: &str) -> KbResult<Vec<f32>> {
        Ok(vec![0.1, 0.2, 0.3, 0.4])
    }

    fn model_id(&self) -> &str {
        "stub-embed"
    }
}

/// In-memory vector store scoring by substring containment: documents
/// containing the query text score 1.0, everything else 0.1.
#[derive(Default)]
pub struct MockVectorStore {
    collections: RwLock<HashMap<String, Vec<IndexDocument>>>,
}

impl MockVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn has_collection(&self, collection: &str) -> bool {
        self.collections.read().await.contains_key(collection)
    }
}

#[async_trait]
impl VectorStore for MockVectorStore {
    async fn collection_exists(&self, collection: &str) -> KbResult<bool> {
        Ok(self.collections.read().await.contains_key(collection))
    }

    async fn delete_collection(&self, collection: &str) -> KbResult<()> {
        self.collections.write().await.remove(collection);
        Ok(())
    }

    async fn create_index(
        &self,
        collection: &str,
        documents: &[IndexDocument],
        embedder: &dyn EmbeddingModel,
    ) -> KbResult<()> {
        // Exercise the embedding contract the way a real store would.
        for doc in documents {
            embedder.embed(&doc.text).await?;
        }
        self.collections
            .write()
            .await
            .insert(collection.to_string(), documents.to_vec());
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        text: &str,
        top_k: usize,
        _embedder: &dyn EmbeddingModel,
    ) -> KbResult<Vec<ScoredNode>> {
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut nodes: Vec<ScoredNode> = docs
            .iter()
            .map(|doc| ScoredNode {
                text: doc.text.clone(),
                score: if doc.text.contains(text) { 1.0 } else { 0.1 },
                metadata: doc.metadata.clone(),
            })
            .collect();
        nodes.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        nodes.truncate(top_k);
        Ok(nodes)
    }
}

/// LLM that replies with a fixed text and records every prompt it saw.
pub struct ScriptedLlm {
    text: String,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Llm for ScriptedLlm {
    async fn complete(&self, prompt: &str) -> KbResult<Completion> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(Completion {
            text: self.text.clone(),
        })
    }

    async fn stream_complete(&self, prompt: &str) -> KbResult<DeltaStream> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let deltas: Vec<KbResult<Delta>> = self
            .text
            .split_inclusive(' ')
            .map(|token| Ok(Delta::Text(token.to_string())))
            .collect();
        Ok(Box::pin(futures::stream::iter(deltas)))
    }

    fn model_id(&self) -> &str {
        "scripted"
    }
}
