//! Vector store contract.
//!
//! A collection is the store's name for one indexed corpus. The core never
//! holds an index in memory; collections are (re)opened on every call so
//! replicas stay interchangeable.

mod qdrant;

pub use qdrant::QdrantStore;

use async_trait::async_trait;

use crate::embeddings::EmbeddingModel;
use crate::error::KbResult;

/// An index-ready document: text plus stable id plus metadata.
#[derive(Debug, Clone)]
pub struct IndexDocument {
    pub id: String,
    pub text: String,
    pub metadata: serde_json::Value,
}

/// One scored node returned from a collection query.
#[derive(Debug, Clone)]
pub struct ScoredNode {
    pub text: String,
    pub score: f32,
    pub metadata: serde_json::Value,
}

/// Contract consumed by the index builder and the retriever.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn collection_exists(&self, collection: &str) -> KbResult<bool>;

    async fn delete_collection(&self, collection: &str) -> KbResult<()>;

    /// Create the collection and insert embeddings for every document.
    async fn create_index(
        &self,
        collection: &str,
        documents: &[IndexDocument],
        embedder: &dyn EmbeddingModel,
    ) -> KbResult<()>;

    /// Query a collection, returning up to `top_k` scored nodes.
    async fn query(
        &self,
        collection: &str,
        text: &str,
        top_k: usize,
        embedder: &dyn EmbeddingModel,
    ) -> KbResult<Vec<ScoredNode>>;
}
