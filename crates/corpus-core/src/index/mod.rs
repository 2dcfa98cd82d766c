//! Index builder: delete-and-rebuild of one KB's vector-store collection.
//!
//! The builder holds no in-memory index. Index-ready documents are
//! reconstructed from the persisted docs, so a rebuild never re-reads the
//! source.

use std::sync::Arc;

use crate::embeddings::EmbeddingModel;
use crate::error::{KbError, KbResult};
use crate::storage::status::StatusStore;
use crate::vector::{IndexDocument, VectorStore};

/// Vector-store collection name for a KB.
pub fn collection_name(kb_id: &str) -> String {
    format!("kb_{}", kb_id)
}

/// Rebuilds vector-store collections from persisted documents.
#[derive(Clone)]
pub struct IndexBuilder {
    status: StatusStore,
    vector: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingModel>,
}

impl IndexBuilder {
    pub fn new(
        status: StatusStore,
        vector: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingModel>,
    ) -> Self {
        Self {
            status,
            vector,
            embedder,
        }
    }

    /// Rebuild the collection for one KB from its persisted documents.
    ///
    /// Returns the number of documents indexed. Documents without a retained
    /// original body cannot be indexed and are skipped; if none remain the
    /// collection is left untouched and the index flag stays unset.
    pub async fn rebuild(&self, workspace_id: &str, kb_id: &str) -> KbResult<usize> {
        let docs = self.status.get_docs(workspace_id, kb_id).await?;

        let index_docs: Vec<IndexDocument> = docs
            .iter()
            .filter_map(|doc| {
                doc.original.as_ref().map(|original| IndexDocument {
                    id: original.id.clone(),
                    text: original.text.clone(),
                    metadata: original.metadata.clone(),
                })
            })
            .collect();

        if index_docs.len() < docs.len() {
            tracing::warn!(
                kb_id = %kb_id,
                skipped = docs.len() - index_docs.len(),
                "Documents without original body skipped during indexing"
            );
        }
        if index_docs.is_empty() {
            tracing::warn!(kb_id = %kb_id, "No indexable documents, skipping index build");
            return Ok(0);
        }

        let collection = collection_name(kb_id);

        // Full-rebuild contract: drop any existing collection first.
        if self
            .vector
            .collection_exists(&collection)
            .await
            .map_err(build_err)?
        {
            tracing::info!(collection = %collection, "Deleting existing collection for rebuild");
            self.vector
                .delete_collection(&collection)
                .await
                .map_err(build_err)?;
        }

        self.vector
            .create_index(&collection, &index_docs, &*self.embedder)
            .await
            .map_err(build_err)?;

        self.status.mark_index_created(kb_id).await?;

        tracing::info!(
            kb_id = %kb_id,
            collection = %collection,
            documents = index_docs.len(),
            "Index built"
        );
        Ok(index_docs.len())
    }
}

fn build_err(err: KbError) -> KbError {
    match err {
        err @ KbError::StoreUnavailable(_) => err,
        other => KbError::IndexBuildFailed(other.to_string()),
    }
}
