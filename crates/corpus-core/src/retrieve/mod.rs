//! Multi-KB retrieval fan-out.
//!
//! Given a workspace and an optional explicit KB set, queries every selected
//! collection and merges results by similarity score. Per-KB failures skip
//! that KB; the overall query returns partial results.

use std::sync::Arc;

use crate::embeddings::EmbeddingModel;
use crate::error::KbResult;
use crate::index::{collection_name, IndexBuilder};
use crate::storage::status::StatusStore;
use crate::types::{KbStatus, RetrievedChunk};
use crate::vector::VectorStore;

/// Fans a query out across a workspace's running KBs.
#[derive(Clone)]
pub struct Retriever {
    status: StatusStore,
    vector: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingModel>,
    builder: IndexBuilder,
}

impl Retriever {
    pub fn new(
        status: StatusStore,
        vector: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingModel>,
        builder: IndexBuilder,
    ) -> Self {
        Self {
            status,
            vector,
            embedder,
            builder,
        }
    }

    /// Query the workspace's KBs and return the merged top-k chunks.
    pub async fn retrieve(
        &self,
        workspace_id: &str,
        kb_ids: Option<&[String]>,
        query_text: &str,
        top_k: usize,
    ) -> KbResult<Vec<RetrievedChunk>> {
        let selected = self.select_kbs(workspace_id, kb_ids).await?;
        tracing::info!(
            workspace_id = %workspace_id,
            kb_count = selected.len(),
            "Querying knowledge bases"
        );

        let mut results = Vec::new();
        for kb_id in &selected {
            // Build the index on demand when documents exist but the index
            // flag was never set.
            if !self.status.index_created(kb_id).await? {
                if self.status.docs_exist(workspace_id, kb_id).await? {
                    tracing::info!(kb_id = %kb_id, "Creating index on demand");
                    if let Err(e) = self.builder.rebuild(workspace_id, kb_id).await {
                        tracing::warn!(kb_id = %kb_id, error = %e, "On-demand index build failed");
                        continue;
                    }
                } else {
                    tracing::warn!(kb_id = %kb_id, "No documents found, skipping");
                    continue;
                }
            }

            let collection = collection_name(kb_id);
            match self
                .vector
                .query(&collection, query_text, top_k, &*self.embedder)
                .await
            {
                Ok(nodes) => {
                    results.extend(nodes.into_iter().map(|node| RetrievedChunk {
                        kb_id: kb_id.clone(),
                        text: node.text,
                        score: node.score,
                        metadata: node.metadata,
                    }));
                }
                Err(e) => {
                    tracing::warn!(kb_id = %kb_id, error = %e, "Vector store query failed, skipping");
                }
            }
        }

        Ok(merge_top_k(results, top_k))
    }

    /// Resolve the KB set to query: the explicit list filtered to `running`,
    /// or every running KB in the workspace.
    async fn select_kbs(
        &self,
        workspace_id: &str,
        kb_ids: Option<&[String]>,
    ) -> KbResult<Vec<String>> {
        match kb_ids {
            Some(requested) if !requested.is_empty() => {
                let mut selected = Vec::new();
                let mut dropped = Vec::new();
                for kb_id in requested {
                    if self.status.get_status(workspace_id, kb_id).await? == KbStatus::Running {
                        selected.push(kb_id.clone());
                    } else {
                        dropped.push(kb_id.clone());
                    }
                }
                if !dropped.is_empty() {
                    tracing::warn!(
                        workspace_id = %workspace_id,
                        dropped = ?dropped,
                        "Requested knowledge bases are not running"
                    );
                }
                Ok(selected)
            }
            _ => self.status.list_running(workspace_id).await,
        }
    }
}

/// Union of per-KB results, sorted by score descending and truncated.
///
/// The sort is stable, so ties keep the KB insertion order. No text
/// deduplication: near-duplicates from overlapping KBs are the caller's
/// concern.
pub fn merge_top_k(mut results: Vec<RetrievedChunk>, top_k: usize) -> Vec<RetrievedChunk> {
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(top_k);
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(kb: &str, score: f32) -> RetrievedChunk {
        RetrievedChunk {
            kb_id: kb.to_string(),
            text: format!("{}:{}", kb, score),
            score,
            metadata: serde_json::Value::Null,
        }
    }

    #[test]
    fn merge_interleaves_by_score() {
        let results = vec![
            chunk("k1", 0.9),
            chunk("k1", 0.7),
            chunk("k1", 0.5),
            chunk("k2", 0.8),
            chunk("k2", 0.6),
            chunk("k2", 0.4),
        ];

        let merged = merge_top_k(results, 4);
        let scores: Vec<f32> = merged.iter().map(|c| c.score).collect();
        assert_eq!(scores, vec![0.9, 0.8, 0.7, 0.6]);
    }

    #[test]
    fn merge_truncates_and_is_non_increasing() {
        let results = vec![chunk("k1", 0.1), chunk("k2", 0.9), chunk("k3", 0.5)];
        let merged = merge_top_k(results, 2);
        assert_eq!(merged.len(), 2);
        assert!(merged[0].score >= merged[1].score);
    }

    #[test]
    fn merge_keeps_insertion_order_on_ties() {
        let results = vec![chunk("k1", 0.5), chunk("k2", 0.5), chunk("k3", 0.5)];
        let merged = merge_top_k(results, 3);
        let kbs: Vec<&str> = merged.iter().map(|c| c.kb_id.as_str()).collect();
        assert_eq!(kbs, vec!["k1", "k2", "k3"]);
    }
}
