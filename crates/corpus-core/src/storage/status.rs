//! Status store: the fixed key schema for durable KB state.
//!
//! Key schema over the shared KV store:
//!
//! ```text
//! kb:<workspace>:<kb>:status            lifecycle status string
//! kb:<workspace>:<kb>:folder_structure  folder tree, JSON
//! kb:<workspace>:<kb>:docs              ordered document list, JSON
//! kb:<kb>:index_created                 "true" or absent
//! ```
//!
//! `index_created` is keyed by kb id alone: collection naming treats kb ids
//! as globally unique. Promoting it to the full (workspace, kb) pair would
//! change behavior for ids reused across workspaces, so it stays as is.

use std::sync::Arc;

use crate::error::{KbError, KbResult};
use crate::storage::KvStore;
use crate::types::{Document, Folder, KbStatus};

fn status_key(workspace_id: &str, kb_id: &str) -> String {
    format!("kb:{}:{}:status", workspace_id, kb_id)
}

fn folder_structure_key(workspace_id: &str, kb_id: &str) -> String {
    format!("kb:{}:{}:folder_structure", workspace_id, kb_id)
}

fn docs_key(workspace_id: &str, kb_id: &str) -> String {
    format!("kb:{}:{}:docs", workspace_id, kb_id)
}

fn index_created_key(kb_id: &str) -> String {
    format!("kb:{}:index_created", kb_id)
}

/// Parse `kb:<workspace>:<kb>:<class>` into its workspace and kb parts.
fn parse_key(key: &str) -> Option<(&str, &str)> {
    let mut parts = key.split(':');
    if parts.next() != Some("kb") {
        return None;
    }
    let workspace = parts.next()?;
    let kb = parts.next()?;
    parts.next()?;
    Some((workspace, kb))
}

/// Typed access to per-KB durable state under the fixed key schema.
///
/// This wrapper never interprets values beyond the schema; connectivity
/// failures surface as [`KbError::StoreUnavailable`].
#[derive(Clone)]
pub struct StatusStore {
    kv: Arc<dyn KvStore>,
}

impl StatusStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub async fn set_status(
        &self,
        workspace_id: &str,
        kb_id: &str,
        status: KbStatus,
    ) -> KbResult<()> {
        debug_assert!(status != KbStatus::NotFound, "not_found is never stored");
        self.kv
            .set(&status_key(workspace_id, kb_id), status.as_str())
            .await
    }

    /// Status of a KB; `NotFound` when no key exists.
    pub async fn get_status(&self, workspace_id: &str, kb_id: &str) -> KbResult<KbStatus> {
        match self.kv.get(&status_key(workspace_id, kb_id)).await? {
            Some(value) => KbStatus::parse(&value)
                .ok_or_else(|| KbError::Malformed(format!("unknown status '{}'", value))),
            None => Ok(KbStatus::NotFound),
        }
    }

    pub async fn set_docs(
        &self,
        workspace_id: &str,
        kb_id: &str,
        docs: &[Document],
    ) -> KbResult<()> {
        let json = serde_json::to_string(docs)?;
        self.kv.set(&docs_key(workspace_id, kb_id), &json).await?;
        tracing::info!(
            kb_id = %kb_id,
            workspace_id = %workspace_id,
            count = docs.len(),
            "Stored documents"
        );
        Ok(())
    }

    /// Documents for a KB; empty when the key is absent.
    pub async fn get_docs(&self, workspace_id: &str, kb_id: &str) -> KbResult<Vec<Document>> {
        match self.kv.get(&docs_key(workspace_id, kb_id)).await? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    pub async fn docs_exist(&self, workspace_id: &str, kb_id: &str) -> KbResult<bool> {
        self.kv.exists(&docs_key(workspace_id, kb_id)).await
    }

    pub async fn set_folder_structure(
        &self,
        workspace_id: &str,
        kb_id: &str,
        folders: &[Folder],
    ) -> KbResult<()> {
        let json = serde_json::to_string(folders)?;
        self.kv
            .set(&folder_structure_key(workspace_id, kb_id), &json)
            .await
    }

    /// Folder tree for a KB; empty when the key is absent.
    pub async fn get_folder_structure(
        &self,
        workspace_id: &str,
        kb_id: &str,
    ) -> KbResult<Vec<Folder>> {
        match self
            .kv
            .get(&folder_structure_key(workspace_id, kb_id))
            .await?
        {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    pub async fn mark_index_created(&self, kb_id: &str) -> KbResult<()> {
        self.kv.set(&index_created_key(kb_id), "true").await
    }

    pub async fn index_created(&self, kb_id: &str) -> KbResult<bool> {
        self.kv.exists(&index_created_key(kb_id)).await
    }

    /// Remove every KV key belonging to a KB. The vector-store collection is
    /// the caller's responsibility.
    pub async fn delete_kb(&self, workspace_id: &str, kb_id: &str) -> KbResult<()> {
        self.kv.delete(&status_key(workspace_id, kb_id)).await?;
        self.kv
            .delete(&folder_structure_key(workspace_id, kb_id))
            .await?;
        self.kv.delete(&docs_key(workspace_id, kb_id)).await?;
        self.kv.delete(&index_created_key(kb_id)).await?;
        Ok(())
    }

    /// All kb ids with a status key in this workspace.
    pub async fn list_kbs(&self, workspace_id: &str) -> KbResult<Vec<String>> {
        let pattern = format!("kb:{}:*:status", workspace_id);
        let keys = self.kv.scan(&pattern).await?;
        Ok(keys
            .iter()
            .filter_map(|k| parse_key(k).map(|(_, kb)| kb.to_string()))
            .collect())
    }

    /// All kb ids in this workspace whose status is `running`.
    pub async fn list_running(&self, workspace_id: &str) -> KbResult<Vec<String>> {
        let mut running = Vec::new();
        for kb_id in self.list_kbs(workspace_id).await? {
            if self.get_status(workspace_id, &kb_id).await? == KbStatus::Running {
                running.push(kb_id);
            }
        }
        Ok(running)
    }

    /// All kb ids with a docs key in this workspace.
    pub async fn kbs_with_docs(&self, workspace_id: &str) -> KbResult<Vec<String>> {
        let pattern = format!("kb:{}:*:docs", workspace_id);
        let keys = self.kv.scan(&pattern).await?;
        Ok(keys
            .iter()
            .filter_map(|k| parse_key(k).map(|(_, kb)| kb.to_string()))
            .collect())
    }

    /// First workspace that holds documents for this kb id, if any.
    pub async fn find_workspace(&self, kb_id: &str) -> KbResult<Option<String>> {
        let pattern = format!("kb:*:{}:docs", kb_id);
        let keys = self.kv.scan(&pattern).await?;
        Ok(keys
            .iter()
            .filter_map(|k| parse_key(k))
            .find(|(_, kb)| *kb == kb_id)
            .map(|(ws, _)| ws.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn store() -> StatusStore {
        StatusStore::new(Arc::new(MemoryStore::new()))
    }

    fn doc(id: &str, folder: &str) -> Document {
        Document {
            id: id.to_string(),
            title: format!("{}.txt", id),
            doc_type: "text".into(),
            date: "2024-01-01T00:00:00Z".into(),
            tags: vec![],
            source: "local_store".into(),
            description: String::new(),
            url: format!("/tmp/{}", id),
            folder_id: folder.to_string(),
            original: None,
        }
    }

    #[tokio::test]
    async fn missing_status_reads_as_not_found() {
        let store = store();
        assert_eq!(
            store.get_status("ws1", "k1").await.unwrap(),
            KbStatus::NotFound
        );

        store
            .set_status("ws1", "k1", KbStatus::Initializing)
            .await
            .unwrap();
        assert_eq!(
            store.get_status("ws1", "k1").await.unwrap(),
            KbStatus::Initializing
        );
    }

    #[tokio::test]
    async fn docs_round_trip_and_enumeration() {
        let store = store();
        store
            .set_docs("ws1", "k1", &[doc("d1", "a"), doc("d2", "b")])
            .await
            .unwrap();
        store.set_status("ws1", "k1", KbStatus::Running).await.unwrap();

        let docs = store.get_docs("ws1", "k1").await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "d1");

        assert_eq!(store.kbs_with_docs("ws1").await.unwrap(), vec!["k1"]);
        assert_eq!(store.list_running("ws1").await.unwrap(), vec!["k1"]);
        assert_eq!(
            store.find_workspace("k1").await.unwrap(),
            Some("ws1".to_string())
        );
        assert_eq!(store.find_workspace("k2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_removes_every_key() {
        let store = store();
        store.set_status("ws1", "k1", KbStatus::Running).await.unwrap();
        store.set_docs("ws1", "k1", &[doc("d1", "a")]).await.unwrap();
        store
            .set_folder_structure("ws1", "k1", &[])
            .await
            .unwrap();
        store.mark_index_created("k1").await.unwrap();

        store.delete_kb("ws1", "k1").await.unwrap();

        assert_eq!(
            store.get_status("ws1", "k1").await.unwrap(),
            KbStatus::NotFound
        );
        assert!(store.get_docs("ws1", "k1").await.unwrap().is_empty());
        assert!(!store.index_created("k1").await.unwrap());
        assert!(store.list_kbs("ws1").await.unwrap().is_empty());
    }

    #[test]
    fn key_parsing_rejects_foreign_keys() {
        assert_eq!(parse_key("kb:ws1:k1:status"), Some(("ws1", "k1")));
        assert_eq!(parse_key("kb:ws1:k1:docs"), Some(("ws1", "k1")));
        assert_eq!(parse_key("session:abc"), None);
        assert_eq!(parse_key("kb:k1:index_created"), None);
    }
}
