//! Corpus Core - knowledge base orchestration for RAG workloads
//!
//! This crate contains the core functionality for Corpus, including:
//! - Durable KB status/metadata in a shared key-value store (`storage`)
//! - Pluggable document readers (`readers`)
//! - The asynchronous ingestion pipeline (`ingest`)
//! - Vector index rebuilds (`index`) and multi-KB retrieval (`retrieve`)
//! - RAG answering in blocking and streaming mode (`answer`, `llm`)
//! - Streaming session bookkeeping (`session`)
//!
//! [`KbManager`] is the public surface; routes unmarshal requests and call
//! straight into it.

pub mod answer;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod readers;
pub mod retrieve;
pub mod session;
pub mod storage;
pub mod types;
pub mod vector;

#[cfg(test)]
pub(crate) mod testutil;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_stream::wrappers::ReceiverStream;

pub use answer::Answerer;
pub use config::Config;
pub use embeddings::{EmbeddingModel, OllamaEmbedding};
pub use error::{KbError, KbResult};
pub use ingest::{IngestHandle, ReaderMap};
pub use llm::{Delta, DeltaStream, Llm, OpenAiCompatProvider};
pub use retrieve::Retriever;
pub use session::{SessionRegistry, StreamSession};
pub use storage::status::StatusStore;
pub use storage::{KvStore, MemoryStore, RedisStore};
pub use types::{
    DataSource, Document, Folder, KbStatus, KnowledgeBaseRegistration, QueryRequest,
    RetrievedChunk, StringOrList,
};
pub use vector::{QdrantStore, VectorStore};

use index::{collection_name, IndexBuilder};
use readers::Reader;

/// A streaming answer: the transport forwards `events` verbatim and can use
/// `session_id` to observe progress.
pub struct StreamingAnswer {
    pub session_id: String,
    pub events: ReceiverStream<String>,
}

/// Public surface of the knowledge base core.
///
/// Owns the status store, the ingestion pipeline, retrieval and answering,
/// and the in-process reader/name caches. Cheap to clone pieces are shared;
/// the manager itself is intended to live in the application state.
pub struct KbManager {
    status: StatusStore,
    vector: Arc<dyn VectorStore>,
    sessions: Arc<SessionRegistry>,
    /// Configured reader per KB; best-effort cache used by resync.
    readers: ReaderMap,
    /// Display names recorded at registration; best-effort cache.
    kb_names: Arc<RwLock<HashMap<String, String>>>,
    ingest: IngestHandle,
    builder: IndexBuilder,
    retriever: Retriever,
    answerer: Answerer,
}

impl KbManager {
    /// Build a manager over the given collaborators and start the ingestion
    /// worker.
    pub fn new(
        kv: Arc<dyn KvStore>,
        vector: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingModel>,
        llm: Arc<dyn Llm>,
    ) -> Self {
        let status = StatusStore::new(kv);
        let builder = IndexBuilder::new(status.clone(), vector.clone(), embedder.clone());
        let retriever = Retriever::new(
            status.clone(),
            vector.clone(),
            embedder.clone(),
            builder.clone(),
        );
        let answerer = Answerer::new(retriever.clone(), llm);
        let readers: ReaderMap = Arc::new(RwLock::new(HashMap::new()));

        let ingest = ingest::spawn_ingest_worker(status.clone(), builder.clone(), readers.clone());

        Self {
            status,
            vector,
            sessions: Arc::new(SessionRegistry::new()),
            readers,
            kb_names: Arc::new(RwLock::new(HashMap::new())),
            ingest,
            builder,
            retriever,
            answerer,
        }
    }

    /// Connect to the configured collaborators and build a manager.
    pub async fn connect(config: &Config) -> KbResult<Self> {
        let kv: Arc<dyn KvStore> = Arc::new(RedisStore::connect(&config.redis_url).await?);
        let vector: Arc<dyn VectorStore> = Arc::new(QdrantStore::new(&config.qdrant_url));
        let embedder: Arc<dyn EmbeddingModel> = Arc::new(OllamaEmbedding::new(
            &config.embed_base_url,
            &config.embed_model,
        ));
        let llm: Arc<dyn Llm> = Arc::new(OpenAiCompatProvider::new(
            &config.llm_api_base,
            &config.llm_api_key,
            &config.llm_model,
        ));
        Ok(Self::new(kv, vector, embedder, llm))
    }

    /// Register a knowledge base and queue it for ingestion.
    ///
    /// Status is seeded `disabled` before the registration is enqueued, so a
    /// poll straight after this call never reads `not_found`. Ingestion
    /// outcome is reported through status polling only.
    pub async fn register(&self, registration: KnowledgeBaseRegistration) -> KbResult<()> {
        self.status
            .set_status(
                &registration.workspace_id,
                &registration.id,
                KbStatus::Disabled,
            )
            .await?;

        let display = if registration.name.is_empty() {
            registration.id.clone()
        } else {
            registration.name.clone()
        };
        self.kb_names
            .write()
            .await
            .insert(registration.id.clone(), display);

        tracing::info!(
            kb_id = %registration.id,
            workspace_id = %registration.workspace_id,
            "Queued KB registration"
        );
        self.ingest.enqueue(registration);
        Ok(())
    }

    /// Current status of a KB; `NotFound` when it does not exist.
    pub async fn get_status(&self, workspace_id: &str, kb_id: &str) -> KbResult<KbStatus> {
        self.status.get_status(workspace_id, kb_id).await
    }

    /// Data source cards for every `running` KB in the workspace.
    pub async fn list_sources(&self, workspace_id: &str) -> KbResult<Vec<DataSource>> {
        let mut sources = Vec::new();
        for kb_id in self.status.kbs_with_docs(workspace_id).await? {
            if self.status.get_status(workspace_id, &kb_id).await? != KbStatus::Running {
                continue;
            }
            sources.push(self.source_card(workspace_id, &kb_id).await?);
        }
        Ok(sources)
    }

    /// Data source card for one KB, if it is `running`.
    pub async fn get_source(
        &self,
        workspace_id: &str,
        kb_id: &str,
    ) -> KbResult<Option<DataSource>> {
        if self.status.get_status(workspace_id, kb_id).await? != KbStatus::Running {
            return Ok(None);
        }
        Ok(Some(self.source_card(workspace_id, kb_id).await?))
    }

    async fn source_card(&self, workspace_id: &str, kb_id: &str) -> KbResult<DataSource> {
        let docs = self.status.get_docs(workspace_id, kb_id).await?;
        Ok(DataSource {
            id: kb_id.to_string(),
            name: self.display_name(kb_id).await,
            icon: "database".to_string(),
            count: docs.len(),
        })
    }

    async fn display_name(&self, kb_id: &str) -> String {
        if let Some(name) = self.kb_names.read().await.get(kb_id) {
            return name.clone();
        }
        if kb_id.contains('-') {
            if let Some(first) = kb_id.split('-').next() {
                return format!("{} KB", first);
            }
        }
        kb_id.to_string()
    }

    /// Folder tree for a KB; empty when absent.
    pub async fn folder_structure(&self, workspace_id: &str, kb_id: &str) -> KbResult<Vec<Folder>> {
        self.status.get_folder_structure(workspace_id, kb_id).await
    }

    /// Documents for a KB; empty when absent.
    pub async fn documents(&self, workspace_id: &str, kb_id: &str) -> KbResult<Vec<Document>> {
        self.status.get_docs(workspace_id, kb_id).await
    }

    /// Enable or disable a KB. Enabling only flips `disabled → running`,
    /// disabling only `running → disabled`; other states are left alone.
    pub async fn update_status(
        &self,
        workspace_id: &str,
        kb_id: &str,
        enabled: bool,
    ) -> KbResult<KbStatus> {
        let current = self.status.get_status(workspace_id, kb_id).await?;
        if current == KbStatus::NotFound {
            return Err(KbError::NotFound(format!("knowledge base {}", kb_id)));
        }

        match (enabled, current) {
            (true, KbStatus::Disabled) => {
                self.status
                    .set_status(workspace_id, kb_id, KbStatus::Running)
                    .await?;
                tracing::info!(kb_id = %kb_id, "Knowledge base enabled");
                Ok(KbStatus::Running)
            }
            (false, KbStatus::Running) => {
                self.status
                    .set_status(workspace_id, kb_id, KbStatus::Disabled)
                    .await?;
                tracing::info!(kb_id = %kb_id, "Knowledge base disabled");
                Ok(KbStatus::Disabled)
            }
            _ => Ok(current),
        }
    }

    /// Delete a knowledge base completely: all of its KV keys, the cached
    /// reader and display name, and the vector-store collection.
    ///
    /// The status key goes first, so a partially deleted KB is never
    /// observable as `running`; a failed collection delete surfaces as an
    /// error and the call can be retried.
    pub async fn delete(&self, workspace_id: &str, kb_id: &str) -> KbResult<()> {
        let current = self.status.get_status(workspace_id, kb_id).await?;
        if current == KbStatus::NotFound {
            return Err(KbError::NotFound(format!("knowledge base {}", kb_id)));
        }

        self.status.delete_kb(workspace_id, kb_id).await?;
        self.readers.write().await.remove(kb_id);
        self.kb_names.write().await.remove(kb_id);

        let collection = collection_name(kb_id);
        if self.vector.collection_exists(&collection).await? {
            self.vector.delete_collection(&collection).await?;
        }

        tracing::info!(kb_id = %kb_id, workspace_id = %workspace_id, "Knowledge base deleted");
        Ok(())
    }

    /// Query a workspace's KBs and return the merged top-k chunks.
    pub async fn retrieve(
        &self,
        workspace_id: &str,
        kb_ids: Option<&[String]>,
        query_text: &str,
        top_k: usize,
    ) -> KbResult<Vec<RetrievedChunk>> {
        self.retriever
            .retrieve(workspace_id, kb_ids, query_text, top_k)
            .await
    }

    /// Answer a query with retrieved context, returning the full text.
    pub async fn answer(&self, request: &QueryRequest) -> KbResult<String> {
        self.answerer.answer(request).await
    }

    /// Answer a query as a line-oriented event stream, tracked by a session.
    pub async fn stream_answer(&self, request: &QueryRequest) -> KbResult<StreamingAnswer> {
        let session_id = SessionRegistry::new_session_id();
        self.sessions.store(&session_id, request.clone()).await;

        let deltas = match self.answerer.stream_answer(request).await {
            Ok(deltas) => deltas,
            Err(e) => {
                self.sessions.remove(&session_id).await;
                return Err(e);
            }
        };

        let events = session::stream_events(self.sessions.clone(), session_id.clone(), deltas);
        Ok(StreamingAnswer { session_id, events })
    }

    /// Re-run the reader and rebuild the index for every `running` KB whose
    /// reader is still cached in-process. Per-KB failures flip that KB to
    /// `error` and never abort the sweep.
    pub async fn sync_all(&self) -> KbResult<()> {
        let readers: Vec<(String, Arc<dyn Reader>)> = self
            .readers
            .read()
            .await
            .iter()
            .map(|(id, reader)| (id.clone(), reader.clone()))
            .collect();

        for (kb_id, reader) in readers {
            let Some(workspace_id) = self.status.find_workspace(&kb_id).await? else {
                tracing::warn!(kb_id = %kb_id, "No workspace found for cached reader");
                continue;
            };
            if self.status.get_status(&workspace_id, &kb_id).await? != KbStatus::Running {
                continue;
            }

            if let Err(e) = self.resync_kb(&workspace_id, &kb_id, reader).await {
                tracing::error!(kb_id = %kb_id, error = %e, "Resync failed");
                if let Err(e) = self
                    .status
                    .set_status(&workspace_id, &kb_id, KbStatus::Error)
                    .await
                {
                    tracing::error!(kb_id = %kb_id, error = %e, "Failed to record error status");
                }
            }
        }
        Ok(())
    }

    async fn resync_kb(
        &self,
        workspace_id: &str,
        kb_id: &str,
        reader: Arc<dyn Reader>,
    ) -> KbResult<()> {
        let docs = tokio::task::spawn_blocking(move || reader.load_documents())
            .await
            .map_err(|e| KbError::ReaderFailed(format!("load task failed: {}", e)))??;

        self.status.set_docs(workspace_id, kb_id, &docs).await?;
        let tree = ingest::folders::build_folder_structure(&docs);
        self.status
            .set_folder_structure(workspace_id, kb_id, &tree)
            .await?;
        self.builder.rebuild(workspace_id, kb_id).await?;

        tracing::info!(kb_id = %kb_id, "Reloaded documents and rebuilt index");
        Ok(())
    }

    /// The streaming session registry, for progress lookups.
    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }
}
