//! Ingestion pipeline.
//!
//! A single long-lived worker drains an unbounded FIFO registration queue,
//! so two registrations for the same KB can never race. Per registration the
//! worker drives `initializing → running | error`:
//!
//! ```text
//! registration ──▶ initializing ──▶ load documents (blocking pool)
//!                                   persist docs + folder tree
//!                                   rebuild vector index
//!                              ──▶ running
//!      any failure anywhere    ──▶ error (no retry)
//! ```
//!
//! A KB stranded in `initializing` by a crash is not auto-resumed; it stays
//! there until a new registration arrives.

pub mod folders;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use crate::error::{KbError, KbResult};
use crate::index::IndexBuilder;
use crate::readers::{self, Reader, ReaderOptions};
use crate::storage::status::StatusStore;
use crate::types::{KbStatus, KnowledgeBaseRegistration};

/// Configured reader instances retained per KB, keyed by kb id. Best-effort
/// cache: loss is survivable, only resync needs it.
pub type ReaderMap = Arc<RwLock<HashMap<String, Arc<dyn Reader>>>>;

/// Handle for submitting registrations to the pipeline.
#[derive(Clone)]
pub struct IngestHandle {
    tx: mpsc::UnboundedSender<KnowledgeBaseRegistration>,
}

impl IngestHandle {
    /// Enqueue a registration. Registration is acknowledged regardless of
    /// later ingestion outcome; status polling reports failures.
    pub fn enqueue(&self, registration: KnowledgeBaseRegistration) {
        if self.tx.send(registration).is_err() {
            tracing::error!("Ingestion worker is gone, registration dropped");
        }
    }
}

/// Spawn the single ingestion worker.
///
/// Registrations are processed strictly in submission order. The worker
/// stops when every handle is dropped.
pub fn spawn_ingest_worker(
    status: StatusStore,
    builder: IndexBuilder,
    readers: ReaderMap,
) -> IngestHandle {
    let (tx, mut rx) = mpsc::unbounded_channel::<KnowledgeBaseRegistration>();

    tokio::spawn(async move {
        tracing::info!("Ingestion worker started");

        while let Some(registration) = rx.recv().await {
            let workspace_id = registration.workspace_id.clone();
            let kb_id = registration.id.clone();
            tracing::info!(
                kb_id = %kb_id,
                workspace_id = %workspace_id,
                source = %registration.source,
                "Processing KB registration"
            );

            if let Err(e) = process_registration(&status, &builder, &readers, registration).await {
                tracing::error!(kb_id = %kb_id, error = %e, "KB ingestion failed");
                if let Err(e) = status
                    .set_status(&workspace_id, &kb_id, KbStatus::Error)
                    .await
                {
                    tracing::error!(kb_id = %kb_id, error = %e, "Failed to record error status");
                }
            }
        }

        tracing::info!("Ingestion worker stopped");
    });

    IngestHandle { tx }
}

/// One worker step. Documents persisted before a failure are left in place;
/// a later registration or delete overwrites them.
async fn process_registration(
    status: &StatusStore,
    builder: &IndexBuilder,
    readers: &ReaderMap,
    registration: KnowledgeBaseRegistration,
) -> KbResult<()> {
    let workspace_id = &registration.workspace_id;
    let kb_id = &registration.id;

    status
        .set_status(workspace_id, kb_id, KbStatus::Initializing)
        .await?;

    let options = resolve_source(&registration)?;

    let mut reader = readers::create_reader(&registration.source)?;
    reader.configure(&options)?;
    let reader: Arc<dyn Reader> = Arc::from(reader);

    let loader = Arc::clone(&reader);
    let docs = tokio::task::spawn_blocking(move || loader.load_documents())
        .await
        .map_err(|e| KbError::ReaderFailed(format!("load task failed: {}", e)))??;

    readers.write().await.insert(kb_id.clone(), reader);

    // Docs and folder tree are durable before the status may read running.
    status.set_docs(workspace_id, kb_id, &docs).await?;
    let tree = folders::build_folder_structure(&docs);
    status
        .set_folder_structure(workspace_id, kb_id, &tree)
        .await?;

    builder.rebuild(workspace_id, kb_id).await?;

    status
        .set_status(workspace_id, kb_id, KbStatus::Running)
        .await?;
    tracing::info!(kb_id = %kb_id, "KB is now running");
    Ok(())
}

/// Resolve reader options from a registration.
///
/// Local stores require an existing filesystem path, normalized lexically.
/// Other sources pass their URL through untouched.
fn resolve_source(registration: &KnowledgeBaseRegistration) -> KbResult<ReaderOptions> {
    if !readers::is_registered(&registration.source) {
        return Err(KbError::InvalidSource(format!(
            "unknown source type: {}",
            registration.source
        )));
    }

    if registration.source == "local_store" {
        if registration.url.is_empty() {
            return Err(KbError::InvalidSource(
                "no path provided for local_store".to_string(),
            ));
        }
        let path = readers::normalize_path(Path::new(&registration.url));
        if !path.exists() {
            return Err(KbError::InvalidSource(format!(
                "path does not exist: {}",
                path.display()
            )));
        }
        Ok(ReaderOptions {
            path: Some(path),
            url: None,
        })
    } else {
        Ok(ReaderOptions {
            path: None,
            url: Some(registration.url.clone()),
        })
    }
}
