//! Streaming session registry.
//!
//! Sessions are in-process only: they exist so a client can observe the
//! progress of an in-flight streaming answer and so teardown is clean when
//! the client disconnects mid-stream. Every session is reaped by a TTL timer;
//! normal stream completion removes it immediately.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use rand::RngCore;
use tokio::sync::{mpsc, RwLock};
use tokio_stream::wrappers::ReceiverStream;

use crate::llm::DeltaStream;
use crate::types::QueryRequest;

/// Default session time-to-live.
const SESSION_TTL: Duration = Duration::from_secs(1800);

/// Pause between forwarded tokens so one stream cannot starve other handlers.
const INTER_TOKEN_YIELD: Duration = Duration::from_millis(10);

/// Event buffer between the forwarding task and the transport.
const EVENT_BUFFER: usize = 16;

/// State of one in-flight streaming answer.
#[derive(Debug, Clone)]
pub struct StreamSession {
    pub session_id: String,
    pub query: QueryRequest,
    pub current_content: String,
    pub is_complete: bool,
    pub expires_at: Instant,
}

/// In-process map of live streaming sessions with TTL expiry.
pub struct SessionRegistry {
    ttl: Duration,
    sessions: Arc<RwLock<HashMap<String, StreamSession>>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::with_ttl(SESSION_TTL)
    }

    /// Registry with a custom TTL, for tests.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// An opaque random session id.
    pub fn new_session_id() -> String {
        let mut bytes = [0u8; 8];
        rand::rng().fill_bytes(&mut bytes);
        let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
        format!("stream_{}", hex)
    }

    /// Store a fresh session and schedule its TTL removal.
    pub async fn store(&self, session_id: &str, query: QueryRequest) {
        let session = StreamSession {
            session_id: session_id.to_string(),
            query,
            current_content: String::new(),
            is_complete: false,
            expires_at: Instant::now() + self.ttl,
        };
        self.sessions
            .write()
            .await
            .insert(session_id.to_string(), session);

        let sessions = self.sessions.clone();
        let ttl = self.ttl;
        let session_id = session_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            if sessions.write().await.remove(&session_id).is_some() {
                tracing::debug!(session_id = %session_id, "Session expired");
            }
        });
    }

    pub async fn get(&self, session_id: &str) -> Option<StreamSession> {
        self.sessions.read().await.get(session_id).cloned()
    }

    pub async fn update_content(&self, session_id: &str, content: &str) {
        if let Some(session) = self.sessions.write().await.get_mut(session_id) {
            session.current_content = content.to_string();
        }
    }

    pub async fn mark_complete(&self, session_id: &str) {
        if let Some(session) = self.sessions.write().await.get_mut(session_id) {
            session.is_complete = true;
        }
    }

    pub async fn remove(&self, session_id: &str) {
        self.sessions.write().await.remove(session_id);
    }
}

/// Drive a delta stream into a line-oriented event stream.
///
/// Emits `event: start`, one `event: token` per normalized delta, and
/// `event: end`. Each delivered token is appended to the session's
/// `current_content`. Any failure mid-iteration still marks the session
/// complete. When the consumer goes away the forwarding loop stops and the
/// TTL timer reaps the session; on normal completion the session is removed
/// immediately.
pub fn stream_events(
    registry: Arc<SessionRegistry>,
    session_id: String,
    mut deltas: DeltaStream,
) -> ReceiverStream<String> {
    let (tx, rx) = mpsc::channel::<String>(EVENT_BUFFER);

    tokio::spawn(async move {
        let mut accumulated = String::new();
        let mut disconnected = tx
            .send("event: start\ndata: {}\n\n".to_string())
            .await
            .is_err();

        while !disconnected {
            let Some(item) = deltas.next().await else {
                break;
            };
            let delta = match item {
                Ok(delta) => delta,
                Err(e) => {
                    tracing::error!(session_id = %session_id, error = %e, "Streaming error");
                    break;
                }
            };

            let token = delta.into_text();
            let payload = serde_json::json!({ "token": token });
            if tx
                .send(format!("event: token\ndata: {}\n\n", payload))
                .await
                .is_err()
            {
                disconnected = true;
                break;
            }

            accumulated.push_str(&token);
            registry.update_content(&session_id, &accumulated).await;

            tokio::time::sleep(INTER_TOKEN_YIELD).await;
        }

        registry.mark_complete(&session_id).await;

        if disconnected {
            // No explicit cancel reaches the LLM; dropping the delta stream
            // is the only upstream signal.
            tracing::info!(session_id = %session_id, "Client disconnected mid-stream");
        } else {
            let _ = tx.send("event: end\ndata: {}\n\n".to_string()).await;
            registry.remove(&session_id).await;
            tracing::debug!(session_id = %session_id, "Stream completed");
        }
    });

    ReceiverStream::new(rx)
}
