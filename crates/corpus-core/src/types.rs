//! Wire types shared across the knowledge base core.
//!
//! Serialized field names match the shapes the frontend and the sibling
//! services already exchange (`folderId`, `isOpen`, `original_doc`), so
//! values written by one replica deserialize on any other.

use serde::{Deserialize, Serialize};

/// The untruncated body of a document, retained so the vector index can be
/// rebuilt without re-reading the source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginalDoc {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// A document loaded from a knowledge base source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub doc_type: String,
    pub date: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub source: String,
    pub description: String,
    pub url: String,
    #[serde(rename = "folderId")]
    pub folder_id: String,
    /// Present for documents that can be re-indexed in place.
    #[serde(rename = "original_doc", default)]
    pub original: Option<OriginalDoc>,
}

/// A node in the folder tree derived from documents' `folder_id` paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub folders: Vec<Folder>,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(rename = "isOpen", default)]
    pub is_open: bool,
}

/// Summary card for a knowledge base, as returned by list/get source calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSource {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub count: usize,
}

/// Lifecycle status of a knowledge base.
///
/// `NotFound` is never written to the store; it is the answer when no status
/// key exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KbStatus {
    Disabled,
    Initializing,
    Running,
    Error,
    NotFound,
}

impl KbStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::Error => "error",
            Self::NotFound => "not_found",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "disabled" => Some(Self::Disabled),
            "initializing" => Some(Self::Initializing),
            "running" => Some(Self::Running),
            "error" => Some(Self::Error),
            "not_found" => Some(Self::NotFound),
            _ => None,
        }
    }
}

impl std::fmt::Display for KbStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A knowledge base registration request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBaseRegistration {
    pub id: String,
    pub name: String,
    pub workspace_id: String,
    #[serde(default)]
    pub description: String,
    pub source: String,
    pub url: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub embedding_engine: String,
}

fn default_true() -> bool {
    true
}

/// A value that may arrive as either a single string or a list of strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringOrList {
    One(String),
    Many(Vec<String>),
}

impl StringOrList {
    /// The last element for lists, the string itself otherwise.
    pub fn last(&self) -> &str {
        match self {
            Self::One(s) => s,
            Self::Many(list) => list.last().map(String::as_str).unwrap_or(""),
        }
    }

    /// All elements joined with newlines.
    pub fn joined(&self) -> String {
        match self {
            Self::One(s) => s.clone(),
            Self::Many(list) => list.join("\n"),
        }
    }
}

impl Default for StringOrList {
    fn default() -> Self {
        Self::One(String::new())
    }
}

/// A retrieval or RAG-answer request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub workspace_id: String,
    #[serde(default)]
    pub knowledge_bases: Option<Vec<String>>,
    pub query: StringOrList,
    #[serde(default)]
    pub conversation_history: StringOrList,
    #[serde(default)]
    pub streaming: bool,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_language")]
    pub preferred_language: String,
    #[serde(default)]
    pub message_id: Option<String>,
}

fn default_top_k() -> usize {
    5
}

fn default_language() -> String {
    "en".to_string()
}

impl QueryRequest {
    /// The effective query text: the last element if a list, else the string.
    pub fn query_text(&self) -> &str {
        self.query.last()
    }
}

/// One retrieved chunk, attributed to the knowledge base it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub kb_id: String,
    pub text: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            KbStatus::Disabled,
            KbStatus::Initializing,
            KbStatus::Running,
            KbStatus::Error,
            KbStatus::NotFound,
        ] {
            assert_eq!(KbStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(KbStatus::parse("bogus"), None);
    }

    #[test]
    fn query_text_takes_last_list_element() {
        let req: QueryRequest = serde_json::from_str(
            r#"{"workspace_id": "ws1", "query": ["first", "second"]}"#,
        )
        .unwrap();
        assert_eq!(req.query_text(), "second");
        assert_eq!(req.top_k, 5);
        assert_eq!(req.preferred_language, "en");
        assert!(!req.streaming);
    }

    #[test]
    fn query_accepts_plain_string() {
        let req: QueryRequest =
            serde_json::from_str(r#"{"workspace_id": "ws1", "query": "hello"}"#).unwrap();
        assert_eq!(req.query_text(), "hello");
    }

    #[test]
    fn document_serializes_with_wire_names() {
        let doc = Document {
            id: "d1".into(),
            title: "x.txt".into(),
            doc_type: "text".into(),
            date: "2024-01-01T00:00:00Z".into(),
            tags: vec![],
            source: "local_store".into(),
            description: String::new(),
            url: "/tmp/a/x.txt".into(),
            folder_id: "a".into(),
            original: None,
        };
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["folderId"], "a");
        assert_eq!(json["type"], "text");
    }
}
