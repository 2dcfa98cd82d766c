//! LLM contract for blocking and streaming completions.

mod openai;

pub use openai::OpenAiCompatProvider;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::KbResult;

/// A finished completion.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
}

/// One item of a streaming completion.
///
/// Providers differ in what a streamed item looks like; consumers normalize
/// everything to text via [`Delta::into_text`].
#[derive(Debug, Clone)]
pub enum Delta {
    /// A plain text chunk.
    Text(String),
    /// A structured delta carrying a text field.
    Struct { text: String },
    /// Anything else; rendered via its JSON form.
    Raw(serde_json::Value),
}

impl Delta {
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Struct { text } => text,
            Self::Raw(serde_json::Value::String(s)) => s,
            Self::Raw(value) => value.to_string(),
        }
    }
}

/// A lazy sequence of completion deltas.
pub type DeltaStream = Pin<Box<dyn Stream<Item = KbResult<Delta>> + Send>>;

/// Contract for the language model.
#[async_trait]
pub trait Llm: Send + Sync {
    /// Run the prompt to completion and return the full text.
    async fn complete(&self, prompt: &str) -> KbResult<Completion>;

    /// Stream the completion token by token.
    async fn stream_complete(&self, prompt: &str) -> KbResult<DeltaStream>;

    /// The model identifier, for logging.
    fn model_id(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_normalizes_to_text() {
        assert_eq!(Delta::Text("a".into()).into_text(), "a");
        assert_eq!(Delta::Struct { text: "b".into() }.into_text(), "b");
        assert_eq!(
            Delta::Raw(serde_json::Value::String("c".into())).into_text(),
            "c"
        );
        assert_eq!(
            Delta::Raw(serde_json::json!({"k": 1})).into_text(),
            r#"{"k":1}"#
        );
    }
}
