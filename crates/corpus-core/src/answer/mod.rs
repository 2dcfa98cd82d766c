//! RAG answerer: retrieved context + conversation history + localized
//! template, driven through the LLM in blocking or streaming mode.

pub mod lang;

use std::sync::Arc;

use crate::error::KbResult;
use crate::llm::{DeltaStream, Llm};
use crate::retrieve::Retriever;
use crate::types::{QueryRequest, RetrievedChunk};

/// Composes prompts from retrieval results and drives the LLM.
#[derive(Clone)]
pub struct Answerer {
    retriever: Retriever,
    llm: Arc<dyn Llm>,
}

impl Answerer {
    pub fn new(retriever: Retriever, llm: Arc<dyn Llm>) -> Self {
        Self { retriever, llm }
    }

    /// Retrieve context for a query and format it for prompt injection.
    pub async fn generate_context(&self, request: &QueryRequest) -> KbResult<String> {
        let results = self
            .retriever
            .retrieve(
                &request.workspace_id,
                request.knowledge_bases.as_deref(),
                request.query_text(),
                request.top_k,
            )
            .await?;
        tracing::info!(result_count = results.len(), "Generated retrieval context");
        Ok(compose_context(&results))
    }

    /// Answer the query and return the LLM's full text.
    pub async fn answer(&self, request: &QueryRequest) -> KbResult<String> {
        let prompt = self.build_prompt(request).await?;
        let completion = self.llm.complete(&prompt).await?;
        Ok(completion.text)
    }

    /// Answer the query as a lazy sequence of deltas.
    pub async fn stream_answer(&self, request: &QueryRequest) -> KbResult<DeltaStream> {
        let prompt = self.build_prompt(request).await?;
        self.llm.stream_complete(&prompt).await
    }

    async fn build_prompt(&self, request: &QueryRequest) -> KbResult<String> {
        if !lang::is_supported(&request.preferred_language) {
            tracing::warn!(
                language = %request.preferred_language,
                "Unsupported language, defaulting to en"
            );
        }
        let context = self.generate_context(request).await?;
        Ok(lang::render(
            &request.preferred_language,
            &context,
            &request.conversation_history.joined(),
            request.query_text(),
        ))
    }
}

/// `"Relevant information:"` followed by one `[Document i]` block per chunk,
/// in merged order.
pub fn compose_context(results: &[RetrievedChunk]) -> String {
    let mut context = String::from("Relevant information:\n\n");
    for (i, result) in results.iter().enumerate() {
        context.push_str(&format!("[Document {}] {}\n\n", i + 1, result.text));
    }
    context
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str, score: f32) -> RetrievedChunk {
        RetrievedChunk {
            kb_id: "k1".into(),
            text: text.to_string(),
            score,
            metadata: serde_json::Value::Null,
        }
    }

    #[test]
    fn context_blocks_are_numbered_in_order() {
        let context = compose_context(&[chunk("first", 0.9), chunk("second", 0.8)]);
        assert!(context.starts_with("Relevant information:\n\n"));
        assert!(context.contains("[Document 1] first"));
        assert!(context.contains("[Document 2] second"));
        assert!(context.find("[Document 1]").unwrap() < context.find("[Document 2]").unwrap());
    }

    #[test]
    fn empty_results_yield_header_only() {
        assert_eq!(compose_context(&[]), "Relevant information:\n\n");
    }
}
