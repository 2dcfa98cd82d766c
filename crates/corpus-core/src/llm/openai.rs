//! OpenAI-compatible chat completion provider.
//!
//! Drives any `/chat/completions` endpoint (DeepSeek, OpenAI, vLLM, ...)
//! with reqwest, parsing the SSE stream manually.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::{Completion, Delta, DeltaStream, Llm};
use crate::error::{KbError, KbResult};

/// Provider for an OpenAI-compatible chat API.
pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl OpenAiCompatProvider {
    pub fn new(api_base: &str, api_key: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    fn headers(&self) -> KbResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                .map_err(|e| KbError::Llm(format!("invalid api key: {}", e)))?,
        );
        Ok(headers)
    }

    fn request_body(&self, prompt: &str, stream: bool) -> serde_json::Value {
        json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "stream": stream,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

/// Turn one SSE `data:` payload into a delta, or `None` for chunks that
/// carry no content (role prelude, finish marker).
fn parse_chunk(data: &str) -> Option<Delta> {
    let value: serde_json::Value = match serde_json::from_str(data) {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(data = %data, "Unparseable stream chunk");
            return Some(Delta::Raw(serde_json::Value::String(data.to_string())));
        }
    };

    if value["choices"].as_array().is_some_and(|c| c.is_empty()) {
        // Trailing usage-only chunk.
        return None;
    }

    let delta = &value["choices"][0]["delta"];
    if let Some(content) = delta["content"].as_str() {
        if content.is_empty() {
            return None;
        }
        return Some(Delta::Text(content.to_string()));
    }
    if delta.is_object() || value["choices"][0]["finish_reason"].is_string() {
        // Role-only or finish chunk.
        return None;
    }
    Some(Delta::Raw(value))
}

#[async_trait]
impl Llm for OpenAiCompatProvider {
    async fn complete(&self, prompt: &str) -> KbResult<Completion> {
        let response = self
            .client
            .post(self.completions_url())
            .headers(self.headers()?)
            .json(&self.request_body(prompt, false))
            .send()
            .await
            .map_err(|e| KbError::Llm(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(KbError::Llm(format!("completion returned {}: {}", status, body)));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| KbError::Llm(e.to_string()))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();
        Ok(Completion { text })
    }

    async fn stream_complete(&self, prompt: &str) -> KbResult<DeltaStream> {
        let response = self
            .client
            .post(self.completions_url())
            .headers(self.headers()?)
            .json(&self.request_body(prompt, true))
            .send()
            .await
            .map_err(|e| KbError::Llm(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(KbError::Llm(format!("stream returned {}: {}", status, body)));
        }

        let (tx, rx) = mpsc::channel::<KbResult<Delta>>(64);

        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut buffer = String::new();

            'outer: while let Some(chunk_result) = stream.next().await {
                let chunk = match chunk_result {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx.send(Err(KbError::Llm(e.to_string()))).await;
                        break;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                // Process complete SSE events.
                while let Some(event_end) = buffer.find("\n\n") {
                    let event_data = buffer[..event_end].to_string();
                    buffer = buffer[event_end + 2..].to_string();

                    for line in event_data.lines() {
                        let Some(data) = line.strip_prefix("data: ") else {
                            continue;
                        };
                        if data == "[DONE]" {
                            break 'outer;
                        }
                        if let Some(delta) = parse_chunk(data) {
                            if tx.send(Ok(delta)).await.is_err() {
                                // Consumer went away; stop reading.
                                break 'outer;
                            }
                        }
                    }
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_chunk_extracts_content() {
        let data = r#"{"choices":[{"delta":{"content":"Hel"},"index":0}]}"#;
        match parse_chunk(data) {
            Some(Delta::Text(text)) => assert_eq!(text, "Hel"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn parse_chunk_skips_role_and_finish() {
        let role = r#"{"choices":[{"delta":{"role":"assistant"},"index":0}]}"#;
        assert!(parse_chunk(role).is_none());

        let finish = r#"{"choices":[{"delta":{},"finish_reason":"stop","index":0}]}"#;
        assert!(parse_chunk(finish).is_none());
    }

    #[test]
    fn parse_chunk_wraps_unknown_shapes() {
        match parse_chunk("not json at all") {
            Some(Delta::Raw(serde_json::Value::String(s))) => {
                assert_eq!(s, "not json at all")
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
