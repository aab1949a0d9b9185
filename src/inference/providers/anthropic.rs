//! Anthropic provider implementation using the Messages API.
//!
//! Streaming responses arrive as typed SSE events; only
//! `content_block_delta` events with a `text_delta` carry generated text,
//! and `message_stop` marks the end of the message.

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::Sender;

use crate::ProviderId;
use crate::inference::provider::{ensure_success, send_delta};
use crate::inference::sse::SseLineBuffer;
use crate::inference::{CompletionProvider, CompletionRequest, ProviderError, StreamChunk};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
pub const DEFAULT_MODEL: &str = "claude-3-5-haiku-20241022";
const API_VERSION: &str = "2023-06-01";

// ============================================================================
// Messages API Types
// ============================================================================

#[derive(Serialize, Debug)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

/// The request body for the Messages API
#[derive(Serialize, Debug)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Deserialize, Debug)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

/// Streaming events, discriminated by their embedded `type` field.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    ContentBlockDelta { delta: Delta },
    MessageStop,
    Error { error: ApiError },
    #[serde(other)]
    Unknown,
}

#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Delta {
    TextDelta {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    message: String,
}

// ============================================================================
// Provider Implementation
// ============================================================================

pub struct AnthropicProvider {
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Creates a new Anthropic provider.
    ///
    /// # Arguments
    /// * `api_key` - Anthropic API key
    /// * `base_url` - Optional custom base URL (defaults to Anthropic's API)
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: super::DEFAULT_MAX_TOKENS,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    async fn send_request(
        &self,
        request: &MessagesRequest<'_>,
    ) -> Result<reqwest::Response, ProviderError> {
        info!(
            "Anthropic Messages API request: model={}, stream={:?}",
            request.model, request.stream
        );

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(request)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        debug!("Anthropic response status: {}", response.status());
        ensure_success(ProviderId::Anthropic, response).await
    }

    fn build_request<'a>(
        &'a self,
        request: CompletionRequest<'a>,
        stream: bool,
    ) -> MessagesRequest<'a> {
        MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: request.system_prompt,
            messages: vec![Message {
                role: "user",
                content: request.user_message,
            }],
            stream: stream.then_some(true),
        }
    }
}

#[async_trait]
impl CompletionProvider for AnthropicProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Anthropic
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, ProviderError> {
        let body = self.build_request(request, false);
        let response = self.send_request(&body).await?;

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        parsed
            .content
            .into_iter()
            .find_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .ok_or_else(|| ProviderError::Parse("No text content in Anthropic response.".to_string()))
    }

    async fn stream_completion(
        &self,
        request: CompletionRequest<'_>,
        sender: Sender<StreamChunk>,
    ) -> Result<(), ProviderError> {
        let body = self.build_request(request, true);
        let mut response = self.send_request(&body).await?;

        let mut lines = SseLineBuffer::new();
        let mut chunk_count = 0usize;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?
        {
            debug!("Raw chunk received: {} bytes", chunk.len());
            for event in lines.push(&chunk) {
                let parsed = match serde_json::from_str::<StreamEvent>(&event.data) {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        debug!("Skipping unparseable event data ({}): {}", e, event.data);
                        continue;
                    }
                };

                match parsed {
                    StreamEvent::ContentBlockDelta {
                        delta: Delta::TextDelta { text },
                    } => {
                        chunk_count += 1;
                        send_delta(&sender, text).await?;
                    }
                    StreamEvent::ContentBlockDelta { .. } => {}
                    StreamEvent::MessageStop => {
                        info!("Stream complete: {} chunks", chunk_count);
                        return Ok(());
                    }
                    StreamEvent::Error { error } => {
                        warn!("Anthropic stream error: {}", error.message);
                        return Err(ProviderError::Stream(error.message));
                    }
                    StreamEvent::Unknown => {
                        debug!("Ignoring event type {:?}", event.event_type);
                    }
                }
            }
        }

        info!("Stream ended without message_stop: {} chunks", chunk_count);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization_omits_stream_for_one_shot() {
        let provider = AnthropicProvider::new("key".to_string(), None);
        let request = CompletionRequest {
            system_prompt: "sys",
            user_message: "hello",
        };

        let json = serde_json::to_string(&provider.build_request(request, false)).unwrap();
        assert!(!json.contains("stream"));
        assert!(json.contains(r#""system":"sys""#));
        assert!(json.contains(r#""max_tokens":2048"#));
        assert!(json.contains(r#""messages":[{"role":"user","content":"hello"}]"#));

        let json = serde_json::to_string(&provider.build_request(request, true)).unwrap();
        assert!(json.contains(r#""stream":true"#));
    }

    #[test]
    fn test_text_delta_event_deserializes() {
        let json = r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#;
        let event: StreamEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(
            event,
            StreamEvent::ContentBlockDelta { delta: Delta::TextDelta { ref text } } if text == "Hi"
        ));
    }

    #[test]
    fn test_unrelated_events_deserialize_as_unknown() {
        let json = r#"{"type":"message_start","message":{"id":"msg_1"}}"#;
        let event: StreamEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, StreamEvent::Unknown));

        let json = r#"{"type":"content_block_delta","index":0,"delta":{"type":"input_json_delta","partial_json":"{"}}"#;
        let event: StreamEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(
            event,
            StreamEvent::ContentBlockDelta { delta: Delta::Other }
        ));
    }

    #[test]
    fn test_one_shot_response_skips_non_text_blocks() {
        let json = r#"{"content":[{"type":"tool_use","id":"t"},{"type":"text","text":"{}"}]}"#;
        let response: MessagesResponse = serde_json::from_str(json).unwrap();
        assert!(matches!(response.content[0], ContentBlock::Other));
        assert!(matches!(response.content[1], ContentBlock::Text { ref text } if text == "{}"));
    }
}
