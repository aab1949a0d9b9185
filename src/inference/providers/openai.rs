//! OpenAI provider implementation using the Chat Completions API.
//!
//! Streamed chunks carry their text in `choices[0].delta.content` and the
//! stream is closed by a literal `data: [DONE]` line.

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::Sender;

use crate::ProviderId;
use crate::inference::provider::{ensure_success, send_delta};
use crate::inference::sse::{SseLineBuffer, UpstreamEvent};
use crate::inference::{CompletionProvider, CompletionRequest, ProviderError, StreamChunk};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

// ============================================================================
// Chat Completions API Types
// ============================================================================

/// Role in a chat message
#[derive(Serialize, Debug, Clone, Copy)]
#[serde(rename_all = "lowercase")]
enum Role {
    System,
    User,
}

#[derive(Serialize, Debug)]
struct ChatMessage<'a> {
    role: Role,
    content: &'a str,
}

/// The request body for the Chat Completions API
#[derive(Serialize, Debug)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize, Debug)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// One streamed `chat.completion.chunk`, or an in-band error object.
#[derive(Deserialize, Debug)]
struct ChunkEvent {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Deserialize, Debug)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    message: String,
}

/// What one upstream event means for the read loop.
enum Step {
    Continue,
    Finished,
}

// ============================================================================
// Provider Implementation
// ============================================================================

pub struct OpenAiProvider {
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    client: reqwest::Client,
}

impl OpenAiProvider {
    /// Creates a new OpenAI provider.
    ///
    /// # Arguments
    /// * `api_key` - OpenAI API key
    /// * `base_url` - Optional custom base URL (defaults to OpenAI's API)
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

    fn build_request<'a>(&'a self, request: CompletionRequest<'a>, stream: bool) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: vec![
                ChatMessage {
                    role: Role::System,
                    content: request.system_prompt,
                },
                ChatMessage {
                    role: Role::User,
                    content: request.user_message,
                },
            ],
            stream: stream.then_some(true),
        }
    }

    async fn send_request(&self, request: &ChatRequest<'_>) -> Result<reqwest::Response, ProviderError> {
        info!(
            "OpenAI Chat Completions request: model={}, stream={:?}",
            request.model, request.stream
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(request)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        debug!("OpenAI response status: {}", response.status());
        ensure_success(ProviderId::OpenAi, response).await
    }

    async fn handle_event(
        event: UpstreamEvent,
        sender: &Sender<StreamChunk>,
    ) -> Result<Step, ProviderError> {
        if event.data == "[DONE]" {
            debug!("Received [DONE] marker");
            return Ok(Step::Finished);
        }

        let parsed = match serde_json::from_str::<ChunkEvent>(&event.data) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!("Skipping unparseable chunk ({}): {}", e, event.data);
                return Ok(Step::Continue);
            }
        };

        if let Some(error) = parsed.error {
            warn!("OpenAI stream error: {}", error.message);
            return Err(ProviderError::Stream(error.message));
        }

        if let Some(choice) = parsed.choices.into_iter().next() {
            if let Some(content) = choice.delta.content {
                send_delta(sender, content).await?;
            }
            if let Some(reason) = choice.finish_reason {
                debug!("finish_reason: {}", reason);
            }
        }
        Ok(Step::Continue)
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenAi
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, ProviderError> {
        let body = self.build_request(request, false);
        let response = self.send_request(&body).await?;

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Parse("No choices in OpenAI response.".to_string()))?;

        Ok(choice.message.content.unwrap_or_default())
    }

    async fn stream_completion(
        &self,
        request: CompletionRequest<'_>,
        sender: Sender<StreamChunk>,
    ) -> Result<(), ProviderError> {
        let body = self.build_request(request, true);
        let mut response = self.send_request(&body).await?;

        let mut lines = SseLineBuffer::new();

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?
        {
            debug!("Raw chunk received: {} bytes", chunk.len());
            for event in lines.push(&chunk) {
                if let Step::Finished = Self::handle_event(event, &sender).await? {
                    info!("OpenAI stream complete");
                    return Ok(());
                }
            }
        }

        if let Some(event) = lines.finish() {
            Self::handle_event(event, &sender).await?;
        }

        info!("OpenAI stream ended without [DONE] marker");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_puts_system_prompt_first() {
        let provider = OpenAiProvider::new("key".to_string(), None).with_max_tokens(512);
        let request = CompletionRequest {
            system_prompt: "sys",
            user_message: "hello",
        };

        let json = serde_json::to_string(&provider.build_request(request, true)).unwrap();
        assert!(json.contains(
            r#""messages":[{"role":"system","content":"sys"},{"role":"user","content":"hello"}]"#
        ));
        assert!(json.contains(r#""max_tokens":512"#));
        assert!(json.contains(r#""stream":true"#));
    }

    #[test]
    fn test_chunk_event_with_content() {
        let json = r#"{"id":"c1","choices":[{"index":0,"delta":{"content":"Hel"},"finish_reason":null}]}"#;
        let event: ChunkEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.choices[0].delta.content.as_deref(), Some("Hel"));
        assert!(event.error.is_none());
    }

    #[test]
    fn test_chunk_event_role_only_delta() {
        let json = r#"{"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#;
        let event: ChunkEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.choices[0].delta.content, None);
    }

    #[test]
    fn test_one_shot_response_null_content() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        let response: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.choices[0].message.content, None);
    }
}
