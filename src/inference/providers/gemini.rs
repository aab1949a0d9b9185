//! Google Gemini provider implementation using the generateContent API.
//!
//! With `alt=sse` every streamed event is a complete `GenerateContentResponse`;
//! the text of a delta is the concatenation of the first candidate's parts.
//! The stream has no explicit end marker, it simply closes.

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::Sender;

use crate::ProviderId;
use crate::inference::provider::{ensure_success, send_delta};
use crate::inference::sse::{SseLineBuffer, UpstreamEvent};
use crate::inference::{CompletionProvider, CompletionRequest, ProviderError, StreamChunk};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

// ============================================================================
// generateContent API Types
// ============================================================================

#[derive(Serialize, Deserialize, Debug, Default)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Serialize, Debug)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize, Debug)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
}

/// The request body for generateContent and streamGenerateContent
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Deserialize, Debug, Default)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug, Default)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    message: String,
}

impl GenerateResponse {
    /// Joins the text parts of the first candidate. None when there is no candidate.
    fn text(self) -> Option<String> {
        let candidate = self.candidates.into_iter().next()?;
        let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
        Some(parts.into_iter().filter_map(|p| p.text).collect())
    }
}

// ============================================================================
// Provider Implementation
// ============================================================================

pub struct GeminiProvider {
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    client: reqwest::Client,
}

impl GeminiProvider {
    /// Creates a new Gemini provider.
    ///
    /// # Arguments
    /// * `api_key` - Google AI Studio API key
    /// * `base_url` - Optional custom base URL (defaults to the public v1beta endpoint)
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

    fn build_request<'a>(&self, request: CompletionRequest<'a>) -> GenerateRequest<'a> {
        GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![RequestPart {
                    text: request.system_prompt,
                }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![RequestPart {
                    text: request.user_message,
                }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: self.max_tokens,
            },
        }
    }

    async fn send_request(
        &self,
        request: &GenerateRequest<'_>,
        stream: bool,
    ) -> Result<reqwest::Response, ProviderError> {
        let url = if stream {
            format!(
                "{}/models/{}:streamGenerateContent?alt=sse",
                self.base_url, self.model
            )
        } else {
            format!("{}/models/{}:generateContent", self.base_url, self.model)
        };
        info!("Gemini request: model={}, stream={}", self.model, stream);

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        debug!("Gemini response status: {}", response.status());
        ensure_success(ProviderId::Gemini, response).await
    }

    async fn handle_event(
        event: UpstreamEvent,
        sender: &Sender<StreamChunk>,
    ) -> Result<(), ProviderError> {
        let parsed = match serde_json::from_str::<GenerateResponse>(&event.data) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!("Skipping unparseable event ({}): {}", e, event.data);
                return Ok(());
            }
        };

        if let Some(error) = parsed.error {
            warn!("Gemini stream error: {}", error.message);
            return Err(ProviderError::Stream(error.message));
        }

        if let Some(text) = parsed.text() {
            send_delta(sender, text).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Gemini
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, ProviderError> {
        let body = self.build_request(request);
        let response = self.send_request(&body, false).await?;

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        parsed
            .text()
            .ok_or_else(|| ProviderError::Parse("No candidates in Gemini response.".to_string()))
    }

    async fn stream_completion(
        &self,
        request: CompletionRequest<'_>,
        sender: Sender<StreamChunk>,
    ) -> Result<(), ProviderError> {
        let body = self.build_request(request);
        let mut response = self.send_request(&body, true).await?;

        let mut lines = SseLineBuffer::new();
        let mut event_count = 0usize;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?
        {
            debug!("Raw chunk received: {} bytes", chunk.len());
            for event in lines.push(&chunk) {
                event_count += 1;
                Self::handle_event(event, &sender).await?;
            }
        }

        if let Some(event) = lines.finish() {
            event_count += 1;
            Self::handle_event(event, &sender).await?;
        }

        info!("Gemini stream ended: {} events", event_count);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization_uses_camel_case() {
        let provider = GeminiProvider::new("key".to_string(), None);
        let request = CompletionRequest {
            system_prompt: "sys",
            user_message: "hello",
        };

        let json = serde_json::to_string(&provider.build_request(request)).unwrap();
        assert!(json.contains(r#""systemInstruction":{"parts":[{"text":"sys"}]}"#));
        assert!(json.contains(r#""contents":[{"role":"user","parts":[{"text":"hello"}]}]"#));
        assert!(json.contains(r#""generationConfig":{"maxOutputTokens":2048}"#));
    }

    #[test]
    fn test_response_text_joins_parts() {
        let json = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hel"},{"text":"lo"}]}}]}"#;
        let response: GenerateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.text().as_deref(), Some("Hello"));
    }

    #[test]
    fn test_response_without_candidates_has_no_text() {
        let json = r#"{"usageMetadata":{"promptTokenCount":3}}"#;
        let response: GenerateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.text(), None);
    }

    #[test]
    fn test_candidate_without_content_yields_empty_text() {
        let json = r#"{"candidates":[{"finishReason":"STOP"}]}"#;
        let response: GenerateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.text().as_deref(), Some(""));
    }
}
