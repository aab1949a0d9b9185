use std::fmt;

use async_trait::async_trait;
use log::warn;
use tokio::sync::mpsc::Sender;

use super::types::{StreamChunk, TokenDelta};
use crate::ProviderId;

/// Errors that can occur during provider operations.
#[derive(Debug)]
pub enum ProviderError {
    /// Provider misconfigured (missing API key, bad URL). Raised before any network call.
    Config(String),
    /// Network-level failure (timeout, DNS, connection refused).
    Network(String),
    /// API returned an error response.
    Api { status: u16, message: String },
    /// Failed to parse the provider's response.
    Parse(String),
    /// The provider reported an error inside an otherwise successful stream.
    Stream(String),
    /// The mpsc channel was closed (the consumer went away).
    ChannelClosed,
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Config(msg) => write!(f, "config error: {msg}"),
            ProviderError::Network(msg) => write!(f, "network error: {msg}"),
            ProviderError::Api { status, message } => {
                write!(f, "API error (HTTP {status}): {message}")
            }
            ProviderError::Parse(msg) => write!(f, "parse error: {msg}"),
            ProviderError::Stream(msg) => write!(f, "stream error: {msg}"),
            ProviderError::ChannelClosed => write!(f, "channel closed"),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Everything a provider needs to fulfill a completion request.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub system_prompt: &'a str,
    pub user_message: &'a str,
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Which service this provider talks to.
    fn id(&self) -> ProviderId;

    /// Requests a full completion and returns the generated text in one piece.
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, ProviderError>;

    /// Streams a completion, sending each text delta to the provided channel.
    ///
    /// Returning `Ok(())` means the upstream stream ended normally.
    async fn stream_completion(
        &self,
        request: CompletionRequest<'_>,
        sender: Sender<StreamChunk>,
    ) -> Result<(), ProviderError>;
}

/// Rejects non-2xx responses, carrying the upstream body as the message.
pub(crate) async fn ensure_success(
    provider: ProviderId,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let err_body = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());
    warn!("{} API error: {} - {}", provider.label(), status, err_body);
    Err(ProviderError::Api {
        status,
        message: err_body,
    })
}

/// Forwards one normalized delta. Empty deltas are dropped here so no
/// provider ever emits them.
pub(crate) async fn send_delta(
    sender: &Sender<StreamChunk>,
    text: String,
) -> Result<(), ProviderError> {
    if text.is_empty() {
        return Ok(());
    }
    if sender
        .send(StreamChunk::Delta(TokenDelta { text }))
        .await
        .is_err()
    {
        warn!("Delta send failed: receiver dropped");
        return Err(ProviderError::ChannelClosed);
    }
    Ok(())
}
