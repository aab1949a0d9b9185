//! HTTP client for a running MinutAI server.
//!
//! `summarize` consumes the event stream the way a browser would: raw body
//! chunks go through a [`FrameDecoder`], chunk events grow a local
//! [`StreamState`] (for progress display), and the `done` text is extracted
//! into a [`MeetingSummary`].

use std::fmt;

use log::{debug, warn};
use serde::Serialize;

use crate::ProviderId;
use crate::core::request::InputType;
use crate::core::summary::MeetingSummary;
use crate::pipeline::{
    CompareResponse, ExtractionError, FrameDecoder, StreamState, WireError, WireEvent, extract,
};
use crate::server::ErrorBody;

#[derive(Debug)]
pub enum ClientError {
    Http(reqwest::Error),
    /// The server refused the request before streaming began.
    Rejected { status: u16, message: String },
    /// The server reported a failure mid-stream.
    Stream(String),
    Wire(WireError),
    Extraction(ExtractionError),
    /// The body ended without a `done` or `error` event.
    Incomplete,
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Http(e) => write!(f, "request failed: {e}"),
            ClientError::Rejected { status, message } => write!(f, "{message} (HTTP {status})"),
            ClientError::Stream(msg) => write!(f, "{msg}"),
            ClientError::Wire(e) => write!(f, "{e}"),
            ClientError::Extraction(e) => write!(f, "could not read summary: {e}"),
            ClientError::Incomplete => write!(f, "stream ended before completion"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Http(e)
    }
}

impl From<WireError> for ClientError {
    fn from(e: WireError) -> Self {
        ClientError::Wire(e)
    }
}

impl From<ExtractionError> for ClientError {
    fn from(e: ExtractionError) -> Self {
        ClientError::Extraction(e)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SummarizeBody<'a> {
    text: &'a str,
    provider: ProviderId,
    input_type: InputType,
}

#[derive(Serialize)]
struct CompareBody<'a> {
    text: &'a str,
    providers: [ProviderId; 2],
}

pub struct SummaryClient {
    base_url: String,
    http: reqwest::Client,
}

impl SummaryClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Streams a summary, calling `on_progress` after every chunk and once
    /// more on completion.
    pub async fn summarize<F>(
        &self,
        text: &str,
        provider: ProviderId,
        input_type: InputType,
        mut on_progress: F,
    ) -> Result<MeetingSummary, ClientError>
    where
        F: FnMut(&StreamState),
    {
        let body = SummarizeBody {
            text,
            provider,
            input_type,
        };
        let mut response = self
            .http
            .post(format!("{}/api/summarize", self.base_url))
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        let mut decoder = FrameDecoder::new();
        let mut state = StreamState::new();

        while let Some(bytes) = response.chunk().await? {
            for event in decoder.push(&bytes) {
                match event? {
                    WireEvent::Chunk(text) => {
                        state.append(&text);
                        on_progress(&state);
                    }
                    WireEvent::Done(full) => {
                        if full != state.text() {
                            warn!("Final text differs from the streamed chunks");
                        }
                        state.complete();
                        on_progress(&state);
                        debug!("Summary stream complete ({} bytes)", full.len());
                        return Ok(extract(&full)?);
                    }
                    WireEvent::Error(message) => return Err(ClientError::Stream(message)),
                }
            }
        }

        decoder.finish()?;
        Err(ClientError::Incomplete)
    }

    pub async fn compare(
        &self,
        text: &str,
        providers: [ProviderId; 2],
    ) -> Result<CompareResponse, ClientError> {
        let response = self
            .http
            .post(format!("{}/api/compare", self.base_url))
            .json(&CompareBody { text, providers })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        Ok(response.json().await?)
    }
}

/// Reads the `{statusCode, message}` body of an error response, falling back
/// to the raw text.
async fn rejection(response: reqwest::Response) -> ClientError {
    let status = response.status().as_u16();
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.message)
        .unwrap_or(text);
    ClientError::Rejected { status, message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalized() {
        let client = SummaryClient::new("http://127.0.0.1:3000/");
        assert_eq!(client.base_url, "http://127.0.0.1:3000");
    }

    #[test]
    fn test_request_bodies() {
        let body = SummarizeBody {
            text: "notes",
            provider: ProviderId::OpenAi,
            input_type: InputType::FreeNotes,
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"text":"notes","provider":"openai","inputType":"free-notes"}"#
        );

        let body = CompareBody {
            text: "t",
            providers: [ProviderId::Anthropic, ProviderId::Gemini],
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"text":"t","providers":["anthropic","gemini"]}"#
        );
    }

    #[test]
    fn test_rejection_display() {
        let err = ClientError::Rejected {
            status: 400,
            message: "Text is too short.".into(),
        };
        assert_eq!(err.to_string(), "Text is too short. (HTTP 400)");
    }
}
