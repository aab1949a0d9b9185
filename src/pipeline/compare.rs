//! Dual-provider comparison.
//!
//! The same transcript goes to two providers at once (one-shot, not
//! streamed). Each side settles on its own: a failing provider shows up as an
//! `{error}` member of the response and never affects the other side.

use std::sync::Arc;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::extract::extract;
use crate::ProviderId;
use crate::core::request::{InputType, ValidationError, validate_text};
use crate::core::summary::MeetingSummary;
use crate::inference::{CompletionRequest, ProviderRegistry};

pub const PARSE_FAILURE_MESSAGE: &str = "Failed to parse response as JSON.";

/// Either a summary or an error record, never both.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum CompareOutcome {
    // Listed first so `{"error": ..}` is never read as an empty summary.
    Failed { error: String },
    Summary(MeetingSummary),
}

impl CompareOutcome {
    pub fn summary(&self) -> Option<&MeetingSummary> {
        match self {
            CompareOutcome::Summary(summary) => Some(summary),
            CompareOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            CompareOutcome::Failed { error } => Some(error),
            CompareOutcome::Summary(_) => None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CompareResult {
    pub provider: ProviderId,
    pub result: CompareOutcome,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CompareResponse {
    pub a: CompareResult,
    pub b: CompareResult,
}

pub struct Comparator {
    registry: Arc<ProviderRegistry>,
}

impl Comparator {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }

    /// Validates, then runs both providers concurrently and waits for both.
    /// Only validation can fail the whole call.
    pub async fn compare(
        &self,
        text: &str,
        providers: &[ProviderId],
    ) -> Result<CompareResponse, ValidationError> {
        validate_text(text, "Transcript is too short.")?;
        let &[first, second] = providers else {
            return Err(ValidationError::new("Exactly 2 providers required."));
        };

        let system_prompt = InputType::Transcript.system_prompt();
        let user_message = InputType::Transcript.user_message(text);
        info!("Comparing {} and {}", first, second);

        let (a, b) = tokio::join!(
            self.settle(first, &system_prompt, &user_message),
            self.settle(second, &system_prompt, &user_message),
        );
        Ok(CompareResponse { a, b })
    }

    async fn settle(&self, provider: ProviderId, system_prompt: &str, user_message: &str) -> CompareResult {
        let request = CompletionRequest {
            system_prompt,
            user_message,
        };
        let result = match self.registry.complete(provider, request).await {
            Ok(text) => match extract(&text) {
                Ok(summary) => CompareOutcome::Summary(summary),
                Err(e) => {
                    warn!("{} returned unparseable output: {}", provider, e);
                    CompareOutcome::Failed {
                        error: PARSE_FAILURE_MESSAGE.to_string(),
                    }
                }
            },
            Err(e) => {
                warn!("{} comparison call failed: {}", provider, e);
                CompareOutcome::Failed { error: e.to_string() }
            }
        };
        CompareResult { provider, result }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::ProviderError;
    use crate::test_support::{ScriptedProvider, sample_summary, sample_summary_json};

    fn comparator(registry: ProviderRegistry) -> Comparator {
        Comparator::new(Arc::new(registry))
    }

    const TRANSCRIPT: &str = "Dana: let's ship the beta on Friday. Lee: agreed.";

    #[tokio::test]
    async fn test_failure_of_one_side_leaves_the_other_intact() {
        let registry = ProviderRegistry::new()
            .with_provider(Arc::new(
                ScriptedProvider::replying(ProviderId::Anthropic, "")
                    .failing_with(ProviderError::Api {
                        status: 529,
                        message: "overloaded".into(),
                    }),
            ))
            .with_provider(Arc::new(ScriptedProvider::replying(
                ProviderId::OpenAi,
                &format!("```json\n{}\n```", sample_summary_json()),
            )));

        let response = comparator(registry)
            .compare(TRANSCRIPT, &[ProviderId::Anthropic, ProviderId::OpenAi])
            .await
            .unwrap();

        assert_eq!(response.a.provider, ProviderId::Anthropic);
        assert!(response.a.result.error().unwrap().contains("overloaded"));
        assert_eq!(response.b.result.summary(), Some(&sample_summary()));
    }

    #[tokio::test]
    async fn test_unparseable_output_becomes_parse_failure() {
        let registry = ProviderRegistry::new()
            .with_provider(Arc::new(ScriptedProvider::replying(ProviderId::Gemini, "Sure! Here you go")));

        let response = comparator(registry)
            .compare(TRANSCRIPT, &[ProviderId::Gemini, ProviderId::Gemini])
            .await
            .unwrap();
        assert_eq!(response.a.result.error(), Some(PARSE_FAILURE_MESSAGE));
        assert_eq!(response.b.result.error(), Some(PARSE_FAILURE_MESSAGE));
    }

    #[tokio::test]
    async fn test_unconfigured_provider_is_reported_in_its_slot() {
        let registry = ProviderRegistry::new()
            .with_provider(Arc::new(ScriptedProvider::replying(ProviderId::OpenAi, &sample_summary_json())));

        let response = comparator(registry)
            .compare(TRANSCRIPT, &[ProviderId::OpenAi, ProviderId::Gemini])
            .await
            .unwrap();
        assert!(response.a.result.summary().is_some());
        assert!(response.b.result.error().unwrap().contains("Gemini API key is not configured."));
    }

    #[tokio::test]
    async fn test_validation_fires_before_any_call() {
        // A provider that would fail loudly if it were ever called.
        let registry = ProviderRegistry::new().with_provider(Arc::new(
            ScriptedProvider::replying(ProviderId::OpenAi, "")
                .failing_with(ProviderError::Network("should not be called".into())),
        ));
        let comparator = comparator(registry);

        let err = comparator.compare("hi", &[ProviderId::OpenAi]).await.unwrap_err();
        assert_eq!(err.to_string(), "Transcript is too short.");

        let err = comparator.compare(TRANSCRIPT, &[ProviderId::OpenAi]).await.unwrap_err();
        assert_eq!(err.to_string(), "Exactly 2 providers required.");

        let err = comparator
            .compare(TRANSCRIPT, &[ProviderId::OpenAi; 3])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Exactly 2 providers required.");
    }

    #[test]
    fn test_outcome_json_shapes() {
        let failed = CompareOutcome::Failed { error: "boom".into() };
        assert_eq!(serde_json::to_string(&failed).unwrap(), r#"{"error":"boom"}"#);

        let parsed: CompareOutcome = serde_json::from_str(r#"{"error":"boom"}"#).unwrap();
        assert_eq!(parsed, failed);

        let parsed: CompareOutcome = serde_json::from_str(&sample_summary_json()).unwrap();
        assert_eq!(parsed.summary(), Some(&sample_summary()));
    }
}
