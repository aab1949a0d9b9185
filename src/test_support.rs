//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc::Sender;

use crate::ProviderId;
use crate::core::summary::{ActionItem, Decision, MeetingSummary, Priority};
use crate::inference::provider::send_delta;
use crate::inference::{CompletionProvider, CompletionRequest, ProviderError};
use crate::inference::StreamChunk;

/// A provider that plays back a fixed script instead of calling an API.
pub struct ScriptedProvider {
    id: ProviderId,
    reply: String,
    deltas: Vec<String>,
    failure: Mutex<Option<ProviderError>>,
}

impl ScriptedProvider {
    /// One-shot calls return `reply`; streaming calls send it as a single delta.
    pub fn replying(id: ProviderId, reply: &str) -> Self {
        Self {
            id,
            reply: reply.to_string(),
            deltas: vec![reply.to_string()],
            failure: Mutex::new(None),
        }
    }

    /// Streaming calls send each of `deltas`; one-shot calls return them joined.
    pub fn streaming(id: ProviderId, deltas: &[&str]) -> Self {
        Self {
            id,
            reply: deltas.concat(),
            deltas: deltas.iter().map(|d| d.to_string()).collect(),
            failure: Mutex::new(None),
        }
    }

    /// The first call fails with `error` (after streaming its deltas).
    pub fn failing_with(self, error: ProviderError) -> Self {
        Self {
            failure: Mutex::new(Some(error)),
            ..self
        }
    }

    fn take_failure(&self) -> Option<ProviderError> {
        self.failure.lock().ok().and_then(|mut f| f.take())
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    async fn complete(&self, _request: CompletionRequest<'_>) -> Result<String, ProviderError> {
        match self.take_failure() {
            Some(e) => Err(e),
            None => Ok(self.reply.clone()),
        }
    }

    async fn stream_completion(
        &self,
        _request: CompletionRequest<'_>,
        sender: Sender<StreamChunk>,
    ) -> Result<(), ProviderError> {
        for delta in &self.deltas {
            send_delta(&sender, delta.clone()).await?;
        }
        match self.take_failure() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// A fully populated summary for extraction and comparison tests.
pub fn sample_summary() -> MeetingSummary {
    MeetingSummary {
        summary: "The team agreed to ship the beta on Friday.".to_string(),
        action_items: vec![ActionItem {
            task: "Prepare release notes".to_string(),
            owner: "Dana".to_string(),
            deadline: "Thursday".to_string(),
            priority: Priority::High,
        }],
        decisions: vec![Decision {
            decision: "Ship beta Friday".to_string(),
            rationale: "All blockers closed".to_string(),
            made_by: "Group decision".to_string(),
        }],
        participants: vec!["Dana".to_string(), "Lee".to_string()],
        meeting_type: "Sprint Planning".to_string(),
        key_topics: vec!["release".to_string(), "beta".to_string()],
    }
}

/// The sample summary rendered the way a model would return it.
pub fn sample_summary_json() -> String {
    serde_json::to_string_pretty(&sample_summary()).unwrap_or_default()
}
