//! Exporting action items to an issue tracker.
//!
//! The core knows nothing about a particular tracker's fields: an
//! [`IssueTracker`] takes one action item plus the meeting type and answers
//! with the URL of whatever it created, and can move an issue it created to
//! a new status. Connected trackers are held in a [`TrackerRegistry`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::core::summary::ActionItem;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerError {
    NothingToExport,
    NotConnected(String),
    Rejected(String),
}

impl fmt::Display for TrackerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerError::NothingToExport => write!(f, "No action items to export."),
            TrackerError::NotConnected(tracker) => write!(f, "{tracker} is not connected."),
            TrackerError::Rejected(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for TrackerError {}

#[async_trait]
pub trait IssueTracker: Send + Sync {
    fn name(&self) -> &str;

    /// Creates one issue and returns its URL.
    async fn create_item(&self, item: &ActionItem, meeting_type: &str) -> Result<String, TrackerError>;

    /// Moves an existing issue, by the tracker's own id, to `status`.
    async fn transition_status(&self, external_id: &str, status: &str) -> Result<(), TrackerError>;
}

/// Trackers the server can export to, keyed by lowercase name.
#[derive(Default, Clone)]
pub struct TrackerRegistry {
    trackers: HashMap<String, Arc<dyn IssueTracker>>,
}

impl TrackerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tracker: Arc<dyn IssueTracker>) {
        self.trackers.insert(tracker.name().to_lowercase(), tracker);
    }

    pub fn with_tracker(mut self, tracker: Arc<dyn IssueTracker>) -> Self {
        self.register(tracker);
        self
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn IssueTracker>, TrackerError> {
        self.trackers
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| TrackerError::NotConnected(name.to_string()))
    }

}

/// Per-item result: `url` on success, `error` otherwise.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ExportOutcome {
    pub task: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Exports every item in order. A failing item is recorded and the rest
/// are still attempted.
pub async fn export_action_items(
    tracker: &dyn IssueTracker,
    items: &[ActionItem],
    meeting_type: &str,
) -> Result<Vec<ExportOutcome>, TrackerError> {
    if items.is_empty() {
        return Err(TrackerError::NothingToExport);
    }

    let mut outcomes = Vec::with_capacity(items.len());
    for item in items {
        let outcome = match tracker.create_item(item, meeting_type).await {
            Ok(url) => ExportOutcome {
                task: item.task.clone(),
                url: Some(url),
                error: None,
            },
            Err(e) => {
                warn!("{}: failed to export {:?}: {}", tracker.name(), item.task, e);
                ExportOutcome {
                    task: item.task.clone(),
                    url: None,
                    error: Some(e.to_string()),
                }
            }
        };
        outcomes.push(outcome);
    }

    let exported = outcomes.iter().filter(|o| o.url.is_some()).count();
    info!("{}: exported {}/{} action items", tracker.name(), exported, items.len());
    Ok(outcomes)
}

/// Pushes a status change to the tracker. A failure is logged and reported
/// as `false`; it never fails the caller's own update.
pub async fn sync_status(tracker: &dyn IssueTracker, external_id: &str, status: &str) -> bool {
    match tracker.transition_status(external_id, status).await {
        Ok(()) => {
            info!("{}: {} moved to {:?}", tracker.name(), external_id, status);
            true
        }
        Err(e) => {
            warn!("{}: failed to sync status of {}: {}", tracker.name(), external_id, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Rejects any task containing "fail" and any status but "done"; records
    /// what it was asked to do.
    #[derive(Default)]
    struct FakeTracker {
        created: Mutex<Vec<String>>,
        transitions: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl IssueTracker for FakeTracker {
        fn name(&self) -> &str {
            "fake"
        }

        async fn create_item(&self, item: &ActionItem, meeting_type: &str) -> Result<String, TrackerError> {
            if item.task.contains("fail") {
                return Err(TrackerError::Rejected("title rejected".into()));
            }
            let mut created = self.created.lock().unwrap();
            created.push(format!("[{meeting_type}] {}", item.task));
            Ok(format!("https://tracker.test/issue/{}", created.len()))
        }

        async fn transition_status(&self, external_id: &str, status: &str) -> Result<(), TrackerError> {
            if status != "done" {
                return Err(TrackerError::Rejected(format!("no transition to {status}")));
            }
            self.transitions
                .lock()
                .unwrap()
                .push((external_id.to_string(), status.to_string()));
            Ok(())
        }
    }

    fn item(task: &str) -> ActionItem {
        ActionItem {
            task: task.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_export_continues_past_failures() {
        let tracker = FakeTracker::default();
        let items = [item("Write notes"), item("This will fail"), item("Book room")];

        let outcomes = export_action_items(&tracker, &items, "Retro").await.unwrap();

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].url.as_deref(), Some("https://tracker.test/issue/1"));
        assert_eq!(outcomes[1].error.as_deref(), Some("title rejected"));
        assert_eq!(outcomes[2].url.as_deref(), Some("https://tracker.test/issue/2"));
        assert_eq!(
            *tracker.created.lock().unwrap(),
            vec!["[Retro] Write notes", "[Retro] Book room"]
        );
    }

    #[tokio::test]
    async fn test_empty_export_is_rejected() {
        let tracker = FakeTracker::default();
        let err = export_action_items(&tracker, &[], "Retro").await.unwrap_err();
        assert_eq!(err, TrackerError::NothingToExport);
    }

    #[test]
    fn test_outcome_serializes_only_the_relevant_field() {
        let outcome = ExportOutcome {
            task: "t".into(),
            url: None,
            error: Some("e".into()),
        };
        assert_eq!(serde_json::to_string(&outcome).unwrap(), r#"{"task":"t","error":"e"}"#);
    }

    #[tokio::test]
    async fn test_sync_status_reports_failure_without_raising() {
        let tracker = FakeTracker::default();
        assert!(sync_status(&tracker, "ENG-7", "done").await);
        assert!(!sync_status(&tracker, "ENG-8", "archived").await);
        assert_eq!(
            *tracker.transitions.lock().unwrap(),
            vec![("ENG-7".to_string(), "done".to_string())]
        );
    }

    #[test]
    fn test_registry_lookup_is_case_insensitive() {
        let registry = TrackerRegistry::new().with_tracker(Arc::new(FakeTracker::default()));
        assert_eq!(registry.get("Fake").unwrap().name(), "fake");
        assert_eq!(
            registry.get("jira").err(),
            Some(TrackerError::NotConnected("jira".into()))
        );
        assert_eq!(
            TrackerError::NotConnected("jira".into()).to_string(),
            "jira is not connected."
        );
    }
}
