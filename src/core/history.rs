//! # Meeting History
//!
//! Saved summaries, keyed by a UUID v4 and an optional owner id. Storage
//! sits behind the [`HistoryStore`] trait; the server receives a store at
//! construction time and never reaches for a global handle.
//!
//! Every operation is scoped to one owner: an entry saved with an owner is
//! only visible under that owner, and an anonymous (`None`) caller only sees
//! anonymous entries.
//!
//! `InMemoryHistoryStore` is the shipped implementation. Entries live for the
//! lifetime of the process.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::ProviderId;
use crate::core::summary::MeetingSummary;

pub const DEFAULT_PAGE_LIMIT: usize = 20;
pub const MAX_PAGE_LIMIT: usize = 100;
const FALLBACK_MEETING_TYPE: &str = "Meeting";

/// How the summary was produced.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SummaryMode {
    #[default]
    Single,
    Compare,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: Uuid,
    /// When the meeting took place (as entered), defaults to creation time.
    pub date: DateTime<Utc>,
    pub meeting_type: String,
    pub provider: ProviderId,
    pub mode: SummaryMode,
    pub char_count: usize,
    pub transcript: String,
    pub summary: MeetingSummary,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
}

impl HistoryEntry {
    fn is_owned_by(&self, owner: Option<&str>) -> bool {
        self.owner_id.as_deref() == owner
    }
}

/// Fields supplied by the caller when saving a summary.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewHistoryEntry {
    pub summary: MeetingSummary,
    pub provider: ProviderId,
    #[serde(default)]
    pub transcript: String,
    #[serde(default)]
    pub mode: SummaryMode,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HistoryPage {
    pub data: Vec<HistoryEntry>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    NotFound(Uuid),
    Storage(String),
}

impl fmt::Display for HistoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryError::NotFound(id) => write!(f, "history entry {id} not found"),
            HistoryError::Storage(msg) => write!(f, "history storage error: {msg}"),
        }
    }
}

impl std::error::Error for HistoryError {}

/// Page number and size after clamping: page ≥ 1, limit in 1..=100.
pub fn normalize_paging(page: Option<usize>, limit: Option<usize>) -> (usize, usize) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit
        .unwrap_or(DEFAULT_PAGE_LIMIT)
        .clamp(1, MAX_PAGE_LIMIT);
    (page, limit)
}

fn meeting_type_of(summary: &MeetingSummary) -> String {
    let meeting_type = summary.meeting_type.trim();
    if meeting_type.is_empty() {
        FALLBACK_MEETING_TYPE.to_string()
    } else {
        meeting_type.to_string()
    }
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn create(&self, entry: NewHistoryEntry, owner: Option<&str>) -> Result<HistoryEntry, HistoryError>;

    /// Newest first.
    async fn list(
        &self,
        owner: Option<&str>,
        page: Option<usize>,
        limit: Option<usize>,
    ) -> Result<HistoryPage, HistoryError>;

    async fn get(&self, id: Uuid, owner: Option<&str>) -> Result<HistoryEntry, HistoryError>;

    /// Replaces the summary; the meeting type is re-derived from it.
    async fn update_summary(
        &self,
        id: Uuid,
        owner: Option<&str>,
        summary: MeetingSummary,
    ) -> Result<HistoryEntry, HistoryError>;

    async fn delete(&self, id: Uuid, owner: Option<&str>) -> Result<(), HistoryError>;
}

/// Process-local store. Entries are kept in insertion order.
#[derive(Default)]
pub struct InMemoryHistoryStore {
    entries: RwLock<Vec<HistoryEntry>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn create(&self, entry: NewHistoryEntry, owner: Option<&str>) -> Result<HistoryEntry, HistoryError> {
        let now = Utc::now();
        let created = HistoryEntry {
            id: Uuid::new_v4(),
            date: entry.date.unwrap_or(now),
            meeting_type: meeting_type_of(&entry.summary),
            provider: entry.provider,
            mode: entry.mode,
            char_count: entry.transcript.chars().count(),
            transcript: entry.transcript,
            summary: entry.summary,
            created_at: now,
            owner_id: owner.map(str::to_string),
        };
        debug!("Saving history entry {} ({})", created.id, created.meeting_type);
        self.entries.write().await.push(created.clone());
        Ok(created)
    }

    async fn list(
        &self,
        owner: Option<&str>,
        page: Option<usize>,
        limit: Option<usize>,
    ) -> Result<HistoryPage, HistoryError> {
        let (page, limit) = normalize_paging(page, limit);
        let entries = self.entries.read().await;
        let owned: Vec<&HistoryEntry> = entries.iter().filter(|e| e.is_owned_by(owner)).collect();
        let data = owned
            .iter()
            .rev()
            .skip((page - 1).saturating_mul(limit))
            .take(limit)
            .map(|e| (*e).clone())
            .collect();
        Ok(HistoryPage {
            data,
            total: owned.len(),
            page,
            limit,
        })
    }

    async fn get(&self, id: Uuid, owner: Option<&str>) -> Result<HistoryEntry, HistoryError> {
        self.entries
            .read()
            .await
            .iter()
            .find(|e| e.id == id && e.is_owned_by(owner))
            .cloned()
            .ok_or(HistoryError::NotFound(id))
    }

    async fn update_summary(
        &self,
        id: Uuid,
        owner: Option<&str>,
        summary: MeetingSummary,
    ) -> Result<HistoryEntry, HistoryError> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .iter_mut()
            .find(|e| e.id == id && e.is_owned_by(owner))
            .ok_or(HistoryError::NotFound(id))?;
        entry.meeting_type = meeting_type_of(&summary);
        entry.summary = summary;
        Ok(entry.clone())
    }

    async fn delete(&self, id: Uuid, owner: Option<&str>) -> Result<(), HistoryError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|e| !(e.id == id && e.is_owned_by(owner)));
        if entries.len() == before {
            return Err(HistoryError::NotFound(id));
        }
        debug!("Deleted history entry {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_summary;

    fn new_entry(meeting_type: &str, transcript: &str) -> NewHistoryEntry {
        NewHistoryEntry {
            summary: MeetingSummary {
                meeting_type: meeting_type.to_string(),
                ..sample_summary()
            },
            provider: ProviderId::Anthropic,
            transcript: transcript.to_string(),
            mode: SummaryMode::Single,
            date: None,
        }
    }

    #[tokio::test]
    async fn test_create_derives_fields() {
        let store = InMemoryHistoryStore::new();
        let entry = store.create(new_entry("Retro", "héllo"), None).await.unwrap();
        assert_eq!(entry.meeting_type, "Retro");
        assert_eq!(entry.char_count, 5);
        assert_eq!(entry.date, entry.created_at);
    }

    #[tokio::test]
    async fn test_blank_meeting_type_falls_back() {
        let store = InMemoryHistoryStore::new();
        let entry = store.create(new_entry("  ", ""), None).await.unwrap();
        assert_eq!(entry.meeting_type, "Meeting");
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_paged() {
        let store = InMemoryHistoryStore::new();
        for name in ["one", "two", "three"] {
            store.create(new_entry(name, ""), None).await.unwrap();
        }

        let first = store.list(None, Some(1), Some(2)).await.unwrap();
        assert_eq!(first.total, 3);
        let types: Vec<&str> = first.data.iter().map(|e| e.meeting_type.as_str()).collect();
        assert_eq!(types, vec!["three", "two"]);

        let second = store.list(None, Some(2), Some(2)).await.unwrap();
        assert_eq!(second.data.len(), 1);
        assert_eq!(second.data[0].meeting_type, "one");
    }

    #[test]
    fn test_normalize_paging_clamps() {
        assert_eq!(normalize_paging(None, None), (1, DEFAULT_PAGE_LIMIT));
        assert_eq!(normalize_paging(Some(0), Some(0)), (1, 1));
        assert_eq!(normalize_paging(Some(3), Some(500)), (3, MAX_PAGE_LIMIT));
    }

    #[tokio::test]
    async fn test_update_summary_rederives_meeting_type() {
        let store = InMemoryHistoryStore::new();
        let entry = store.create(new_entry("Standup", ""), None).await.unwrap();

        let updated = store
            .update_summary(
                entry.id,
                None,
                MeetingSummary {
                    meeting_type: "Client Review".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.meeting_type, "Client Review");
        assert_eq!(store.get(entry.id, None).await.unwrap().meeting_type, "Client Review");
    }

    #[tokio::test]
    async fn test_missing_entries_report_not_found() {
        let store = InMemoryHistoryStore::new();
        let id = Uuid::new_v4();
        assert_eq!(store.get(id, None).await.unwrap_err(), HistoryError::NotFound(id));
        assert_eq!(store.delete(id, None).await.unwrap_err(), HistoryError::NotFound(id));
        assert!(matches!(
            store.update_summary(id, None, MeetingSummary::default()).await,
            Err(HistoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_removes_entry() {
        let store = InMemoryHistoryStore::new();
        let entry = store.create(new_entry("Sync", ""), None).await.unwrap();
        store.delete(entry.id, None).await.unwrap();
        assert_eq!(store.list(None, None, None).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_entries_are_scoped_to_their_owner() {
        let store = InMemoryHistoryStore::new();
        let mine = store.create(new_entry("Mine", ""), Some("user-1")).await.unwrap();
        store.create(new_entry("Anonymous", ""), None).await.unwrap();
        assert_eq!(mine.owner_id.as_deref(), Some("user-1"));

        let page = store.list(Some("user-1"), None, None).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.data[0].meeting_type, "Mine");
        assert_eq!(store.list(None, None, None).await.unwrap().data[0].meeting_type, "Anonymous");

        assert_eq!(store.get(mine.id, None).await.unwrap_err(), HistoryError::NotFound(mine.id));
        assert!(store.get(mine.id, Some("user-2")).await.is_err());
        assert!(store.delete(mine.id, Some("user-2")).await.is_err());
        assert!(store.update_summary(mine.id, None, MeetingSummary::default()).await.is_err());

        store.delete(mine.id, Some("user-1")).await.unwrap();
        assert_eq!(store.list(Some("user-1"), None, None).await.unwrap().total, 0);
    }
}
