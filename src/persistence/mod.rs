//! Conversation persistence.
//!
//! Conversations are rows keyed by room URL in an external PostgREST-style
//! store. The controller reads the row for its room at flush time and
//! patches it by primary key, so a flush against an already-ended or
//! missing row is a no-op rather than an error.

mod memory;
mod rest;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::core::session::{ContactRecord, SessionStatus, TranscriptMessage};

pub use memory::MemoryStore;
pub use rest::RestConversationStore;

/// Errors from the conversation store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("store returned status {status}: {body}")]
    Status {
        status: u16,
        body: String,
    },
    #[error("malformed store response: {0}")]
    Decode(String),
}

/// One persisted conversation row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRow {
    pub id: i64,
    pub room_url: String,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default)]
    pub transcript: Option<Value>,
    #[serde(default)]
    pub contact: Option<Value>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Partial update applied to a row at flush time.
///
/// `None` fields are left untouched by the store.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversationPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SessionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<Vec<TranscriptMessage>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<ContactRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ConversationPatch {
    /// Patch that closes out a conversation with its final state.
    pub fn closing(
        transcript: Vec<TranscriptMessage>,
        contact: Option<ContactRecord>,
    ) -> Self {
        Self {
            status: Some(SessionStatus::Ended),
            transcript: Some(transcript),
            contact,
            updated_at: Some(Utc::now()),
        }
    }

    /// Patch that stores contact details mid-conversation.
    pub fn contact(contact: ContactRecord) -> Self {
        Self {
            contact: Some(contact),
            updated_at: Some(Utc::now()),
            ..Self::default()
        }
    }
}

/// Backing store for conversation rows.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Fetch the row for a room, if one exists.
    async fn find_by_room(&self, room_url: &str) -> Result<Option<ConversationRow>, StoreError>;

    /// Apply a partial update to a row by primary key.
    async fn update(&self, id: i64, patch: ConversationPatch) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_serializes_only_set_fields() {
        let patch = ConversationPatch {
            status: Some(SessionStatus::Ended),
            ..Default::default()
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({"status": "ended"}));
    }

    #[test]
    fn closing_patch_sets_status_and_timestamp() {
        let patch = ConversationPatch::closing(vec![TranscriptMessage::user("bye")], None);
        assert_eq!(patch.status, Some(SessionStatus::Ended));
        assert!(patch.updated_at.is_some());
        assert!(patch.contact.is_none());
        let json = serde_json::to_value(&patch).unwrap();
        assert!(json.get("contact").is_none());
    }

    #[test]
    fn row_tolerates_missing_optional_columns() {
        let row: ConversationRow =
            serde_json::from_str(r#"{"id": 3, "room_url": "https://rooms.example/x"}"#).unwrap();
        assert_eq!(row.id, 3);
        assert_eq!(row.status, SessionStatus::Active);
        assert!(row.transcript.is_none());
    }
}
