//! Per-room conversation session state.
//!
//! A session is created when the first participant joins and accumulates
//! the transcript and any contact details the model records through tools.
//! The controller owns the session exclusively; everything here is plain
//! data with serde shapes matching the persistence layer.

use serde::{Deserialize, Serialize};

/// Lifecycle of a conversation.
///
/// ```text
/// Active ──► Ending ──► Ended
///    └────────────────────┘ (participant left: straight to Ended)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Active,
    /// Farewell in flight; termination scheduled after the grace delay.
    Ending,
    Ended,
}

/// Speaker role for a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub role: Role,
    pub content: String,
}

impl TranscriptMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Contact details collected during the call.
///
/// Email and notes are always present when a record exists; the phone
/// number is optional and omitted from the serialized object when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub notes: String,
}

/// In-memory state for one room's conversation.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    pub room_url: String,
    pub status: SessionStatus,
    pub transcript: Vec<TranscriptMessage>,
    pub contact: Option<ContactRecord>,
}

impl ConversationSession {
    pub fn new(room_url: impl Into<String>) -> Self {
        Self {
            room_url: room_url.into(),
            status: SessionStatus::Active,
            transcript: Vec::new(),
            contact: None,
        }
    }

    pub fn push_message(&mut self, message: TranscriptMessage) {
        self.transcript.push(message);
    }

    pub fn record_contact(&mut self, contact: ContactRecord) {
        self.contact = Some(contact);
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }
}
