//! In-process conversation store for tests and dry runs.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::to_value;

use super::{ConversationPatch, ConversationRow, ConversationStore, StoreError};

/// Map-backed store with the same semantics as the REST store.
#[derive(Default)]
pub struct MemoryStore {
    rows: RwLock<Vec<ConversationRow>>,
    update_count: RwLock<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a row, returning its id.
    pub fn insert(&self, room_url: impl Into<String>) -> i64 {
        let mut rows = self.rows.write();
        let id = rows.len() as i64 + 1;
        rows.push(ConversationRow {
            id,
            room_url: room_url.into(),
            status: Default::default(),
            transcript: None,
            contact: None,
            updated_at: None,
        });
        id
    }

    pub fn get(&self, id: i64) -> Option<ConversationRow> {
        self.rows.read().iter().find(|r| r.id == id).cloned()
    }

    /// Number of updates applied, for asserting flush-once behaviour.
    pub fn update_count(&self) -> usize {
        *self.update_count.read()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn find_by_room(&self, room_url: &str) -> Result<Option<ConversationRow>, StoreError> {
        Ok(self
            .rows
            .read()
            .iter()
            .find(|r| r.room_url == room_url)
            .cloned())
    }

    async fn update(&self, id: i64, patch: ConversationPatch) -> Result<(), StoreError> {
        let mut rows = self.rows.write();
        if let Some(row) = rows.iter_mut().find(|r| r.id == id) {
            if let Some(status) = patch.status {
                row.status = status;
            }
            if let Some(transcript) = patch.transcript {
                row.transcript =
                    Some(to_value(transcript).map_err(|e| StoreError::Decode(e.to_string()))?);
            }
            if let Some(contact) = patch.contact {
                row.contact =
                    Some(to_value(contact).map_err(|e| StoreError::Decode(e.to_string()))?);
            }
            if patch.updated_at.is_some() {
                row.updated_at = patch.updated_at;
            }
        }
        *self.update_count.write() += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::{SessionStatus, TranscriptMessage};

    #[tokio::test]
    async fn lookup_by_room_url() {
        let store = MemoryStore::new();
        store.insert("https://rooms.example/a");
        let row = store.find_by_room("https://rooms.example/a").await.unwrap();
        assert!(row.is_some());
        assert!(store.find_by_room("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn patch_applies_only_set_fields() {
        let store = MemoryStore::new();
        let id = store.insert("room");

        store
            .update(
                id,
                ConversationPatch::closing(vec![TranscriptMessage::user("bye")], None),
            )
            .await
            .unwrap();

        let row = store.get(id).unwrap();
        assert_eq!(row.status, SessionStatus::Ended);
        assert!(row.transcript.is_some());
        assert!(row.contact.is_none());
        assert!(row.updated_at.is_some());
        assert_eq!(store.update_count(), 1);
    }
}
