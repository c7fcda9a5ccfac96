//! PostgREST-backed conversation store.

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use tracing::{debug, info, warn};

use super::{ConversationPatch, ConversationRow, ConversationStore, StoreError};

/// Store speaking the PostgREST dialect (Supabase-compatible).
pub struct RestConversationStore {
    client: Client,
    base_url: String,
    api_key: String,
    table: String,
}

impl RestConversationStore {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_table(base_url, api_key, "conversations")
    }

    pub fn with_table(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: Client::new(),
            base_url,
            api_key: api_key.into(),
            table: table.into(),
        }
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
    }
}

#[async_trait]
impl ConversationStore for RestConversationStore {
    async fn find_by_room(&self, room_url: &str) -> Result<Option<ConversationRow>, StoreError> {
        let response = self
            .auth(self.client.get(self.table_url()))
            .query(&[("select", "*"), ("room_url", &format!("eq.{room_url}"))])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let mut rows: Vec<ConversationRow> = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        if rows.len() > 1 {
            warn!(
                room_url,
                count = rows.len(),
                "multiple conversation rows for room; using the first"
            );
        }
        debug!(room_url, found = !rows.is_empty(), "conversation lookup");
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.remove(0))
        })
    }

    async fn update(&self, id: i64, patch: ConversationPatch) -> Result<(), StoreError> {
        let response = self
            .auth(self.client.patch(self.table_url()))
            .query(&[("id", format!("eq.{id}"))])
            .header(header::CONTENT_TYPE, "application/json")
            .json(&patch)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() && status != StatusCode::NO_CONTENT {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }

        info!(id, "conversation row updated");
        Ok(())
    }
}
