//! Block-list lookups against the friends/relationships table

use futures::future::BoxFuture;
use uuid::Uuid;

use super::supabase::{SupabaseClient, SupabaseError};
use super::BlockList;

/// Reads `relationships` rows with status `blocked`
#[derive(Clone)]
pub struct RelationshipStore {
    client: SupabaseClient,
}

impl RelationshipStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    pub async fn is_blocked(&self, user_id: Uuid, blocked_id: Uuid) -> Result<bool, SupabaseError> {
        let query = format!(
            "select=user_id&user_id=eq.{}&related_user_id=eq.{}&status=eq.blocked",
            user_id, blocked_id
        );
        let row: Option<serde_json::Value> = self.client.get_one("relationships", &query).await?;
        Ok(row.is_some())
    }
}

impl BlockList for RelationshipStore {
    fn has_blocked(
        &self,
        user_id: Uuid,
        blocked_id: Uuid,
    ) -> BoxFuture<'_, Result<bool, SupabaseError>> {
        Box::pin(self.is_blocked(user_id, blocked_id))
    }
}
