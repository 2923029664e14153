//! Display names for connecting players

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::supabase::{SupabaseClient, SupabaseError};

/// User profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub display_name: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Profile store operations
#[derive(Clone)]
pub struct ProfileStore {
    client: SupabaseClient,
}

impl ProfileStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    /// Get a user profile by ID
    pub async fn get_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, SupabaseError> {
        let query = format!("id=eq.{}", user_id);
        self.client.get_one("profiles", &query).await
    }

    /// Name shown to opponents; falls back to a short id when unset
    pub async fn display_name(&self, user_id: Uuid) -> Result<String, SupabaseError> {
        let profile = self.get_profile(user_id).await?;
        Ok(profile
            .and_then(|p| p.display_name)
            .unwrap_or_else(|| fallback_name(user_id)))
    }
}

/// `Player_` plus the first 8 characters of the user id
pub fn fallback_name(user_id: Uuid) -> String {
    format!("Player_{}", &user_id.to_string()[..8])
}
