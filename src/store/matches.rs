//! Finished-match records

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::ws::protocol::SessionMode;

use super::supabase::{SupabaseClient, SupabaseError};
use super::MatchRecorder;

/// One finished match. Written exactly once, when a player reaches the max score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchRecord {
    pub player1_id: Uuid,
    pub player2_id: Uuid,
    pub player1_score: u32,
    pub player2_score: u32,
    pub winner_id: Option<Uuid>,
    pub loser_id: Option<Uuid>,
    pub mode: SessionMode,
}

#[derive(Debug, Deserialize)]
struct StoredMatch {
    id: Uuid,
}

#[derive(Clone)]
pub struct MatchStore {
    client: SupabaseClient,
}

impl MatchStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    pub async fn create_match(&self, record: MatchRecord) -> Result<Uuid, SupabaseError> {
        let stored: StoredMatch = self.client.insert("matches", &record).await?;
        info!(match_id = %stored.id, winner = ?record.winner_id, "Match record stored");
        Ok(stored.id)
    }
}

impl MatchRecorder for MatchStore {
    fn record_match(&self, record: MatchRecord) -> BoxFuture<'_, Result<(), SupabaseError>> {
        Box::pin(async move {
            self.create_match(record).await?;
            Ok(())
        })
    }
}
