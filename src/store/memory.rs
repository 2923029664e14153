//! In-memory stand-ins for the Supabase stores, used by tests

use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::HashSet;
use uuid::Uuid;

use super::{BlockList, MatchRecord, MatchRecorder, SupabaseError};

#[derive(Default)]
pub struct MemoryMatchStore {
    records: Mutex<Vec<MatchRecord>>,
    fail: bool,
}

impl MemoryMatchStore {
    /// A store whose writes always fail
    pub fn failing() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn records(&self) -> Vec<MatchRecord> {
        self.records.lock().clone()
    }
}

impl MatchRecorder for MemoryMatchStore {
    fn record_match(&self, record: MatchRecord) -> BoxFuture<'_, Result<(), SupabaseError>> {
        Box::pin(async move {
            if self.fail {
                return Err(SupabaseError::Api {
                    status: 503,
                    body: "unavailable".to_string(),
                });
            }
            self.records.lock().push(record);
            Ok(())
        })
    }
}

#[derive(Default)]
pub struct MemoryBlockList {
    blocked: Mutex<HashSet<(Uuid, Uuid)>>,
}

impl MemoryBlockList {
    pub fn block(&self, user_id: Uuid, blocked_id: Uuid) {
        self.blocked.lock().insert((user_id, blocked_id));
    }
}

impl BlockList for MemoryBlockList {
    fn has_blocked(
        &self,
        user_id: Uuid,
        blocked_id: Uuid,
    ) -> BoxFuture<'_, Result<bool, SupabaseError>> {
        let blocked = self.blocked.lock().contains(&(user_id, blocked_id));
        Box::pin(async move { Ok(blocked) })
    }
}
