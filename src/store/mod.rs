//! Data store modules for Supabase integration

pub mod matches;
#[cfg(test)]
pub mod memory;
pub mod profiles;
pub mod relationships;
pub mod supabase;

pub use matches::{MatchRecord, MatchStore};
pub use profiles::ProfileStore;
pub use relationships::RelationshipStore;
pub use supabase::{SupabaseClient, SupabaseError};

use futures::future::BoxFuture;
use uuid::Uuid;

/// Persists finished matches
pub trait MatchRecorder: Send + Sync {
    fn record_match(&self, record: MatchRecord) -> BoxFuture<'_, Result<(), SupabaseError>>;
}

/// Answers "has `user_id` blocked `blocked_id`"
pub trait BlockList: Send + Sync {
    fn has_blocked(
        &self,
        user_id: Uuid,
        blocked_id: Uuid,
    ) -> BoxFuture<'_, Result<bool, SupabaseError>>;
}
