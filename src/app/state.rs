//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::GameConfig;
use crate::lobby::{RegistrySettings, SessionRegistry};
use crate::store::{MatchStore, ProfileStore, RelationshipStore, SupabaseClient};
use crate::ws::hub::ConnectionHub;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub profile_store: ProfileStore,
    pub hub: Arc<ConnectionHub>,
    pub registry: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        // Initialize Supabase client
        let supabase = SupabaseClient::new(&config);

        // Initialize stores
        let profile_store = ProfileStore::new(supabase.clone());
        let relationships = Arc::new(RelationshipStore::new(supabase.clone()));
        let matches = Arc::new(MatchStore::new(supabase));

        let hub = Arc::new(ConnectionHub::new());
        let settings = RegistrySettings {
            max_session_lifetime: config.session_max_lifetime,
            sweep_interval: config.session_sweep_interval,
        };
        let registry = Arc::new(SessionRegistry::new(
            hub.clone(),
            relationships,
            matches,
            GameConfig::default(),
            settings,
        ));

        Self {
            config,
            profile_store,
            hub,
            registry,
        }
    }
}
