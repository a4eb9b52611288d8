//! Shared application state handed to every handler and to the auth gate.

use std::sync::Arc;

use crate::{
    clock::Clock,
    config::Config,
    services::{
        key_admin::KeyAdminService,
        key_store::{KeyStore, hash_key},
        rate_limiter::RateLimiter,
    },
    store::{HitLog, KeyRepository},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub key_store: KeyStore,
    pub rate_limiter: RateLimiter,
    pub key_admin: KeyAdminService,
    master_key_hash: Arc<str>,
}

impl AppState {
    /// Wire the services together over the given storage and clock.
    pub fn new(
        config: Config,
        keys: Arc<dyn KeyRepository>,
        hits: Arc<dyn HitLog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let key_store = KeyStore::new(keys, clock.clone());
        let rate_limiter = RateLimiter::new(hits, clock);
        let key_admin = KeyAdminService::new(key_store.clone(), config.rate_limit_per_min);
        let master_key_hash = Arc::from(hash_key(&config.master_api_key));

        Self {
            config: Arc::new(config),
            key_store,
            rate_limiter,
            key_admin,
            master_key_hash,
        }
    }

    /// Digest of the configured master credential.
    pub fn master_key_hash(&self) -> &str {
        &self.master_key_hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{clock::SystemClock, store::MemoryStore};

    #[test]
    fn state_keeps_the_config_it_was_built_from() {
        let store = Arc::new(MemoryStore::new());
        let mut config = Config::new("postgres://localhost/gate", "  master  ");
        config.server_port = 8081;

        let state = AppState::new(config, store.clone(), store, Arc::new(SystemClock));

        assert_eq!(state.config.server_port, 8081);
        assert_eq!(state.master_key_hash(), hash_key("master"));
    }
}
