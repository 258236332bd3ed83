//! Application state.

use std::sync::Arc;

use clipqa_models::LockPolicy;
use clipqa_store::RecordStore;

use crate::auth::TokenVerifier;
use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub store: Arc<dyn RecordStore>,
    pub tokens: Arc<TokenVerifier>,
    pub lock_policy: LockPolicy,
}

impl AppState {
    pub fn new(config: ApiConfig, store: Arc<dyn RecordStore>) -> Self {
        let tokens = TokenVerifier::new(&config.jwt_secret, config.jwt_issuer.as_deref());
        Self {
            lock_policy: config.lock_policy(),
            tokens: Arc::new(tokens),
            config,
            store,
        }
    }
}
