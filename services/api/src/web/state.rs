//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and credential resolution.

use crate::config::Config;
use pettrack_core::domain::ProviderCredentials;
use pettrack_core::ports::{CompletionService, DatabaseService, PortError, PortResult};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub completions: Arc<dyn CompletionService>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Resolves the completion credentials for one request.
    ///
    /// The active key stored by an admin takes precedence, falling back to the
    /// key from the environment. No key at all is a configuration error, and
    /// callers fail the request before touching the catalog.
    pub async fn resolve_credentials(&self) -> PortResult<ProviderCredentials> {
        if let Some(stored) = self.db.get_active_api_key().await? {
            return Ok(ProviderCredentials {
                api_key: stored.key_value,
                model: stored
                    .model
                    .unwrap_or_else(|| self.config.default_model.clone()),
            });
        }

        match &self.config.openrouter_api_key {
            Some(key) => Ok(ProviderCredentials {
                api_key: key.clone(),
                model: self.config.default_model.clone(),
            }),
            None => Err(PortError::Configuration(
                "No completion API key configured".to_string(),
            )),
        }
    }
}
