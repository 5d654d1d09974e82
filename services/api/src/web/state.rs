//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use medassist_core::orchestrator::{
    ConversationOrchestrator, ConversationServices, OrchestratorSettings,
};
use medassist_core::ports::DatabaseService;
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub orchestrator: Arc<ConversationOrchestrator>,
}

impl AppState {
    /// Wires the orchestrator from the configured collaborators.
    pub fn new(config: Arc<Config>, services: ConversationServices) -> Self {
        let settings = orchestrator_settings(&config);
        let db = services.db.clone();
        Self {
            db,
            config,
            orchestrator: Arc::new(ConversationOrchestrator::new(services, settings)),
        }
    }
}

pub fn orchestrator_settings(config: &Config) -> OrchestratorSettings {
    OrchestratorSettings {
        default_model: config.answer_model.clone(),
        allowed_models: config.allowed_models.clone(),
        max_prompt_chars: config.max_prompt_chars,
        quota_policy: config.quota_policy.clone(),
        calendar_offset: config.quota_offset,
        guest_limit: config.guest_query_limit,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use medassist_core::testing::Fakes;
    use std::collections::HashMap;

    /// A config with every required variable set, as the service would load it.
    pub fn config() -> Config {
        let env: HashMap<&str, &str> = [
            ("DATABASE_URL", "postgres://localhost/medassist_test"),
            ("LLM_API_KEY", "sk-test"),
            ("ALLOWED_MODELS", "gpt-4o,gpt-4o-mini"),
        ]
        .into_iter()
        .collect();
        Config::from_lookup(|key| env.get(key).map(|v| v.to_string()))
            .expect("test config loads")
    }

    pub fn app_state(fakes: &Fakes) -> Arc<AppState> {
        Arc::new(AppState::new(Arc::new(config()), fakes.services()))
    }
}
