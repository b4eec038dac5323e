//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use florescer_core::personalization::Personalizer;
use florescer_core::ports::{AccountRepository, MessageGenerationService, ProfileStore};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<dyn AccountRepository>,
    pub profiles: Arc<dyn ProfileStore>,
    /// The raw generator, used by the generate-message function.
    pub generator: Arc<dyn MessageGenerationService>,
    /// The generator wrapped with static fallbacks, used by the app-facing endpoints.
    pub personalizer: Personalizer,
}

impl AppState {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        profiles: Arc<dyn ProfileStore>,
        generator: Arc<dyn MessageGenerationService>,
    ) -> Self {
        Self {
            accounts,
            profiles,
            personalizer: Personalizer::new(generator.clone()),
            generator,
        }
    }
}
