use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::DbPool,
    services::{
        generation::GenerationService, llm::CompletionClient, refinement::RefinementEngine,
        storage::StorageService,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: DbPool,
    pub storage: StorageService,
    pub generation: GenerationService,
    pub refinement: RefinementEngine,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        db: DbPool,
        storage: StorageService,
        llm: Arc<dyn CompletionClient>,
    ) -> Self {
        Self {
            config,
            db,
            storage,
            generation: GenerationService::new(llm.clone()),
            refinement: RefinementEngine::new(llm),
        }
    }
}
