//! Concrete data-collection jobs.
//!
//! Each module implements one [`quarry_engine::JobHandler`]: government
//! press releases with LLM entity extraction, the consolidated screening
//! list, its entity conversion, the university risk tracker, and the
//! flagger's scholarly-entity resolution.

pub mod ai;
pub mod entities;
pub mod flagger;
pub mod http;
pub mod press;
pub mod sanctions;
pub mod unitracker;

use std::sync::Arc;

use quarry_engine::HandlerRegistry;

use crate::ai::ChatModel;
use crate::flagger::EntitySearch;

/// Register every shipped handler under its plan name.
pub fn register_all(
    registry: &mut HandlerRegistry,
    chat: Arc<dyn ChatModel>,
    search: Arc<dyn EntitySearch>,
) {
    registry.register("press_releases", Arc::new(press::PressReleasesJob::new(chat)));
    registry.register("sanctions", Arc::new(sanctions::SanctionsJob::new()));
    registry.register("sanction_entities", Arc::new(entities::SanctionEntitiesJob));
    registry.register("unitracker", Arc::new(unitracker::UnitrackerJob::new()));
    registry.register("flagger", Arc::new(flagger::FlaggerJob::new(search)));
}
