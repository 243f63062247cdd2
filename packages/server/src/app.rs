use axum::Router;
use std::sync::Arc;
use truthwars_engine::{
    services::headline_service::bundled_catalog, GameConfig, HeadlineDeck, SessionManager,
    SystemClock,
};

use crate::routes;
use crate::state::AppState;

/// 同梱の見出しカタログと実時計でマネージャーを組み立てる
pub fn build_manager(config: GameConfig) -> anyhow::Result<SessionManager> {
    let catalog = bundled_catalog()?;
    let manager = SessionManager::new(config, HeadlineDeck::factory(catalog), Arc::new(SystemClock))?;
    Ok(manager)
}

pub fn create_app(state: AppState) -> Router {
    routes::create_routes(state)
}
