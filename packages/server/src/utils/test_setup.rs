use dotenvy::dotenv;
use std::sync::{Arc, Once};
use truthwars_engine::{
    models::headline::Headline,
    services::headline_service::{HeadlineSource, ScriptedHeadlines},
    GameConfig, HeadlineSourceFactory, ManualClock, PhaseDurations, SessionManager,
};

use crate::state::AppState;

static INIT: Once = Once::new();

pub fn setup_test_env() {
    INIT.call_once(|| {
        dotenv().ok();
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// 締め切りが十分長いので、テスト中にタイマーで進むことはない
pub fn test_state(headlines: Vec<Headline>) -> AppState {
    setup_test_env();
    let config = GameConfig {
        rng_seed: Some(42),
        durations: PhaseDurations::uniform(600),
        ..GameConfig::default()
    };
    let factory: HeadlineSourceFactory = Arc::new(move |_seed: u64| -> Box<dyn HeadlineSource> {
        Box::new(ScriptedHeadlines::new(headlines.clone()))
    });
    let manager = SessionManager::new(
        config,
        factory,
        Arc::new(ManualClock::new(chrono::Utc::now())),
    )
    .expect("test config is valid");
    AppState::new(manager)
}
