use chrono::Utc;
use dotenvy::dotenv;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{Arc, Once};

use crate::models::config::{GameConfig, PhaseDurations};
use crate::models::headline::{Difficulty, Headline};
use crate::models::player::PlayerEntry;
use crate::models::role::Role;
use crate::models::session::Session;
use crate::services::headline_service::ScriptedHeadlines;

static INIT: Once = Once::new();

pub fn setup_test_env() {
    INIT.call_once(|| {
        dotenv().ok();
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

pub fn test_config() -> GameConfig {
    GameConfig {
        rng_seed: Some(42),
        durations: PhaseDurations::uniform(30),
        ..GameConfig::default()
    }
}

pub fn test_headline(id: &str, is_true: bool) -> Headline {
    Headline {
        id: id.to_string(),
        text: format!("Headline {}", id),
        is_true,
        difficulty: Difficulty::Medium,
        category: "general".to_string(),
        explanation: None,
    }
}

pub fn player_entries(n: usize) -> Vec<PlayerEntry> {
    (1..=n)
        .map(|i| PlayerEntry::new(format!("p{}", i), format!("Player {}", i)))
        .collect()
}

/// Lobby session with players `p1..pn`, fed by a scripted headline queue.
pub fn session_with_players(n: usize, headlines: Vec<Headline>) -> Session {
    Session::new(
        "test-session".to_string(),
        player_entries(n),
        Arc::new(test_config()),
        StdRng::seed_from_u64(42),
        Box::new(ScriptedHeadlines::new(headlines)),
        Utc::now(),
    )
}

/// Session whose players `p1..pn` hold `roles` in order.
pub fn session_with_roles(roles: &[Role]) -> Session {
    let headlines = (1..=10)
        .map(|i| test_headline(&format!("t{}", i), i % 2 == 0))
        .collect();
    let mut session = session_with_players(roles.len(), headlines);
    for (player, role) in session.players.iter_mut().zip(roles) {
        player.role = Some(*role);
    }
    session
}
