use std::env;

use super::headline::Difficulty;
use super::session::GamePhase;

/// The rule table never deals fewer than five seats.
pub const ABSOLUTE_MIN_PLAYERS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("max_rounds must be at least 1")]
    NoRounds,
    #[error("min_players must be at least 5, got {0}")]
    TooFewPlayers(usize),
    #[error("max_players ({max}) is below min_players ({min})")]
    PlayerBounds { min: usize, max: usize },
    #[error("accusation round {round} is outside 1..{max_rounds}")]
    AccusationRound { round: u32, max_rounds: u32 },
    #[error("win thresholds must be at least 1")]
    ZeroThreshold,
}

/// Phase time limits in seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseDurations {
    pub lobby_secs: u64,
    pub role_assignment_secs: u64,
    pub headline_reveal_secs: u64,
    pub discussion_secs: u64,
    pub voting_secs: u64,
    pub accusation_secs: u64,
    pub round_results_secs: u64,
}

impl Default for PhaseDurations {
    fn default() -> Self {
        Self {
            lobby_secs: 180,
            role_assignment_secs: 45,
            headline_reveal_secs: 5,
            discussion_secs: 120,
            voting_secs: 45,
            accusation_secs: 60,
            round_results_secs: 15,
        }
    }
}

impl PhaseDurations {
    /// Every phase uses the same limit. Handy for tests and local play.
    pub fn uniform(secs: u64) -> Self {
        Self {
            lobby_secs: secs,
            role_assignment_secs: secs,
            headline_reveal_secs: secs,
            discussion_secs: secs,
            voting_secs: secs,
            accusation_secs: secs,
            round_results_secs: secs,
        }
    }

    pub fn for_phase(&self, phase: GamePhase) -> Option<u64> {
        match phase {
            GamePhase::Lobby => Some(self.lobby_secs),
            GamePhase::RoleAssignment => Some(self.role_assignment_secs),
            GamePhase::HeadlineReveal => Some(self.headline_reveal_secs),
            GamePhase::Discussion => Some(self.discussion_secs),
            GamePhase::Voting => Some(self.voting_secs),
            GamePhase::AccusationWindow => Some(self.accusation_secs),
            GamePhase::RoundResults => Some(self.round_results_secs),
            GamePhase::GameEnd => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GameConfig {
    pub max_rounds: u32,
    pub min_players: usize,
    pub max_players: usize,
    pub starting_reputation: u32,
    // 告発後に発言制限が続くラウンド数
    pub restriction_rounds: u32,
    pub accusation_rounds: Vec<u32>,
    pub deception_win_threshold: u32,
    pub truth_win_threshold: u32,
    pub message_max_len: usize,
    pub headline_difficulty: Difficulty,
    pub headline_category: Option<String>,
    pub headline_retry_limit: u32,
    // 未設定ならエントロピーから生成
    pub rng_seed: Option<u64>,
    pub durations: PhaseDurations,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            max_rounds: 5,
            min_players: ABSOLUTE_MIN_PLAYERS,
            max_players: 12,
            starting_reputation: 3,
            restriction_rounds: 1,
            accusation_rounds: vec![2, 4],
            deception_win_threshold: 3,
            truth_win_threshold: 3,
            message_max_len: 500,
            headline_difficulty: Difficulty::Medium,
            headline_category: None,
            headline_retry_limit: 3,
            rng_seed: None,
            durations: PhaseDurations::default(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

impl GameConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let default_durations = PhaseDurations::default();

        let accusation_rounds = env::var("TRUTHWARS_ACCUSATION_ROUNDS")
            .ok()
            .map(|v| {
                v.split(',')
                    .filter_map(|r| r.trim().parse::<u32>().ok())
                    .collect::<Vec<_>>()
            })
            .unwrap_or(defaults.accusation_rounds);
        let headline_difficulty = env_parse::<Difficulty>("TRUTHWARS_HEADLINE_DIFFICULTY")
            .unwrap_or(defaults.headline_difficulty);
        let headline_category = env::var("TRUTHWARS_HEADLINE_CATEGORY")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let durations = PhaseDurations {
            lobby_secs: env_parse("TRUTHWARS_LOBBY_SECS").unwrap_or(default_durations.lobby_secs),
            role_assignment_secs: env_parse("TRUTHWARS_ROLE_ASSIGNMENT_SECS")
                .unwrap_or(default_durations.role_assignment_secs),
            headline_reveal_secs: env_parse("TRUTHWARS_HEADLINE_REVEAL_SECS")
                .unwrap_or(default_durations.headline_reveal_secs),
            discussion_secs: env_parse("TRUTHWARS_DISCUSSION_SECS")
                .unwrap_or(default_durations.discussion_secs),
            voting_secs: env_parse("TRUTHWARS_VOTING_SECS")
                .unwrap_or(default_durations.voting_secs),
            accusation_secs: env_parse("TRUTHWARS_ACCUSATION_SECS")
                .unwrap_or(default_durations.accusation_secs),
            round_results_secs: env_parse("TRUTHWARS_ROUND_RESULTS_SECS")
                .unwrap_or(default_durations.round_results_secs),
        };

        Self {
            max_rounds: env_parse("TRUTHWARS_MAX_ROUNDS").unwrap_or(defaults.max_rounds),
            min_players: env_parse("TRUTHWARS_MIN_PLAYERS").unwrap_or(defaults.min_players),
            max_players: env_parse("TRUTHWARS_MAX_PLAYERS").unwrap_or(defaults.max_players),
            starting_reputation: env_parse("TRUTHWARS_STARTING_REPUTATION")
                .unwrap_or(defaults.starting_reputation),
            restriction_rounds: env_parse("TRUTHWARS_RESTRICTION_ROUNDS")
                .unwrap_or(defaults.restriction_rounds),
            accusation_rounds,
            deception_win_threshold: env_parse("TRUTHWARS_DECEPTION_WIN_THRESHOLD")
                .unwrap_or(defaults.deception_win_threshold),
            truth_win_threshold: env_parse("TRUTHWARS_TRUTH_WIN_THRESHOLD")
                .unwrap_or(defaults.truth_win_threshold),
            message_max_len: env_parse("TRUTHWARS_MESSAGE_MAX_LEN")
                .unwrap_or(defaults.message_max_len),
            headline_difficulty,
            headline_category,
            headline_retry_limit: env_parse("TRUTHWARS_HEADLINE_RETRY_LIMIT")
                .unwrap_or(defaults.headline_retry_limit),
            rng_seed: env_parse("TRUTHWARS_RNG_SEED"),
            durations,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_rounds == 0 {
            return Err(ConfigError::NoRounds);
        }
        if self.min_players < ABSOLUTE_MIN_PLAYERS {
            return Err(ConfigError::TooFewPlayers(self.min_players));
        }
        if self.max_players < self.min_players {
            return Err(ConfigError::PlayerBounds {
                min: self.min_players,
                max: self.max_players,
            });
        }
        // 最終ラウンドには告発フェーズを置かない
        if let Some(&round) = self
            .accusation_rounds
            .iter()
            .find(|&&r| r == 0 || r >= self.max_rounds)
        {
            return Err(ConfigError::AccusationRound {
                round,
                max_rounds: self.max_rounds,
            });
        }
        if self.deception_win_threshold == 0 || self.truth_win_threshold == 0 {
            return Err(ConfigError::ZeroThreshold);
        }
        Ok(())
    }

    pub fn is_accusation_round(&self, round: u32) -> bool {
        round < self.max_rounds && self.accusation_rounds.contains(&round)
    }
}
