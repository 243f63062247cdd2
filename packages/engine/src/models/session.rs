use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use super::config::GameConfig;
use super::headline::{Headline, PublicHeadline};
use super::player::{Player, PlayerEntry, PlayerId};
use super::role::{Faction, Role};
use super::round::{FactionScores, RoundResult};
use super::vote::Vote;
use crate::error::GameError;
use crate::services::headline_service::HeadlineSource;

pub type SessionId = String;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    Lobby,            // 参加受付
    RoleAssignment,   // 役職確認
    HeadlineReveal,   // 見出し公開
    Discussion,       // 議論
    Voting,           // 投票
    AccusationWindow, // 告発
    RoundResults,     // 結果発表
    GameEnd,          // ゲーム終了
}

impl GamePhase {
    pub fn is_terminal(self) -> bool {
        self == GamePhase::GameEnd
    }
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinReason {
    FakeHeadlinesTrusted,
    FakeHeadlinesFlagged,
    RoundsExhausted,
    OpponentsSilenced,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GameResult {
    InProgress,
    Won { faction: Faction, reason: WinReason },
    Aborted { reason: String },
    Failed { reason: String },
}

impl GameResult {
    pub fn winner(&self) -> Option<Faction> {
        match self {
            GameResult::Won { faction, .. } => Some(*faction),
            _ => None,
        }
    }
}

/// One running game. Mutated only by the phase machine in
/// `services::game_service`.
pub struct Session {
    pub id: SessionId,
    pub phase: GamePhase,
    pub round: u32,
    pub max_rounds: u32,
    pub players: Vec<Player>,
    pub scores: FactionScores,
    pub fake_trusted: u32,
    pub fake_flagged: u32,
    pub headline: Option<Headline>,
    // 現ラウンドの票（同じプレイヤーの再投票は上書き）
    pub votes: BTreeMap<PlayerId, Vote>,
    pub ready: BTreeSet<PlayerId>,
    pub pending_result: Option<RoundResult>,
    pub results: Vec<RoundResult>,
    pub result: GameResult,
    pub phase_seq: u64,
    pub phase_deadline: Option<DateTime<Utc>>,
    pub headline_failures: u32,
    pub created_at: DateTime<Utc>,
    pub(crate) config: Arc<GameConfig>,
    pub(crate) rng: StdRng,
    pub(crate) headlines: Box<dyn HeadlineSource>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("phase", &self.phase)
            .field("round", &self.round)
            .field("players", &self.players.len())
            .field("result", &self.result)
            .finish()
    }
}

impl Session {
    pub fn new(
        id: SessionId,
        entries: Vec<PlayerEntry>,
        config: Arc<GameConfig>,
        rng: StdRng,
        headlines: Box<dyn HeadlineSource>,
        now: DateTime<Utc>,
    ) -> Self {
        let players = entries
            .into_iter()
            .map(|entry| Player::new(entry, config.starting_reputation))
            .collect();
        Session {
            id,
            phase: GamePhase::Lobby,
            round: 0,
            max_rounds: config.max_rounds,
            players,
            scores: FactionScores::default(),
            fake_trusted: 0,
            fake_flagged: 0,
            headline: None,
            votes: BTreeMap::new(),
            ready: BTreeSet::new(),
            pending_result: None,
            results: Vec::new(),
            result: GameResult::InProgress,
            phase_seq: 0,
            phase_deadline: None,
            headline_failures: 0,
            created_at: now,
            config,
            rng,
            headlines,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    pub fn player_mut(&mut self, player_id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == player_id)
    }

    pub fn require_player(&self, player_id: &str) -> Result<&Player, GameError> {
        self.player(player_id)
            .ok_or_else(|| GameError::UnknownPlayer(player_id.to_string()))
    }

    pub fn active_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.is_active)
    }

    /// Ghosts keep their vote, so every active player is eligible.
    pub fn eligible_voters(&self) -> impl Iterator<Item = &Player> {
        self.active_players()
    }

    pub fn all_eligible_voted(&self) -> bool {
        self.eligible_voters().all(|p| self.votes.contains_key(&p.id))
    }

    /// Players who still hold an unused accusation and have not passed.
    pub fn pending_accusers(&self) -> impl Iterator<Item = &Player> {
        self.active_players()
            .filter(|p| p.has_accusation() && !self.ready.contains(&p.id))
    }

    pub fn all_active_ready(&self) -> bool {
        self.active_players().all(|p| self.ready.contains(&p.id))
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id.clone(),
            phase: self.phase,
            round: self.round,
            max_rounds: self.max_rounds,
            players: self
                .players
                .iter()
                .map(|p| PlayerView {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    reputation: p.reputation,
                    role: p.role,
                    faction: p.faction(),
                    is_active: p.is_active,
                    is_ghost: p.is_ghost(),
                    restricted_through: p.restricted_through,
                    restriction_count: p.restriction_count,
                    accusation_used: p.accusation_used,
                })
                .collect(),
            scores: self.scores,
            fake_trusted: self.fake_trusted,
            fake_flagged: self.fake_flagged,
            headline: self.headline.as_ref().map(PublicHeadline::from),
            votes_cast: self.votes.len(),
            results: self.results.clone(),
            result: self.result.clone(),
            phase_deadline: self.phase_deadline,
            created_at: self.created_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub reputation: u32,
    pub role: Option<Role>,
    pub faction: Option<Faction>,
    pub is_active: bool,
    pub is_ghost: bool,
    pub restricted_through: Option<u32>,
    pub restriction_count: u32,
    pub accusation_used: bool,
}

/// Serialisable view of a session, handed to the archive and to readers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub phase: GamePhase,
    pub round: u32,
    pub max_rounds: u32,
    pub players: Vec<PlayerView>,
    pub scores: FactionScores,
    pub fake_trusted: u32,
    pub fake_flagged: u32,
    pub headline: Option<PublicHeadline>,
    pub votes_cast: usize,
    pub results: Vec<RoundResult>,
    pub result: GameResult,
    pub phase_deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl SessionSnapshot {
    /// Hides roles while the game is still running.
    pub fn redacted(mut self) -> Self {
        if !self.phase.is_terminal() {
            for player in &mut self.players {
                player.role = None;
                player.faction = None;
            }
        }
        self
    }
}
