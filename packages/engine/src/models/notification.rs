use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::headline::PublicHeadline;
use super::player::PlayerId;
use super::role::{Faction, Role};
use super::round::{FactionScores, RoundResult};
use super::session::{GamePhase, GameResult, SessionId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "player_id", rename_all = "snake_case")]
pub enum Audience {
    All,
    Player(PlayerId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleReveal {
    pub player_id: PlayerId,
    pub role: Role,
    pub faction: Faction,
    pub reputation: u32,
}

/// Outbound events for the presentation layer. Each carries only what is
/// needed to render it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "message_type", rename_all = "snake_case")]
pub enum GameEvent {
    SessionCreated {
        players: Vec<PlayerId>,
    },
    PlayerJoined {
        player_id: PlayerId,
        name: String,
    },
    PlayerLeft {
        player_id: PlayerId,
    },
    PhaseChanged {
        from_phase: GamePhase,
        to_phase: GamePhase,
        round: u32,
        deadline: Option<DateTime<Utc>>,
    },
    RoleAssigned {
        player_id: PlayerId,
        role: Role,
        faction: Faction,
    },
    RoundStarted {
        round: u32,
        headline: PublicHeadline,
    },
    TruthHint {
        player_id: PlayerId,
        round: u32,
        headline_id: String,
        is_true: bool,
    },
    InfoWithheld {
        player_id: PlayerId,
        round: u32,
    },
    HeadlineSwapped {
        round: u32,
        headline: PublicHeadline,
    },
    MessagePosted {
        player_id: PlayerId,
        text: String,
        counted: bool,
    },
    VoteRecorded {
        round: u32,
        player_id: PlayerId,
        replaced: bool,
    },
    AccusationResolved {
        round: u32,
        accuser_id: PlayerId,
        target_id: PlayerId,
        success: bool,
    },
    PlayerRestricted {
        player_id: PlayerId,
        through_round: u32,
    },
    RestrictionLifted {
        player_id: PlayerId,
        round: u32,
    },
    PlayerBecameGhost {
        player_id: PlayerId,
        round: u32,
    },
    RoundResolved {
        result: RoundResult,
    },
    RoundAborted {
        round: u32,
        reason: String,
    },
    GameEnded {
        result: GameResult,
        scores: FactionScores,
        fake_trusted: u32,
        fake_flagged: u32,
        roles: Vec<RoleReveal>,
    },
    SessionFailed {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub session_id: SessionId,
    pub audience: Audience,
    pub event: GameEvent,
}

impl Notification {
    pub fn public(session_id: &str, event: GameEvent) -> Self {
        Notification {
            session_id: session_id.to_string(),
            audience: Audience::All,
            event,
        }
    }

    pub fn private(session_id: &str, player_id: &str, event: GameEvent) -> Self {
        Notification {
            session_id: session_id.to_string(),
            audience: Audience::Player(player_id.to_string()),
            event,
        }
    }

    pub fn is_visible_to(&self, player_id: &str) -> bool {
        match &self.audience {
            Audience::All => true,
            Audience::Player(id) => id == player_id,
        }
    }
}
