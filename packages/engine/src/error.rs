use serde::{Deserialize, Serialize};

use crate::models::session::GamePhase;

/// Coarse classification used by callers to decide how to report a
/// rejected action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    State,
    Eligibility,
    Resource,
    Upstream,
    Integrity,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("at least {required} players are required, got {actual}")]
    InsufficientPlayers { required: usize, actual: usize },
    #[error("action is not accepted in phase {phase:?} of round {round}")]
    PhaseClosed { phase: GamePhase, round: u32 },
    #[error("accusation window is closed in round {round}")]
    WindowClosed { round: u32 },
    #[error("player {0} is not eligible for this ability")]
    NotEligible(String),
    #[error("player {0} has already used this ability")]
    AbilityAlreadyUsed(String),
    #[error("invalid target: {0}")]
    InvalidTarget(String),
    #[error("player {0} is communication-restricted")]
    CommunicationRestricted(String),
    #[error("unknown player: {0}")]
    UnknownPlayer(String),
    #[error("unknown session: {0}")]
    UnknownSession(String),
    #[error("no headline available")]
    NoHeadlineAvailable,
    #[error("session integrity violation: {0}")]
    IntegrityViolation(String),
}

impl GameError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GameError::Validation(_) | GameError::InsufficientPlayers { .. } => {
                ErrorKind::Validation
            }
            GameError::PhaseClosed { .. } | GameError::WindowClosed { .. } => ErrorKind::State,
            GameError::NotEligible(_)
            | GameError::AbilityAlreadyUsed(_)
            | GameError::InvalidTarget(_)
            | GameError::CommunicationRestricted(_) => ErrorKind::Eligibility,
            GameError::UnknownPlayer(_) | GameError::UnknownSession(_) => ErrorKind::Resource,
            GameError::NoHeadlineAvailable => ErrorKind::Upstream,
            GameError::IntegrityViolation(_) => ErrorKind::Integrity,
        }
    }
}
