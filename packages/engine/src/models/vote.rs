use serde::{Deserialize, Serialize};

use super::player::PlayerId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteChoice {
    Believe, // 信じる
    Reject,  // 疑う
}

impl VoteChoice {
    /// Whether this choice matches the headline's truth value.
    pub fn is_correct_for(self, headline_is_true: bool) -> bool {
        match self {
            VoteChoice::Believe => headline_is_true,
            VoteChoice::Reject => !headline_is_true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub round: u32,
    pub player_id: PlayerId,
    pub choice: VoteChoice,
    pub weight: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MajorityOutcome {
    Believe,
    Reject,
    NoMajority,
}

impl MajorityOutcome {
    pub fn choice(self) -> Option<VoteChoice> {
        match self {
            MajorityOutcome::Believe => Some(VoteChoice::Believe),
            MajorityOutcome::Reject => Some(VoteChoice::Reject),
            MajorityOutcome::NoMajority => None,
        }
    }
}
