use serde::{Deserialize, Serialize};

use crate::models::player::Player;

/// What a player may currently do, derived from reputation and restrictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Standing {
    Active,
    // 発言制限中（投票は可能）
    Restricted,
    // RP 0（投票は可能、発言は参加として数えない）
    Ghost,
    Inactive,
}

impl Standing {
    pub fn can_speak(self) -> bool {
        matches!(self, Standing::Active | Standing::Ghost)
    }

    pub fn can_vote(self) -> bool {
        self != Standing::Inactive
    }

    /// Counted as an active, non-immune member for the faction-collapse check.
    pub fn counts_for_faction(self) -> bool {
        self == Standing::Active
    }
}

pub fn standing(player: &Player, round: u32) -> Standing {
    if !player.is_active {
        Standing::Inactive
    } else if player.is_restricted(round) {
        Standing::Restricted
    } else if player.is_ghost() {
        Standing::Ghost
    } else {
        Standing::Active
    }
}

/// +1 for a correct vote, -1 for an incorrect one, floored at 0.
pub fn apply_vote(reputation: u32, correct: bool) -> u32 {
    if correct {
        reputation + 1
    } else {
        reputation.saturating_sub(1)
    }
}

/// Flat +1 for a DeceptionFaction member when the majority judged wrongly.
pub fn apply_deception_bonus(reputation: u32, is_deception: bool, majority_was_wrong: bool) -> u32 {
    if is_deception && majority_was_wrong {
        reputation + 1
    } else {
        reputation
    }
}

/// Reputation after one round for a player who voted.
pub fn apply_vote_outcome(
    reputation: u32,
    correct: bool,
    is_deception: bool,
    majority_was_wrong: bool,
) -> u32 {
    let after_vote = apply_vote(reputation, correct);
    apply_deception_bonus(after_vote, is_deception, majority_was_wrong)
}
