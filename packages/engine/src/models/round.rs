use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::player::PlayerId;
use super::role::Faction;
use super::vote::MajorityOutcome;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactionScores {
    pub truth: u32,
    pub deception: u32,
}

impl FactionScores {
    pub fn add(&mut self, delta: FactionScores) {
        self.truth += delta.truth;
        self.deception += delta.deception;
    }

    pub fn credit(faction: Faction) -> Self {
        match faction {
            Faction::Truth => FactionScores {
                truth: 1,
                deception: 0,
            },
            Faction::Deception => FactionScores {
                truth: 0,
                deception: 1,
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccusationRecord {
    pub round: u32,
    pub accuser_id: PlayerId,
    pub target_id: PlayerId,
    pub success: bool,
    // 発言制限を受けたプレイヤー（成功時は対象、失敗時は告発者）
    pub restricted_player_id: PlayerId,
    pub restricted_through: u32,
}

/// Immutable record of one resolved round.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundResult {
    pub round: u32,
    pub headline_id: String,
    pub headline_is_true: bool,
    pub believe_weight: u32,
    pub reject_weight: u32,
    pub majority: MajorityOutcome,
    // 多数派がいない場合は None
    pub majority_correct: Option<bool>,
    pub reputation_deltas: BTreeMap<PlayerId, i32>,
    pub faction_score_delta: FactionScores,
    pub fake_trusted: bool,
    pub fake_flagged: bool,
    pub accusations: Vec<AccusationRecord>,
}

impl RoundResult {
    pub fn majority_was_wrong(&self) -> bool {
        self.majority_correct == Some(false)
    }
}
