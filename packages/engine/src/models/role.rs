use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Faction {
    Truth,     // 真実陣営
    Deception, // 欺瞞陣営
}

impl Faction {
    pub fn opponent(self) -> Faction {
        match self {
            Faction::Truth => Faction::Deception,
            Faction::Deception => Faction::Truth,
        }
    }
}

impl fmt::Display for Faction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Faction::Truth => write!(f, "TruthFaction"),
            Faction::Deception => write!(f, "DeceptionFaction"),
        }
    }
}

/// How often a role learns the truth value of the active headline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfoReliability {
    Always,
    AllButOneRound,
}

/// Capability set a role grants. Logic in the resolver and the accusation
/// subsystem reads these flags and never branches on the role itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleCapabilities {
    pub vote_weight: u32,
    pub info: Option<InfoReliability>,
    pub can_accuse: bool,
    pub can_swap_headline: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    FactChecker, // ファクトチェッカー
    Deceiver,    // 詐欺師
    Influencer,  // インフルエンサー
    Regular,     // 一般人
}

impl Role {
    pub fn capabilities(self) -> RoleCapabilities {
        match self {
            Role::FactChecker => RoleCapabilities {
                vote_weight: 1,
                info: Some(InfoReliability::AllButOneRound),
                can_accuse: true,
                can_swap_headline: false,
            },
            Role::Deceiver => RoleCapabilities {
                vote_weight: 1,
                info: Some(InfoReliability::Always),
                can_accuse: true,
                can_swap_headline: true,
            },
            Role::Influencer => RoleCapabilities {
                vote_weight: 2,
                info: None,
                can_accuse: false,
                can_swap_headline: false,
            },
            Role::Regular => RoleCapabilities {
                vote_weight: 1,
                info: None,
                can_accuse: false,
                can_swap_headline: false,
            },
        }
    }

    pub fn faction(self) -> Faction {
        match self {
            Role::Deceiver => Faction::Deception,
            Role::FactChecker | Role::Influencer | Role::Regular => Faction::Truth,
        }
    }

    pub fn vote_weight(self) -> u32 {
        self.capabilities().vote_weight
    }

    pub fn can_accuse(self) -> bool {
        self.capabilities().can_accuse
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::FactChecker => write!(f, "Fact Checker"),
            Role::Deceiver => write!(f, "Deceiver"),
            Role::Influencer => write!(f, "Influencer"),
            Role::Regular => write!(f, "Regular"),
        }
    }
}
