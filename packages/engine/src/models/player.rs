use serde::{Deserialize, Serialize};

use super::role::{Faction, Role};

pub type PlayerId = String;

/// A seat requested when creating or joining a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerEntry {
    pub id: PlayerId,
    pub name: String,
}

impl PlayerEntry {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl From<&str> for PlayerEntry {
    fn from(id: &str) -> Self {
        PlayerEntry::new(id, id)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub reputation: u32,
    // ロビー中は未割り当て
    pub role: Option<Role>,
    pub is_active: bool,
    // 発言制限の最終ラウンド（このラウンドを含む）
    pub restricted_through: Option<u32>,
    pub restriction_count: u32,
    pub accusation_used: bool,
    pub swap_used: bool,
    pub no_info_round: Option<u32>,
    pub messages_counted: u32,
}

impl Player {
    pub fn new(entry: PlayerEntry, reputation: u32) -> Self {
        Self {
            id: entry.id,
            name: entry.name,
            reputation,
            role: None,
            is_active: true,
            restricted_through: None,
            restriction_count: 0,
            accusation_used: false,
            swap_used: false,
            no_info_round: None,
            messages_counted: 0,
        }
    }

    pub fn faction(&self) -> Option<Faction> {
        self.role.map(Role::faction)
    }

    pub fn vote_weight(&self) -> u32 {
        self.role.map(Role::vote_weight).unwrap_or(1)
    }

    pub fn is_ghost(&self) -> bool {
        self.reputation == 0
    }

    pub fn is_restricted(&self, round: u32) -> bool {
        self.restricted_through
            .map_or(false, |through| round <= through)
    }

    /// Restricts communication through `through_round`, never shortening an
    /// existing restriction.
    pub fn restrict_through(&mut self, through_round: u32) -> u32 {
        let through = self
            .restricted_through
            .map_or(through_round, |current| current.max(through_round));
        self.restricted_through = Some(through);
        self.restriction_count += 1;
        through
    }

    pub fn has_accusation(&self) -> bool {
        self.is_active && !self.accusation_used && self.role.map_or(false, Role::can_accuse)
    }
}
