use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{BTreeMap, HashSet};

use crate::error::GameError;
use crate::models::config::ABSOLUTE_MIN_PLAYERS;
use crate::models::player::PlayerId;
use crate::models::role::Role;

/// Roster size from which a second Deceiver and the Influencer are dealt.
pub const LARGE_ROSTER: usize = 7;

/// Role multiset for a roster of `player_count` seats.
///
/// - 5–6 players: 1 FactChecker, 1 Deceiver, the rest Regular
/// - 7+ players: 1 FactChecker, 2 Deceivers, 1 Influencer, the rest Regular
pub fn role_table(player_count: usize) -> Result<Vec<Role>, GameError> {
    if player_count < ABSOLUTE_MIN_PLAYERS {
        return Err(GameError::InsufficientPlayers {
            required: ABSOLUTE_MIN_PLAYERS,
            actual: player_count,
        });
    }

    let mut roles = vec![Role::FactChecker, Role::Deceiver];
    if player_count >= LARGE_ROSTER {
        roles.push(Role::Deceiver);
        roles.push(Role::Influencer);
    }
    roles.resize(player_count, Role::Regular);
    Ok(roles)
}

/// Deals roles to `players` with a uniform-random permutation drawn from
/// `rng`. The rng is the only source of randomness.
pub fn assign_roles<R: Rng + ?Sized>(
    players: &[PlayerId],
    rng: &mut R,
) -> Result<BTreeMap<PlayerId, Role>, GameError> {
    let mut seen = HashSet::new();
    if let Some(dup) = players.iter().find(|id| !seen.insert(id.as_str())) {
        return Err(GameError::Validation(format!("duplicate player id: {}", dup)));
    }

    let mut roles = role_table(players.len())?;
    roles.shuffle(rng);

    Ok(players.iter().cloned().zip(roles).collect())
}
