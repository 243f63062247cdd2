use log::{debug, info};

use crate::error::GameError;
use crate::models::round::AccusationRecord;
use crate::models::session::{GamePhase, Session};

fn window_open(session: &Session) -> bool {
    session.phase == GamePhase::AccusationWindow
        && session.config().is_accusation_round(session.round)
}

/// Resolves a one-shot accusation.
///
/// Checks run in a fixed order so each failure has one cause: the accuser's
/// role, the window, the used flag, then the target. On success the target
/// is restricted, on failure the accuser is. The ability is consumed either
/// way.
pub fn submit_accusation(
    session: &mut Session,
    accuser_id: &str,
    target_id: &str,
) -> Result<AccusationRecord, GameError> {
    let round = session.round;
    let accuser = session.require_player(accuser_id)?;

    if !accuser.is_active || !accuser.role.map_or(false, |r| r.can_accuse()) {
        return Err(GameError::NotEligible(accuser_id.to_string()));
    }
    if !window_open(session) {
        return Err(GameError::WindowClosed { round });
    }
    if accuser.accusation_used {
        return Err(GameError::AbilityAlreadyUsed(accuser_id.to_string()));
    }
    if accuser_id == target_id {
        return Err(GameError::InvalidTarget(format!(
            "{} cannot accuse themselves",
            accuser_id
        )));
    }
    let accuser_faction = accuser.faction();
    let target = session
        .player(target_id)
        .filter(|p| p.is_active)
        .ok_or_else(|| GameError::InvalidTarget(format!("{} is not an active player", target_id)))?;

    let success = match (accuser_faction, target.faction()) {
        (Some(mine), Some(theirs)) => theirs == mine.opponent(),
        _ => false,
    };
    let restricted_id = if success { target_id } else { accuser_id };
    let through_round = round + session.config().restriction_rounds;

    let restricted_through = session
        .player_mut(restricted_id)
        .map(|p| p.restrict_through(through_round))
        .ok_or_else(|| GameError::UnknownPlayer(restricted_id.to_string()))?;
    if let Some(accuser) = session.player_mut(accuser_id) {
        accuser.accusation_used = true;
    }

    debug!(
        "Session {}: {} accused {} in round {}",
        session.id, accuser_id, target_id, round
    );
    info!(
        "Session {}: accusation by {} {}, {} restricted through round {}",
        session.id,
        accuser_id,
        if success { "succeeded" } else { "failed" },
        restricted_id,
        restricted_through
    );

    Ok(AccusationRecord {
        round,
        accuser_id: accuser_id.to_string(),
        target_id: target_id.to_string(),
        success,
        restricted_player_id: restricted_id.to_string(),
        restricted_through,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::role::Role;
    use crate::utils::test_setup::session_with_roles;

    fn window_session() -> Session {
        let mut session = session_with_roles(&[
            Role::FactChecker,
            Role::Deceiver,
            Role::Regular,
            Role::Regular,
            Role::Regular,
        ]);
        session.phase = GamePhase::AccusationWindow;
        session.round = 2;
        session
    }

    #[test]
    fn test_successful_accusation_restricts_target() {
        let mut session = window_session();
        let record = submit_accusation(&mut session, "p1", "p2").unwrap();

        assert!(record.success);
        assert_eq!(record.restricted_player_id, "p2");
        assert_eq!(record.restricted_through, 3);
        let target = session.player("p2").unwrap();
        assert!(target.is_restricted(3));
        assert!(!target.is_restricted(4));
        assert!(!session.player("p1").unwrap().is_restricted(3));
        assert!(session.player("p1").unwrap().accusation_used);
    }

    #[test]
    fn test_deceiver_accusation_is_symmetric() {
        let mut session = window_session();
        let record = submit_accusation(&mut session, "p2", "p3").unwrap();

        assert!(record.success);
        assert_eq!(record.restricted_player_id, "p3");
    }

    #[test]
    fn test_wrong_faction_target_backfires() {
        let mut session = window_session();
        let record = submit_accusation(&mut session, "p1", "p3").unwrap();

        assert!(!record.success);
        assert_eq!(record.restricted_player_id, "p1");
        assert!(session.player("p1").unwrap().is_restricted(3));
        assert!(!session.player("p3").unwrap().is_restricted(3));
        assert!(session.player("p1").unwrap().accusation_used);
    }

    #[test]
    fn test_second_accusation_is_rejected() {
        let mut session = window_session();
        submit_accusation(&mut session, "p1", "p3").unwrap();
        assert_eq!(
            submit_accusation(&mut session, "p1", "p2"),
            Err(GameError::AbilityAlreadyUsed("p1".to_string()))
        );
        // 次の告発ラウンドでも使えない
        session.round = 4;
        assert_eq!(
            submit_accusation(&mut session, "p1", "p2"),
            Err(GameError::AbilityAlreadyUsed("p1".to_string()))
        );
    }

    #[test]
    fn test_precondition_order() {
        let mut session = window_session();

        assert_eq!(
            submit_accusation(&mut session, "ghost", "p2"),
            Err(GameError::UnknownPlayer("ghost".to_string()))
        );
        // 資格なしは窓より先に判定される
        session.round = 3;
        assert_eq!(
            submit_accusation(&mut session, "p3", "p2"),
            Err(GameError::NotEligible("p3".to_string()))
        );
        assert_eq!(
            submit_accusation(&mut session, "p1", "p2"),
            Err(GameError::WindowClosed { round: 3 })
        );

        session.round = 2;
        session.phase = GamePhase::Voting;
        assert_eq!(
            submit_accusation(&mut session, "p1", "p2"),
            Err(GameError::WindowClosed { round: 2 })
        );

        session.phase = GamePhase::AccusationWindow;
        assert!(matches!(
            submit_accusation(&mut session, "p1", "p1"),
            Err(GameError::InvalidTarget(_))
        ));
        assert!(matches!(
            submit_accusation(&mut session, "p1", "nobody"),
            Err(GameError::InvalidTarget(_))
        ));
        session.player_mut("p4").unwrap().is_active = false;
        assert!(matches!(
            submit_accusation(&mut session, "p1", "p4"),
            Err(GameError::InvalidTarget(_))
        ));
        // 失敗した試行では能力は消費されない
        assert!(!session.player("p1").unwrap().accusation_used);
    }

    #[test]
    fn test_restriction_does_not_shorten_existing_one() {
        let mut session = window_session();
        session.player_mut("p2").unwrap().restricted_through = Some(4);
        let record = submit_accusation(&mut session, "p1", "p2").unwrap();
        assert_eq!(record.restricted_through, 4);
    }
}
