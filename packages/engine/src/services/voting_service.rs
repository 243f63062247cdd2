use log::{info, warn};
use std::collections::{BTreeMap, HashSet};

use crate::error::GameError;
use crate::models::role::Faction;
use crate::models::round::{FactionScores, RoundResult};
use crate::models::session::Session;
use crate::models::vote::{MajorityOutcome, Vote, VoteChoice};
use crate::services::reputation_service;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub believe: u32,
    pub reject: u32,
}

impl Tally {
    pub fn from_votes(votes: &[Vote]) -> Self {
        votes.iter().fold(Tally { believe: 0, reject: 0 }, |mut t, v| {
            match v.choice {
                VoteChoice::Believe => t.believe += v.weight,
                VoteChoice::Reject => t.reject += v.weight,
            }
            t
        })
    }

    /// Strictly greater weight wins; an exact tie has no majority.
    pub fn majority(&self) -> MajorityOutcome {
        if self.believe > self.reject {
            MajorityOutcome::Believe
        } else if self.reject > self.believe {
            MajorityOutcome::Reject
        } else {
            MajorityOutcome::NoMajority
        }
    }
}

fn check_integrity(session: &Session, votes: &[Vote]) -> Result<(), GameError> {
    let mut seen = HashSet::new();
    for vote in votes {
        if !seen.insert(vote.player_id.as_str()) {
            return Err(GameError::IntegrityViolation(format!(
                "player {} has more than one final vote in round {}",
                vote.player_id, session.round
            )));
        }
        if vote.round != session.round {
            return Err(GameError::IntegrityViolation(format!(
                "vote by {} belongs to round {}, not {}",
                vote.player_id, vote.round, session.round
            )));
        }
        let player = session.player(&vote.player_id).ok_or_else(|| {
            GameError::IntegrityViolation(format!("vote by unknown player {}", vote.player_id))
        })?;
        if !player.is_active {
            return Err(GameError::IntegrityViolation(format!(
                "vote by inactive player {}",
                vote.player_id
            )));
        }
        if vote.weight != player.vote_weight() {
            return Err(GameError::IntegrityViolation(format!(
                "vote by {} carries weight {} but the role grants {}",
                vote.player_id,
                vote.weight,
                player.vote_weight()
            )));
        }
    }
    Ok(())
}

/// Resolves the round's votes against the active headline, applying
/// reputation changes and the session's score and headline counters.
///
/// Nothing is mutated unless every vote passes the integrity check.
pub fn resolve_round(session: &mut Session, votes: &[Vote]) -> Result<RoundResult, GameError> {
    let headline = session.headline.clone().ok_or_else(|| {
        GameError::IntegrityViolation(format!("round {} has no active headline", session.round))
    })?;
    check_integrity(session, votes)?;

    let tally = Tally::from_votes(votes);
    let majority = tally.majority();
    let round = session.round;

    let mut result = RoundResult {
        round,
        headline_id: headline.id.clone(),
        headline_is_true: headline.is_true,
        believe_weight: tally.believe,
        reject_weight: tally.reject,
        majority,
        majority_correct: None,
        reputation_deltas: session.players.iter().map(|p| (p.id.clone(), 0)).collect(),
        faction_score_delta: FactionScores::default(),
        fake_trusted: false,
        fake_flagged: false,
        accusations: Vec::new(),
    };

    let Some(majority_choice) = majority.choice() else {
        warn!(
            "Session {} round {}: no majority ({} vs {}), nothing is scored",
            session.id, round, tally.believe, tally.reject
        );
        return Ok(result);
    };

    let majority_correct = majority_choice.is_correct_for(headline.is_true);
    let majority_was_wrong = !majority_correct;
    result.majority_correct = Some(majority_correct);

    let choices: BTreeMap<&str, VoteChoice> = votes
        .iter()
        .map(|v| (v.player_id.as_str(), v.choice))
        .collect();

    let mut deltas = BTreeMap::new();
    for player in session.players.iter_mut().filter(|p| p.is_active) {
        let before = player.reputation;
        let is_deception = player.faction() == Some(Faction::Deception);
        player.reputation = match choices.get(player.id.as_str()) {
            // 自分の票が見出しの真偽と一致したかで判定（多数派との一致ではない）
            Some(choice) => reputation_service::apply_vote_outcome(
                before,
                choice.is_correct_for(headline.is_true),
                is_deception,
                majority_was_wrong,
            ),
            None => reputation_service::apply_deception_bonus(
                before,
                is_deception,
                majority_was_wrong,
            ),
        };
        deltas.insert(
            player.id.clone(),
            player.reputation as i32 - before as i32,
        );
    }
    result.reputation_deltas.extend(deltas);

    let credited = if majority_correct {
        Faction::Truth
    } else {
        Faction::Deception
    };
    result.faction_score_delta = FactionScores::credit(credited);
    session.scores.add(result.faction_score_delta);

    if !headline.is_true {
        match majority_choice {
            VoteChoice::Believe => {
                session.fake_trusted += 1;
                result.fake_trusted = true;
            }
            VoteChoice::Reject => {
                session.fake_flagged += 1;
                result.fake_flagged = true;
            }
        }
    }

    info!(
        "Session {} round {}: believe={} reject={} majority={:?} correct={}",
        session.id, round, tally.believe, tally.reject, majority, majority_correct
    );
    Ok(result)
}
