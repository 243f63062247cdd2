use chrono::{DateTime, Duration, Utc};
use log::{debug, error, info, warn};
use rand::Rng;

use crate::error::GameError;
use crate::models::headline::PublicHeadline;
use crate::models::notification::{GameEvent, Notification, RoleReveal};
use crate::models::player::{Player, PlayerEntry, PlayerId};
use crate::models::role::{Faction, InfoReliability, Role};
use crate::models::round::RoundResult;
use crate::models::session::{GamePhase, GameResult, Session, WinReason};
use crate::models::vote::{Vote, VoteChoice};
use crate::services::reputation_service::{self, Standing};
use crate::services::scheduler::ScheduledTimer;
use crate::services::{accusation_service, roster_service, voting_service};

/// Discrete inputs to a session's phase machine.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Start,
    Join(PlayerEntry),
    Leave {
        player_id: PlayerId,
    },
    Vote {
        player_id: PlayerId,
        round: u32,
        choice: VoteChoice,
    },
    Accuse {
        accuser_id: PlayerId,
        target_id: PlayerId,
    },
    Message {
        player_id: PlayerId,
        text: String,
    },
    SwapHeadline {
        player_id: PlayerId,
    },
    Ready {
        player_id: PlayerId,
    },
    // スケジューラからの期限通知
    Timeout {
        phase_seq: u64,
    },
    AdvanceIfDue,
    Abort {
        reason: String,
    },
}

/// Effects of one processed command, in emission order.
#[derive(Debug, Default, PartialEq)]
pub struct Transition {
    pub notifications: Vec<Notification>,
    // 最後に入ったフェーズのタイマー（古いものは phase_seq で無効化される）
    pub timer: Option<ScheduledTimer>,
    pub archived: Vec<RoundResult>,
    pub finished: bool,
}

impl Transition {
    fn public(&mut self, session_id: &str, event: GameEvent) {
        self.notifications.push(Notification::public(session_id, event));
    }

    fn private(&mut self, session_id: &str, player_id: &str, event: GameEvent) {
        self.notifications
            .push(Notification::private(session_id, player_id, event));
    }

    pub fn is_noop(&self) -> bool {
        self.notifications.is_empty() && self.timer.is_none() && self.archived.is_empty()
    }
}

/// Arms the lobby timer of a freshly created session.
pub fn open_lobby(session: &mut Session, now: DateTime<Utc>) -> Transition {
    let mut out = Transition::default();
    out.public(
        &session.id,
        GameEvent::SessionCreated {
            players: session.players.iter().map(|p| p.id.clone()).collect(),
        },
    );
    arm_timer(session, now, &mut out);
    out
}

/// Applies `command` to `session`. A rejected command leaves the session
/// untouched.
pub fn handle(
    session: &mut Session,
    command: SessionCommand,
    now: DateTime<Utc>,
) -> Result<Transition, GameError> {
    let mut out = Transition::default();

    match command {
        SessionCommand::Timeout { phase_seq } => {
            if session.is_terminal() || phase_seq != session.phase_seq {
                debug!(
                    "Session {}: stale timeout seq={} (current {})",
                    session.id, phase_seq, session.phase_seq
                );
                return Ok(out);
            }
            advance(session, now, &mut out);
            return Ok(out);
        }
        SessionCommand::AdvanceIfDue => {
            let due = session.phase_deadline.map_or(false, |d| now >= d);
            if due && !session.is_terminal() {
                advance(session, now, &mut out);
            }
            return Ok(out);
        }
        _ => {}
    }

    if session.is_terminal() {
        return Err(phase_closed(session));
    }

    match command {
        SessionCommand::Start => start(session, now, &mut out)?,
        SessionCommand::Join(entry) => join(session, entry, &mut out)?,
        SessionCommand::Leave { player_id } => leave(session, &player_id, &mut out)?,
        SessionCommand::Vote {
            player_id,
            round,
            choice,
        } => vote(session, &player_id, round, choice, now, &mut out)?,
        SessionCommand::Accuse {
            accuser_id,
            target_id,
        } => accuse(session, &accuser_id, &target_id, now, &mut out)?,
        SessionCommand::Message { player_id, text } => {
            message(session, &player_id, text, &mut out)?
        }
        SessionCommand::SwapHeadline { player_id } => swap_headline(session, &player_id, &mut out)?,
        SessionCommand::Ready { player_id } => ready(session, &player_id, now, &mut out)?,
        SessionCommand::Abort { reason } => abort(session, reason, now, &mut out),
        SessionCommand::Timeout { .. } | SessionCommand::AdvanceIfDue => {}
    }
    Ok(out)
}

/// End-of-game check, in priority order.
pub fn evaluate_win(session: &Session) -> Option<(Faction, WinReason)> {
    let config = session.config();
    if session.fake_trusted >= config.deception_win_threshold {
        return Some((Faction::Deception, WinReason::FakeHeadlinesTrusted));
    }
    if session.fake_flagged >= config.truth_win_threshold {
        return Some((Faction::Truth, WinReason::FakeHeadlinesFlagged));
    }
    if session.round >= session.max_rounds {
        return Some((Faction::Truth, WinReason::RoundsExhausted));
    }

    let standing_members = |faction: Faction| {
        session
            .players
            .iter()
            .filter(|p| p.faction() == Some(faction))
            .filter(|p| reputation_service::standing(p, session.round).counts_for_faction())
            .count()
    };
    if standing_members(Faction::Deception) == 0 {
        return Some((Faction::Truth, WinReason::OpponentsSilenced));
    }
    if standing_members(Faction::Truth) == 0 {
        return Some((Faction::Deception, WinReason::OpponentsSilenced));
    }
    None
}

fn phase_closed(session: &Session) -> GameError {
    GameError::PhaseClosed {
        phase: session.phase,
        round: session.round,
    }
}

fn arm_timer(session: &mut Session, now: DateTime<Utc>, out: &mut Transition) {
    session.phase_seq += 1;
    let deadline = session
        .config()
        .durations
        .for_phase(session.phase)
        .map(|secs| now + Duration::seconds(secs as i64));
    session.phase_deadline = deadline;
    out.timer = deadline.map(|due_at| ScheduledTimer {
        session_id: session.id.clone(),
        phase: session.phase,
        round: session.round,
        phase_seq: session.phase_seq,
        due_at,
    });
}

fn enter_phase(session: &mut Session, to: GamePhase, now: DateTime<Utc>, out: &mut Transition) {
    let from = session.phase;
    session.phase = to;
    session.ready.clear();
    arm_timer(session, now, out);

    info!(
        "Session {}: {} -> {} (round {})",
        session.id, from, to, session.round
    );
    out.public(
        &session.id,
        GameEvent::PhaseChanged {
            from_phase: from,
            to_phase: to,
            round: session.round,
            deadline: session.phase_deadline,
        },
    );
}

/// Leaves the current phase as if its time limit had run out.
fn advance(session: &mut Session, now: DateTime<Utc>, out: &mut Transition) {
    match session.phase {
        GamePhase::Lobby => {
            let joined = session.active_players().count();
            if joined >= session.config().min_players {
                close_lobby(session, now, out);
            } else {
                warn!(
                    "Session {}: lobby timed out with {} players",
                    session.id, joined
                );
                abort(
                    session,
                    format!("lobby closed with only {} players", joined),
                    now,
                    out,
                );
            }
        }
        GamePhase::RoleAssignment => start_round(session, now, out),
        GamePhase::HeadlineReveal => enter_phase(session, GamePhase::Discussion, now, out),
        GamePhase::Discussion => enter_phase(session, GamePhase::Voting, now, out),
        GamePhase::Voting => close_voting(session, now, out),
        GamePhase::AccusationWindow => enter_round_results(session, now, out),
        GamePhase::RoundResults => finish_round(session, now, out),
        GamePhase::GameEnd => {}
    }
}

fn start(session: &mut Session, now: DateTime<Utc>, out: &mut Transition) -> Result<(), GameError> {
    if session.phase != GamePhase::Lobby {
        return Err(phase_closed(session));
    }
    let joined = session.active_players().count();
    let required = session.config().min_players;
    if joined < required {
        return Err(GameError::InsufficientPlayers {
            required,
            actual: joined,
        });
    }
    close_lobby(session, now, out);
    Ok(())
}

fn close_lobby(session: &mut Session, now: DateTime<Utc>, out: &mut Transition) {
    let ids: Vec<PlayerId> = session.players.iter().map(|p| p.id.clone()).collect();
    let assignment = match roster_service::assign_roles(&ids, &mut session.rng) {
        Ok(assignment) => assignment,
        Err(e) => {
            abort(session, e.to_string(), now, out);
            return;
        }
    };

    let max_rounds = session.max_rounds.max(1);
    let no_info_round = session.rng.gen_range(1..=max_rounds);
    for player in session.players.iter_mut() {
        player.role = assignment.get(&player.id).copied();
        if player.role.map(|r| r.capabilities().info) == Some(Some(InfoReliability::AllButOneRound)) {
            player.no_info_round = Some(no_info_round);
        }
    }

    enter_phase(session, GamePhase::RoleAssignment, now, out);
    for player in &session.players {
        if let (Some(role), Some(faction)) = (player.role, player.faction()) {
            out.private(
                &session.id,
                &player.id,
                GameEvent::RoleAssigned {
                    player_id: player.id.clone(),
                    role,
                    faction,
                },
            );
        }
    }
}

fn join(session: &mut Session, entry: PlayerEntry, out: &mut Transition) -> Result<(), GameError> {
    if session.phase != GamePhase::Lobby {
        return Err(phase_closed(session));
    }
    if entry.id.trim().is_empty() {
        return Err(GameError::Validation("player id must not be empty".to_string()));
    }
    if session.player(&entry.id).is_some() {
        return Err(GameError::Validation(format!(
            "player {} already joined",
            entry.id
        )));
    }
    if session.players.len() >= session.config().max_players {
        return Err(GameError::Validation(format!(
            "lobby is full ({} players)",
            session.config().max_players
        )));
    }

    let player = Player::new(entry, session.config().starting_reputation);
    out.public(
        &session.id,
        GameEvent::PlayerJoined {
            player_id: player.id.clone(),
            name: player.name.clone(),
        },
    );
    session.players.push(player);
    Ok(())
}

fn leave(session: &mut Session, player_id: &str, out: &mut Transition) -> Result<(), GameError> {
    session.require_player(player_id)?;
    if session.phase != GamePhase::Lobby {
        return Err(phase_closed(session));
    }
    session.players.retain(|p| p.id != player_id);
    out.public(
        &session.id,
        GameEvent::PlayerLeft {
            player_id: player_id.to_string(),
        },
    );
    Ok(())
}

fn start_round(session: &mut Session, now: DateTime<Utc>, out: &mut Transition) {
    let next_round = session.round + 1;
    let difficulty = session.config().headline_difficulty;
    let category = session.config().headline_category.clone();

    let headline = match session
        .headlines
        .next_headline(difficulty, category.as_deref())
    {
        Ok(headline) => headline,
        Err(e) => {
            session.headline_failures += 1;
            warn!(
                "Session {}: round {} aborted ({}), attempt {}/{}",
                session.id,
                next_round,
                e,
                session.headline_failures,
                session.config().headline_retry_limit
            );
            out.public(
                &session.id,
                GameEvent::RoundAborted {
                    round: next_round,
                    reason: e.to_string(),
                },
            );
            if session.headline_failures >= session.config().headline_retry_limit {
                abort(
                    session,
                    format!("no headline available for round {}", next_round),
                    now,
                    out,
                );
            } else {
                // 同じフェーズに留まり、次の期限で再試行する
                let current = session.phase;
                enter_phase(session, current, now, out);
            }
            return;
        }
    };

    session.headline_failures = 0;
    session.round = next_round;
    session.votes.clear();
    session.pending_result = None;

    for player in session.players.iter_mut() {
        if player.restricted_through.map_or(false, |t| t < next_round) {
            player.restricted_through = None;
            out.notifications.push(Notification::public(
                &session.id,
                GameEvent::RestrictionLifted {
                    player_id: player.id.clone(),
                    round: next_round,
                },
            ));
        }
    }

    let public = PublicHeadline::from(&headline);
    session.headline = Some(headline);
    enter_phase(session, GamePhase::HeadlineReveal, now, out);
    out.public(
        &session.id,
        GameEvent::RoundStarted {
            round: next_round,
            headline: public,
        },
    );
    reveal_info(session, out);
}

/// Private truth hints for the roles that receive information.
fn reveal_info(session: &Session, out: &mut Transition) {
    let Some(headline) = session.headline.as_ref() else {
        return;
    };
    for player in session.active_players() {
        let Some(info) = player.role.and_then(|r| r.capabilities().info) else {
            continue;
        };
        let withheld =
            info == InfoReliability::AllButOneRound && player.no_info_round == Some(session.round);
        let event = if withheld {
            GameEvent::InfoWithheld {
                player_id: player.id.clone(),
                round: session.round,
            }
        } else {
            GameEvent::TruthHint {
                player_id: player.id.clone(),
                round: session.round,
                headline_id: headline.id.clone(),
                is_true: headline.is_true,
            }
        };
        out.private(&session.id, &player.id, event);
    }
}

fn vote(
    session: &mut Session,
    player_id: &str,
    round: u32,
    choice: VoteChoice,
    now: DateTime<Utc>,
    out: &mut Transition,
) -> Result<(), GameError> {
    let player = session.require_player(player_id)?;
    if session.phase != GamePhase::Voting || round != session.round {
        return Err(phase_closed(session));
    }
    if !reputation_service::standing(player, round).can_vote() {
        return Err(GameError::NotEligible(player_id.to_string()));
    }

    let ballot = Vote {
        round,
        player_id: player_id.to_string(),
        choice,
        weight: player.vote_weight(),
    };
    let replaced = session
        .votes
        .insert(player_id.to_string(), ballot)
        .is_some();
    debug!(
        "Session {}: {} voted in round {} (replaced={})",
        session.id, player_id, round, replaced
    );
    out.public(
        &session.id,
        GameEvent::VoteRecorded {
            round,
            player_id: player_id.to_string(),
            replaced,
        },
    );

    if session.all_eligible_voted() {
        close_voting(session, now, out);
    }
    Ok(())
}

fn close_voting(session: &mut Session, now: DateTime<Utc>, out: &mut Transition) {
    let votes: Vec<Vote> = session.votes.values().cloned().collect();
    let result = match voting_service::resolve_round(session, &votes) {
        Ok(result) => result,
        Err(e) => {
            fail(session, e.to_string(), now, out);
            return;
        }
    };

    for (player_id, delta) in &result.reputation_deltas {
        let became_ghost = *delta < 0 && session.player(player_id).map_or(false, Player::is_ghost);
        if became_ghost {
            out.public(
                &session.id,
                GameEvent::PlayerBecameGhost {
                    player_id: player_id.clone(),
                    round: session.round,
                },
            );
        }
    }
    session.pending_result = Some(result);

    let window = session.config().is_accusation_round(session.round)
        && session.pending_accusers().next().is_some();
    if window {
        enter_phase(session, GamePhase::AccusationWindow, now, out);
    } else {
        enter_round_results(session, now, out);
    }
}

fn accuse(
    session: &mut Session,
    accuser_id: &str,
    target_id: &str,
    now: DateTime<Utc>,
    out: &mut Transition,
) -> Result<(), GameError> {
    let record = accusation_service::submit_accusation(session, accuser_id, target_id)?;

    out.public(
        &session.id,
        GameEvent::AccusationResolved {
            round: record.round,
            accuser_id: record.accuser_id.clone(),
            target_id: record.target_id.clone(),
            success: record.success,
        },
    );
    out.public(
        &session.id,
        GameEvent::PlayerRestricted {
            player_id: record.restricted_player_id.clone(),
            through_round: record.restricted_through,
        },
    );
    if let Some(result) = session.pending_result.as_mut() {
        result.accusations.push(record);
    }

    if session.pending_accusers().next().is_none() {
        enter_round_results(session, now, out);
    }
    Ok(())
}

fn message(
    session: &mut Session,
    player_id: &str,
    text: String,
    out: &mut Transition,
) -> Result<(), GameError> {
    let round = session.round;
    let max_len = session.config().message_max_len;
    let player = session.require_player(player_id)?;
    if session.phase != GamePhase::Discussion {
        return Err(phase_closed(session));
    }
    let standing = reputation_service::standing(player, round);
    match standing {
        Standing::Inactive => return Err(GameError::NotEligible(player_id.to_string())),
        Standing::Restricted => {
            return Err(GameError::CommunicationRestricted(player_id.to_string()))
        }
        Standing::Active | Standing::Ghost => {}
    }
    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(GameError::Validation("message must not be empty".to_string()));
    }
    if text.chars().count() > max_len {
        return Err(GameError::Validation(format!(
            "message exceeds {} characters",
            max_len
        )));
    }

    // ゴーストの発言は参加として数えない
    let counted = standing != Standing::Ghost;
    if counted {
        if let Some(player) = session.player_mut(player_id) {
            player.messages_counted += 1;
        }
    }
    out.public(
        &session.id,
        GameEvent::MessagePosted {
            player_id: player_id.to_string(),
            text,
            counted,
        },
    );
    Ok(())
}

fn swap_headline(
    session: &mut Session,
    player_id: &str,
    out: &mut Transition,
) -> Result<(), GameError> {
    let player = session.require_player(player_id)?;
    let can_swap = player.is_active
        && player
            .role
            .map_or(false, |r: Role| r.capabilities().can_swap_headline);
    if !can_swap {
        return Err(GameError::NotEligible(player_id.to_string()));
    }
    if !matches!(
        session.phase,
        GamePhase::HeadlineReveal | GamePhase::Discussion
    ) {
        return Err(phase_closed(session));
    }
    if player.swap_used {
        return Err(GameError::AbilityAlreadyUsed(player_id.to_string()));
    }

    let difficulty = session.config().headline_difficulty;
    let category = session.config().headline_category.clone();
    let headline = session
        .headlines
        .next_headline(difficulty, category.as_deref())?;

    info!(
        "Session {}: {} swapped the headline in round {}",
        session.id, player_id, session.round
    );
    if let Some(player) = session.player_mut(player_id) {
        player.swap_used = true;
    }
    session.votes.clear();
    out.public(
        &session.id,
        GameEvent::HeadlineSwapped {
            round: session.round,
            headline: PublicHeadline::from(&headline),
        },
    );
    session.headline = Some(headline);
    reveal_info(session, out);
    Ok(())
}

fn ready(
    session: &mut Session,
    player_id: &str,
    now: DateTime<Utc>,
    out: &mut Transition,
) -> Result<(), GameError> {
    let player = session.require_player(player_id)?;
    if !player.is_active {
        return Err(GameError::NotEligible(player_id.to_string()));
    }
    let complete = match session.phase {
        GamePhase::RoleAssignment
        | GamePhase::HeadlineReveal
        | GamePhase::Discussion
        | GamePhase::RoundResults => {
            session.ready.insert(player_id.to_string());
            session.all_active_ready()
        }
        // 告発フェーズでの ready は「パス」
        GamePhase::AccusationWindow => {
            session.ready.insert(player_id.to_string());
            session.pending_accusers().next().is_none()
        }
        GamePhase::Lobby | GamePhase::Voting | GamePhase::GameEnd => {
            return Err(phase_closed(session))
        }
    };
    if complete {
        advance(session, now, out);
    }
    Ok(())
}

fn enter_round_results(session: &mut Session, now: DateTime<Utc>, out: &mut Transition) {
    let Some(result) = session.pending_result.take() else {
        fail(
            session,
            format!("round {} closed without a result", session.round),
            now,
            out,
        );
        return;
    };
    session.results.push(result.clone());
    out.archived.push(result.clone());
    enter_phase(session, GamePhase::RoundResults, now, out);
    out.public(&session.id, GameEvent::RoundResolved { result });
}

fn finish_round(session: &mut Session, now: DateTime<Utc>, out: &mut Transition) {
    match evaluate_win(session) {
        Some((faction, reason)) => {
            info!(
                "Session {}: {} wins after round {} ({:?})",
                session.id, faction, session.round, reason
            );
            end(session, GameResult::Won { faction, reason }, now, out);
        }
        None => start_round(session, now, out),
    }
}

fn end(session: &mut Session, result: GameResult, now: DateTime<Utc>, out: &mut Transition) {
    session.result = result;
    enter_phase(session, GamePhase::GameEnd, now, out);
    out.finished = true;

    let roles = session
        .players
        .iter()
        .filter_map(|p| {
            Some(RoleReveal {
                player_id: p.id.clone(),
                role: p.role?,
                faction: p.faction()?,
                reputation: p.reputation,
            })
        })
        .collect();
    out.public(
        &session.id,
        GameEvent::GameEnded {
            result: session.result.clone(),
            scores: session.scores,
            fake_trusted: session.fake_trusted,
            fake_flagged: session.fake_flagged,
            roles,
        },
    );
}

fn abort(session: &mut Session, reason: String, now: DateTime<Utc>, out: &mut Transition) {
    warn!("Session {}: aborted ({})", session.id, reason);
    end(session, GameResult::Aborted { reason }, now, out);
}

fn fail(session: &mut Session, reason: String, now: DateTime<Utc>, out: &mut Transition) {
    error!("Session {}: integrity violation: {}", session.id, reason);
    out.public(
        &session.id,
        GameEvent::SessionFailed {
            reason: reason.clone(),
        },
    );
    end(session, GameResult::Failed { reason }, now, out);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::notification::Audience;
    use crate::utils::test_setup::{session_with_players, test_headline};

    fn events(out: &Transition) -> Vec<&GameEvent> {
        out.notifications.iter().map(|n| &n.event).collect()
    }

    fn started(n: usize) -> Session {
        let headlines = (1..=10)
            .map(|i| test_headline(&format!("h{}", i), false))
            .collect();
        let mut session = session_with_players(n, headlines);
        handle(&mut session, SessionCommand::Start, Utc::now()).unwrap();
        session
    }

    fn ready_all(session: &mut Session) -> Transition {
        let ids: Vec<PlayerId> = session.active_players().map(|p| p.id.clone()).collect();
        let mut last = Transition::default();
        for id in ids {
            last = handle(session, SessionCommand::Ready { player_id: id }, Utc::now()).unwrap();
        }
        last
    }

    #[test]
    fn test_start_requires_five_players() {
        let mut session = session_with_players(4, vec![]);
        assert_eq!(
            handle(&mut session, SessionCommand::Start, Utc::now()).unwrap_err(),
            GameError::InsufficientPlayers {
                required: 5,
                actual: 4
            }
        );
        assert_eq!(session.phase, GamePhase::Lobby);
    }

    #[test]
    fn test_start_assigns_roles_privately() {
        let session_headlines = vec![test_headline("h1", true)];
        let mut session = session_with_players(5, session_headlines);
        let out = handle(&mut session, SessionCommand::Start, Utc::now()).unwrap();

        assert_eq!(session.phase, GamePhase::RoleAssignment);
        assert!(session.players.iter().all(|p| p.role.is_some()));
        let role_events: Vec<_> = out
            .notifications
            .iter()
            .filter(|n| matches!(n.event, GameEvent::RoleAssigned { .. }))
            .collect();
        assert_eq!(role_events.len(), 5);
        assert!(role_events
            .iter()
            .all(|n| matches!(n.audience, Audience::Player(_))));
        let timer = out.timer.unwrap();
        assert_eq!(timer.phase, GamePhase::RoleAssignment);
        assert_eq!(timer.phase_seq, session.phase_seq);

        let checker = session
            .players
            .iter()
            .find(|p| p.role == Some(Role::FactChecker))
            .unwrap();
        let no_info = checker.no_info_round.unwrap();
        assert!((1..=session.max_rounds).contains(&no_info));
    }

    #[test]
    fn test_lobby_membership() {
        let mut session = session_with_players(5, vec![]);
        let out = handle(
            &mut session,
            SessionCommand::Join(PlayerEntry::new("p6", "Frank")),
            Utc::now(),
        )
        .unwrap();
        assert!(matches!(events(&out)[0], GameEvent::PlayerJoined { .. }));
        assert!(matches!(
            handle(
                &mut session,
                SessionCommand::Join(PlayerEntry::new("p6", "Again")),
                Utc::now()
            ),
            Err(GameError::Validation(_))
        ));

        handle(
            &mut session,
            SessionCommand::Leave {
                player_id: "p6".to_string(),
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(session.players.len(), 5);
        assert_eq!(
            handle(
                &mut session,
                SessionCommand::Leave {
                    player_id: "p6".to_string()
                },
                Utc::now()
            ),
            Err(GameError::UnknownPlayer("p6".to_string()))
        );
    }

    #[test]
    fn test_round_reveal_sends_hints_to_informed_roles() {
        let mut session = started(5);
        let out = ready_all(&mut session);

        assert_eq!(session.phase, GamePhase::HeadlineReveal);
        assert_eq!(session.round, 1);
        let private: Vec<_> = out
            .notifications
            .iter()
            .filter(|n| n.audience != Audience::All)
            .collect();
        // Deceiver と FactChecker の 2 人だけ
        assert_eq!(private.len(), 2);
        assert!(out
            .notifications
            .iter()
            .any(|n| matches!(n.event, GameEvent::RoundStarted { round: 1, .. })));
    }

    #[test]
    fn test_vote_only_in_voting_phase() {
        let mut session = started(5);
        ready_all(&mut session);
        let err = handle(
            &mut session,
            SessionCommand::Vote {
                player_id: "p1".to_string(),
                round: 1,
                choice: VoteChoice::Reject,
            },
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            GameError::PhaseClosed {
                phase: GamePhase::HeadlineReveal,
                round: 1
            }
        );
    }

    #[test]
    fn test_stale_timeout_is_a_noop() {
        let mut session = started(5);
        let stale_seq = session.phase_seq;
        ready_all(&mut session);
        let phase = session.phase;
        let seq = session.phase_seq;

        let out = handle(
            &mut session,
            SessionCommand::Timeout {
                phase_seq: stale_seq,
            },
            Utc::now(),
        )
        .unwrap();
        assert!(out.is_noop());
        assert_eq!(session.phase, phase);
        assert_eq!(session.phase_seq, seq);
    }

    #[test]
    fn test_advance_if_due_respects_deadline() {
        let mut session = started(5);
        let now = Utc::now();
        let out = handle(&mut session, SessionCommand::AdvanceIfDue, now).unwrap();
        assert!(out.is_noop());

        let later = now + Duration::seconds(3600);
        handle(&mut session, SessionCommand::AdvanceIfDue, later).unwrap();
        assert_eq!(session.phase, GamePhase::HeadlineReveal);
    }

    #[test]
    fn test_abort_is_terminal() {
        let mut session = started(5);
        let out = handle(
            &mut session,
            SessionCommand::Abort {
                reason: "host left".to_string(),
            },
            Utc::now(),
        )
        .unwrap();
        assert!(out.finished);
        assert!(out.timer.is_none());
        assert_eq!(session.phase, GamePhase::GameEnd);
        assert!(matches!(session.result, GameResult::Aborted { .. }));

        assert!(matches!(
            handle(&mut session, SessionCommand::Start, Utc::now()),
            Err(GameError::PhaseClosed { .. })
        ));
    }

    #[test]
    fn test_lobby_timeout_with_too_few_players_aborts() {
        let mut session = session_with_players(3, vec![]);
        let out = open_lobby(&mut session, Utc::now());
        let seq = out.timer.unwrap().phase_seq;

        let out = handle(&mut session, SessionCommand::Timeout { phase_seq: seq }, Utc::now())
            .unwrap();
        assert!(out.finished);
        assert!(matches!(session.result, GameResult::Aborted { .. }));
    }

    #[test]
    fn test_headline_failure_keeps_phase_then_aborts() {
        let mut session = session_with_players(5, vec![]);
        handle(&mut session, SessionCommand::Start, Utc::now()).unwrap();

        let out = ready_all(&mut session);
        assert_eq!(session.phase, GamePhase::RoleAssignment);
        assert_eq!(session.round, 0);
        assert!(out
            .notifications
            .iter()
            .any(|n| matches!(n.event, GameEvent::RoundAborted { round: 1, .. })));

        for _ in 1..session.config().headline_retry_limit {
            let seq = session.phase_seq;
            handle(&mut session, SessionCommand::Timeout { phase_seq: seq }, Utc::now()).unwrap();
        }
        assert_eq!(session.phase, GamePhase::GameEnd);
        assert!(matches!(session.result, GameResult::Aborted { .. }));
    }

    #[test]
    fn test_win_priority_prefers_deception_threshold() {
        let mut session = started(5);
        session.round = session.max_rounds;
        session.fake_trusted = 3;
        session.fake_flagged = 3;
        assert_eq!(
            evaluate_win(&session),
            Some((Faction::Deception, WinReason::FakeHeadlinesTrusted))
        );

        session.fake_trusted = 0;
        assert_eq!(
            evaluate_win(&session),
            Some((Faction::Truth, WinReason::FakeHeadlinesFlagged))
        );

        session.fake_flagged = 0;
        assert_eq!(
            evaluate_win(&session),
            Some((Faction::Truth, WinReason::RoundsExhausted))
        );
    }

    #[test]
    fn test_faction_collapse() {
        let mut session = started(5);
        session.round = 1;
        assert_eq!(evaluate_win(&session), None);

        let deceiver = session
            .players
            .iter_mut()
            .find(|p| p.role == Some(Role::Deceiver))
            .unwrap();
        deceiver.reputation = 0;
        assert_eq!(
            evaluate_win(&session),
            Some((Faction::Truth, WinReason::OpponentsSilenced))
        );

        // 両陣営とも全滅した場合は真実陣営
        for player in session.players.iter_mut() {
            player.reputation = 0;
        }
        assert_eq!(
            evaluate_win(&session),
            Some((Faction::Truth, WinReason::OpponentsSilenced))
        );
    }
}
