use chrono::Utc;
use truthwars_engine::{
    models::{
        player::{Player, PlayerId},
        role::{Faction, Role},
        session::{GamePhase, GameResult, Session, WinReason},
        vote::{MajorityOutcome, Vote, VoteChoice},
    },
    services::game_service::{self, SessionCommand, Transition},
    utils::test_setup::{session_with_players, setup_test_env, test_headline},
    Audience, GameError, GameEvent,
};

fn send(session: &mut Session, command: SessionCommand) -> Transition {
    game_service::handle(session, command, Utc::now()).unwrap()
}

fn ids(session: &Session) -> Vec<PlayerId> {
    session.active_players().map(|p| p.id.clone()).collect()
}

fn ready_all(session: &mut Session) -> Vec<Transition> {
    ids(session)
        .into_iter()
        .map(|player_id| send(session, SessionCommand::Ready { player_id }))
        .collect()
}

fn id_with_role(session: &Session, role: Role) -> PlayerId {
    session
        .players
        .iter()
        .find(|p| p.role == Some(role))
        .map(|p| p.id.clone())
        .unwrap()
}

/// Drives one round from HeadlineReveal to RoundResults. Every pending
/// accuser passes.
fn play_round(session: &mut Session, choose: impl Fn(&Player) -> VoteChoice) {
    assert_eq!(session.phase, GamePhase::HeadlineReveal);
    ready_all(session);
    assert_eq!(session.phase, GamePhase::Discussion);
    ready_all(session);
    assert_eq!(session.phase, GamePhase::Voting);

    let round = session.round;
    let ballots: Vec<(PlayerId, VoteChoice)> = session
        .active_players()
        .map(|p| (p.id.clone(), choose(p)))
        .collect();
    for (player_id, choice) in ballots {
        send(
            session,
            SessionCommand::Vote {
                player_id,
                round,
                choice,
            },
        );
    }

    if session.phase == GamePhase::AccusationWindow {
        let pending: Vec<PlayerId> = session.pending_accusers().map(|p| p.id.clone()).collect();
        for player_id in pending {
            send(session, SessionCommand::Ready { player_id });
        }
    }
    assert_eq!(session.phase, GamePhase::RoundResults);
}

fn started_with(n: usize, truth_values: &[bool]) -> Session {
    setup_test_env();
    let headlines = truth_values
        .iter()
        .enumerate()
        .map(|(i, is_true)| test_headline(&format!("h{}", i + 1), *is_true))
        .collect();
    let mut session = session_with_players(n, headlines);
    send(&mut session, SessionCommand::Start);
    ready_all(&mut session);
    session
}

fn started_session(n: usize, fake_only: bool) -> Session {
    let truth_values: Vec<bool> = (1..=10).map(|i| !fake_only && i % 2 == 0).collect();
    started_with(n, &truth_values)
}

#[test]
fn test_deception_wins_at_threshold_before_last_round() {
    let mut session = started_session(5, true);

    for round in 1..=3 {
        assert_eq!(session.round, round);
        play_round(&mut session, |_| VoteChoice::Believe);
        let last = ready_all(&mut session);
        if round < 3 {
            assert_eq!(session.phase, GamePhase::HeadlineReveal);
        } else {
            assert!(last.last().unwrap().finished);
        }
    }

    assert_eq!(session.phase, GamePhase::GameEnd);
    assert_eq!(session.round, 3);
    assert!(session.round < session.max_rounds);
    assert_eq!(session.fake_trusted, 3);
    assert_eq!(
        session.result,
        GameResult::Won {
            faction: Faction::Deception,
            reason: WinReason::FakeHeadlinesTrusted
        }
    );
}

#[test]
fn test_truth_wins_by_flagging_fakes() {
    let mut session = started_session(6, true);
    for _ in 1..=3 {
        play_round(&mut session, |_| VoteChoice::Reject);
        ready_all(&mut session);
    }
    assert_eq!(
        session.result,
        GameResult::Won {
            faction: Faction::Truth,
            reason: WinReason::FakeHeadlinesFlagged
        }
    );
    assert_eq!(session.scores.truth, 3);
}

#[test]
fn test_rounds_exhausted_defaults_to_truth() {
    // 偽見出しは 5 ラウンド中 2 件だけなので閾値に届かない
    let mut session = started_with(5, &[true, false, true, false, true]);
    let mut round = 0;
    while session.phase != GamePhase::GameEnd {
        round += 1;
        let is_true = session.headline.as_ref().unwrap().is_true;
        play_round(&mut session, move |_| {
            if is_true {
                VoteChoice::Believe
            } else {
                VoteChoice::Reject
            }
        });
        ready_all(&mut session);
    }
    assert_eq!(round, 5);
    assert_eq!(session.results.len(), 5);
    assert_eq!(
        session.result,
        GameResult::Won {
            faction: Faction::Truth,
            reason: WinReason::RoundsExhausted
        }
    );
    // 全員正解なので全員 3 + 5
    assert!(session.players.iter().all(|p| p.reputation == 8));
}

#[test]
fn test_timeout_after_completion_is_a_noop() {
    let mut session = started_session(5, true);
    ready_all(&mut session);
    ready_all(&mut session);
    assert_eq!(session.phase, GamePhase::Voting);
    let voting_seq = session.phase_seq;

    play_round_votes(&mut session, VoteChoice::Reject);
    assert_eq!(session.phase, GamePhase::RoundResults);
    let seq = session.phase_seq;
    let results = session.results.clone();

    let out = send(
        &mut session,
        SessionCommand::Timeout {
            phase_seq: voting_seq,
        },
    );
    assert!(out.notifications.is_empty());
    assert!(out.timer.is_none());
    assert_eq!(session.phase, GamePhase::RoundResults);
    assert_eq!(session.phase_seq, seq);
    assert_eq!(session.results, results);
}

fn play_round_votes(session: &mut Session, choice: VoteChoice) {
    let round = session.round;
    for player_id in ids(session) {
        send(
            session,
            SessionCommand::Vote {
                player_id,
                round,
                choice,
            },
        );
    }
}

#[test]
fn test_vote_resubmission_overwrites() {
    let mut session = started_session(5, true);
    ready_all(&mut session);
    ready_all(&mut session);

    let first = send(
        &mut session,
        SessionCommand::Vote {
            player_id: "p1".to_string(),
            round: 1,
            choice: VoteChoice::Believe,
        },
    );
    let second = send(
        &mut session,
        SessionCommand::Vote {
            player_id: "p1".to_string(),
            round: 1,
            choice: VoteChoice::Reject,
        },
    );
    assert!(matches!(
        first.notifications[0].event,
        GameEvent::VoteRecorded { replaced: false, .. }
    ));
    assert!(matches!(
        second.notifications[0].event,
        GameEvent::VoteRecorded { replaced: true, .. }
    ));
    assert_eq!(session.votes.len(), 1);
    assert_eq!(session.votes["p1"].choice, VoteChoice::Reject);

    // 前のラウンド番号での投票は締め切り済み
    let err = game_service::handle(
        &mut session,
        SessionCommand::Vote {
            player_id: "p2".to_string(),
            round: 0,
            choice: VoteChoice::Reject,
        },
        Utc::now(),
    )
    .unwrap_err();
    assert!(matches!(err, GameError::PhaseClosed { .. }));
}

#[test]
fn test_ghosts_keep_their_vote() {
    let mut session = started_session(5, true);
    for player in session.players.iter_mut() {
        player.reputation = 0;
    }
    ready_all(&mut session);
    ready_all(&mut session);
    play_round_votes(&mut session, VoteChoice::Reject);

    let result = session.results.last().unwrap();
    assert_eq!(result.reject_weight, 5);
    assert_eq!(result.majority, MajorityOutcome::Reject);
    assert!(session.players.iter().all(|p| p.reputation == 1));
}

#[test]
fn test_ghost_messages_are_not_counted() {
    let mut session = started_session(5, true);
    ready_all(&mut session);
    assert_eq!(session.phase, GamePhase::Discussion);
    session.player_mut("p1").unwrap().reputation = 0;

    let out = send(
        &mut session,
        SessionCommand::Message {
            player_id: "p1".to_string(),
            text: "I think it's fake".to_string(),
        },
    );
    assert!(matches!(
        out.notifications[0].event,
        GameEvent::MessagePosted { counted: false, .. }
    ));
    assert_eq!(session.player("p1").unwrap().messages_counted, 0);

    send(
        &mut session,
        SessionCommand::Message {
            player_id: "p2".to_string(),
            text: "  agreed  ".to_string(),
        },
    );
    assert_eq!(session.player("p2").unwrap().messages_counted, 1);

    let too_long = "x".repeat(session.config().message_max_len + 1);
    let err = game_service::handle(
        &mut session,
        SessionCommand::Message {
            player_id: "p2".to_string(),
            text: too_long,
        },
        Utc::now(),
    )
    .unwrap_err();
    assert!(matches!(err, GameError::Validation(_)));
}

#[test]
fn test_accusation_window_restriction_and_expiry() {
    let mut session = started_session(5, true);
    play_round(&mut session, |_| VoteChoice::Reject);
    ready_all(&mut session);

    // ラウンド 2 は告発ラウンド
    ready_all(&mut session);
    ready_all(&mut session);
    play_round_votes(&mut session, VoteChoice::Reject);
    assert_eq!(session.phase, GamePhase::AccusationWindow);

    let checker = id_with_role(&session, Role::FactChecker);
    let deceiver = id_with_role(&session, Role::Deceiver);
    let out = send(
        &mut session,
        SessionCommand::Accuse {
            accuser_id: checker.clone(),
            target_id: deceiver.clone(),
        },
    );
    assert!(out.notifications.iter().any(|n| matches!(
        &n.event,
        GameEvent::PlayerRestricted { player_id, through_round: 3 } if *player_id == deceiver
    )));
    // Deceiver still holds an accusation, so the window stays open
    assert_eq!(session.phase, GamePhase::AccusationWindow);
    let view = session.snapshot();
    let target = view.players.iter().find(|p| p.id == deceiver).unwrap();
    assert_eq!(target.restriction_count, 1);
    assert_eq!(target.restricted_through, Some(3));

    let err = game_service::handle(
        &mut session,
        SessionCommand::Accuse {
            accuser_id: checker.clone(),
            target_id: deceiver.clone(),
        },
        Utc::now(),
    )
    .unwrap_err();
    assert_eq!(err, GameError::AbilityAlreadyUsed(checker.clone()));

    send(
        &mut session,
        SessionCommand::Ready {
            player_id: deceiver.clone(),
        },
    );
    assert_eq!(session.phase, GamePhase::RoundResults);
    let record = &session.results.last().unwrap().accusations[0];
    assert!(record.success);

    // 唯一の Deceiver が制限されたため真実陣営の勝ち
    let last = ready_all(&mut session);
    assert!(last.last().unwrap().finished);
    assert_eq!(
        session.result,
        GameResult::Won {
            faction: Faction::Truth,
            reason: WinReason::OpponentsSilenced
        }
    );
}

#[test]
fn test_restriction_lifts_at_round_start() {
    let mut session = started_session(5, true);
    let regular = id_with_role(&session, Role::Regular);
    session.player_mut(&regular).unwrap().restricted_through = Some(1);

    ready_all(&mut session);
    let err = game_service::handle(
        &mut session,
        SessionCommand::Message {
            player_id: regular.clone(),
            text: "hello".to_string(),
        },
        Utc::now(),
    )
    .unwrap_err();
    assert_eq!(err, GameError::CommunicationRestricted(regular.clone()));

    ready_all(&mut session);
    play_round_votes(&mut session, VoteChoice::Reject);
    let transitions = ready_all(&mut session);
    let lifted = transitions.last().unwrap().notifications.iter().any(|n| {
        matches!(&n.event, GameEvent::RestrictionLifted { player_id, round: 2 } if *player_id == regular)
    });
    assert!(lifted);
    assert_eq!(session.player(&regular).unwrap().restricted_through, None);
}

#[test]
fn test_headline_swap_once_per_deceiver() {
    let mut session = started_session(5, true);
    let deceiver = id_with_role(&session, Role::Deceiver);
    let regular = id_with_role(&session, Role::Regular);
    let before = session.headline.as_ref().unwrap().id.clone();

    let out = send(
        &mut session,
        SessionCommand::SwapHeadline {
            player_id: deceiver.clone(),
        },
    );
    assert!(matches!(
        out.notifications[0].event,
        GameEvent::HeadlineSwapped { round: 1, .. }
    ));
    assert_ne!(session.headline.as_ref().unwrap().id, before);

    let err = game_service::handle(
        &mut session,
        SessionCommand::SwapHeadline {
            player_id: deceiver.clone(),
        },
        Utc::now(),
    )
    .unwrap_err();
    assert_eq!(err, GameError::AbilityAlreadyUsed(deceiver));

    let err = game_service::handle(
        &mut session,
        SessionCommand::SwapHeadline {
            player_id: regular.clone(),
        },
        Utc::now(),
    )
    .unwrap_err();
    assert_eq!(err, GameError::NotEligible(regular));
}

#[test]
fn test_fact_checker_info_withheld_in_no_info_round() {
    setup_test_env();
    let headlines = vec![test_headline("h1", false), test_headline("h2", true)];
    let mut session = session_with_players(5, headlines);
    send(&mut session, SessionCommand::Start);
    let checker = id_with_role(&session, Role::FactChecker);
    let deceiver = id_with_role(&session, Role::Deceiver);
    session.player_mut(&checker).unwrap().no_info_round = Some(1);

    let transitions = ready_all(&mut session);
    assert_eq!(session.phase, GamePhase::HeadlineReveal);
    let reveal = transitions.last().unwrap();

    let to_checker: Vec<_> = reveal
        .notifications
        .iter()
        .filter(|n| n.audience == Audience::Player(checker.clone()))
        .collect();
    assert_eq!(to_checker.len(), 1);
    assert!(matches!(
        &to_checker[0].event,
        GameEvent::InfoWithheld { player_id, round: 1 } if *player_id == checker
    ));

    let to_deceiver: Vec<_> = reveal
        .notifications
        .iter()
        .filter(|n| n.audience == Audience::Player(deceiver.clone()))
        .collect();
    assert_eq!(to_deceiver.len(), 1);
    assert!(matches!(
        &to_deceiver[0].event,
        GameEvent::TruthHint { player_id, round: 1, is_true: false, .. } if *player_id == deceiver
    ));
}

#[test]
fn test_failed_swap_keeps_ability() {
    // 見出しは 1 件しかないので差し替え先がない
    let mut session = started_with(5, &[false]);
    assert_eq!(session.phase, GamePhase::HeadlineReveal);
    let deceiver = id_with_role(&session, Role::Deceiver);

    let err = game_service::handle(
        &mut session,
        SessionCommand::SwapHeadline {
            player_id: deceiver.clone(),
        },
        Utc::now(),
    )
    .unwrap_err();
    assert_eq!(err, GameError::NoHeadlineAvailable);
    assert_eq!(session.headline.as_ref().unwrap().id, "h1");
    assert!(!session.player(&deceiver).unwrap().swap_used);
}

#[test]
fn test_forged_vote_fails_the_session() {
    let mut session = started_session(5, true);
    ready_all(&mut session);
    ready_all(&mut session);
    assert_eq!(session.phase, GamePhase::Voting);

    session.votes.insert(
        "p1".to_string(),
        Vote {
            round: session.round,
            player_id: "p1".to_string(),
            choice: VoteChoice::Believe,
            weight: 9,
        },
    );
    let seq = session.phase_seq;
    let out = send(&mut session, SessionCommand::Timeout { phase_seq: seq });

    assert!(out.finished);
    assert!(out
        .notifications
        .iter()
        .any(|n| matches!(n.event, GameEvent::SessionFailed { .. })));
    assert_eq!(session.phase, GamePhase::GameEnd);
    assert!(matches!(session.result, GameResult::Failed { .. }));
}
