use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::GameError;
use crate::models::config::{ConfigError, GameConfig};
use crate::models::notification::Notification;
use crate::models::player::PlayerEntry;
use crate::models::round::RoundResult;
use crate::models::session::{Session, SessionId, SessionSnapshot};
use crate::models::vote::VoteChoice;
use crate::services::game_service::{self, SessionCommand, Transition};
use crate::services::headline_service::HeadlineSourceFactory;
use crate::services::scheduler::{ScheduledTimer, Scheduler, TimerCommand};
use crate::utils::clock::Clock;

const NOTIFICATION_CAPACITY: usize = 1024;
const TIMER_CAPACITY: usize = 4096;
const ARCHIVE_CAPACITY: usize = 4096;

/// Immutable records handed to the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum ArchiveRecord {
    Round {
        session_id: SessionId,
        result: RoundResult,
    },
    Session(SessionSnapshot),
}

/// A session and its own notification channel.
#[derive(Clone)]
struct SessionEntry {
    state: Arc<Mutex<Session>>,
    notifications: broadcast::Sender<Notification>,
}

struct ManagerInner {
    sessions: RwLock<HashMap<SessionId, SessionEntry>>,
    config: Arc<GameConfig>,
    headlines: HeadlineSourceFactory,
    clock: Arc<dyn Clock>,
    seeds: Mutex<StdRng>,
    timers: mpsc::Sender<TimerCommand>,
    timer_rx: Mutex<Option<mpsc::Receiver<TimerCommand>>>,
    archive: mpsc::Sender<ArchiveRecord>,
    archive_rx: Mutex<Option<mpsc::Receiver<ArchiveRecord>>>,
}

/// Registry of running sessions. Each session sits behind its own lock, so
/// commands for one session are applied strictly in arrival order while
/// different sessions proceed in parallel.
///
/// Timers and archive records are buffered in bounded channels. Start the
/// timer loop with [`SessionManager::spawn_scheduler`] and drain
/// [`SessionManager::take_archive_receiver`]; once a buffer is full further
/// records are dropped with a warning.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<ManagerInner>,
}

impl SessionManager {
    pub fn new(
        config: GameConfig,
        headlines: HeadlineSourceFactory,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let seeds = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let (timers, timer_rx) = mpsc::channel(TIMER_CAPACITY);
        let (archive, archive_rx) = mpsc::channel(ARCHIVE_CAPACITY);

        Ok(Self {
            inner: Arc::new(ManagerInner {
                sessions: RwLock::new(HashMap::new()),
                config: Arc::new(config),
                headlines,
                clock,
                seeds: Mutex::new(seeds),
                timers,
                timer_rx: Mutex::new(Some(timer_rx)),
                archive,
                archive_rx: Mutex::new(Some(archive_rx)),
            }),
        })
    }

    pub fn config(&self) -> &GameConfig {
        &self.inner.config
    }

    /// Notifications of one session in emission order. The stream closes
    /// when the session is cleaned up.
    pub async fn subscribe(
        &self,
        session_id: &str,
    ) -> Result<broadcast::Receiver<Notification>, GameError> {
        Ok(self.entry(session_id).await?.notifications.subscribe())
    }

    /// The archive stream can be taken once.
    pub async fn take_archive_receiver(&self) -> Option<mpsc::Receiver<ArchiveRecord>> {
        self.inner.archive_rx.lock().await.take()
    }

    /// Starts the timer loop. Returns `None` if it is already running.
    pub async fn spawn_scheduler(&self) -> Option<JoinHandle<()>> {
        let rx = self.inner.timer_rx.lock().await.take()?;
        let weak = Arc::downgrade(&self.inner);
        let scheduler = Scheduler::new(self.inner.clock.clone());

        Some(tokio::spawn(scheduler.run(rx, move |timer| {
            let weak = weak.clone();
            async move {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let manager = SessionManager { inner };
                if let Err(e) = manager.handle_timer(timer).await {
                    warn!("Timer handling failed: {}", e);
                }
            }
        })))
    }

    pub async fn create_session(
        &self,
        entries: Vec<PlayerEntry>,
    ) -> Result<(SessionId, Vec<Notification>), GameError> {
        let config = &self.inner.config;
        if entries.len() > config.max_players {
            return Err(GameError::Validation(format!(
                "at most {} players may join, got {}",
                config.max_players,
                entries.len()
            )));
        }
        let mut seen = HashSet::new();
        for entry in &entries {
            if entry.id.trim().is_empty() {
                return Err(GameError::Validation("player id must not be empty".to_string()));
            }
            if !seen.insert(entry.id.as_str()) {
                return Err(GameError::Validation(format!(
                    "duplicate player id: {}",
                    entry.id
                )));
            }
        }

        let seed: u64 = self.inner.seeds.lock().await.gen();
        let session_id = Uuid::new_v4().to_string();
        let headlines = (self.inner.headlines)(seed.rotate_left(17));
        let mut session = Session::new(
            session_id.clone(),
            entries,
            config.clone(),
            StdRng::seed_from_u64(seed),
            headlines,
            self.inner.clock.now(),
        );
        let transition = game_service::open_lobby(&mut session, self.inner.clock.now());
        info!(
            "Session {} created with {} players",
            session_id,
            session.players.len()
        );

        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        let entry = SessionEntry {
            state: Arc::new(Mutex::new(session)),
            notifications,
        };
        // 登録前にロックを取り、作成通知が他の操作より先に流れるようにする
        let guard = entry.state.lock().await;
        self.inner
            .sessions
            .write()
            .await
            .insert(session_id.clone(), entry.clone());
        let notifications = self.dispatch(&entry.notifications, &guard, transition);
        drop(guard);

        Ok((session_id, notifications))
    }

    pub async fn join_session(
        &self,
        session_id: &str,
        entry: PlayerEntry,
    ) -> Result<Vec<Notification>, GameError> {
        self.execute(session_id, SessionCommand::Join(entry)).await
    }

    pub async fn leave_session(
        &self,
        session_id: &str,
        player_id: &str,
    ) -> Result<Vec<Notification>, GameError> {
        self.execute(
            session_id,
            SessionCommand::Leave {
                player_id: player_id.to_string(),
            },
        )
        .await
    }

    pub async fn start_session(&self, session_id: &str) -> Result<Vec<Notification>, GameError> {
        self.execute(session_id, SessionCommand::Start).await
    }

    pub async fn submit_vote(
        &self,
        session_id: &str,
        player_id: &str,
        round: u32,
        choice: VoteChoice,
    ) -> Result<Vec<Notification>, GameError> {
        self.execute(
            session_id,
            SessionCommand::Vote {
                player_id: player_id.to_string(),
                round,
                choice,
            },
        )
        .await
    }

    pub async fn submit_accusation(
        &self,
        session_id: &str,
        accuser_id: &str,
        target_id: &str,
    ) -> Result<Vec<Notification>, GameError> {
        self.execute(
            session_id,
            SessionCommand::Accuse {
                accuser_id: accuser_id.to_string(),
                target_id: target_id.to_string(),
            },
        )
        .await
    }

    pub async fn submit_message(
        &self,
        session_id: &str,
        player_id: &str,
        text: &str,
    ) -> Result<Vec<Notification>, GameError> {
        self.execute(
            session_id,
            SessionCommand::Message {
                player_id: player_id.to_string(),
                text: text.to_string(),
            },
        )
        .await
    }

    pub async fn swap_headline(
        &self,
        session_id: &str,
        player_id: &str,
    ) -> Result<Vec<Notification>, GameError> {
        self.execute(
            session_id,
            SessionCommand::SwapHeadline {
                player_id: player_id.to_string(),
            },
        )
        .await
    }

    pub async fn mark_ready(
        &self,
        session_id: &str,
        player_id: &str,
    ) -> Result<Vec<Notification>, GameError> {
        self.execute(
            session_id,
            SessionCommand::Ready {
                player_id: player_id.to_string(),
            },
        )
        .await
    }

    pub async fn advance_phase_if_due(
        &self,
        session_id: &str,
    ) -> Result<Vec<Notification>, GameError> {
        self.execute(session_id, SessionCommand::AdvanceIfDue).await
    }

    /// Timeout attempt for a fired timer. Timers of sessions that are gone
    /// are ignored.
    pub async fn handle_timer(&self, timer: ScheduledTimer) -> Result<Vec<Notification>, GameError> {
        debug!(
            "Timer fired: session={} phase={} seq={}",
            timer.session_id, timer.phase, timer.phase_seq
        );
        match self
            .execute(
                &timer.session_id,
                SessionCommand::Timeout {
                    phase_seq: timer.phase_seq,
                },
            )
            .await
        {
            Err(GameError::UnknownSession(_)) => Ok(Vec::new()),
            other => other,
        }
    }

    pub async fn abort_session(
        &self,
        session_id: &str,
        reason: &str,
    ) -> Result<Vec<Notification>, GameError> {
        self.execute(
            session_id,
            SessionCommand::Abort {
                reason: reason.to_string(),
            },
        )
        .await
    }

    pub async fn snapshot(&self, session_id: &str) -> Result<SessionSnapshot, GameError> {
        let entry = self.entry(session_id).await?;
        let session = entry.state.lock().await;
        Ok(session.snapshot())
    }

    pub async fn list_sessions(&self) -> Vec<SessionSnapshot> {
        let entries: Vec<_> = self.inner.sessions.read().await.values().cloned().collect();
        let mut snapshots = Vec::with_capacity(entries.len());
        for entry in entries {
            snapshots.push(entry.state.lock().await.snapshot());
        }
        snapshots.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        snapshots
    }

    pub async fn session_count(&self) -> usize {
        self.inner.sessions.read().await.len()
    }

    /// Drops terminal sessions. Their final snapshot has already been
    /// archived when they finished. Dropping the entry closes its
    /// notification channel.
    pub async fn cleanup_finished(&self) -> usize {
        let mut sessions = self.inner.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| match entry.state.try_lock() {
            Ok(session) => !session.is_terminal(),
            Err(_) => true,
        });
        let removed = before - sessions.len();
        if removed > 0 {
            info!("Cleaned up {} finished sessions", removed);
        }
        removed
    }

    async fn entry(&self, session_id: &str) -> Result<SessionEntry, GameError> {
        self.inner
            .sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| GameError::UnknownSession(session_id.to_string()))
    }

    async fn execute(
        &self,
        session_id: &str,
        command: SessionCommand,
    ) -> Result<Vec<Notification>, GameError> {
        let entry = self.entry(session_id).await?;
        let mut session = entry.state.lock().await;
        let now = self.inner.clock.now();

        match game_service::handle(&mut session, command, now) {
            Ok(transition) => Ok(self.dispatch(&entry.notifications, &session, transition)),
            Err(e) => {
                debug!("Session {}: rejected ({})", session_id, e);
                Err(e)
            }
        }
    }

    /// Forwards a transition's side effects. Runs while the session lock is
    /// held so notifications leave in the order they were produced.
    fn dispatch(
        &self,
        channel: &broadcast::Sender<Notification>,
        session: &Session,
        transition: Transition,
    ) -> Vec<Notification> {
        let Transition {
            notifications,
            timer,
            archived,
            finished,
        } = transition;

        if let Some(timer) = timer {
            self.send_timer(TimerCommand::Schedule(timer));
        }
        for result in archived {
            self.send_archive(ArchiveRecord::Round {
                session_id: session.id.clone(),
                result,
            });
        }
        if finished {
            self.send_timer(TimerCommand::CancelSession(session.id.clone()));
            self.send_archive(ArchiveRecord::Session(session.snapshot()));
            info!("Session {} finished: {:?}", session.id, session.result);
        }
        for notification in &notifications {
            // 購読者がいない場合の送信エラーは無視する
            let _ = channel.send(notification.clone());
        }
        notifications
    }

    fn send_timer(&self, command: TimerCommand) {
        match self.inner.timers.try_send(command) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(command)) => {
                warn!("Timer buffer is full, dropping {:?}", command);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Timer loop is gone, command dropped");
            }
        }
    }

    fn send_archive(&self, record: ArchiveRecord) {
        match self.inner.archive.try_send(record) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(record)) => match record {
                ArchiveRecord::Round { session_id, result } => warn!(
                    "Archive buffer is full, dropping round {} of session {}",
                    result.round, session_id
                ),
                ArchiveRecord::Session(snapshot) => warn!(
                    "Archive buffer is full, dropping final snapshot of session {}",
                    snapshot.id
                ),
            },
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Archive receiver is gone, record dropped");
            }
        }
    }
}
