use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::models::session::{GamePhase, SessionId};
use crate::utils::clock::Clock;

// タイマーがない時の待機上限
const IDLE_WAIT: Duration = Duration::from_secs(3600);

/// A phase deadline. Stale once the session's `phase_seq` moves on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTimer {
    pub session_id: SessionId,
    pub phase: GamePhase,
    pub round: u32,
    pub phase_seq: u64,
    pub due_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TimerCommand {
    Schedule(ScheduledTimer),
    CancelSession(SessionId),
}

#[derive(Clone, Debug)]
struct QueuedTimer {
    sequence: u64,
    timer: ScheduledTimer,
}

impl PartialEq for QueuedTimer {
    fn eq(&self, other: &Self) -> bool {
        self.timer.due_at == other.timer.due_at && self.sequence == other.sequence
    }
}

impl Eq for QueuedTimer {}

impl PartialOrd for QueuedTimer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// BinaryHeap は最大ヒープなので逆順で比較する
impl Ord for QueuedTimer {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .timer
            .due_at
            .cmp(&self.timer.due_at)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Min-heap of timers ordered by `(due_at, insertion order)`.
#[derive(Debug, Default)]
pub struct TimerQueue {
    heap: BinaryHeap<QueuedTimer>,
    next_sequence: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, timer: ScheduledTimer) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(QueuedTimer { sequence, timer });
    }

    pub fn peek_due(&self) -> Option<DateTime<Utc>> {
        self.heap.peek().map(|q| q.timer.due_at)
    }

    pub fn pop_if_due(&mut self, now: DateTime<Utc>) -> Option<ScheduledTimer> {
        if self.heap.peek().is_some_and(|q| q.timer.due_at <= now) {
            self.heap.pop().map(|q| q.timer)
        } else {
            None
        }
    }

    /// Drops every pending timer of `session_id`, returning how many.
    pub fn cancel_session(&mut self, session_id: &str) -> usize {
        let before = self.heap.len();
        self.heap.retain(|q| q.timer.session_id != session_id);
        before - self.heap.len()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

/// Single loop that turns due timers into timeout attempts.
pub struct Scheduler {
    queue: TimerQueue,
    clock: Arc<dyn Clock>,
}

impl Scheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            queue: TimerQueue::new(),
            clock,
        }
    }

    fn apply(&mut self, command: TimerCommand) {
        match command {
            TimerCommand::Schedule(timer) => {
                debug!(
                    "Timer scheduled: session={} phase={} seq={} due={}",
                    timer.session_id, timer.phase, timer.phase_seq, timer.due_at
                );
                self.queue.schedule(timer);
            }
            TimerCommand::CancelSession(session_id) => {
                let dropped = self.queue.cancel_session(&session_id);
                debug!("Cancelled {} timers of session {}", dropped, session_id);
            }
        }
    }

    /// Runs until every command sender is dropped. `fire` is awaited for
    /// each due timer in deadline order.
    pub async fn run<F, Fut>(mut self, mut commands: mpsc::Receiver<TimerCommand>, fire: F)
    where
        F: Fn(ScheduledTimer) -> Fut,
        Fut: Future<Output = ()>,
    {
        info!("Timer scheduler started");
        loop {
            while let Some(timer) = self.queue.pop_if_due(self.clock.now()) {
                fire(timer).await;
            }

            let wait = self
                .queue
                .peek_due()
                .map(|due| (due - self.clock.now()).to_std().unwrap_or(Duration::ZERO))
                .unwrap_or(IDLE_WAIT);

            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.apply(command),
                    None => break,
                },
                _ = tokio::time::sleep(wait) => {}
            }
        }
        info!("Timer scheduler stopped");
    }
}
