//! Per-task bookkeeping: round count, message history, terminal status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::Message;

/// Position of a task in the routing state machine.
///
/// Transitions are monotonic: a task never re-enters `Pending` and never
/// leaves a terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Created, not yet submitted to the Planner.
    Pending,
    /// Waiting for the Planner to emit a plan block.
    Planning,
    /// Plan forwarded; waiting for the Executer's result.
    Executing,
    /// Result forwarded; waiting for the Planner's verdict.
    Reviewing,
    /// The Planner signalled completion.
    Done,
    /// Endpoint loss, round limit, or interruption.
    Failed,
    /// A phase wait exhausted its budget.
    TimedOut,
}

impl TaskStatus {
    /// True once the task has been archived; no further transitions happen.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Done | TaskStatus::Failed | TaskStatus::TimedOut
        )
    }
}

/// One end-to-end user request and its accumulated state.
///
/// Mutated exclusively by the routing engine. Pure bookkeeping, no I/O.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub description: String,
    /// Completed Planner→Executer→Planner cycles. Starts at 0.
    pub round: u32,
    pub status: TaskStatus,
    /// Accepted messages in acceptance order, append-only.
    pub history: Vec<Message>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            round: 0,
            status: TaskStatus::Pending,
            history: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Appends an accepted message to the history.
    ///
    /// History ordering matches the order messages were accepted by the
    /// engine, not the order they appeared in raw captures.
    pub fn record(&mut self, message: Message) {
        self.history.push(message);
    }

    /// Marks one Planner→Executer→Planner cycle complete.
    pub fn advance_round(&mut self) {
        self.round += 1;
    }

    /// Moves the task along the state machine.
    ///
    /// Once a terminal status is reached further transitions are ignored,
    /// and no transition may return to `Pending`.
    pub fn transition(&mut self, status: TaskStatus) {
        if self.status.is_terminal() || status == TaskStatus::Pending {
            return;
        }
        self.status = status;
    }

    /// Archives the task with a terminal status. No-op if already terminal.
    pub fn finalize(&mut self, status: TaskStatus) {
        debug_assert!(status.is_terminal());
        self.transition(status);
    }
}
