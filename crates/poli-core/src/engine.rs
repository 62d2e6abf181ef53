//! The turn-taking routing engine.
//!
//! One task flows Planner → Executer → Planner until the Planner signals
//! completion or a budget runs out. Both endpoints are shared, order-sensitive
//! resources, so a single engine processes one task at a time and owns the
//! consumed-block cursor for each pane.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use poli_proto::{Endpoint, EndpointError, Message, Role, RouteError, Task, TaskStatus};

use crate::completion::CompletionPolicy;
use crate::config::RouteConfig;
use crate::cursor::CaptureCursor;
use crate::instructions::InstructionBuilder;
use crate::policy::{WaitOutcome, WaitPolicy, WaitSpec};

/// The final state of a routing session.
#[derive(Debug)]
pub struct RouteReport {
    /// The task with its terminal status, round count, and full history.
    pub task: Task,
    /// Human-readable reason when the task did not reach `Done`.
    pub reason: Option<String>,
}

impl RouteReport {
    pub fn succeeded(&self) -> bool {
        self.task.status == TaskStatus::Done
    }
}

/// The final state of a monitor session: every task the Planner opened, in
/// first-seen order, plus the reason the bridge stopped (if it did not stop
/// by cancellation).
#[derive(Debug)]
pub struct MonitorReport {
    pub tasks: Vec<Task>,
    pub reason: Option<String>,
}

/// Orchestrates tasks end-to-end over a pair of pane endpoints.
///
/// The engine holds handles to the two panes for the lifetime of a session;
/// it does not own their underlying process lifecycle.
pub struct RoutingEngine {
    planner: Arc<dyn Endpoint>,
    executer: Arc<dyn Endpoint>,
    config: RouteConfig,
    completion: CompletionPolicy,
    instructions: InstructionBuilder,
    wait: WaitPolicy,
    cancel: CancellationToken,
    planner_cursor: CaptureCursor,
    executer_cursor: CaptureCursor,
}

impl RoutingEngine {
    pub fn new(
        planner: Arc<dyn Endpoint>,
        executer: Arc<dyn Endpoint>,
        config: RouteConfig,
    ) -> Self {
        let instructions = InstructionBuilder::new();
        let wait = WaitPolicy::new(&config, instructions.nudge());
        Self {
            planner,
            executer,
            config,
            completion: CompletionPolicy::default(),
            instructions,
            wait,
            cancel: CancellationToken::new(),
            planner_cursor: CaptureCursor::new(),
            executer_cursor: CaptureCursor::new(),
        }
    }

    /// Replaces the default completion policy.
    pub fn with_completion_policy(mut self, completion: CompletionPolicy) -> Self {
        self.completion = completion;
        self
    }

    /// A token the caller can cancel to abort the active session. The abort
    /// is observed within one polling interval, after which no further input
    /// is sent to either endpoint.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Routes one task to a terminal status.
    pub async fn route(
        &mut self,
        task_id: impl Into<String>,
        description: impl Into<String>,
    ) -> RouteReport {
        let mut task = Task::new(task_id, description);
        info!(
            task_id = %task.id,
            max_rounds = self.config.max_rounds,
            "starting routing session"
        );

        if self.cancel.is_cancelled() {
            return Self::interrupted(task);
        }

        // PENDING → PLANNING: hand the user request to the Planner.
        let prompt = self
            .instructions
            .initial_task(&task.id, &task.description);
        if let Err(err) = self.planner.send(&prompt).await {
            return Self::endpoint_lost(task, &err);
        }
        task.transition(TaskStatus::Planning);

        loop {
            // Planner phase: wait for the next plan-like or completion block.
            // Planner-originated envelopes are addressed to EXECUTER.
            let planner_msg = match self.await_planner(&mut task).await {
                Ok(msg) => msg,
                Err(report) => return *report,
            };

            if self.completion.is_complete(&planner_msg) {
                info!(task_id = %task.id, round = task.round, "planner signalled completion");
                // Best-effort closing summary; the task is already done.
                let _ = self.planner.send(self.instructions.final_summary()).await;
                task.finalize(TaskStatus::Done);
                return RouteReport { task, reason: None };
            }

            // Continuation past the round limit fails the task.
            if task.round >= self.config.max_rounds {
                let err = RouteError::RoundLimitExceeded { rounds: task.round };
                warn!(task_id = %task.id, "{err}");
                task.finalize(TaskStatus::Failed);
                return RouteReport {
                    task,
                    reason: Some(err.to_string()),
                };
            }

            // PLANNING → EXECUTING: forward the instructions verbatim.
            task.transition(TaskStatus::Executing);
            let prompt = self.instructions.forward_to_executer(&planner_msg);
            if let Err(err) = self.executer.send(&prompt).await {
                return Self::endpoint_lost(task, &err);
            }

            let result_msg = match self.await_executer(&mut task).await {
                Ok(msg) => msg,
                Err(report) => return *report,
            };

            // EXECUTING → REVIEWING: relay the result and count the cycle.
            task.advance_round();
            task.transition(TaskStatus::Reviewing);
            let prompt =
                self.instructions
                    .review_result(&result_msg, task.round, &task.description);
            if let Err(err) = self.planner.send(&prompt).await {
                return Self::endpoint_lost(task, &err);
            }
        }
    }

    /// Bridges a Planner the user drives directly.
    ///
    /// No prompts are injected into the Planner pane and no nudges are sent
    /// to it; the engine only listens for plan-like blocks (any task id),
    /// runs the Executer leg for each, and relays results back. Tasks are
    /// tracked per id; completion and the round limit apply per task. The
    /// loop runs until cancellation or an endpoint is lost.
    pub async fn monitor(&mut self) -> MonitorReport {
        let mut tasks: Vec<Task> = Vec::new();
        info!(
            max_rounds = self.config.max_rounds,
            "starting monitor session"
        );

        let listen = WaitSpec {
            expected_to: Role::Executer,
            task_id: None,
            budget: self.config.plan_timeout,
            nudge: false,
        };

        // Blocks for several tasks can land in one capture; the first is
        // accepted by the wait, the rest arrive through the observer and
        // queue up here so none is lost.
        let mut pending: VecDeque<Message> = VecDeque::new();

        let reason = loop {
            let msg = match pending.pop_front() {
                Some(msg) => msg,
                None => {
                    let mut trailing = Vec::new();
                    let outcome = self
                        .wait
                        .wait_for_block(
                            self.planner.as_ref(),
                            &listen,
                            &mut self.planner_cursor,
                            &self.cancel,
                            |m| trailing.push(m),
                        )
                        .await;
                    match outcome {
                        Ok(WaitOutcome::Accepted(msg)) => {
                            pending.extend(trailing);
                            msg
                        }
                        // A quiet Planner is normal here; keep listening.
                        Ok(WaitOutcome::TimedOut { .. }) => continue,
                        Ok(WaitOutcome::Cancelled) => break None,
                        Err(err) => break Some(RouteError::from(err).to_string()),
                    }
                }
            };

            let task = task_entry(&mut tasks, &msg);
            task.record(msg.clone());

            if task.status.is_terminal() {
                warn!(task_id = %task.id, "ignoring block for a finished task");
                continue;
            }
            if self.completion.is_complete(&msg) {
                info!(task_id = %task.id, round = task.round, "planner signalled completion");
                task.finalize(TaskStatus::Done);
                continue;
            }
            if !msg.is_plan_like() {
                warn!(kind = %msg.kind, "ignoring unexpected block kind from planner");
                continue;
            }
            if task.round >= self.config.max_rounds {
                let err = RouteError::RoundLimitExceeded { rounds: task.round };
                warn!(task_id = %task.id, "{err}");
                task.finalize(TaskStatus::Failed);
                continue;
            }

            info!(task_id = %task.id, round = task.round + 1, kind = %msg.kind, "bridging to executer");
            task.transition(TaskStatus::Planning);
            task.transition(TaskStatus::Executing);
            let prompt = self.instructions.forward_to_executer(&msg);
            if let Err(err) = self.executer.send(&prompt).await {
                task.finalize(TaskStatus::Failed);
                break Some(RouteError::from(err).to_string());
            }

            let exec = WaitSpec {
                expected_to: Role::Planner,
                task_id: Some(task.id.clone()),
                budget: self.config.exec_timeout,
                nudge: true,
            };
            let result_msg = loop {
                let outcome = self
                    .wait
                    .wait_for_block(
                        self.executer.as_ref(),
                        &exec,
                        &mut self.executer_cursor,
                        &self.cancel,
                        |m| task.record(m),
                    )
                    .await;
                match outcome {
                    Ok(WaitOutcome::Accepted(m)) => {
                        task.record(m.clone());
                        if m.is_result_like() {
                            break Ok(Some(m));
                        }
                        warn!(kind = %m.kind, "ignoring unexpected block kind from executer");
                    }
                    Ok(WaitOutcome::TimedOut { .. }) => {
                        warn!(task_id = %task.id, "executer timed out; task abandoned");
                        task.finalize(TaskStatus::TimedOut);
                        break Ok(None);
                    }
                    Ok(WaitOutcome::Cancelled) => break Err(None),
                    Err(err) => {
                        task.finalize(TaskStatus::Failed);
                        break Err(Some(RouteError::from(err).to_string()));
                    }
                }
            };
            let result_msg = match result_msg {
                Ok(Some(m)) => m,
                // This task is done for; other tasks may still arrive.
                Ok(None) => continue,
                Err(reason) => break reason,
            };

            task.advance_round();
            task.transition(TaskStatus::Reviewing);
            let prompt =
                self.instructions
                    .review_result(&result_msg, task.round, &task.description);
            if let Err(err) = self.planner.send(&prompt).await {
                break Some(RouteError::from(err).to_string());
            }
        };

        MonitorReport { tasks, reason }
    }

    /// Waits on the Planner pane for a plan-like or completion block,
    /// recording everything accepted into the task history.
    async fn await_planner(&mut self, task: &mut Task) -> Result<Message, Box<RouteReport>> {
        let spec = WaitSpec {
            expected_to: Role::Executer,
            task_id: Some(task.id.clone()),
            budget: self.config.plan_timeout,
            nudge: true,
        };
        loop {
            let outcome = self
                .wait
                .wait_for_block(
                    self.planner.as_ref(),
                    &spec,
                    &mut self.planner_cursor,
                    &self.cancel,
                    |msg| task.record(msg),
                )
                .await;

            let msg = match Self::unwrap_outcome(task, outcome)? {
                Some(msg) => msg,
                None => continue,
            };
            task.record(msg.clone());

            if msg.is_plan_like() || self.completion.is_complete(&msg) {
                return Ok(msg);
            }
            warn!(kind = %msg.kind, "ignoring unexpected block kind from planner");
        }
    }

    /// Waits on the Executer pane for a result-like block.
    async fn await_executer(&mut self, task: &mut Task) -> Result<Message, Box<RouteReport>> {
        let spec = WaitSpec {
            expected_to: Role::Planner,
            task_id: Some(task.id.clone()),
            budget: self.config.exec_timeout,
            nudge: true,
        };
        loop {
            let outcome = self
                .wait
                .wait_for_block(
                    self.executer.as_ref(),
                    &spec,
                    &mut self.executer_cursor,
                    &self.cancel,
                    |msg| task.record(msg),
                )
                .await;

            let msg = match Self::unwrap_outcome(task, outcome)? {
                Some(msg) => msg,
                None => continue,
            };
            task.record(msg.clone());

            if msg.is_result_like() {
                return Ok(msg);
            }
            warn!(kind = %msg.kind, "ignoring unexpected block kind from executer");
        }
    }

    /// Maps a wait outcome to either an accepted message, `None` for
    /// "keep waiting", or the terminal report for this task.
    fn unwrap_outcome(
        task: &mut Task,
        outcome: Result<WaitOutcome, EndpointError>,
    ) -> Result<Option<Message>, Box<RouteReport>> {
        match outcome {
            Ok(WaitOutcome::Accepted(msg)) => Ok(Some(msg)),
            Ok(WaitOutcome::TimedOut { elapsed, nudged }) => {
                let phase = phase_name(task.status);
                let err = RouteError::PhaseTimeout {
                    phase: phase.to_string(),
                    elapsed,
                };
                warn!(task_id = %task.id, nudged, "{err}");
                task.finalize(TaskStatus::TimedOut);
                Err(Box::new(RouteReport {
                    task: task.clone(),
                    reason: Some(err.to_string()),
                }))
            }
            Ok(WaitOutcome::Cancelled) => Err(Box::new(Self::interrupted(task.clone()))),
            Err(err) => Err(Box::new(Self::endpoint_lost(task.clone(), &err))),
        }
    }

    fn endpoint_lost(mut task: Task, err: &EndpointError) -> RouteReport {
        let err = RouteError::EndpointUnavailable { role: err.role() };
        warn!(task_id = %task.id, "{err}");
        task.finalize(TaskStatus::Failed);
        RouteReport {
            task,
            reason: Some(err.to_string()),
        }
    }

    fn interrupted(mut task: Task) -> RouteReport {
        let err = RouteError::Interrupted;
        info!(task_id = %task.id, "{err}");
        task.finalize(TaskStatus::Failed);
        RouteReport {
            task,
            reason: Some(err.to_string()),
        }
    }
}

/// Finds the task a monitor-mode block belongs to, opening a new one on
/// first sight. The first block's payload doubles as the description.
fn task_entry<'a>(tasks: &'a mut Vec<Task>, msg: &Message) -> &'a mut Task {
    let idx = match tasks.iter().position(|t| t.id == msg.id) {
        Some(idx) => idx,
        None => {
            info!(task_id = %msg.id, "tracking new task from planner");
            tasks.push(Task::new(msg.id.clone(), msg.payload.clone()));
            tasks.len() - 1
        }
    };
    &mut tasks[idx]
}

fn phase_name(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "submission",
        TaskStatus::Planning => "planning",
        TaskStatus::Executing => "executing",
        TaskStatus::Reviewing => "reviewing",
        TaskStatus::Done | TaskStatus::Failed | TaskStatus::TimedOut => "terminal",
    }
}
