//! Polling wait with a single nudge and an absolute timeout ceiling.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use poli_proto::{Endpoint, EndpointError, Message, Role, kind};

use crate::block_parser::BlockParser;
use crate::config::RouteConfig;
use crate::cursor::CaptureCursor;

/// What one wait accepts and how it behaves while waiting.
#[derive(Debug, Clone)]
pub struct WaitSpec {
    /// Recipient role a block must name to match.
    pub expected_to: Role,
    /// Task id a block must carry; `None` accepts any id (monitor mode).
    pub task_id: Option<String>,
    /// Absolute ceiling for this wait.
    pub budget: Duration,
    /// Whether the single per-wait reminder may be sent. Disabled when a
    /// human is driving the pane.
    pub nudge: bool,
}

impl WaitSpec {
    fn matches(&self, msg: &Message) -> bool {
        msg.to == self.expected_to
            && self
                .task_id
                .as_deref()
                .is_none_or(|id| msg.id == id)
    }
}

/// How a `wait_for_block` call ended.
#[derive(Debug)]
pub enum WaitOutcome {
    /// The first matching block, accepted and consumed.
    Accepted(Message),
    /// The budget elapsed without a valid block. `nudged` reports whether
    /// the single reminder went out during the wait.
    TimedOut { elapsed: Duration, nudged: bool },
    /// Cancellation was observed between polls.
    Cancelled,
}

/// Polls an endpoint's capture until a matching block appears, sending at
/// most one reminder per wait.
pub struct WaitPolicy {
    parser: BlockParser,
    config: RouteConfig,
    nudge_text: String,
}

impl WaitPolicy {
    pub fn new(config: &RouteConfig, nudge_text: impl Into<String>) -> Self {
        Self {
            parser: BlockParser::new(),
            config: config.clone(),
            nudge_text: nudge_text.into(),
        }
    }

    /// Waits for the first block on `endpoint` matching `spec`.
    ///
    /// `cursor` is the endpoint's consumed-block memory; it is updated only
    /// together with block consumption, so a block is never processed twice
    /// even when the capture window scrolls between polls. Matching blocks
    /// beyond the first in the same capture, and interim `status` blocks,
    /// are consumed and handed to `on_observed` for the history without
    /// ending the wait or being acted upon.
    ///
    /// The reminder is sent at most once, only before the budget elapses;
    /// nudging never resets the clock. Cancellation is observed within one
    /// poll interval.
    pub async fn wait_for_block(
        &self,
        endpoint: &dyn Endpoint,
        spec: &WaitSpec,
        cursor: &mut CaptureCursor,
        cancel: &CancellationToken,
        mut on_observed: impl FnMut(Message),
    ) -> Result<WaitOutcome, EndpointError> {
        let start = Instant::now();
        let nudge_after = self.config.nudge_after(spec.budget);
        let mut nudged = false;

        debug!(
            endpoint = %endpoint.role(),
            expected_to = %spec.expected_to,
            task_id = spec.task_id.as_deref().unwrap_or("<any>"),
            budget = ?spec.budget,
            "waiting for block"
        );

        loop {
            if cancel.is_cancelled() {
                return Ok(WaitOutcome::Cancelled);
            }

            // The window may have scrolled since the last poll, so every
            // visible block is re-extracted and deduplicated by the cursor.
            let buffer = endpoint.capture(self.config.capture_lines).await?;
            let mut accepted = None;

            for msg in self.parser.extract(&buffer, 0) {
                if cursor.already_consumed(&msg) {
                    continue;
                }
                if !spec.matches(&msg) {
                    debug!(to = %msg.to, id = %msg.id, kind = %msg.kind, "discarding non-matching block");
                    continue;
                }

                // Consume atomically with acceptance.
                cursor.consume(&msg);

                if msg.kind == kind::STATUS {
                    info!(id = %msg.id, "status update: {}", truncate(&msg.payload, 80));
                    on_observed(msg);
                } else if accepted.is_none() {
                    info!(id = %msg.id, kind = %msg.kind, "accepted block");
                    accepted = Some(msg);
                } else {
                    // First match wins; later matches in the same capture
                    // are retained in history but not acted upon.
                    debug!(kind = %msg.kind, "retaining trailing block without acting on it");
                    on_observed(msg);
                }
            }

            if let Some(msg) = accepted {
                return Ok(WaitOutcome::Accepted(msg));
            }

            let elapsed = start.elapsed();
            if spec.nudge && !nudged && elapsed >= nudge_after && elapsed < spec.budget {
                info!(endpoint = %endpoint.role(), "sending nudge");
                endpoint.send(&self.nudge_text).await?;
                nudged = true;
            }
            if elapsed >= spec.budget {
                warn!(endpoint = %endpoint.role(), ?elapsed, "wait timed out");
                return Ok(WaitOutcome::TimedOut { elapsed, nudged });
            }

            tokio::select! {
                () = cancel.cancelled() => return Ok(WaitOutcome::Cancelled),
                () = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
