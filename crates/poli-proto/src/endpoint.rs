//! The pane I/O capability interface.

use async_trait::async_trait;

use crate::error::EndpointError;
use crate::message::Role;

/// A single interactive session the engine can inject text into and read
/// output from.
///
/// Any endpoint, real or simulated, satisfies this two-method contract, so
/// tests substitute scripted implementations for the tmux adapter.
#[async_trait]
pub trait Endpoint: Send + Sync {
    /// Which side of the conversation this endpoint hosts.
    fn role(&self) -> Role;

    /// Writes `text` followed by an activation (the equivalent of pressing
    /// Enter) to the session. Fire-and-forget: the endpoint's own behavior
    /// determines when, or whether, output appears.
    async fn send(&self, text: &str) -> Result<(), EndpointError>;

    /// Returns the last `max_lines` of the endpoint's visible output, newest
    /// content last, with terminal control sequences stripped. Pure read.
    async fn capture(&self, max_lines: usize) -> Result<String, EndpointError>;
}
