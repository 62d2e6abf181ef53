//! Error taxonomy shared by the routing engine and the pane adapters.

use std::time::Duration;

use thiserror::Error;

use crate::message::Role;

/// Failures reported by a pane endpoint.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// The underlying session no longer exists. Fatal for the active task.
    #[error("{role} session is unavailable")]
    Unavailable { role: Role },

    /// The terminal multiplexer binary could not be invoked.
    #[error("failed to run terminal command for {role}")]
    Io {
        role: Role,
        #[source]
        source: std::io::Error,
    },
}

impl EndpointError {
    /// The endpoint role this error originated from.
    pub fn role(&self) -> Role {
        match self {
            EndpointError::Unavailable { role } | EndpointError::Io { role, .. } => *role,
        }
    }
}

/// Terminal failures of a routing session, surfaced to the caller as the
/// task's final status plus a human-readable reason.
#[derive(Debug, Error)]
pub enum RouteError {
    /// An endpoint's session disappeared mid-phase.
    #[error("{role} endpoint became unavailable")]
    EndpointUnavailable { role: Role },

    /// No valid block arrived within the phase budget.
    #[error("{phase} phase timed out after {elapsed:?}")]
    PhaseTimeout { phase: String, elapsed: Duration },

    /// The Planner kept requesting continuation past the round limit.
    #[error("round limit exceeded after {rounds} rounds")]
    RoundLimitExceeded { rounds: u32 },

    /// The caller requested an abort; no further input is sent.
    #[error("routing interrupted")]
    Interrupted,
}

impl From<EndpointError> for RouteError {
    fn from(err: EndpointError) -> Self {
        RouteError::EndpointUnavailable { role: err.role() }
    }
}
