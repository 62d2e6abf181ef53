//! # poli-adapters
//!
//! Pane adapters for PoliTerm.
//!
//! This crate provides:
//! - `TmuxEndpoint`, the tmux-backed implementation of the `Endpoint` trait
//! - `SessionLauncher`, the provisioning collaborator that starts and stops
//!   the two named sessions
//!
//! Any other implementation of the two-method `Endpoint` contract can stand
//! in for these; the routing engine does not know tmux exists.

mod session;
mod tmux;

pub use session::SessionLauncher;
pub use tmux::TmuxEndpoint;
