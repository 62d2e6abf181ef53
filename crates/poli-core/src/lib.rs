//! # poli-core
//!
//! Core routing functionality for PoliTerm.
//!
//! This crate provides:
//! - The block parser for `[[POLI:MSG ...]]` envelopes embedded in terminal text
//! - The timeout/nudge wait policy for polling an endpoint
//! - The turn-taking routing engine and its state machine
//! - Routing configuration with environment-driven defaults

mod block_parser;
mod completion;
mod config;
mod cursor;
mod engine;
mod instructions;
mod policy;
#[cfg(test)]
mod test_support;

pub use block_parser::BlockParser;
pub use completion::CompletionPolicy;
pub use config::RouteConfig;
pub use cursor::CaptureCursor;
pub use engine::{MonitorReport, RouteReport, RoutingEngine};
pub use instructions::InstructionBuilder;
pub use policy::{WaitOutcome, WaitPolicy, WaitSpec};
