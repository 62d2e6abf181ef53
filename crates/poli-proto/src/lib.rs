//! # poli-proto
//!
//! Shared types for the PoliTerm message router.
//!
//! This crate provides:
//! - The `Role` and `Message` types for the tagged-block wire protocol
//! - The `Endpoint` trait for pane I/O adapters
//! - The error taxonomy shared by the routing engine and adapters

mod endpoint;
mod error;
mod message;
mod task;

pub use endpoint::Endpoint;
pub use error::{EndpointError, RouteError};
pub use message::{Message, Role, UnknownRole, kind};
pub use task::{Task, TaskStatus};
