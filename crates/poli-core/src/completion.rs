//! Detection of the Planner's "task is finished" signal.
//!
//! Producers have been inconsistent about how completion is expressed: some
//! emit a reserved kind (`done`, `complete`), others write a marker phrase
//! into an otherwise ordinary block. Both are configurable here rather than
//! hard-coded in the engine.

use poli_proto::{Message, kind};

/// Predicate over a Planner message deciding whether the task is complete.
#[derive(Debug, Clone)]
pub struct CompletionPolicy {
    kinds: Vec<String>,
    payload_markers: Vec<String>,
}

impl Default for CompletionPolicy {
    fn default() -> Self {
        Self {
            kinds: vec![kind::DONE.to_string(), kind::COMPLETE.to_string()],
            payload_markers: vec!["TASK COMPLETE".to_string()],
        }
    }
}

impl CompletionPolicy {
    /// A policy matching only the given reserved kinds and payload markers.
    pub fn new(
        kinds: impl IntoIterator<Item = String>,
        payload_markers: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
            payload_markers: payload_markers.into_iter().collect(),
        }
    }

    /// True if the message carries a completion signal.
    pub fn is_complete(&self, message: &Message) -> bool {
        if self.kinds.iter().any(|k| k == &message.kind) {
            return true;
        }
        self.payload_markers
            .iter()
            .any(|marker| message.payload.contains(marker))
    }
}
