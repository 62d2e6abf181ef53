//! Consumed-block tracking for one pane.
//!
//! `capture` returns a sliding window over the pane's scrollback, so a byte
//! offset alone cannot identify which blocks were already consumed: once the
//! pane scrolls past the window size, a brand-new block can end at a lower
//! offset than an older one. The cursor therefore remembers a fingerprint of
//! every consumed block and treats a re-rendered copy of a consumed block as
//! already handled, wherever the window places it.

use std::collections::HashSet;
use std::hash::{DefaultHasher, Hash, Hasher};

use poli_proto::Message;

/// Tracks which blocks on one pane have already been consumed.
///
/// A block is identified by its task id, kind, and payload. Two blocks with
/// identical content are the same block re-rendered by the capture window,
/// not a new message.
#[derive(Debug, Default)]
pub struct CaptureCursor {
    seen: HashSet<u64>,
}

impl CaptureCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if no block has been consumed through this cursor yet.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// True if an earlier poll already consumed this block.
    pub fn already_consumed(&self, message: &Message) -> bool {
        self.seen.contains(&fingerprint(message))
    }

    /// Marks a block consumed. Must happen atomically with acceptance so a
    /// block is never processed twice.
    pub fn consume(&mut self, message: &Message) {
        self.seen.insert(fingerprint(message));
    }
}

fn fingerprint(message: &Message) -> u64 {
    let mut hasher = DefaultHasher::new();
    message.id.hash(&mut hasher);
    message.kind.hash(&mut hasher);
    message.payload.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use poli_proto::Role;

    fn message(kind: &str, payload: &str) -> Message {
        Message {
            to: Role::Planner,
            kind: kind.to_string(),
            id: "t1".to_string(),
            payload: payload.to_string(),
            header: serde_json::Map::new(),
            raw_offset: 0,
        }
    }

    #[test]
    fn consumed_block_is_remembered_regardless_of_offset() {
        let mut cursor = CaptureCursor::new();
        let mut msg = message("result", "first");
        msg.raw_offset = 4100;
        assert!(!cursor.already_consumed(&msg));
        cursor.consume(&msg);

        // The same block re-rendered lower in a scrolled window.
        msg.raw_offset = 100;
        assert!(cursor.already_consumed(&msg));
    }

    #[test]
    fn distinct_content_is_distinct() {
        let mut cursor = CaptureCursor::new();
        cursor.consume(&message("result", "first"));
        assert!(!cursor.already_consumed(&message("result", "second")));
        assert!(!cursor.already_consumed(&message("status", "first")));
    }
}
