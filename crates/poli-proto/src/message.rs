//! Message envelope and recipient roles for the POLI wire protocol.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Well-known message kinds (the wire `type` field).
///
/// The parser does not restrict kinds to this set; these are the values the
/// routing engine gives special meaning to.
pub mod kind {
    /// Initial plan from the Planner, addressed to the Executer.
    pub const PLAN: &str = "plan";
    /// Follow-up instructions from the Planner after reviewing a result.
    pub const CONTINUE: &str = "continue";
    /// Correction instructions from the Planner.
    pub const REVISION: &str = "revision";
    /// Execution outcome from the Executer, addressed to the Planner.
    pub const RESULT: &str = "result";
    /// Progress report from the Executer; does not end a wait.
    pub const STATUS: &str = "status";
    /// Execution failure report from the Executer.
    pub const ERROR: &str = "error";
    /// Completion signal from the Planner.
    pub const DONE: &str = "done";
    /// Completion signal from the Planner (long form).
    pub const COMPLETE: &str = "complete";
}

/// One of the two interactive programs the engine talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Planner,
    Executer,
}

impl Role {
    /// Wire representation used in envelope headers.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Planner => "PLANNER",
            Role::Executer => "EXECUTER",
        }
    }

    /// The opposite endpoint.
    pub fn peer(self) -> Role {
        match self {
            Role::Planner => Role::Executer,
            Role::Executer => Role::Planner,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PLANNER" => Ok(Role::Planner),
            "EXECUTER" | "EXECUTOR" => Ok(Role::Executer),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

/// Returned when an envelope names a role outside {PLANNER, EXECUTER}.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role: {}", self.0)
    }
}

impl std::error::Error for UnknownRole {}

/// One structured envelope extracted from an endpoint's captured output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Recipient role from the envelope header.
    pub to: Role,
    /// Semantic kind (the wire `type` field), e.g. `"plan"` or `"result"`.
    pub kind: String,
    /// Task id this message correlates to.
    pub id: String,
    /// Verbatim text between the inner payload tags.
    pub payload: String,
    /// The envelope header as parsed, kept verbatim so a forwarded block
    /// carries the exact metadata the producer emitted.
    pub header: serde_json::Map<String, serde_json::Value>,
    /// Byte offset in the capture where the block's closing marker ended.
    /// Meaningful only within the capture it was parsed from; captures are
    /// sliding windows, so offsets shift as the pane scrolls.
    pub raw_offset: usize,
}

impl Message {
    /// True if this kind carries instructions for the Executer.
    pub fn is_plan_like(&self) -> bool {
        matches!(
            self.kind.as_str(),
            kind::PLAN | kind::CONTINUE | kind::REVISION
        )
    }

    /// True if this kind reports an execution outcome.
    pub fn is_result_like(&self) -> bool {
        matches!(self.kind.as_str(), kind::RESULT | kind::ERROR)
    }

    /// Re-serializes the envelope header as it appeared on the wire.
    pub fn header_json(&self) -> String {
        serde_json::Value::Object(self.header.clone()).to_string()
    }
}
