//! Scripted in-memory endpoints for exercising the wait policy and engine
//! without tmux.

use std::sync::Mutex;

use async_trait::async_trait;

use poli_proto::{Endpoint, EndpointError, Role};

#[derive(Debug)]
struct Reply {
    matcher: String,
    output: String,
    used: bool,
}

#[derive(Debug)]
struct Vanish {
    matcher: String,
    used: bool,
}

#[derive(Debug, Default)]
struct ScriptState {
    buffer: String,
    sends: Vec<String>,
    replies: Vec<Reply>,
    vanish: Option<Vanish>,
    unavailable: bool,
}

/// An `Endpoint` whose visible output is driven by the test script.
///
/// `reply_when` registers pane output that appears once a send containing
/// the given substring arrives, which lets scenario tests express the whole
/// Planner/Executer dialogue without timing dependence.
pub struct ScriptedEndpoint {
    role: Role,
    state: Mutex<ScriptState>,
}

impl ScriptedEndpoint {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            state: Mutex::new(ScriptState::default()),
        }
    }

    /// Appends text to the endpoint's visible output immediately.
    pub fn push_output(&self, text: &str) {
        self.state.lock().unwrap().buffer.push_str(text);
    }

    /// Replaces the visible output wholesale, as a scrolled capture window
    /// does when older content falls out of range.
    pub fn set_output(&self, text: &str) {
        self.state.lock().unwrap().buffer = text.to_string();
    }

    /// When a send containing `matcher` arrives, `output` appears in the
    /// pane. Each registration fires once, oldest first.
    pub fn reply_when(&self, matcher: &str, output: &str) {
        self.state.lock().unwrap().replies.push(Reply {
            matcher: matcher.to_string(),
            output: output.to_string(),
            used: false,
        });
    }

    /// When a send containing `matcher` arrives, the session disappears:
    /// that send still succeeds, everything afterwards fails.
    pub fn vanish_when(&self, matcher: &str) {
        self.state.lock().unwrap().vanish = Some(Vanish {
            matcher: matcher.to_string(),
            used: false,
        });
    }

    /// Makes every subsequent operation fail with `Unavailable`.
    pub fn set_unavailable(&self) {
        self.state.lock().unwrap().unavailable = true;
    }

    /// Everything sent to this endpoint so far, in order.
    pub fn sends(&self) -> Vec<String> {
        self.state.lock().unwrap().sends.clone()
    }
}

#[async_trait]
impl Endpoint for ScriptedEndpoint {
    fn role(&self) -> Role {
        self.role
    }

    async fn send(&self, text: &str) -> Result<(), EndpointError> {
        let mut state = self.state.lock().unwrap();
        if state.unavailable {
            return Err(EndpointError::Unavailable { role: self.role });
        }
        state.sends.push(text.to_string());

        let mut appended = Vec::new();
        for reply in &mut state.replies {
            if !reply.used && text.contains(&reply.matcher) {
                reply.used = true;
                appended.push(reply.output.clone());
                break;
            }
        }
        for output in appended {
            state.buffer.push_str(&output);
        }

        if let Some(vanish) = &mut state.vanish {
            if !vanish.used && text.contains(&vanish.matcher) {
                vanish.used = true;
                state.unavailable = true;
            }
        }
        Ok(())
    }

    async fn capture(&self, _max_lines: usize) -> Result<String, EndpointError> {
        let state = self.state.lock().unwrap();
        if state.unavailable {
            return Err(EndpointError::Unavailable { role: self.role });
        }
        Ok(state.buffer.clone())
    }
}
