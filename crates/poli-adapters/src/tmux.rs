//! tmux-backed pane endpoint.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use poli_proto::{Endpoint, EndpointError, Role};

/// A handle to one tmux pane: inject text with `send-keys`, read visible
/// output with `capture-pane`.
pub struct TmuxEndpoint {
    role: Role,
    socket: String,
    target: String,
}

impl TmuxEndpoint {
    /// Wraps an existing pane. `target` is a tmux target spec such as
    /// `planner:tui.0`.
    pub fn new(role: Role, socket: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            role,
            socket: socket.into(),
            target: target.into(),
        }
    }

    /// The tmux target spec this endpoint writes to.
    pub fn target(&self) -> &str {
        &self.target
    }

    async fn tmux(&self, args: &[&str]) -> Result<Vec<u8>, EndpointError> {
        debug!(socket = %self.socket, ?args, "tmux");
        let output = Command::new("tmux")
            .arg("-L")
            .arg(&self.socket)
            .args(args)
            .output()
            .await
            .map_err(|source| EndpointError::Io {
                role: self.role,
                source,
            })?;

        if output.status.success() {
            Ok(output.stdout)
        } else {
            // tmux exits non-zero when the target pane or session is gone.
            Err(EndpointError::Unavailable { role: self.role })
        }
    }
}

#[async_trait]
impl Endpoint for TmuxEndpoint {
    fn role(&self) -> Role {
        self.role
    }

    async fn send(&self, text: &str) -> Result<(), EndpointError> {
        debug!(target = %self.target, "sending {} chars", text.len());
        // Newlines do not survive a single send-keys call; each line is
        // written separately and activated with C-m, preserving blank lines.
        for line in text.split('\n') {
            if !line.is_empty() {
                self.tmux(&["send-keys", "-t", &self.target, "--", line])
                    .await?;
            }
            self.tmux(&["send-keys", "-t", &self.target, "C-m"]).await?;
        }
        Ok(())
    }

    async fn capture(&self, max_lines: usize) -> Result<String, EndpointError> {
        // -p print, -J join wrapped lines, -S start N lines back from the end.
        let start = format!("-{max_lines}");
        let raw = self
            .tmux(&["capture-pane", "-t", &self.target, "-pJS", &start])
            .await?;
        let stripped = strip_ansi_escapes::strip(&raw);
        Ok(String::from_utf8_lossy(&stripped).into_owned())
    }
}
