//! Session provisioning: start and stop the two named tmux sessions.
//!
//! This is the external collaborator the routing engine depends on but does
//! not own. It verifies a session accepts injected text and supports capture
//! before handing back an endpoint.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::process::Command;
use tracing::info;

use poli_proto::{Endpoint, Role};

use crate::tmux::TmuxEndpoint;

/// Window name used for freshly provisioned sessions.
const WINDOW_NAME: &str = "tui";

/// Starts and tears down the named per-role tmux sessions.
pub struct SessionLauncher {
    socket: String,
}

impl SessionLauncher {
    pub fn new(socket: impl Into<String>) -> Self {
        Self {
            socket: socket.into(),
        }
    }

    /// The session name used for a role.
    pub fn session_name(role: Role) -> &'static str {
        match role {
            Role::Planner => "planner",
            Role::Executer => "executer",
        }
    }

    /// The pane target the router injects into for a role.
    pub fn target_for(role: Role) -> String {
        format!("{}:{WINDOW_NAME}.0", Self::session_name(role))
    }

    /// Creates a detached session running `command` in `working_dir` and
    /// returns an endpoint bound to its first pane.
    pub async fn start_session(
        &self,
        role: Role,
        command: &str,
        working_dir: &Path,
    ) -> Result<TmuxEndpoint> {
        let session = Self::session_name(role);
        self.run(&[
            "new-session",
            "-d",
            "-s",
            session,
            "-n",
            WINDOW_NAME,
            "-c",
            &working_dir.display().to_string(),
            command,
        ])
        .await
        .with_context(|| format!("failed to start {role} session"))?;

        // The session must accept injected text before we hand it out.
        let endpoint = TmuxEndpoint::new(role, self.socket.clone(), Self::target_for(role));
        tokio::time::sleep(Duration::from_millis(200)).await;
        endpoint
            .capture(1)
            .await
            .with_context(|| format!("{role} session did not become capturable"))?;

        info!(%role, session, %command, "session started");
        Ok(endpoint)
    }

    /// Kills the session for a role. Missing sessions are not an error.
    pub async fn stop_session(&self, role: Role) -> Result<()> {
        let session = Self::session_name(role);
        let _ = self.run(&["kill-session", "-t", session]).await;
        info!(%role, session, "session stopped");
        Ok(())
    }

    /// True if the role's session is currently running.
    pub async fn session_exists(&self, role: Role) -> bool {
        self.run(&["has-session", "-t", Self::session_name(role)])
            .await
            .is_ok()
    }

    async fn run(&self, args: &[&str]) -> Result<()> {
        let output = Command::new("tmux")
            .arg("-L")
            .arg(&self.socket)
            .args(args)
            .output()
            .await
            .context("failed to run tmux")?;
        if !output.status.success() {
            bail!(
                "tmux {} failed: {}",
                args.first().unwrap_or(&""),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_follow_the_session_window_pane_convention() {
        assert_eq!(SessionLauncher::target_for(Role::Planner), "planner:tui.0");
        assert_eq!(
            SessionLauncher::target_for(Role::Executer),
            "executer:tui.0"
        );
    }

    #[tokio::test]
    async fn missing_session_does_not_exist() {
        let launcher = SessionLauncher::new("poli-test-nonexistent");
        assert!(!launcher.session_exists(Role::Planner).await);
    }

    #[tokio::test]
    async fn stopping_a_missing_session_is_not_an_error() {
        let launcher = SessionLauncher::new("poli-test-nonexistent");
        assert!(launcher.stop_session(Role::Executer).await.is_ok());
    }
}
