//! tmux control for the DAQ session.
//!
//! [`Multiplexer`] is the narrow surface bring-up needs: session existence,
//! kill, create, split, resize, send-keys and attach. [`Tmux`] implements it
//! by shelling out to the tmux CLI; tests use the recording fake in
//! [`fake`].
//!
//! Pane-level commands report failure through `Result`, but whether a failure
//! stops the run is decided by [`CommandPolicy`], not here.

use std::fmt;
use std::process::{Command, Output};

use tracing::{debug, info, warn};

use crate::error::{LaunchError, LaunchResult};

/// Opaque pane identifier returned by the multiplexer (tmux: `%3`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PaneHandle(String);

impl PaneHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Handle left behind by a failed split in lenient mode. tmux resolves an
    /// empty target to the current pane.
    pub fn unresolved() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_resolved(&self) -> bool {
        !self.0.is_empty()
    }
}

impl fmt::Display for PaneHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("<unresolved>")
        } else {
            f.write_str(&self.0)
        }
    }
}

/// Direction of a split, named after where the new pane lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// New pane to the right (`split-window -h`).
    Horizontal,
    /// New pane below (`split-window -v`).
    Vertical,
}

impl Orientation {
    fn flag(self) -> &'static str {
        match self {
            Self::Horizontal => "-h",
            Self::Vertical => "-v",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Width,
    Height,
}

impl Dimension {
    fn flag(self) -> &'static str {
        match self {
            Self::Width => "-x",
            Self::Height => "-y",
        }
    }
}

/// What to do when a pane-level multiplexer command fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandPolicy {
    /// Log and carry on, as the legacy launcher did.
    #[default]
    Lenient,
    /// Abort the run on the first failure.
    Strict,
}

impl CommandPolicy {
    /// Apply the policy to a command result. In lenient mode a failure is
    /// replaced by `fallback`.
    pub fn settle<T>(self, result: LaunchResult<T>, fallback: impl FnOnce() -> T) -> LaunchResult<T> {
        match (self, result) {
            (_, Ok(value)) => Ok(value),
            (Self::Strict, Err(e)) => Err(e),
            (Self::Lenient, Err(e)) => {
                warn!(error = %e, "multiplexer command failed; continuing");
                Ok(fallback())
            }
        }
    }
}

pub trait Multiplexer {
    fn session_exists(&self, session: &str) -> bool;
    fn kill_session(&self, session: &str) -> LaunchResult<()>;
    /// Create a detached session and return its first pane.
    fn new_session(&self, session: &str) -> LaunchResult<PaneHandle>;
    /// Split `target` and return the handle of the newly created pane.
    fn split_pane(&self, target: &PaneHandle, orientation: Orientation) -> LaunchResult<PaneHandle>;
    fn resize_pane(&self, target: &PaneHandle, dimension: Dimension, percent: u8) -> LaunchResult<()>;
    /// Type `text` into the pane and press Enter.
    fn send_keys(&self, target: &PaneHandle, text: &str) -> LaunchResult<()>;
    /// Attach the current terminal; blocks until the operator detaches.
    fn attach(&self, session: &str) -> LaunchResult<()>;
}

/// Check that tmux is installed and reachable.
pub fn check_tmux() -> LaunchResult<String> {
    let output = Command::new("tmux").arg("-V").output().map_err(|e| {
        LaunchError::io(
            "tmux not found; install tmux (e.g., `apt install tmux` or `brew install tmux`)",
            e,
        )
    })?;

    if !output.status.success() {
        return Err(LaunchError::ExternalCommand {
            command: "tmux -V".to_string(),
            detail: stderr_of(&output),
        });
    }

    let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
    debug!(version = %version, "tmux found");
    Ok(version)
}

fn stderr_of(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.is_empty() {
        format!("exited with {}", output.status)
    } else {
        stderr
    }
}

/// Session target that matches `session` exactly. A bare name would also
/// match any session it is a prefix of.
fn exact_session(session: &str) -> String {
    format!("={session}")
}

/// Multiplexer backed by the tmux CLI.
#[derive(Debug, Default, Clone)]
pub struct Tmux;

impl Tmux {
    fn run(&self, args: &[&str]) -> LaunchResult<Output> {
        let rendered = format!("tmux {}", args.join(" "));
        debug!(command = %rendered, "running tmux");
        let output = Command::new("tmux")
            .args(args)
            .output()
            .map_err(|e| LaunchError::io(format!("failed to run `{rendered}`"), e))?;
        if !output.status.success() {
            return Err(LaunchError::ExternalCommand {
                command: rendered,
                detail: stderr_of(&output),
            });
        }
        Ok(output)
    }

    fn run_for_pane(&self, args: &[&str]) -> LaunchResult<PaneHandle> {
        let output = self.run(args)?;
        let pane = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if pane.is_empty() {
            return Err(LaunchError::ExternalCommand {
                command: format!("tmux {}", args.join(" ")),
                detail: "tmux returned an empty pane id".to_string(),
            });
        }
        Ok(PaneHandle::new(pane))
    }
}

impl Multiplexer for Tmux {
    fn session_exists(&self, session: &str) -> bool {
        Command::new("tmux")
            .args(["has-session", "-t", exact_session(session).as_str()])
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn kill_session(&self, session: &str) -> LaunchResult<()> {
        self.run(&["kill-session", "-t", exact_session(session).as_str()])?;
        info!(session = session, "tmux session killed");
        Ok(())
    }

    fn new_session(&self, session: &str) -> LaunchResult<PaneHandle> {
        let pane = self.run_for_pane(&["new-session", "-d", "-s", session, "-P", "-F", "#{pane_id}"])?;
        info!(session = session, pane = %pane, "tmux session created");
        Ok(pane)
    }

    fn split_pane(&self, target: &PaneHandle, orientation: Orientation) -> LaunchResult<PaneHandle> {
        self.run_for_pane(&[
            "split-window",
            orientation.flag(),
            "-t",
            target.as_str(),
            "-P",
            "-F",
            "#{pane_id}",
        ])
    }

    fn resize_pane(&self, target: &PaneHandle, dimension: Dimension, percent: u8) -> LaunchResult<()> {
        let size = format!("{percent}%");
        self.run(&["resize-pane", "-t", target.as_str(), dimension.flag(), &size])?;
        Ok(())
    }

    fn send_keys(&self, target: &PaneHandle, text: &str) -> LaunchResult<()> {
        // `-l` keeps punctuation from being read as tmux key names; Enter goes
        // as a separate key so the line is always submitted.
        self.run(&["send-keys", "-t", target.as_str(), "-l", "--", text])?;
        self.run(&["send-keys", "-t", target.as_str(), "C-m"])?;
        debug!(target = %target, keys = text, "sent keys");
        Ok(())
    }

    fn attach(&self, session: &str) -> LaunchResult<()> {
        let status = Command::new("tmux")
            .args(["attach-session", "-t", exact_session(session).as_str()])
            .status()
            .map_err(|e| {
                LaunchError::io(format!("failed to attach to tmux session '{session}'"), e)
            })?;

        if !status.success() {
            return Err(LaunchError::ExternalCommand {
                command: format!("tmux attach-session -t ={session}"),
                detail: format!("exited with {status}"),
            });
        }
        Ok(())
    }
}
