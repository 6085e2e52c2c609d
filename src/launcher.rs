//! Start commands for the five panes.
//!
//! The order is fixed: acquisition A, settle, acquisition B, settle, both
//! monitors, then the system monitor. The settles exist because the two
//! digitizers race each other during firmware initialization; what a settle
//! actually does is up to the [`Readiness`] policy, so a real probe can
//! replace the fixed delay without touching the order.

use std::borrow::Cow;
use std::path::Path;
use std::time::Duration;

use tracing::info;

use crate::error::LaunchResult;
use crate::paths::RunFolder;
use crate::tmux::{CommandPolicy, Multiplexer, PaneHandle};
use crate::topology::{Role, Topology};

/// File names the acquisition configs are staged under, per instance.
pub const ACQUISITION_CONFIG_FILES: [&str; 2] =
    ["WaveDumpConfig_USB0.txt", "WaveDumpConfig_USB1.txt"];

/// Programs and file names that go into the pane commands.
#[derive(Debug, Clone)]
pub struct LaunchCommands {
    pub acquisition_program: String,
    pub monitor_program: String,
    pub monitor_document: String,
    pub system_monitor_program: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchStep {
    Send { role: Role, command: String },
    /// Wait until the process started in `role` is ready enough to continue.
    Settle { role: Role },
}

/// Decides how long to wait after a process start.
pub trait Readiness {
    fn settle(&self, role: Role, pane: &PaneHandle) -> LaunchResult<()>;
}

/// Unconditional sleep, whatever the pane is doing.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl Readiness for FixedDelay {
    fn settle(&self, role: Role, _pane: &PaneHandle) -> LaunchResult<()> {
        info!(%role, delay_ms = self.0.as_millis() as u64, "waiting for process to initialize");
        std::thread::sleep(self.0);
        Ok(())
    }
}

/// A command that was handed to a pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentCommand {
    pub role: Role,
    pub pane: PaneHandle,
    pub command: String,
}

/// Build the launch sequence for `folder`.
pub fn plan(folder: &RunFolder, commands: &LaunchCommands) -> Vec<LaunchStep> {
    let acquisition = |index: usize| {
        format!(
            "cd {} && {} {}",
            quote_path(folder.instance(index)),
            commands.acquisition_program,
            ACQUISITION_CONFIG_FILES[index]
        )
    };
    let monitor = |index: usize| {
        format!(
            "cd {} && {} --config {}",
            quote_path(folder.instance(index)),
            commands.monitor_program,
            shell_quote(&commands.monitor_document)
        )
    };

    vec![
        LaunchStep::Send {
            role: Role::AcquisitionA,
            command: acquisition(0),
        },
        LaunchStep::Settle {
            role: Role::AcquisitionA,
        },
        LaunchStep::Send {
            role: Role::AcquisitionB,
            command: acquisition(1),
        },
        LaunchStep::Settle {
            role: Role::AcquisitionB,
        },
        LaunchStep::Send {
            role: Role::MonitorA,
            command: monitor(0),
        },
        LaunchStep::Send {
            role: Role::MonitorB,
            command: monitor(1),
        },
        LaunchStep::Send {
            role: Role::SystemMonitor,
            command: commands.system_monitor_program.clone(),
        },
    ]
}

/// Send every start command in plan order. Nothing is read back from the
/// panes; a command counts as started once its keys are sent.
pub fn launch<M: Multiplexer + ?Sized>(
    mux: &M,
    topology: &Topology,
    steps: &[LaunchStep],
    readiness: &dyn Readiness,
    policy: CommandPolicy,
) -> LaunchResult<Vec<SentCommand>> {
    let mut sent = Vec::new();
    for step in steps {
        match step {
            LaunchStep::Send { role, command } => {
                let pane = topology.pane(*role);
                policy.settle(mux.send_keys(pane, command), || ())?;
                info!(%role, pane = %pane, command = %command, "start command sent");
                sent.push(SentCommand {
                    role: *role,
                    pane: pane.clone(),
                    command: command.clone(),
                });
            }
            LaunchStep::Settle { role } => readiness.settle(*role, topology.pane(*role))?,
        }
    }
    Ok(sent)
}

fn quote_path(path: &Path) -> String {
    shell_quote(&path.to_string_lossy()).into_owned()
}

/// Single-quote `word` for a POSIX shell unless it is made only of
/// characters the shell passes through unchanged.
pub fn shell_quote(word: &str) -> Cow<'_, str> {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./:=+,%@".contains(c));
    if plain {
        Cow::Borrowed(word)
    } else {
        Cow::Owned(format!("'{}'", word.replace('\'', r"'\''")))
    }
}
