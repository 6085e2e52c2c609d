//! Session lifecycle, from "is a run already up?" to an attached terminal.
//!
//! ```text
//! CheckExisting ──absent──▶ Provision ──▶ BuildAndLaunch ──▶ Attach
//!       │                      ▲
//!     active                restart (kill first)
//!       ▼                      │
//! PromptConflict ──────────────┘
//!       ├── attach  ──▶ attach to the running session, exit 0
//!       └── cancel / anything else ──▶ UserAbort, exit 1
//! ```
//!
//! Every step is blocking and runs in program order. The session name and
//! data root come from [`OrchestratorConfig`]; nothing here is a literal.

use std::path::PathBuf;
use std::time::Duration;

use tracing::info;

use crate::config::LauncherConfig;
use crate::error::{LaunchError, LaunchResult};
use crate::launcher::{self, ACQUISITION_CONFIG_FILES, LaunchCommands, Readiness};
use crate::log::{LogEvent, RunLog};
use crate::materialize;
use crate::paths::RunFolder;
use crate::prompt::{ConflictChoice, Operator};
use crate::provision;
use crate::tmux::{CommandPolicy, Multiplexer};
use crate::topology::{self, DAQ_LAYOUT};

/// Everything the orchestrator needs, resolved from config and CLI.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub session: String,
    pub data_root: PathBuf,
    pub instances: [String; 2],
    pub acquisition_configs: [PathBuf; 2],
    pub monitor_template: PathBuf,
    pub commands: LaunchCommands,
    pub policy: CommandPolicy,
    /// Pause after the last start command, before the banner.
    pub post_launch_settle: Duration,
    /// Wait for ENTER and attach once the run is up.
    pub attach: bool,
}

impl OrchestratorConfig {
    pub fn from_config(config: &LauncherConfig) -> Self {
        let [first, second] = config.instance_names();
        Self {
            session: config.session.name.clone(),
            data_root: config.layout.data_root.clone(),
            instances: [first.to_string(), second.to_string()],
            acquisition_configs: [
                config.acquisition.usb0_config.clone(),
                config.acquisition.usb1_config.clone(),
            ],
            monitor_template: config.monitor.template.clone(),
            commands: LaunchCommands {
                acquisition_program: config.acquisition.program.clone(),
                monitor_program: config.monitor.program.clone(),
                monitor_document: config.monitor.document_name.clone(),
                system_monitor_program: config.system_monitor.program.clone(),
            },
            policy: config.command_policy(),
            post_launch_settle: config.post_launch_settle(),
            attach: true,
        }
    }

    fn instance_names(&self) -> [&str; 2] {
        [self.instances[0].as_str(), self.instances[1].as_str()]
    }
}

/// How a successful orchestration ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A new run was launched and the operator attached and detached.
    Attached { base_path: PathBuf },
    /// A new run was launched; attaching was skipped.
    Launched { base_path: PathBuf },
    /// The operator chose to attach to the already running session.
    AttachedExisting,
}

#[derive(Debug)]
enum State {
    CheckExisting,
    PromptConflict,
    Provision,
    BuildAndLaunch(RunFolder),
    Attach(RunFolder),
}

pub struct Orchestrator<'a, M: Multiplexer + ?Sized> {
    config: OrchestratorConfig,
    mux: &'a M,
    operator: &'a dyn Operator,
    readiness: &'a dyn Readiness,
}

impl<'a, M: Multiplexer + ?Sized> Orchestrator<'a, M> {
    pub fn new(
        config: OrchestratorConfig,
        mux: &'a M,
        operator: &'a dyn Operator,
        readiness: &'a dyn Readiness,
    ) -> Self {
        Self {
            config,
            mux,
            operator,
            readiness,
        }
    }

    /// Bring up a run for `run_identifier`.
    ///
    /// Declined overwrites and cancelled conflict menus come back as
    /// `Conflict` / `UserAbort`, which map to exit code 1.
    pub fn orchestrate(&self, run_identifier: &str) -> LaunchResult<Outcome> {
        let session = self.config.session.as_str();
        let mut state = State::CheckExisting;
        loop {
            info!(state = state_name(&state), "orchestrator state");
            state = match state {
                State::CheckExisting => {
                    if self.mux.session_exists(session) {
                        State::PromptConflict
                    } else {
                        State::Provision
                    }
                }
                State::PromptConflict => match self.operator.resolve_conflict(session)? {
                    ConflictChoice::Restart => {
                        info!(session, "killing existing session");
                        self.config
                            .policy
                            .settle(self.mux.kill_session(session), || ())?;
                        if self.mux.session_exists(session) {
                            return Err(LaunchError::Conflict {
                                what: format!("session '{session}' is still running after kill"),
                            });
                        }
                        State::Provision
                    }
                    ConflictChoice::Attach => {
                        info!(session, "attaching to existing session");
                        self.mux.attach(session)?;
                        return Ok(Outcome::AttachedExisting);
                    }
                    ConflictChoice::Cancel => {
                        return Err(LaunchError::UserAbort {
                            reason: format!("session '{session}' left running"),
                        });
                    }
                },
                State::Provision => State::BuildAndLaunch(provision::provision(
                    &self.config.data_root,
                    run_identifier,
                    self.config.instance_names(),
                    self.operator,
                )?),
                State::BuildAndLaunch(folder) => {
                    self.build_and_launch(&folder)?;
                    State::Attach(folder)
                }
                State::Attach(folder) => {
                    println!("{}", render_layout_summary(session, &folder));
                    if !self.config.attach {
                        return Ok(Outcome::Launched {
                            base_path: folder.base_path,
                        });
                    }
                    self.operator.await_attach()?;
                    self.mux.attach(session)?;
                    return Ok(Outcome::Attached {
                        base_path: folder.base_path,
                    });
                }
            };
        }
    }

    fn build_and_launch(&self, folder: &RunFolder) -> LaunchResult<()> {
        let run_log = RunLog::in_run_folder(&folder.base_path)?;
        run_log.log(LogEvent::RunFolderCreated {
            run_identifier: folder.run_identifier.clone(),
            base_path: folder.base_path.display().to_string(),
            instances: self.config.instances.to_vec(),
        })?;

        // Files first, panes second: no process may start before its config
        // is on disk.
        for (index, instance) in folder.instance_paths.iter().enumerate() {
            let source = &self.config.acquisition_configs[index];
            let staged = materialize::stage_acquisition_config(
                source,
                instance,
                ACQUISITION_CONFIG_FILES[index],
            )?;
            run_log.log(LogEvent::AcquisitionConfigStaged {
                source: source.display().to_string(),
                destination: staged.display().to_string(),
            })?;
        }
        for instance in &folder.instance_paths {
            let document = materialize::materialize(
                &self.config.monitor_template,
                instance,
                &self.config.commands.monitor_document,
            )?;
            run_log.log(LogEvent::ConfigMaterialized {
                document: document.path.display().to_string(),
                input_file: document.monitor_field("input_file").unwrap_or_default().to_string(),
                log_file: document.monitor_field("log_file").unwrap_or_default().to_string(),
            })?;
        }

        let topology =
            topology::build_topology(self.mux, &self.config.session, &DAQ_LAYOUT, self.config.policy)?;
        for node in topology.nodes() {
            run_log.log(LogEvent::PaneCreated {
                role: node.role.to_string(),
                pane: node.handle.to_string(),
            })?;
        }

        let steps = launcher::plan(folder, &self.config.commands);
        let sent = launcher::launch(
            self.mux,
            &topology,
            &steps,
            self.readiness,
            self.config.policy,
        )?;
        for command in sent {
            run_log.log(LogEvent::CommandSent {
                role: command.role.to_string(),
                pane: command.pane.to_string(),
                command: command.command,
            })?;
        }

        if !self.config.post_launch_settle.is_zero() {
            std::thread::sleep(self.config.post_launch_settle);
        }
        run_log.log(LogEvent::SessionReady {
            session: self.config.session.clone(),
        })?;
        info!(session = %self.config.session, log = %run_log.path().display(), "run launched");
        Ok(())
    }
}

fn state_name(state: &State) -> &'static str {
    match state {
        State::CheckExisting => "check-existing",
        State::PromptConflict => "prompt-conflict",
        State::Provision => "provision",
        State::BuildAndLaunch(_) => "build-and-launch",
        State::Attach(_) => "attach",
    }
}

/// Left-align `text` in a cell exactly `width` characters wide, keeping the
/// tail when it does not fit; the run folder name is the useful part.
fn fit_cell(text: &str, width: usize) -> String {
    let count = text.chars().count();
    if count <= width - 2 {
        format!("  {text:<pad$}", pad = width - 2)
    } else {
        let tail: String = text.chars().skip(count - (width - 3)).collect();
        format!("  …{tail}")
    }
}

/// Operator-facing picture of the session that was just started.
pub fn render_layout_summary(session: &str, folder: &RunFolder) -> String {
    const WIDTH: usize = 29;
    const FULL: usize = WIDTH * 2 + 1;
    let row = |left: String, right: String| {
        format!("║{}║{}║\n", fit_cell(&left, WIDTH), fit_cell(&right, WIDTH))
    };
    let rule = "═".repeat(WIDTH);
    let thin = "─".repeat(WIDTH);

    let mut out = String::new();
    out.push_str(&format!("╔{rule}═{rule}╗\n"));
    out.push_str(&format!(
        "║{}║\n",
        fit_cell(&format!("Tmux Session: {session} (5 panes)"), FULL)
    ));
    out.push_str(&format!(
        "║{}║\n",
        fit_cell(
            &format!("Working Directory: {}", folder.base_path.display()),
            FULL
        )
    ));
    out.push_str(&format!("╠{rule}╦{rule}╣\n"));
    out.push_str(&row("Acquisition A".into(), "Acquisition B".into()));
    out.push_str(&row("Digitizer USB0".into(), "Digitizer USB1".into()));
    out.push_str(&row(
        folder.instance(0).display().to_string(),
        folder.instance(1).display().to_string(),
    ));
    out.push_str(&format!("╠{rule}╬{rule}╣\n"));
    out.push_str(&row("Monitor A".into(), String::new()));
    out.push_str(&row("Real-time Analysis".into(), "System Monitor".into()));
    out.push_str(&format!("╟{thin}╢{:<WIDTH$}║\n", ""));
    out.push_str(&row("Monitor B".into(), String::new()));
    out.push_str(&row("Real-time Analysis".into(), String::new()));
    out.push_str(&format!("╚{rule}╩{rule}╝"));
    out
}
