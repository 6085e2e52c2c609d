//! Bring-up of a dual-digitizer DAQ run: run folder, per-instance configs,
//! and a five-pane tmux session with acquisition and monitoring processes.

pub mod cli;
pub mod config;
pub mod error;
pub mod launcher;
pub mod log;
pub mod materialize;
pub mod paths;
pub mod prompt;
pub mod provision;
pub mod session;
pub mod shell_completion;
pub mod tmux;
pub mod topology;
