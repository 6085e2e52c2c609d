//! Error taxonomy for run bring-up.
//!
//! Operator-facing outcomes (`Conflict`, `UserAbort`) map to exit code 1 so
//! wrapper scripts can tell "the operator said no" apart from real failures,
//! which all map to exit code 2.

use std::path::{Path, PathBuf};

use thiserror::Error;

pub type LaunchResult<T> = std::result::Result<T, LaunchError>;

/// Exit code for a declined overwrite or a cancelled conflict menu.
pub const EXIT_ABORTED: i32 = 1;
/// Exit code for every other failure.
pub const EXIT_FAILURE: i32 = 2;

#[derive(Error, Debug)]
pub enum LaunchError {
    /// An existing folder or session that was not resolved.
    #[error("conflict: {what}")]
    Conflict { what: String },

    #[error("aborted by operator: {reason}")]
    UserAbort { reason: String },

    #[error("failed to parse {}: {detail}", path.display())]
    ConfigParse { path: PathBuf, detail: String },

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("multiplexer command `{command}` failed: {detail}")]
    ExternalCommand { command: String, detail: String },

    #[error("invalid launcher configuration: {0}")]
    InvalidConfig(String),
}

impl LaunchError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn config_parse(path: &Path, detail: impl ToString) -> Self {
        Self::ConfigParse {
            path: path.to_path_buf(),
            detail: detail.to_string(),
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Conflict { .. } | Self::UserAbort { .. } => EXIT_ABORTED,
            _ => EXIT_FAILURE,
        }
    }
}
