use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LaunchError, LaunchResult};
use crate::tmux::CommandPolicy;

const CONFIG_FILENAME: &str = "config.toml";
const CONFIG_DIR: &str = ".daq";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionSettings {
    #[serde(default = "default_session_name")]
    pub name: String,
    #[serde(default)]
    pub strict: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LayoutSettings {
    #[serde(default = "default_data_root")]
    pub data_root: PathBuf,
    #[serde(default = "default_instances")]
    pub instances: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AcquisitionSettings {
    #[serde(default = "default_acquisition_program")]
    pub program: String,
    #[serde(default = "default_usb0_config")]
    pub usb0_config: PathBuf,
    #[serde(default = "default_usb1_config")]
    pub usb1_config: PathBuf,
    #[serde(default = "default_settle_millis")]
    pub settle_millis: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitorSettings {
    #[serde(default = "default_monitor_program")]
    pub program: String,
    #[serde(default = "default_monitor_template")]
    pub template: PathBuf,
    #[serde(default = "default_document_name")]
    pub document_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SystemMonitorSettings {
    #[serde(default = "default_system_monitor_program")]
    pub program: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AttachSettings {
    #[serde(default = "default_settle_millis")]
    pub post_launch_settle_millis: u64,
}

fn default_session_name() -> String {
    "caen_daq".to_string()
}

fn default_data_root() -> PathBuf {
    PathBuf::from("/data")
}

fn default_instances() -> Vec<String> {
    vec!["daq00".to_string(), "daq01".to_string()]
}

fn default_acquisition_program() -> String {
    "wavedump".to_string()
}

fn default_usb0_config() -> PathBuf {
    PathBuf::from("/opt/WaveDumpConfig_USB0.txt")
}

fn default_usb1_config() -> PathBuf {
    PathBuf::from("/opt/WaveDumpConfig_USB1.txt")
}

fn default_settle_millis() -> u64 {
    1000
}

fn default_monitor_program() -> String {
    "/opt/dt5742/daq_monitor/monitor_realtime".to_string()
}

fn default_monitor_template() -> PathBuf {
    PathBuf::from("/opt/dt5742/daq_monitor/monitor_config.json")
}

fn default_document_name() -> String {
    "monitor_config.json".to_string()
}

fn default_system_monitor_program() -> String {
    "glances".to_string()
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            name: default_session_name(),
            strict: false,
        }
    }
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
            instances: default_instances(),
        }
    }
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            program: default_acquisition_program(),
            usb0_config: default_usb0_config(),
            usb1_config: default_usb1_config(),
            settle_millis: default_settle_millis(),
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            program: default_monitor_program(),
            template: default_monitor_template(),
            document_name: default_document_name(),
        }
    }
}

impl Default for SystemMonitorSettings {
    fn default() -> Self {
        Self {
            program: default_system_monitor_program(),
        }
    }
}

impl Default for AttachSettings {
    fn default() -> Self {
        Self {
            post_launch_settle_millis: default_settle_millis(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LauncherConfig {
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub layout: LayoutSettings,
    #[serde(default)]
    pub acquisition: AcquisitionSettings,
    #[serde(default)]
    pub monitor: MonitorSettings,
    #[serde(default)]
    pub system_monitor: SystemMonitorSettings,
    #[serde(default)]
    pub attach: AttachSettings,
}

impl LauncherConfig {
    /// Search upward from `start` for a `.daq/config.toml` file and load it.
    /// Returns the default config if no file is found.
    pub fn load(start: &Path) -> LaunchResult<(Self, Option<PathBuf>)> {
        match Self::find_config_file(start) {
            Some(path) => Ok((Self::load_file(&path)?, Some(path))),
            None => Ok((Self::default(), None)),
        }
    }

    /// Load an explicit config file.
    pub fn load_file(path: &Path) -> LaunchResult<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| LaunchError::io(format!("failed to read {}", path.display()), e))?;
        let config: LauncherConfig =
            toml::from_str(&contents).map_err(|e| LaunchError::config_parse(path, e))?;
        config.validate()?;
        Ok(config)
    }

    fn find_config_file(start: &Path) -> Option<PathBuf> {
        let mut dir = start.to_path_buf();
        loop {
            let candidate = dir.join(CONFIG_DIR).join(CONFIG_FILENAME);
            if candidate.is_file() {
                return Some(candidate);
            }
            if !dir.pop() {
                return None;
            }
        }
    }

    /// The run layout is fixed at two instances; anything else is rejected
    /// up front rather than half-provisioned.
    pub fn validate(&self) -> LaunchResult<()> {
        if self.session.name.trim().is_empty() {
            return Err(LaunchError::InvalidConfig(
                "session.name must not be empty".to_string(),
            ));
        }
        if self.layout.instances.len() != 2 {
            return Err(LaunchError::InvalidConfig(format!(
                "layout.instances must name exactly two directories, got {}",
                self.layout.instances.len()
            )));
        }
        if self.layout.instances[0] == self.layout.instances[1] {
            return Err(LaunchError::InvalidConfig(
                "layout.instances must be distinct".to_string(),
            ));
        }
        if self
            .layout
            .instances
            .iter()
            .any(|name| name.is_empty() || name.contains('/'))
        {
            return Err(LaunchError::InvalidConfig(
                "layout.instances entries must be plain directory names".to_string(),
            ));
        }
        Ok(())
    }

    pub fn command_policy(&self) -> CommandPolicy {
        if self.session.strict {
            CommandPolicy::Strict
        } else {
            CommandPolicy::Lenient
        }
    }

    pub fn instance_names(&self) -> [&str; 2] {
        [
            self.layout.instances[0].as_str(),
            self.layout.instances[1].as_str(),
        ]
    }

    pub fn acquisition_settle(&self) -> Duration {
        Duration::from_millis(self.acquisition.settle_millis)
    }

    pub fn post_launch_settle(&self) -> Duration {
        Duration::from_millis(self.attach.post_launch_settle_millis)
    }
}
