use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use daq_launch::cli::{Cli, Command, RunArgs};
use daq_launch::config::LauncherConfig;
use daq_launch::error::{EXIT_FAILURE, LaunchError};
use daq_launch::launcher::FixedDelay;
use daq_launch::prompt::TerminalOperator;
use daq_launch::session::{Orchestrator, OrchestratorConfig, Outcome};
use daq_launch::shell_completion;
use daq_launch::tmux::{self, CommandPolicy, Tmux};

fn config_source_label(config_path: Option<&Path>) -> String {
    config_path
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(defaults, no .daq/config.toml found)".to_string())
}

fn push_kv(output: &mut String, key: &str, value: impl std::fmt::Display) {
    output.push_str(&format!("  {key:<26} {value}\n"));
}

fn render_config_human(config: &LauncherConfig, config_path: Option<&Path>) -> String {
    let mut output = String::new();
    output.push_str("Session\n");
    push_kv(&mut output, "name", &config.session.name);
    push_kv(&mut output, "strict", config.session.strict);
    output.push('\n');

    output.push_str("Layout\n");
    push_kv(&mut output, "data_root", config.layout.data_root.display());
    push_kv(&mut output, "instances", config.layout.instances.join(", "));
    output.push('\n');

    output.push_str("Acquisition\n");
    push_kv(&mut output, "program", &config.acquisition.program);
    push_kv(&mut output, "usb0_config", config.acquisition.usb0_config.display());
    push_kv(&mut output, "usb1_config", config.acquisition.usb1_config.display());
    push_kv(
        &mut output,
        "settle",
        format!("{}ms", config.acquisition.settle_millis),
    );
    output.push('\n');

    output.push_str("Monitor\n");
    push_kv(&mut output, "program", &config.monitor.program);
    push_kv(&mut output, "template", config.monitor.template.display());
    push_kv(&mut output, "document_name", &config.monitor.document_name);
    output.push('\n');

    output.push_str("System Monitor\n");
    push_kv(&mut output, "program", &config.system_monitor.program);
    output.push('\n');

    output.push_str("Attach\n");
    push_kv(
        &mut output,
        "post_launch_settle",
        format!("{}ms", config.attach.post_launch_settle_millis),
    );
    output.push('\n');

    output.push_str("Source Path\n");
    push_kv(&mut output, "path", config_source_label(config_path));

    output
}

fn render_config_json(config: &LauncherConfig, config_path: Option<&Path>) -> Result<String> {
    let mut payload = serde_json::to_value(config).context("failed to serialize config")?;
    if let Some(map) = payload.as_object_mut() {
        map.insert(
            "source_path".to_string(),
            serde_json::Value::String(config_source_label(config_path)),
        );
    }
    serde_json::to_string_pretty(&payload).context("failed to serialize config to JSON")
}

fn load_config(explicit: Option<&Path>, cwd: &Path) -> Result<(LauncherConfig, Option<PathBuf>)> {
    match explicit {
        Some(path) => {
            let config = LauncherConfig::load_file(path)
                .with_context(|| format!("failed to load launcher config {}", path.display()))?;
            Ok((config, Some(path.to_path_buf())))
        }
        None => LauncherConfig::load(cwd).context("failed to load launcher config"),
    }
}

/// Fold CLI overrides into the config-derived orchestrator settings.
fn orchestrator_config(config: &LauncherConfig, run: &RunArgs) -> OrchestratorConfig {
    let mut resolved = OrchestratorConfig::from_config(config);
    if let Some(path) = &run.wavedump_usb0 {
        resolved.acquisition_configs[0] = path.clone();
    }
    if let Some(path) = &run.wavedump_usb1 {
        resolved.acquisition_configs[1] = path.clone();
    }
    if let Some(path) = &run.monitor_config {
        resolved.monitor_template = path.clone();
    }
    if run.strict {
        resolved.policy = CommandPolicy::Strict;
    }
    resolved.attach = !run.no_attach;
    resolved
}

fn run(cli: Cli) -> Result<ExitCode> {
    let is_quiet_command = cli.command.is_some();
    let filter = match cli.verbose {
        0 if is_quiet_command => "daq_launch=warn",
        0 => "daq_launch=info",
        1 => "daq_launch=debug",
        _ => "daq_launch=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if let Some(Command::Completions { shell }) = cli.command {
        shell_completion::print(shell);
        return Ok(ExitCode::SUCCESS);
    }

    let cwd = std::env::current_dir().context("failed to get current directory (was it deleted?)")?;
    let (config, config_path) = load_config(cli.config.as_deref(), &cwd)?;

    if let Some(Command::Config { json }) = cli.command {
        if json {
            println!("{}", render_config_json(&config, config_path.as_deref())?);
        } else {
            print!("{}", render_config_human(&config, config_path.as_deref()));
        }
        return Ok(ExitCode::SUCCESS);
    }

    match config_path {
        Some(ref p) => info!("loaded config from {}", p.display()),
        None => info!("no .daq/config.toml found, using defaults"),
    }

    let run_identifier = cli
        .run
        .run_identifier
        .clone()
        .context("a run identifier is required")?;
    let resolved = orchestrator_config(&config, &cli.run);

    tmux::check_tmux()?;

    let mux = Tmux;
    let operator = TerminalOperator;
    let readiness = FixedDelay(config.acquisition_settle());
    let orchestrator = Orchestrator::new(resolved, &mux, &operator, &readiness);

    match orchestrator.orchestrate(&run_identifier) {
        Ok(Outcome::Launched { base_path }) => {
            println!("Run launched in {}", base_path.display());
            println!("Attach with: tmux attach -t {}", config.session.name);
        }
        Ok(Outcome::Attached { .. } | Outcome::AttachedExisting) => {}
        Err(e @ (LaunchError::Conflict { .. } | LaunchError::UserAbort { .. })) => {
            println!("Aborting. ({e})");
            return Ok(ExitCode::from(e.exit_code() as u8));
        }
        Err(e) => return Err(e.into()),
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            let code = e
                .downcast_ref::<LaunchError>()
                .map(LaunchError::exit_code)
                .unwrap_or(EXIT_FAILURE);
            ExitCode::from(code as u8)
        }
    }
}
