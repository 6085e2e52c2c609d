use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "orchestrate",
    about = "Provision a DAQ run folder and launch acquisition and monitors in tmux",
    version,
    args_conflicts_with_subcommands = true,
    subcommand_negates_reqs = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub run: RunArgs,

    /// Explicit launcher config file (default: nearest .daq/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Run number (formatted as 6 digits) or folder name
    #[arg(required = true)]
    pub run_identifier: Option<String>,

    /// WaveDump config for the first digitizer
    #[arg(long = "wavedump-usb0", value_name = "PATH")]
    pub wavedump_usb0: Option<PathBuf>,

    /// WaveDump config for the second digitizer
    #[arg(long = "wavedump-usb1", value_name = "PATH")]
    pub wavedump_usb1: Option<PathBuf>,

    /// Monitor config template
    #[arg(long, value_name = "PATH")]
    pub monitor_config: Option<PathBuf>,

    /// Abort on the first failed tmux command
    #[arg(long)]
    pub strict: bool,

    /// Launch without waiting for ENTER or attaching
    #[arg(long)]
    pub no_attach: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the resolved launcher configuration
    Config {
        /// Emit JSON instead of the human-readable summary
        #[arg(long)]
        json: bool,
    },

    /// Print a shell completion script
    Completions {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_with_defaults() {
        let cli = Cli::try_parse_from(["orchestrate", "42"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.run.run_identifier.as_deref(), Some("42"));
        assert!(cli.run.wavedump_usb0.is_none());
        assert!(!cli.run.strict);
        assert!(!cli.run.no_attach);
    }

    #[test]
    fn parses_wavedump_overrides() {
        let cli = Cli::try_parse_from([
            "orchestrate",
            "testrun",
            "--wavedump-usb0",
            "/etc/a.txt",
            "--wavedump-usb1",
            "/etc/b.txt",
            "--strict",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.run.wavedump_usb0, Some(PathBuf::from("/etc/a.txt")));
        assert_eq!(cli.run.wavedump_usb1, Some(PathBuf::from("/etc/b.txt")));
        assert!(cli.run.strict);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn run_identifier_is_required_without_subcommand() {
        assert!(Cli::try_parse_from(["orchestrate"]).is_err());
    }

    #[test]
    fn subcommands_do_not_need_run_identifier() {
        let cli = Cli::try_parse_from(["orchestrate", "config", "--json"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Config { json: true })));

        let cli = Cli::try_parse_from(["orchestrate", "completions", "zsh"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Completions {
                shell: CompletionShell::Zsh
            })
        ));
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
