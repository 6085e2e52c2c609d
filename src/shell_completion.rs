//! Shell completion generation for the orchestrate CLI.

use std::io::{self, Write};

use clap::CommandFactory;
use clap_complete::{Shell, generate};

use crate::cli::{Cli, CompletionShell};

fn shell_for(shell: CompletionShell) -> Shell {
    match shell {
        CompletionShell::Bash => Shell::Bash,
        CompletionShell::Zsh => Shell::Zsh,
        CompletionShell::Fish => Shell::Fish,
    }
}

pub fn write(shell: CompletionShell, out: &mut dyn Write) {
    let mut cmd = Cli::command();
    generate(shell_for(shell), &mut cmd, "orchestrate", out);
}

pub fn print(shell: CompletionShell) {
    write(shell, &mut io::stdout());
}
