//! Operator interaction.
//!
//! Every point where bring-up blocks on a human goes through [`Operator`]:
//! the folder-overwrite confirmation, the existing-session menu, and the
//! "press ENTER to attach" pause. The terminal implementation reads free text
//! with `dialoguer`, or line by line when stdin is piped, and interprets it
//! the way the legacy launcher did, so an unrecognized answer always means
//! "no" / "cancel".

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::Path;

use dialoguer::Input;

use crate::error::{LaunchError, LaunchResult};

/// Answer to the existing-session menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictChoice {
    /// Kill the running session and start a fresh run.
    Restart,
    /// Attach to the running session and exit.
    Attach,
    /// Leave everything alone and exit 1.
    Cancel,
}

impl ConflictChoice {
    /// Interpret a menu answer. Unrecognized input is `Cancel`.
    pub fn parse(answer: &str) -> Self {
        match answer.trim().to_ascii_lowercase().as_str() {
            "1" | "restart" => Self::Restart,
            "2" | "attach" => Self::Attach,
            _ => Self::Cancel,
        }
    }
}

/// Interpret a yes/no answer. Only an explicit yes counts.
pub fn parse_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Blocking operator decisions.
pub trait Operator {
    /// Ask whether an existing run folder may be deleted and recreated.
    fn confirm_overwrite(&self, base_path: &Path) -> LaunchResult<bool>;

    /// Ask what to do about a session that is already running.
    fn resolve_conflict(&self, session: &str) -> LaunchResult<ConflictChoice>;

    /// Block until the operator is ready to be attached.
    fn await_attach(&self) -> LaunchResult<()>;
}

/// Reads answers from stdin: interactively on a terminal, one line per
/// question otherwise.
#[derive(Debug, Default)]
pub struct TerminalOperator;

impl TerminalOperator {
    fn ask(prompt: &str) -> LaunchResult<String> {
        let stdin = io::stdin();
        if !stdin.is_terminal() {
            return read_answer(&mut stdin.lock(), &mut io::stdout(), prompt);
        }
        Input::<String>::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
            .map_err(|e| LaunchError::io("failed to read operator input", io::Error::other(e)))
    }
}

/// Print `prompt` and read one answer line from `input`. End of input is an
/// empty answer, which declines and cancels.
fn read_answer(input: &mut dyn BufRead, out: &mut dyn Write, prompt: &str) -> LaunchResult<String> {
    write!(out, "{prompt}: ")
        .and_then(|()| out.flush())
        .map_err(|e| LaunchError::io("failed to write operator prompt", e))?;
    let mut line = String::new();
    input
        .read_line(&mut line)
        .map_err(|e| LaunchError::io("failed to read operator input", e))?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

impl Operator for TerminalOperator {
    fn confirm_overwrite(&self, base_path: &Path) -> LaunchResult<bool> {
        println!("Folder '{}' already exists.", base_path.display());
        let answer = Self::ask("Delete existing folder and continue? (y/n)")?;
        Ok(parse_yes(&answer))
    }

    fn resolve_conflict(&self, session: &str) -> LaunchResult<ConflictChoice> {
        println!("Tmux session '{session}' already exists.");
        println!("Options:");
        println!("  1) Kill and restart");
        println!("  2) Attach to existing session");
        println!("  3) Cancel");
        let answer = Self::ask("Select option (1/2/3)")?;
        Ok(ConflictChoice::parse(&answer))
    }

    fn await_attach(&self) -> LaunchResult<()> {
        Self::ask("Press ENTER to attach to tmux session")?;
        Ok(())
    }
}

#[cfg(test)]
pub use scripted::ScriptedOperator;


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_menu_accepts_numbers_and_words() {
        assert_eq!(ConflictChoice::parse("1"), ConflictChoice::Restart);
        assert_eq!(ConflictChoice::parse(" 2 \n"), ConflictChoice::Attach);
        assert_eq!(ConflictChoice::parse("3"), ConflictChoice::Cancel);
        assert_eq!(ConflictChoice::parse("Restart"), ConflictChoice::Restart);
        assert_eq!(ConflictChoice::parse("attach"), ConflictChoice::Attach);
    }

    #[test]
    fn conflict_menu_treats_garbage_as_cancel() {
        assert_eq!(ConflictChoice::parse(""), ConflictChoice::Cancel);
        assert_eq!(ConflictChoice::parse("4"), ConflictChoice::Cancel);
        assert_eq!(ConflictChoice::parse("yes"), ConflictChoice::Cancel);
    }

    #[test]
    fn only_explicit_yes_confirms() {
        assert!(parse_yes("y"));
        assert!(parse_yes(" Y "));
        assert!(parse_yes("yes"));
        assert!(!parse_yes("n"));
        assert!(!parse_yes(""));
        assert!(!parse_yes("yep"));
    }

    #[test]
    fn piped_answers_are_read_one_line_per_question() {
        let mut input = io::Cursor::new("n\r\n1\n");
        let mut out = Vec::new();

        let overwrite = read_answer(&mut input, &mut out, "Delete existing folder and continue? (y/n)").unwrap();
        assert!(!parse_yes(&overwrite));
        let menu = read_answer(&mut input, &mut out, "Select option (1/2/3)").unwrap();
        assert_eq!(ConflictChoice::parse(&menu), ConflictChoice::Restart);

        let shown = String::from_utf8(out).unwrap();
        assert!(shown.starts_with("Delete existing folder and continue? (y/n): "));
        assert!(shown.ends_with("Select option (1/2/3): "));
    }

    #[test]
    fn piped_yes_confirms_overwrite() {
        let mut input = io::Cursor::new("y\n");
        let answer = read_answer(&mut input, &mut io::sink(), "Delete?").unwrap();
        assert!(parse_yes(&answer));
    }

    #[test]
    fn closed_stdin_declines_and_cancels() {
        let mut input = io::Cursor::new("");
        let answer = read_answer(&mut input, &mut io::sink(), "Delete?").unwrap();
        assert_eq!(answer, "");
        assert!(!parse_yes(&answer));
        assert_eq!(ConflictChoice::parse(&answer), ConflictChoice::Cancel);
    }

    #[test]
    fn scripted_operator_replays_in_order() {
        let operator = ScriptedOperator::new(["1", "y"]);
        assert_eq!(
            operator.resolve_conflict("caen_daq").unwrap(),
            ConflictChoice::Restart
        );
        assert!(operator.confirm_overwrite(Path::new("/data/000001")).unwrap());
        assert_eq!(
            operator.asked(),
            vec!["conflict caen_daq", "overwrite /data/000001"]
        );
    }

    #[test]
    fn exhausted_script_declines() {
        let operator = ScriptedOperator::new(Vec::<String>::new());
        assert!(!operator.confirm_overwrite(Path::new("/data/x")).unwrap());
        assert_eq!(
            operator.resolve_conflict("caen_daq").unwrap(),
            ConflictChoice::Cancel
        );
    }
}
