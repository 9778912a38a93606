//! Command-line front end for the stencil structural search engine.
//!
//! `stencil search` prints every match of a pattern and `stencil replace`
//! rewrites matches with a replacement template. Output goes to the writers
//! handed to [`run`], which keeps the runtime testable without a process.
//!
//! Exit status is `0` when something matched, `1` when nothing did and `2`
//! on any error.

mod cli;
mod errors;
mod telemetry;
mod workload;

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser as _;

use crate::cli::{Cli, CliCommand};
use crate::errors::AppError;
use crate::workload::Outcome;

const EXIT_UNMATCHED: u8 = 1;
const EXIT_ERROR: u8 = 2;

/// Parses `args` and runs the selected subcommand.
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => {
            let rendered = error.render();
            if error.use_stderr() {
                let _ = write!(stderr, "{rendered}");
                return ExitCode::from(EXIT_ERROR);
            }
            let _ = write!(stdout, "{rendered}");
            return ExitCode::SUCCESS;
        }
    };

    match execute(&cli, stdout, stderr) {
        Ok(Outcome::Matched) => ExitCode::SUCCESS,
        Ok(Outcome::Unmatched) => ExitCode::from(EXIT_UNMATCHED),
        Ok(Outcome::Failed) => ExitCode::from(EXIT_ERROR),
        Err(error) => {
            let _ = writeln!(stderr, "stencil: {error}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn execute<W, E>(cli: &Cli, stdout: &mut W, stderr: &mut E) -> Result<Outcome, AppError>
where
    W: Write,
    E: Write,
{
    telemetry::initialise(cli.log_filter.as_deref())?;
    match &cli.command {
        CliCommand::Search(args) => workload::search(args, stdout, stderr),
        CliCommand::Replace(args) => workload::replace(args, stdout, stderr),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoke(args: &[&str]) -> (ExitCode, String, String) {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let code = run(args.iter().map(OsString::from), &mut stdout, &mut stderr);
        (
            code,
            String::from_utf8_lossy(&stdout).into_owned(),
            String::from_utf8_lossy(&stderr).into_owned(),
        )
    }

    #[test]
    fn help_goes_to_stdout() {
        let (code, stdout, stderr) = invoke(&["stencil", "--help"]);
        assert_eq!(code, ExitCode::SUCCESS);
        assert!(stdout.contains("search"), "{stdout}");
        assert!(stderr.is_empty());
    }

    #[test]
    fn missing_subcommand_is_a_usage_error() {
        let (code, _, stderr) = invoke(&["stencil"]);
        assert_eq!(code, ExitCode::from(EXIT_ERROR));
        assert!(stderr.contains("Usage"), "{stderr}");
    }

    #[test]
    fn unknown_language_is_rejected_by_the_parser() {
        let (code, _, stderr) = invoke(&["stencil", "search", "-p", "x", "-l", "cobol", "a.txt"]);
        assert_eq!(code, ExitCode::from(EXIT_ERROR));
        assert!(stderr.contains("unsupported language: 'cobol'"), "{stderr}");
    }

    #[test]
    fn undetectable_language_is_reported() {
        let (code, _, stderr) = invoke(&["stencil", "search", "-p", "x", "notes.txt"]);
        assert_eq!(code, ExitCode::from(EXIT_ERROR));
        assert!(stderr.contains("cannot detect the language of notes.txt"), "{stderr}");
    }
}
