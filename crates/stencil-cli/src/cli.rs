//! CLI argument definitions for the stencil tool.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use stencil::SupportedLanguage;

/// Structural search and replace over source files.
#[derive(Parser, Debug)]
#[command(name = "stencil", disable_help_subcommand = true)]
pub(crate) struct Cli {
    /// Tracing filter directive, for example `stencil=debug`.
    ///
    /// Falls back to the `STENCIL_LOG` environment variable, then `warn`.
    #[arg(long, global = true, value_name = "FILTER")]
    pub(crate) log_filter: Option<String>,
    /// The operation to run.
    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

/// Subcommands for the stencil CLI.
#[derive(Subcommand, Debug)]
pub(crate) enum CliCommand {
    /// Prints every match of a pattern as `path:line:column: text`.
    Search(SearchArgs),
    /// Rewrites every match of a pattern with a replacement template.
    Replace(ReplaceArgs),
}

/// Arguments shared by every subcommand.
#[derive(Args, Debug)]
pub(crate) struct PatternArgs {
    /// The search pattern.
    #[arg(short, long)]
    pub(crate) pattern: String,
    /// Language of the pattern and the files; detected from each file's
    /// extension when omitted.
    #[arg(short, long, value_parser = parse_language)]
    pub(crate) language: Option<SupportedLanguage>,
    /// JSON file holding search options.
    #[arg(long, value_name = "FILE")]
    pub(crate) options: Option<PathBuf>,
    /// Out-of-band constraint for a variable, as `name=constraint`.
    #[arg(long = "constraint", value_name = "NAME=CONSTRAINT")]
    pub(crate) constraints: Vec<String>,
    /// Files to process.
    #[arg(required = true, value_name = "PATH")]
    pub(crate) paths: Vec<PathBuf>,
}

/// Arguments for `stencil search`.
#[derive(Args, Debug)]
pub(crate) struct SearchArgs {
    #[command(flatten)]
    pub(crate) pattern: PatternArgs,
    /// Also print the bindings of each match.
    #[arg(long)]
    pub(crate) captures: bool,
}

/// Arguments for `stencil replace`.
#[derive(Args, Debug)]
pub(crate) struct ReplaceArgs {
    #[command(flatten)]
    pub(crate) pattern: PatternArgs,
    /// The replacement template.
    #[arg(short, long)]
    pub(crate) replacement: String,
    /// Write results back to the files instead of printing them.
    #[arg(long)]
    pub(crate) in_place: bool,
}

fn parse_language(value: &str) -> Result<SupportedLanguage, String> {
    value.parse().map_err(|err: stencil::LanguageParseError| err.to_string())
}
