//! CLI entrypoint for the stencil structural search tool.
//!
//! The binary delegates to [`stencil_cli::run`] with locked standard streams.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    stencil_cli::run(std::env::args_os(), &mut stdout, &mut stderr)
}
