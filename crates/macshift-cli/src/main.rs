//! Entry point for the `macshift` supervisor.
//!
//! Delegates to [`macshift_cli::run`], which parses arguments, loads
//! configuration, and drives the per-interface workers.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    macshift_cli::run(std::env::args_os(), &mut stdout, &mut stderr)
}
