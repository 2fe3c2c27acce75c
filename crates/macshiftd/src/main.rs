use std::env;
use std::process::ExitCode;

use macshiftd::{LaunchError, run_worker};

fn main() -> ExitCode {
    match run_worker(env::args_os()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(LaunchError::Arguments(error)) => {
            let _ = error.print();
            if error.use_stderr() {
                ExitCode::from(LaunchError::USAGE_EXIT_CODE)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(error) => {
            eprintln!("macshiftd: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}
