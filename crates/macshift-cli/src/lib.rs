//! Supervisor runtime for the `macshift` command.
//!
//! The runtime parses the action and target flags, loads configuration,
//! resolves target interfaces, and drives one detached `macshiftd` worker
//! per interface. Configuration loading and every host interaction sit
//! behind traits so tests can run whole batches without touching real
//! interfaces or processes.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use tracing::debug;

use macshift_config::telemetry;
use macshift_link::AddressPrefix;
use macshift_registry::Registry;

mod cli;
mod config;
mod errors;
mod exit;
mod host;
mod report;
mod supervisor;
mod targets;

pub use cli::{Action, OutputFormat};
use cli::Cli;
use config::{ConfigLoader, OrthoConfigLoader, action_arguments, split_config_arguments};
use errors::AppError;
pub use exit::ExitStatus;
use host::{Host, SystemHost};
pub use report::{BatchReport, InterfaceOutcome, OutcomeKind};
use supervisor::{Supervisor, SupervisorSettings};
use targets::TargetSpec;

pub(crate) const RUNNER_TARGET: &str = "macshift::runner";

#[cfg(test)]
mod tests;

/// Runs the supervisor with the production loader and host.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let status = CliRunner::new(&OrthoConfigLoader, &SystemHost).run(args, stdout, stderr);
    status.into()
}

struct CliRunner<'a, L: ConfigLoader, H: Host> {
    loader: &'a L,
    host: &'a H,
}

impl<'a, L: ConfigLoader, H: Host> CliRunner<'a, L, H> {
    fn new(loader: &'a L, host: &'a H) -> Self {
        Self { loader, host }
    }

    fn run<I, W, E>(&self, args: I, stdout: &mut W, stderr: &mut E) -> ExitStatus
    where
        I: IntoIterator<Item = OsString>,
        W: Write,
        E: Write,
    {
        let args: Vec<OsString> = args.into_iter().collect();
        match self.execute(&args, stdout, stderr) {
            Ok(status) => status,
            Err(AppError::CliUsage(error)) if !error.use_stderr() => {
                // Help and version output are successful requests.
                let _ = write!(stdout, "{}", error.render());
                ExitStatus::Success
            }
            Err(AppError::CliUsage(error)) => {
                let _ = write!(stderr, "{}", error.render());
                ExitStatus::Usage
            }
            Err(error) => {
                let _ = writeln!(stderr, "macshift: {error}");
                error.exit_status()
            }
        }
    }

    fn execute<W: Write, E: Write>(
        &self,
        args: &[OsString],
        stdout: &mut W,
        stderr: &mut E,
    ) -> Result<ExitStatus, AppError> {
        let split = split_config_arguments(args);
        let cli = Cli::try_parse_from(action_arguments(args, &split)).map_err(AppError::CliUsage)?;
        let action: Action = cli
            .action
            .parse()
            .map_err(|_| AppError::UnknownAction {
                action: cli.action.clone(),
            })?;

        let config = self.loader.load(&split.config_arguments)?;
        config.validate()?;
        config.address_prefix().parse::<AddressPrefix>()?;
        let _telemetry = telemetry::initialise(&config, telemetry::Role::Supervisor)?;

        // Checked before any target is touched, dry run included.
        let link = self.host.link(&config).map_err(AppError::DependencyMissing)?;

        let spec = TargetSpec::from_flags(cli.iface.as_deref(), cli.all_up);
        let mut prompter = self.host.prompter();
        let targets = targets::resolve(&spec, &link, prompter.as_mut())?;
        if targets.is_empty() {
            return Err(AppError::NoTargets);
        }
        if action == Action::Start && !cli.dry_run && !self.host.is_privileged() {
            return Err(AppError::PrivilegeRequired {
                action: action.to_string(),
            });
        }

        let registry = Registry::open(config.state_dir().as_std_path())?;
        let spawner = self.host.spawner(&split.config_arguments);
        let processes = self.host.processes();
        let supervisor = Supervisor::new(
            &link,
            &registry,
            spawner.as_ref(),
            processes.as_ref(),
            SupervisorSettings::from_config(&config),
        );

        debug!(
            target: RUNNER_TARGET,
            %action,
            dry_run = cli.dry_run,
            targets = ?targets,
            "running batch"
        );
        let mut report = BatchReport::new(action, cli.dry_run);
        for target in &targets {
            report.push(supervisor.run(action, target, cli.dry_run));
        }
        report.render(cli.output, stdout, stderr)?;
        Ok(report.exit_status())
    }
}
