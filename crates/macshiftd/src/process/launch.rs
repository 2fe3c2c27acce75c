//! Sequences worker start-up and hands control to the rotation loop.

use std::ffi::OsString;
use std::process;

use clap::Parser;
use rand::RngCore;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;

use macshift_config::{Config, telemetry};
use macshift_link::{AddressPrefix, InterfaceName, IpCommand, LinkControl};
use macshift_registry::Registry;

use super::errors::LaunchError;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};
use super::PROCESS_TARGET;
use crate::args::WorkerArgs;
use crate::worker::{RestoreOutcome, Worker, WorkerSettings};

/// Collaborators required to run one worker.
pub(crate) struct WorkerPlan<L, S, R> {
    pub(crate) interface: String,
    pub(crate) config: Config,
    pub(crate) pid: u32,
    pub(crate) link: L,
    pub(crate) shutdown: S,
    pub(crate) rng: R,
}

/// Parses `args` and runs a worker with the production collaborators.
pub fn run_worker<I, T>(args: I) -> Result<(), LaunchError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args = WorkerArgs::try_parse_from(args)?;
    // Handlers go in first so an early stop request is not lost.
    let shutdown = SystemShutdownSignal::install()?;
    let config = args.load_config()?;
    config.validate()?;
    let pid = process::id();
    let _telemetry = telemetry::initialise(
        &config,
        telemetry::Role::Worker {
            interface: &args.interface,
            pid,
        },
    )?;
    let link = IpCommand::locate(config.ip_command())?;
    let plan = WorkerPlan {
        interface: args.interface,
        config,
        pid,
        link,
        shutdown,
        rng: StdRng::from_entropy(),
    };
    run_worker_with(plan).map(|_| ())
}

/// Runs a worker with injected collaborators.
pub(crate) fn run_worker_with<L, S, R>(
    plan: WorkerPlan<L, S, R>,
) -> Result<RestoreOutcome, LaunchError>
where
    L: LinkControl,
    S: ShutdownSignal,
    R: RngCore,
{
    let WorkerPlan {
        interface,
        config,
        pid,
        link,
        shutdown,
        rng,
    } = plan;
    let interface = InterfaceName::new(interface)?;
    let prefix: AddressPrefix = config.address_prefix().parse()?;
    let registry = Registry::open(config.state_dir().as_std_path())?;
    info!(
        target: PROCESS_TARGET,
        interface = %interface,
        pid,
        interval_ms = config.interval_ms,
        %prefix,
        "starting worker"
    );
    let settings = WorkerSettings {
        interface,
        prefix,
        interval: config.interval(),
        pid,
    };
    let mut worker = Worker::new(settings, link, registry, rng);
    let outcome = worker.run(&shutdown)?;
    info!(target: PROCESS_TARGET, ?outcome, "shutdown sequence completed");
    Ok(outcome)
}
