//! Start, stop, and status flows for per-interface workers.
//!
//! - [`process`] spawns and signals worker processes.
//! - [`wait`] holds the two bounded waits: registration after spawn and
//!   release after a stop request.
//!
//! Every flow handles one interface and never aborts the batch; errors are
//! turned into a failed [`InterfaceOutcome`] by [`Supervisor::run`].

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::ExitStatus as ChildStatus;
use std::time::Duration;

use nix::errno::Errno;
use thiserror::Error;
use tracing::{debug, info, warn};

use macshift_config::Config;
use macshift_link::{HardwareAddress, InterfaceName, LinkControl, LinkError, apply_address};
use macshift_registry::{ActivityEvent, Capture, Registry, RegistryError};

use crate::cli::Action;
use crate::report::{InterfaceOutcome, OutcomeKind};

pub(crate) mod process;
pub(crate) mod wait;

pub(crate) use process::{
    ProcessControl, SystemProcesses, SystemSpawner, Termination, WorkerSpawner,
};
use wait::{Registration, Release, wait_for_registration, wait_for_release};

pub(crate) const SUPERVISOR_TARGET: &str = "macshift::supervisor";
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Errors raised while handling a single interface.
#[derive(Debug, Error)]
pub(crate) enum SupervisorError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("failed to open worker trace file {path:?}: {source}")]
    OpenTrace {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to spawn worker binary {binary:?}: {source}")]
    LaunchWorker {
        binary: OsString,
        #[source]
        source: io::Error,
    },
    #[error("failed to monitor worker launch: {source}")]
    MonitorWorker {
        #[source]
        source: io::Error,
    },
    #[error("worker exited during start-up ({status}); see {trace:?}")]
    WorkerExited { status: ChildStatus, trace: PathBuf },
    #[error("failed to signal worker pid {pid}: {source}")]
    SignalFailed {
        pid: u32,
        #[source]
        source: Errno,
    },
    #[error("failed to restore {address}: {source}; original kept for a later stop")]
    Restore {
        address: HardwareAddress,
        #[source]
        source: LinkError,
    },
}

/// Timing parameters for the bounded waits.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SupervisorSettings {
    pub(crate) spawn_grace: Duration,
    pub(crate) stop_grace: Duration,
    pub(crate) poll_interval: Duration,
}

impl SupervisorSettings {
    pub(crate) fn from_config(config: &Config) -> Self {
        Self {
            spawn_grace: config.spawn_grace(),
            stop_grace: config.stop_grace(),
            poll_interval: POLL_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PidState {
    Absent,
    Live(u32),
    /// A dead or unreadable registration that has just been cleared.
    Stale(Option<u32>),
}

/// How the registered worker responded to a stop request.
#[derive(Debug)]
enum WorkerExit {
    Released,
    /// Still registered and alive when the stop grace period ran out.
    Unresponsive,
    SignalFailed(SupervisorError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Restoration {
    NoRecord,
    AlreadyOriginal(HardwareAddress),
    Applied(HardwareAddress),
}

/// Drives workers for a batch of interfaces.
pub(crate) struct Supervisor<'a, L: LinkControl + ?Sized> {
    link: &'a L,
    registry: &'a Registry,
    spawner: &'a dyn WorkerSpawner,
    processes: &'a dyn ProcessControl,
    settings: SupervisorSettings,
}

impl<'a, L: LinkControl + ?Sized> Supervisor<'a, L> {
    pub(crate) fn new(
        link: &'a L,
        registry: &'a Registry,
        spawner: &'a dyn WorkerSpawner,
        processes: &'a dyn ProcessControl,
        settings: SupervisorSettings,
    ) -> Self {
        Self {
            link,
            registry,
            spawner,
            processes,
            settings,
        }
    }

    /// Runs `action` for one target, folding any error into the outcome.
    pub(crate) fn run(&self, action: Action, target: &str, dry_run: bool) -> InterfaceOutcome {
        let interface = match InterfaceName::new(target) {
            Ok(interface) => interface,
            Err(error) => return InterfaceOutcome::failed(target, error.to_string()),
        };
        let result = match action {
            Action::Start => self.start(&interface, dry_run),
            Action::Stop => self.stop(&interface, dry_run),
            Action::Status => self.status(&interface),
        };
        result.unwrap_or_else(|error| {
            warn!(
                target: SUPERVISOR_TARGET,
                interface = %interface,
                %action,
                %error,
                "interface action failed"
            );
            InterfaceOutcome::failed(interface.as_str(), error.to_string())
        })
    }

    /// Ensures a live worker rotates `interface`.
    pub(crate) fn start(
        &self,
        interface: &InterfaceName,
        dry_run: bool,
    ) -> Result<InterfaceOutcome, SupervisorError> {
        let name = interface.as_str();
        if !self.link.exists(name) {
            return Ok(InterfaceOutcome::new(name, OutcomeKind::NotFound, "interface not found"));
        }
        if let PidState::Live(pid) = self.inspect_pid(interface)? {
            return Ok(InterfaceOutcome::new(
                name,
                OutcomeKind::AlreadyRunning,
                format!("already running (pid {pid})"),
            )
            .with_pid(Some(pid)));
        }

        let capture = self.registry.capture_original(interface, self.link)?;
        let original = capture.address();
        if let Capture::Existing(_) = capture {
            debug!(target: SUPERVISOR_TARGET, interface = name, %original, "reusing captured original");
        }
        if dry_run {
            return Ok(InterfaceOutcome::new(
                name,
                OutcomeKind::DryRun,
                format!("dry run; would start a worker (original {original})"),
            )
            .with_original(Some(original)));
        }

        let trace = self.registry.trace_path(interface);
        let mut worker = self.spawner.spawn(interface, &trace)?;
        let registration = wait_for_registration(
            worker.as_mut(),
            self.registry,
            interface,
            &trace,
            self.settings.spawn_grace,
            self.settings.poll_interval,
        )?;
        let pid = registration.pid();
        info!(target: SUPERVISOR_TARGET, interface = name, pid, ?registration, "worker started");
        let message = match registration {
            Registration::SelfRegistered(_) => {
                format!("worker started (pid {pid}, original {original})")
            }
            Registration::Provisional(_) => format!(
                "worker started (pid {pid}, registration pending, original {original})"
            ),
        };
        Ok(InterfaceOutcome::new(name, OutcomeKind::Started, message)
            .with_pid(Some(pid))
            .with_original(Some(original)))
    }

    /// Stops the worker for `interface` and guarantees the original is back.
    pub(crate) fn stop(
        &self,
        interface: &InterfaceName,
        dry_run: bool,
    ) -> Result<InterfaceOutcome, SupervisorError> {
        let name = interface.as_str();
        let pid = match self.registry.read_pid(interface) {
            Ok(pid) => pid,
            Err(RegistryError::ParsePid { .. }) if dry_run => None,
            Err(RegistryError::ParsePid { value, .. }) => {
                warn!(target: SUPERVISOR_TARGET, interface = name, %value, "clearing unreadable pid record");
                self.registry.clear_pid(interface)?;
                None
            }
            Err(error) => return Err(error.into()),
        };
        let original = self.registry.read_original(interface);
        if pid.is_none() && matches!(original, Ok(None)) {
            return Ok(InterfaceOutcome::new(name, OutcomeKind::NothingToStop, "nothing to stop"));
        }

        if dry_run {
            let original = original?;
            let mut steps = Vec::new();
            if let Some(pid) = pid {
                steps.push(format!("signal pid {pid}"));
            }
            if let Some(address) = original {
                steps.push(format!("restore {address}"));
            }
            return Ok(InterfaceOutcome::new(
                name,
                OutcomeKind::DryRun,
                format!("dry run; would {}", steps.join(" and ")),
            )
            .with_pid(pid)
            .with_original(original));
        }

        // The pid is cleared and the original restored whatever the worker did.
        let mut notes = Vec::new();
        let mut signal_failed = false;
        if let Some(pid) = pid {
            match self.terminate_worker(interface, pid) {
                WorkerExit::Released => {}
                WorkerExit::Unresponsive => notes.push(format!(
                    "worker did not exit within {} ms",
                    self.settings.stop_grace.as_millis()
                )),
                WorkerExit::SignalFailed(error) => {
                    signal_failed = true;
                    notes.push(error.to_string());
                }
            }
            self.registry.clear_pid(interface)?;
        }
        let restoration = self.restore(interface)?;
        self.record(interface, &ActivityEvent::Stopped { pid });

        let (detail, restored) = match restoration {
            Restoration::NoRecord if pid.is_some() && !signal_failed => {
                (String::from("original restored by worker"), None)
            }
            Restoration::NoRecord => (String::from("no original recorded"), None),
            Restoration::AlreadyOriginal(address) => {
                (format!("{address} already in place"), Some(address))
            }
            Restoration::Applied(address) => (format!("restored {address}"), Some(address)),
        };
        let (kind, headline) = match pid {
            Some(pid) if signal_failed => (OutcomeKind::Failed, format!("stop incomplete (pid {pid})")),
            Some(pid) => (OutcomeKind::Stopped, format!("stopped (pid {pid})")),
            None => (OutcomeKind::Stopped, String::from("stopped")),
        };
        let mut parts = vec![headline, detail];
        parts.extend(notes);
        Ok(InterfaceOutcome::new(name, kind, parts.join("; "))
            .with_pid(pid)
            .with_original(restored))
    }

    /// Reports whether a live worker rotates `interface`, clearing stale pids.
    pub(crate) fn status(&self, interface: &InterfaceName) -> Result<InterfaceOutcome, SupervisorError> {
        let name = interface.as_str();
        let original = self.registry.read_original(interface).ok().flatten();
        let outcome = match self.inspect_pid(interface)? {
            PidState::Live(pid) => {
                let current = self.link.current_address(name).ok();
                let log = self.registry.activity_log(interface);
                let uptime = self.registry.pid_age(interface).ok().flatten();
                let mut details = vec![format!("pid {pid}")];
                details.extend(uptime.map(|uptime| format!("up {}s", uptime.as_secs())));
                details.extend(current.map(|current| format!("current {current}")));
                details.extend(original.map(|original| format!("original {original}")));
                details.push(format!("log {}", log.path().display()));
                let message = format!("active ({})", details.join(", "));
                InterfaceOutcome::new(name, OutcomeKind::Active, message)
                    .with_pid(Some(pid))
                    .with_current(current)
                    .with_original(original)
                    .with_log(Some(log.path().display().to_string()))
                    .with_uptime(uptime)
            }
            PidState::Stale(pid) => {
                let message = match pid {
                    Some(pid) => format!("stale (pid {pid} not running; record cleared)"),
                    None => String::from("stale (unreadable pid record cleared)"),
                };
                InterfaceOutcome::new(name, OutcomeKind::Stale, message)
                    .with_pid(pid)
                    .with_original(original)
            }
            PidState::Absent => {
                let message = match original {
                    Some(original) => {
                        format!("inactive (original {original} still recorded; run stop to restore)")
                    }
                    None => String::from("inactive"),
                };
                InterfaceOutcome::new(name, OutcomeKind::Inactive, message).with_original(original)
            }
        };
        Ok(outcome)
    }

    fn inspect_pid(&self, interface: &InterfaceName) -> Result<PidState, SupervisorError> {
        match self.registry.read_pid(interface) {
            Ok(None) => Ok(PidState::Absent),
            Ok(Some(pid)) if self.processes.is_alive(pid) => Ok(PidState::Live(pid)),
            Ok(Some(pid)) => {
                info!(target: SUPERVISOR_TARGET, interface = %interface, pid, "clearing stale pid");
                self.registry.clear_pid(interface)?;
                Ok(PidState::Stale(Some(pid)))
            }
            Err(RegistryError::ParsePid { value, .. }) => {
                warn!(target: SUPERVISOR_TARGET, interface = %interface, %value, "clearing unreadable pid record");
                self.registry.clear_pid(interface)?;
                Ok(PidState::Stale(None))
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Signals the registered worker and waits for it to let go.
    ///
    /// Never fails: the caller clears the pid and restores regardless.
    fn terminate_worker(&self, interface: &InterfaceName, pid: u32) -> WorkerExit {
        match self.processes.terminate(pid) {
            Ok(Termination::Delivered) => {
                let release = wait_for_release(
                    self.registry,
                    self.processes,
                    interface,
                    pid,
                    self.settings.stop_grace,
                    self.settings.poll_interval,
                );
                debug!(target: SUPERVISOR_TARGET, interface = %interface, pid, ?release, "worker signalled");
                if release == Release::TimedOut {
                    warn!(target: SUPERVISOR_TARGET, interface = %interface, pid, "clearing pid of unresponsive worker");
                    return WorkerExit::Unresponsive;
                }
                WorkerExit::Released
            }
            Ok(Termination::AlreadyGone) => {
                debug!(target: SUPERVISOR_TARGET, interface = %interface, pid, "registered worker already gone");
                WorkerExit::Released
            }
            Err(error) => {
                warn!(
                    target: SUPERVISOR_TARGET,
                    interface = %interface,
                    pid,
                    %error,
                    "could not signal worker; restoring anyway"
                );
                WorkerExit::SignalFailed(error)
            }
        }
    }

    /// Puts the recorded original back unless it is already in place.
    fn restore(&self, interface: &InterfaceName) -> Result<Restoration, SupervisorError> {
        let Some(original) = self.registry.read_original(interface)? else {
            return Ok(Restoration::NoRecord);
        };
        let name = interface.as_str();
        if self.link.current_address(name).ok() == Some(original) {
            self.registry.clear_original(interface)?;
            return Ok(Restoration::AlreadyOriginal(original));
        }
        match apply_address(self.link, name, original) {
            Ok(()) => {
                self.record(interface, &ActivityEvent::Restored { address: original });
                self.registry.clear_original(interface)?;
                info!(target: SUPERVISOR_TARGET, interface = name, %original, "original address restored");
                Ok(Restoration::Applied(original))
            }
            Err(source) => {
                self.record(
                    interface,
                    &ActivityEvent::RestoreFailed {
                        address: original,
                        reason: source.to_string(),
                    },
                );
                Err(SupervisorError::Restore {
                    address: original,
                    source,
                })
            }
        }
    }

    fn record(&self, interface: &InterfaceName, event: &ActivityEvent) {
        if let Err(error) = self.registry.activity_log(interface).append(event) {
            warn!(target: SUPERVISOR_TARGET, interface = %interface, %error, "failed to append activity log");
        }
    }
}
