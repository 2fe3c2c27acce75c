//! The per-interface rotation state machine.

use std::time::Duration;

use rand::RngCore;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use macshift_link::{AddressPrefix, HardwareAddress, InterfaceName, LinkControl, apply_address};
use macshift_registry::{ActivityEvent, ActivityLog, Capture, Registry, RegistryError};

use crate::process::{ShutdownError, ShutdownSignal};

const WORKER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::worker");

/// Lifecycle phase of a [`Worker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Capturing the original address and registering the pid.
    Starting,
    /// Applying a fresh address every interval.
    Running,
    /// Putting the original address back.
    Restoring,
    /// Finished; the process may exit.
    Terminated,
}

/// Result of one rotation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The generated address is now in place.
    Applied(HardwareAddress),
    /// The generated address was rejected; rotation continues.
    Failed {
        /// Address that was attempted.
        address: HardwareAddress,
        /// Failure text recorded in the activity log.
        reason: String,
    },
}

/// Result of the single restoration pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// The original is back in place and its record was cleared.
    Restored(HardwareAddress),
    /// No original was recorded; the interface was not touched.
    Skipped,
    /// Restoration failed; the record is kept for a later stop.
    Failed {
        /// Failure text.
        reason: String,
    },
}

/// Errors that end a worker before or during rotation.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Capturing the original or registering the pid failed.
    #[error("failed to register worker: {0}")]
    Registration(#[from] RegistryError),
    /// The termination listener failed; restoration has already run.
    #[error("termination listener failed: {0}")]
    Shutdown(#[from] ShutdownError),
}

/// Fixed parameters of one worker.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Interface being rotated.
    pub interface: InterfaceName,
    /// Leading octets of every generated address.
    pub prefix: AddressPrefix,
    /// Sleep between two changes.
    pub interval: Duration,
    /// Pid recorded in the registry.
    pub pid: u32,
}

/// Rotates one interface's address and restores it exactly once.
///
/// Dropping a worker that has not terminated runs restoration, so an
/// unwinding worker still leaves the interface at its original address.
pub struct Worker<L: LinkControl, R: RngCore> {
    settings: WorkerSettings,
    link: L,
    registry: Registry,
    log: ActivityLog,
    rng: R,
    state: WorkerState,
}

impl<L: LinkControl, R: RngCore> Worker<L, R> {
    /// Builds a worker in the [`WorkerState::Starting`] phase.
    pub fn new(settings: WorkerSettings, link: L, registry: Registry, rng: R) -> Self {
        let log = registry.activity_log(&settings.interface);
        Self {
            settings,
            link,
            registry,
            log,
            rng,
            state: WorkerState::Starting,
        }
    }

    /// Current phase.
    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Captures the original (unless already held) and registers this pid.
    ///
    /// A failure leaves the interface untouched and the worker terminated.
    pub fn start(&mut self) -> Result<Capture, WorkerError> {
        debug_assert_eq!(self.state, WorkerState::Starting);
        let interface = &self.settings.interface;
        let registered = self
            .registry
            .capture_original(interface, &self.link)
            .and_then(|capture| {
                self.registry
                    .write_pid(interface, self.settings.pid)
                    .map(|()| capture)
            });
        let capture = match registered {
            Ok(capture) => capture,
            Err(error) => {
                self.state = WorkerState::Terminated;
                return Err(error.into());
            }
        };
        self.record(&ActivityEvent::Started {
            pid: self.settings.pid,
        });
        info!(
            target: WORKER_TARGET,
            interface = %interface,
            pid = self.settings.pid,
            original = %capture.address(),
            "worker running"
        );
        self.state = WorkerState::Running;
        Ok(capture)
    }

    /// Generates and applies one address. Failures are logged, never fatal.
    pub fn tick(&mut self) -> TickOutcome {
        let address = self.settings.prefix.generate(&mut self.rng);
        let interface = self.settings.interface.as_str();
        match apply_address(&self.link, interface, address) {
            Ok(()) => {
                self.record(&ActivityEvent::Set { address });
                debug!(target: WORKER_TARGET, interface, %address, "address rotated");
                TickOutcome::Applied(address)
            }
            Err(error) => {
                let reason = error.to_string();
                self.record(&ActivityEvent::FailedSet {
                    address,
                    reason: reason.clone(),
                });
                warn!(target: WORKER_TARGET, interface, %address, %reason, "address change failed");
                TickOutcome::Failed { address, reason }
            }
        }
    }

    /// Starts, rotates until `shutdown` fires, then restores.
    pub fn run<S: ShutdownSignal + ?Sized>(
        &mut self,
        shutdown: &S,
    ) -> Result<RestoreOutcome, WorkerError> {
        self.start()?;
        let stopped = loop {
            self.tick();
            match shutdown.wait_timeout(self.settings.interval) {
                Ok(true) => break Ok(()),
                Ok(false) => {}
                Err(error) => break Err(error),
            }
        };
        let outcome = self.terminate().unwrap_or(RestoreOutcome::Skipped);
        stopped.map(|()| outcome).map_err(WorkerError::from)
    }

    /// Runs restoration once; later calls return `None`.
    pub fn terminate(&mut self) -> Option<RestoreOutcome> {
        match self.state {
            WorkerState::Restoring | WorkerState::Terminated => return None,
            WorkerState::Starting => {
                self.state = WorkerState::Terminated;
                return None;
            }
            WorkerState::Running => self.state = WorkerState::Restoring,
        }
        let outcome = self.restore();
        self.release_pid();
        self.state = WorkerState::Terminated;
        info!(
            target: WORKER_TARGET,
            interface = %self.settings.interface,
            ?outcome,
            "worker terminated"
        );
        Some(outcome)
    }

    fn restore(&mut self) -> RestoreOutcome {
        let interface = self.settings.interface.clone();
        let original = match self.registry.read_original(&interface) {
            Ok(Some(original)) => original,
            Ok(None) => {
                self.record(&ActivityEvent::RestoreSkipped);
                warn!(
                    target: WORKER_TARGET,
                    interface = %interface,
                    "no original address recorded; leaving interface as is"
                );
                return RestoreOutcome::Skipped;
            }
            Err(error) => {
                error!(
                    target: WORKER_TARGET,
                    interface = %interface,
                    %error,
                    "original address record unreadable"
                );
                return RestoreOutcome::Failed {
                    reason: error.to_string(),
                };
            }
        };
        match apply_address(&self.link, interface.as_str(), original) {
            Ok(()) => {
                self.record(&ActivityEvent::Restored { address: original });
                if let Err(error) = self.registry.clear_original(&interface) {
                    warn!(
                        target: WORKER_TARGET,
                        interface = %interface,
                        %error,
                        "failed to clear original address record"
                    );
                }
                RestoreOutcome::Restored(original)
            }
            Err(error) => {
                let reason = error.to_string();
                self.record(&ActivityEvent::RestoreFailed {
                    address: original,
                    reason: reason.clone(),
                });
                error!(
                    target: WORKER_TARGET,
                    interface = %interface,
                    %original,
                    %reason,
                    "restoration failed; record kept"
                );
                RestoreOutcome::Failed { reason }
            }
        }
    }

    fn release_pid(&self) {
        if let Err(error) = self
            .registry
            .clear_pid_if(&self.settings.interface, self.settings.pid)
        {
            warn!(
                target: WORKER_TARGET,
                interface = %self.settings.interface,
                %error,
                "failed to release pid registration"
            );
        }
    }

    fn record(&self, event: &ActivityEvent) {
        if let Err(error) = self.log.append(event) {
            warn!(
                target: WORKER_TARGET,
                interface = %self.settings.interface,
                %error,
                "failed to append activity log"
            );
        }
    }
}

impl<L: LinkControl, R: RngCore> Drop for Worker<L, R> {
    fn drop(&mut self) {
        if self.state == WorkerState::Running {
            let _ = self.terminate();
        }
    }
}
