//! Bounded polling used after spawning and after signalling a worker.

use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use macshift_link::InterfaceName;
use macshift_registry::Registry;

use super::process::{ProcessControl, WorkerHandle};
use super::{SUPERVISOR_TARGET, SupervisorError};

/// How a freshly spawned worker ended up registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Registration {
    /// The worker wrote its own pid within the grace period.
    SelfRegistered(u32),
    /// The grace period ran out; the spawn-reported pid was recorded.
    Provisional(u32),
}

impl Registration {
    pub(crate) fn pid(self) -> u32 {
        match self {
            Self::SelfRegistered(pid) | Self::Provisional(pid) => pid,
        }
    }
}

/// Whether a signalled worker let go of its registration in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Release {
    Released,
    TimedOut,
}

fn names(registry: &Registry, interface: &InterfaceName, pid: u32) -> bool {
    matches!(registry.read_pid(interface), Ok(Some(current)) if current == pid)
}

/// Waits up to `grace` for `worker` to register itself.
///
/// A worker that exits inside the window is an error; one that is still
/// running but silent gets its spawn-reported pid recorded.
pub(crate) fn wait_for_registration(
    worker: &mut dyn WorkerHandle,
    registry: &Registry,
    interface: &InterfaceName,
    trace: &Path,
    grace: Duration,
    poll: Duration,
) -> Result<Registration, SupervisorError> {
    let pid = worker.id();
    let deadline = Instant::now() + grace;
    loop {
        if let Some(status) = worker
            .try_exit()
            .map_err(|source| SupervisorError::MonitorWorker { source })?
        {
            return Err(SupervisorError::WorkerExited {
                status,
                trace: trace.to_path_buf(),
            });
        }
        if names(registry, interface, pid) {
            debug!(target: SUPERVISOR_TARGET, interface = %interface, pid, "worker registered itself");
            return Ok(Registration::SelfRegistered(pid));
        }
        if Instant::now() >= deadline {
            break;
        }
        thread::sleep(poll);
    }
    registry.write_pid(interface, pid)?;
    warn!(
        target: SUPERVISOR_TARGET,
        interface = %interface,
        pid,
        grace_ms = grace.as_millis(),
        "worker did not register in time; recorded spawn pid"
    );
    Ok(Registration::Provisional(pid))
}

/// Waits up to `grace` for a signalled worker to exit or drop its pid.
pub(crate) fn wait_for_release(
    registry: &Registry,
    processes: &dyn ProcessControl,
    interface: &InterfaceName,
    pid: u32,
    grace: Duration,
    poll: Duration,
) -> Release {
    let deadline = Instant::now() + grace;
    loop {
        if !processes.is_alive(pid) || !names(registry, interface, pid) {
            return Release::Released;
        }
        if Instant::now() >= deadline {
            warn!(
                target: SUPERVISOR_TARGET,
                interface = %interface,
                pid,
                grace_ms = grace.as_millis(),
                "worker still registered after stop grace period"
            );
            return Release::TimedOut;
        }
        thread::sleep(poll);
    }
}
