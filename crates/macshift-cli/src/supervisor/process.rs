//! Worker process spawning and signalling.

use std::env;
use std::ffi::{OsStr, OsString};
use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::process::{Child, Command, ExitStatus as ChildStatus, Stdio};

use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::{Pid, setsid};
use tracing::debug;

use macshift_link::InterfaceName;
use macshift_registry::Registry;

use super::{SUPERVISOR_TARGET, SupervisorError};

/// Environment variable naming the worker binary.
pub(crate) const WORKER_BIN_ENV: &str = "MACSHIFTD_BIN";
const WORKER_BIN_NAME: &str = "macshiftd";

/// A worker process the supervisor has just launched.
pub(crate) trait WorkerHandle {
    /// Pid reported at spawn time.
    fn id(&self) -> u32;

    /// Returns the exit status once the worker has exited.
    fn try_exit(&mut self) -> io::Result<Option<ChildStatus>>;
}

/// Launches detached workers.
pub(crate) trait WorkerSpawner {
    /// Starts a worker for `interface`, sending its diagnostics to `trace`.
    fn spawn(
        &self,
        interface: &InterfaceName,
        trace: &Path,
    ) -> Result<Box<dyn WorkerHandle>, SupervisorError>;
}

/// Result of asking a worker to terminate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Termination {
    /// The signal was delivered.
    Delivered,
    /// No such process; nothing to wait for.
    AlreadyGone,
}

/// Liveness probing and termination of registered workers.
pub(crate) trait ProcessControl {
    fn is_alive(&self, pid: u32) -> bool;

    fn terminate(&self, pid: u32) -> Result<Termination, SupervisorError>;
}

/// Spawns the `macshiftd` binary in a new session with stdio detached.
pub(crate) struct SystemSpawner {
    binary: OsString,
    forwarded: Vec<OsString>,
}

impl SystemSpawner {
    /// Builds a spawner forwarding `config_arguments` (minus `argv[0]`).
    pub(crate) fn new(binary_override: Option<&OsStr>, config_arguments: &[OsString]) -> Self {
        Self {
            binary: resolve_worker_binary(binary_override),
            forwarded: config_arguments.iter().skip(1).cloned().collect(),
        }
    }
}

impl WorkerSpawner for SystemSpawner {
    fn spawn(
        &self,
        interface: &InterfaceName,
        trace: &Path,
    ) -> Result<Box<dyn WorkerHandle>, SupervisorError> {
        let mut options = OpenOptions::new();
        options.append(true).create(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let trace_file = options
            .open(trace)
            .map_err(|source| SupervisorError::OpenTrace {
                path: trace.to_path_buf(),
                source,
            })?;

        let mut command = Command::new(&self.binary);
        command
            .arg("--interface")
            .arg(interface.as_str())
            .arg("--")
            .args(&self.forwarded)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(trace_file));
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // SAFETY: the hook only calls setsid(2), which is async-signal-safe
            // and does not allocate or touch state shared with the parent.
            unsafe {
                command.pre_exec(detach_session);
            }
        }
        let child = command
            .spawn()
            .map_err(|source| SupervisorError::LaunchWorker {
                binary: self.binary.clone(),
                source,
            })?;
        debug!(
            target: SUPERVISOR_TARGET,
            interface = %interface,
            pid = child.id(),
            "worker spawned"
        );
        Ok(Box::new(SpawnedWorker { child }))
    }
}

fn detach_session() -> io::Result<()> {
    setsid().map(|_| ()).map_err(io::Error::from)
}

struct SpawnedWorker {
    child: Child,
}

impl WorkerHandle for SpawnedWorker {
    fn id(&self) -> u32 {
        self.child.id()
    }

    fn try_exit(&mut self) -> io::Result<Option<ChildStatus>> {
        self.child.try_wait()
    }
}

/// Signals real processes with `kill(2)`.
pub(crate) struct SystemProcesses;

impl ProcessControl for SystemProcesses {
    fn is_alive(&self, pid: u32) -> bool {
        Registry::is_alive(pid)
    }

    fn terminate(&self, pid: u32) -> Result<Termination, SupervisorError> {
        // Pid 0 and anything beyond i32 would address process groups.
        let raw = match i32::try_from(pid) {
            Ok(raw) if raw > 0 => raw,
            _ => return Ok(Termination::AlreadyGone),
        };
        match kill(Pid::from_raw(raw), Signal::SIGTERM) {
            Ok(()) => Ok(Termination::Delivered),
            Err(Errno::ESRCH) => Ok(Termination::AlreadyGone),
            Err(source) => Err(SupervisorError::SignalFailed { pid, source }),
        }
    }
}

/// Picks the worker binary: explicit override, then `MACSHIFTD_BIN`, then a
/// `macshiftd` next to the running executable, then `macshiftd` on `PATH`.
pub(crate) fn resolve_worker_binary(binary_override: Option<&OsStr>) -> OsString {
    binary_override
        .map(OsString::from)
        .or_else(|| env::var_os(WORKER_BIN_ENV))
        .or_else(sibling_worker_binary)
        .unwrap_or_else(|| OsString::from(WORKER_BIN_NAME))
}

fn sibling_worker_binary() -> Option<OsString> {
    let current = env::current_exe().ok()?;
    let candidate = current.parent()?.join(WORKER_BIN_NAME);
    candidate.is_file().then(|| candidate.into_os_string())
}
