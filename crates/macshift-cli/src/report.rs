//! Per-interface outcomes and their human or JSON rendering.

use std::io::Write;
use std::time::Duration;

use serde::Serialize;

use crate::cli::{Action, OutputFormat};
use crate::errors::AppError;
use crate::exit::ExitStatus;

/// Classification of one interface's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// A new worker was launched and registered.
    Started,
    /// A live worker was already registered; nothing was launched.
    AlreadyRunning,
    /// The action was previewed without signalling, spawning, or restoring.
    DryRun,
    /// The worker is gone and the original address is in place.
    Stopped,
    /// Neither a worker nor a captured original was registered.
    NothingToStop,
    /// A live worker is rotating the interface.
    Active,
    /// The registered pid was dead and its record has been cleared.
    Stale,
    /// No worker is registered.
    Inactive,
    /// The interface does not exist on this host.
    NotFound,
    /// The action could not be completed.
    Failed,
}

impl OutcomeKind {
    /// Failures are reported on stderr and fail the batch.
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::NotFound | Self::Failed)
    }

    /// Status results that mean no worker is rotating the interface.
    pub const fn is_not_active(self) -> bool {
        matches!(self, Self::Stale | Self::Inactive)
    }
}

/// The result for one interface, with whatever details apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceOutcome {
    /// Interface the action targeted, as given on the command line.
    pub interface: String,
    /// Classification that drives the exit code.
    pub status: OutcomeKind,
    /// Worker pid involved in the action, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    /// Captured original hardware address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original: Option<String>,
    /// Hardware address currently on the interface.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<String>,
    /// Path of the interface's activity log.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
    /// Whole seconds since the live worker registered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_seconds: Option<u64>,
    /// Human-readable summary printed in human output.
    pub message: String,
}

impl InterfaceOutcome {
    /// An outcome with no optional details.
    pub fn new(interface: impl Into<String>, status: OutcomeKind, message: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            status,
            pid: None,
            original: None,
            current: None,
            log: None,
            uptime_seconds: None,
            message: message.into(),
        }
    }

    /// Shorthand for a per-interface failure.
    pub fn failed(interface: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(interface, OutcomeKind::Failed, message)
    }

    /// Records the worker pid.
    #[must_use]
    pub fn with_pid(mut self, pid: Option<u32>) -> Self {
        self.pid = pid;
        self
    }

    #[must_use]
    pub fn with_original(mut self, original: Option<impl ToString>) -> Self {
        self.original = original.map(|address| address.to_string());
        self
    }

    #[must_use]
    pub fn with_current(mut self, current: Option<impl ToString>) -> Self {
        self.current = current.map(|address| address.to_string());
        self
    }

    #[must_use]
    pub fn with_log(mut self, log: Option<String>) -> Self {
        self.log = log;
        self
    }

    /// Records worker uptime, truncated to whole seconds.
    #[must_use]
    pub fn with_uptime(mut self, uptime: Option<Duration>) -> Self {
        self.uptime_seconds = uptime.map(|uptime| uptime.as_secs());
        self
    }
}

/// Every outcome of one invocation.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    /// Action applied to every target.
    pub action: Action,
    /// Whether the run only previewed the action.
    pub dry_run: bool,
    /// One outcome per target, in target order.
    pub results: Vec<InterfaceOutcome>,
}

impl BatchReport {
    pub fn new(action: Action, dry_run: bool) -> Self {
        Self {
            action,
            dry_run,
            results: Vec::new(),
        }
    }

    pub fn push(&mut self, outcome: InterfaceOutcome) {
        self.results.push(outcome);
    }

    /// Failures dominate; otherwise any interface without a live worker.
    pub fn exit_status(&self) -> ExitStatus {
        if self.results.iter().any(|result| result.status.is_failure()) {
            ExitStatus::InterfaceFailure
        } else if self.results.iter().any(|result| result.status.is_not_active()) {
            ExitStatus::NotActive
        } else {
            ExitStatus::Success
        }
    }

    pub(crate) fn render<W: Write, E: Write>(
        &self,
        format: OutputFormat,
        stdout: &mut W,
        stderr: &mut E,
    ) -> Result<(), AppError> {
        match format {
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut *stdout, self).map_err(AppError::SerialiseReport)?;
                stdout.write_all(b"\n").map_err(AppError::Output)?;
            }
            OutputFormat::Human => {
                for result in &self.results {
                    let written = if result.status.is_failure() {
                        writeln!(stderr, "{}: {}", result.interface, result.message)
                    } else {
                        writeln!(stdout, "{}: {}", result.interface, result.message)
                    };
                    written.map_err(AppError::Output)?;
                }
            }
        }
        stdout.flush().map_err(AppError::Output)?;
        stderr.flush().map_err(AppError::Output)
    }
}
