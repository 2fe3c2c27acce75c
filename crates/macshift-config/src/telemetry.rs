//! Structured telemetry initialisation shared by both binaries.
//!
//! The supervisor writes diagnostics to the operator's terminal. A worker's
//! stderr is redirected into its per-interface trace file, so worker output
//! is never coloured and every event is attributed to a root `worker` span
//! carrying the interface and pid.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::span::EnteredSpan;
use tracing::{Subscriber, info_span, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use crate::{Config, LogFormat};

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// The process installing telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role<'a> {
    /// The `macshift` command-line supervisor.
    Supervisor,
    /// A `macshiftd` worker rotating one interface.
    Worker {
        /// Interface the worker owns.
        interface: &'a str,
        /// The worker's own pid.
        pid: u32,
    },
}

impl Role<'_> {
    /// Colour only reaches an operator's terminal, never a trace file.
    const fn uses_ansi(self, stderr_is_terminal: bool) -> bool {
        match self {
            Self::Supervisor => stderr_is_terminal,
            Self::Worker { .. } => false,
        }
    }

    fn root_span(self) -> Option<EnteredSpan> {
        match self {
            Self::Supervisor => None,
            Self::Worker { interface, pid } => Some(info_span!("worker", interface, pid).entered()),
        }
    }
}

/// Keeps the worker's root span entered while held.
#[derive(Debug, Default)]
pub struct TelemetryHandle {
    _root: Option<EnteredSpan>,
}

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured filter expression did not parse.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Another subscriber was already installed globally.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Installs the global tracing subscriber on first use.
///
/// Later calls skip the install, so the CLI test harness can run many
/// invocations in one process. Each call enters a fresh root span for
/// worker roles; hold the handle for as long as the worker runs.
pub fn initialise(config: &Config, role: Role<'_>) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY_GUARD.get_or_try_init(|| install_subscriber(config, role))?;
    Ok(TelemetryHandle {
        _root: role.root_span(),
    })
}

fn install_subscriber(config: &Config, role: Role<'_>) -> Result<(), TelemetryError> {
    let subscriber = build_subscriber(config, role, io::stderr().is_terminal())?;
    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}

fn build_subscriber(
    config: &Config,
    role: Role<'_>,
    stderr_is_terminal: bool,
) -> Result<Box<dyn Subscriber + Send + Sync>, TelemetryError> {
    let filter = EnvFilter::try_new(config.log_filter())
        .map_err(|error| TelemetryError::Filter(error.to_string()))?;

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_thread_names(false)
        .with_writer(io::stderr)
        .with_ansi(role.uses_ansi(stderr_is_terminal))
        .with_timer(fmt::time::UtcTime::rfc_3339());

    Ok(match config.log_format() {
        LogFormat::Json => Box::new(
            builder
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_span_list(false)
                .finish(),
        ),
        LogFormat::Compact => Box::new(builder.compact().finish()),
    })
}
