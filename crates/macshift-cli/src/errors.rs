//! Errors that end a supervisor run before or around the per-interface batch.

use std::io;
use std::sync::Arc;

use thiserror::Error;

use macshift_config::ConfigValueError;
use macshift_config::telemetry::TelemetryError;
use macshift_link::{LinkError, PrefixError};
use macshift_registry::RegistryError;

use crate::exit::ExitStatus;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigValueError),
    #[error("invalid configuration: {0}")]
    InvalidPrefix(#[from] PrefixError),
    #[error("failed to initialise logging: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("unknown action '{action}'; expected start, stop, or status")]
    UnknownAction { action: String },
    #[error("missing dependency: {0}")]
    DependencyMissing(LinkError),
    #[error("failed to list interfaces that are up: {0}")]
    ListInterfaces(LinkError),
    #[error("failed to read target interfaces: {0}")]
    Prompt(io::Error),
    #[error("no target interfaces")]
    NoTargets,
    #[error("'{action}' requires root privileges; re-run with sudo or add --dry-run")]
    PrivilegeRequired { action: String },
    #[error("registry unavailable: {0}")]
    Registry(#[from] RegistryError),
    #[error("failed to serialise report: {0}")]
    SerialiseReport(serde_json::Error),
    #[error("failed to write report: {0}")]
    Output(io::Error),
}

impl AppError {
    pub(crate) fn exit_status(&self) -> ExitStatus {
        match self {
            Self::CliUsage(_)
            | Self::LoadConfiguration(_)
            | Self::InvalidConfiguration(_)
            | Self::InvalidPrefix(_)
            | Self::Telemetry(_) => ExitStatus::Usage,
            Self::UnknownAction { .. } => ExitStatus::UnknownAction,
            Self::DependencyMissing(_) => ExitStatus::DependencyMissing,
            Self::PrivilegeRequired { .. } => ExitStatus::PrivilegeRequired,
            Self::ListInterfaces(_)
            | Self::Prompt(_)
            | Self::NoTargets
            | Self::Registry(_)
            | Self::SerialiseReport(_)
            | Self::Output(_) => ExitStatus::Failure,
        }
    }
}
