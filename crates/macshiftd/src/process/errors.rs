//! Defines the error surface for worker launch.

use std::sync::Arc;

use ortho_config::OrthoError;
use thiserror::Error;

use macshift_config::ConfigValueError;
use macshift_config::telemetry::TelemetryError;
use macshift_link::{InterfaceNameError, LinkError, PrefixError};
use macshift_registry::RegistryError;

use super::shutdown::ShutdownError;
use crate::worker::WorkerError;

/// Errors surfaced while launching or running a worker process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The command line did not parse.
    #[error(transparent)]
    Arguments(#[from] clap::Error),
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Config {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Configuration loaded but holds unusable values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigValueError),
    /// The configured address prefix is unsafe or malformed.
    #[error("invalid configuration: {0}")]
    Prefix(#[from] PrefixError),
    /// The interface name cannot be used.
    #[error(transparent)]
    InterfaceName(#[from] InterfaceNameError),
    /// Telemetry could not be installed.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    /// The link utility is unavailable.
    #[error(transparent)]
    Link(#[from] LinkError),
    /// The registry directory could not be prepared.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// Termination signal handlers could not be installed.
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
    /// The worker state machine failed.
    #[error(transparent)]
    Worker(#[from] WorkerError),
}

impl LaunchError {
    /// Exit status for malformed invocations or configuration.
    pub const USAGE_EXIT_CODE: u8 = 64;
    /// Exit status when the link utility is missing.
    pub const DEPENDENCY_EXIT_CODE: u8 = 2;

    /// Process exit status describing this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Arguments(_)
            | Self::Config { .. }
            | Self::InvalidConfig(_)
            | Self::Prefix(_)
            | Self::InterfaceName(_) => Self::USAGE_EXIT_CODE,
            Self::Link(LinkError::CommandMissing { .. }) => Self::DEPENDENCY_EXIT_CODE,
            _ => 1,
        }
    }
}

impl From<Arc<OrthoError>> for LaunchError {
    fn from(source: Arc<OrthoError>) -> Self {
        Self::Config { source }
    }
}
