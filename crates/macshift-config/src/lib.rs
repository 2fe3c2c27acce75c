//! Shared configuration for the `macshift` supervisor and `macshiftd` workers.
//!
//! Both binaries load the same [`Config`] through `ortho_config`, so values
//! may come from command-line flags, `MACSHIFT_*` environment variables, or a
//! configuration file. The supervisor forwards its configuration flags to
//! every worker it spawns, which keeps the registry directory and timing
//! parameters identical on both sides of the process boundary.

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod defaults;
mod logging;
pub mod telemetry;

pub use defaults::{
    DEFAULT_ADDRESS_PREFIX, DEFAULT_INTERVAL_MS, DEFAULT_IP_COMMAND, DEFAULT_LOG_FILTER,
    DEFAULT_SPAWN_GRACE_MS, DEFAULT_STOP_GRACE_MS, MAX_INTERVAL_MS, MIN_INTERVAL_MS,
    default_address_prefix, default_ip_command, default_log_filter, default_log_format,
    default_state_dir,
};
pub use logging::{LogFormat, LogFormatParseError};

/// Immutable runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "MACSHIFT")]
pub struct Config {
    /// Directory holding pid, original-address, and log files.
    #[ortho_config(default = defaults::default_state_dir())]
    pub state_dir: Utf8PathBuf,
    /// Milliseconds between two address changes.
    #[ortho_config(default = defaults::DEFAULT_INTERVAL_MS)]
    pub interval_ms: u64,
    /// First three octets of every generated address.
    #[ortho_config(default = defaults::default_address_prefix())]
    pub address_prefix: String,
    /// Program invoked to bring links down/up and set their address.
    #[ortho_config(default = defaults::default_ip_command())]
    pub ip_command: String,
    /// Upper bound on the wait for a spawned worker to register itself.
    #[ortho_config(default = defaults::DEFAULT_SPAWN_GRACE_MS)]
    pub spawn_grace_ms: u64,
    /// Upper bound on the wait for a signalled worker to exit.
    #[ortho_config(default = defaults::DEFAULT_STOP_GRACE_MS)]
    pub stop_grace_ms: u64,
    /// `tracing` filter expression.
    #[ortho_config(default = defaults::default_log_filter())]
    pub log_filter: String,
    /// `tracing` output format.
    #[ortho_config(default = defaults::default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            interval_ms: DEFAULT_INTERVAL_MS,
            address_prefix: default_address_prefix(),
            ip_command: default_ip_command(),
            spawn_grace_ms: DEFAULT_SPAWN_GRACE_MS,
            stop_grace_ms: DEFAULT_STOP_GRACE_MS,
            log_filter: default_log_filter(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Registry directory.
    pub fn state_dir(&self) -> &Utf8Path {
        self.state_dir.as_path()
    }

    /// Time between two address changes.
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Configured address prefix, unparsed.
    pub fn address_prefix(&self) -> &str {
        &self.address_prefix
    }

    /// Program used for link mutation.
    pub fn ip_command(&self) -> &str {
        &self.ip_command
    }

    /// Bounded wait applied after spawning a worker.
    pub const fn spawn_grace(&self) -> Duration {
        Duration::from_millis(self.spawn_grace_ms)
    }

    /// Bounded wait applied after signalling a worker.
    pub const fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    /// Log filter expression.
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Rejects values that load successfully but cannot be acted upon.
    pub fn validate(&self) -> Result<(), ConfigValueError> {
        if !(MIN_INTERVAL_MS..=MAX_INTERVAL_MS).contains(&self.interval_ms) {
            return Err(ConfigValueError::IntervalOutOfRange {
                value: self.interval_ms,
            });
        }
        if self.state_dir.as_str().is_empty() {
            return Err(ConfigValueError::EmptyStateDir);
        }
        if self.ip_command.trim().is_empty() {
            return Err(ConfigValueError::EmptyIpCommand);
        }
        Ok(())
    }
}

/// Semantic configuration errors detected after loading.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigValueError {
    /// The interval lies outside the supported range.
    #[error(
        "interval_ms {value} is outside the supported range {MIN_INTERVAL_MS}..={MAX_INTERVAL_MS}"
    )]
    IntervalOutOfRange {
        /// Interval as configured, in milliseconds.
        value: u64,
    },
    /// The registry directory was configured as an empty path.
    #[error("state_dir must not be empty")]
    EmptyStateDir,
    /// The link program was configured as an empty string.
    #[error("ip_command must not be empty")]
    EmptyIpCommand,
}
