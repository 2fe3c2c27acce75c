use std::ffi::OsString;
use std::iter;
use std::sync::Arc;

use clap::Parser;
use ortho_config::{OrthoConfig, OrthoError};

use macshift_config::Config;

/// Command line accepted by the worker.
///
/// Configuration flags follow a `--` separator and are handed to the shared
/// configuration loader untouched, mirroring what the supervisor was given.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "macshiftd",
    version,
    about = "Rotate one interface's hardware address until terminated"
)]
pub struct WorkerArgs {
    /// Interface to rotate.
    #[arg(long, value_name = "NAME")]
    pub interface: String,
    /// Configuration flags forwarded by the supervisor.
    #[arg(last = true, value_name = "CONFIG_FLAGS")]
    pub config: Vec<OsString>,
}

impl WorkerArgs {
    /// Loads configuration from the forwarded flags, the environment, and any
    /// configuration file.
    pub fn load_config(&self) -> Result<Config, Arc<OrthoError>> {
        let argv = iter::once(OsString::from("macshiftd")).chain(self.config.iter().cloned());
        Config::load_from_iter(argv)
    }
}
