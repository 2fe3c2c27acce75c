//! System collaborators the supervisor needs from the host.

use std::ffi::OsString;

use nix::unistd::geteuid;

use macshift_config::Config;
use macshift_link::{IpCommand, LinkControl, LinkError};

use crate::supervisor::{ProcessControl, SystemProcesses, SystemSpawner, WorkerSpawner};
use crate::targets::{Prompter, TerminalPrompter};

/// Everything the runner touches outside its own process.
pub(crate) trait Host {
    type Link: LinkControl;

    /// Locates the link utility; a missing utility is a dependency error.
    fn link(&self, config: &Config) -> Result<Self::Link, LinkError>;

    /// Whether the effective user may change hardware addresses.
    fn is_privileged(&self) -> bool;

    /// A spawner forwarding `config_arguments` to each worker.
    fn spawner(&self, config_arguments: &[OsString]) -> Box<dyn WorkerSpawner>;

    fn processes(&self) -> Box<dyn ProcessControl>;

    fn prompter(&self) -> Box<dyn Prompter>;
}

/// The real machine; the worker binary comes from the usual lookup.
#[derive(Debug, Default)]
pub(crate) struct SystemHost;

impl Host for SystemHost {
    type Link = IpCommand;

    fn link(&self, config: &Config) -> Result<IpCommand, LinkError> {
        IpCommand::locate(config.ip_command())
    }

    fn is_privileged(&self) -> bool {
        geteuid().is_root()
    }

    fn spawner(&self, config_arguments: &[OsString]) -> Box<dyn WorkerSpawner> {
        Box::new(SystemSpawner::new(None, config_arguments))
    }

    fn processes(&self) -> Box<dyn ProcessControl> {
        Box::new(SystemProcesses)
    }

    fn prompter(&self) -> Box<dyn Prompter> {
        Box::new(TerminalPrompter)
    }
}
