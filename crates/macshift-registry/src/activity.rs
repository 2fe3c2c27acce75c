use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use macshift_link::{HardwareAddress, InterfaceName};
use time::OffsetDateTime;
use time::format_description::FormatItem;
use time::macros::format_description;

use crate::errors::RegistryError;
use crate::files::open_append;

const TIMESTAMP: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// One line of the per-interface activity log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityEvent {
    /// A worker registered itself.
    Started { pid: u32 },
    /// A randomized address was applied.
    Set { address: HardwareAddress },
    /// Applying a randomized address failed.
    FailedSet {
        address: HardwareAddress,
        reason: String,
    },
    /// The original address was put back.
    Restored { address: HardwareAddress },
    /// Putting the original address back failed; the record is kept.
    RestoreFailed {
        address: HardwareAddress,
        reason: String,
    },
    /// No original address was recorded, so the interface was left alone.
    RestoreSkipped,
    /// The supervisor stopped rotation for the interface.
    Stopped { pid: Option<u32> },
}

impl ActivityEvent {
    /// Renders the event for `interface` without the timestamp.
    pub fn render(&self, interface: &InterfaceName) -> String {
        Rendered {
            event: self,
            interface,
        }
        .to_string()
    }
}

struct Rendered<'a> {
    event: &'a ActivityEvent,
    interface: &'a InterfaceName,
}

impl fmt::Display for Rendered<'_> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let interface = self.interface;
        match self.event {
            ActivityEvent::Started { pid } => write!(formatter, "STARTED {interface} pid={pid}"),
            ActivityEvent::Set { address } => write!(formatter, "SET {interface} -> {address}"),
            ActivityEvent::FailedSet { address, reason } => {
                write!(formatter, "FAILED_SET {interface} -> {address} : {reason}")
            }
            ActivityEvent::Restored { address } => {
                write!(formatter, "RESTORED {interface} -> {address}")
            }
            ActivityEvent::RestoreFailed { address, reason } => {
                write!(formatter, "RESTORE_FAILED {interface} -> {address} : {reason}")
            }
            ActivityEvent::RestoreSkipped => write!(formatter, "RESTORE_SKIPPED {interface}"),
            ActivityEvent::Stopped { pid: Some(pid) } => {
                write!(formatter, "STOPPED {interface} pid={pid}")
            }
            ActivityEvent::Stopped { pid: None } => write!(formatter, "STOPPED {interface}"),
        }
    }
}

/// Append-only, timestamped activity sink for one interface.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    interface: InterfaceName,
    path: PathBuf,
}

impl ActivityLog {
    pub(crate) fn new(interface: InterfaceName, path: PathBuf) -> Self {
        Self { interface, path }
    }

    /// Location of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `event` as a single UTC-timestamped line.
    pub fn append(&self, event: &ActivityEvent) -> Result<(), RegistryError> {
        let stamp = OffsetDateTime::now_utc()
            .format(TIMESTAMP)
            .map_err(|source| RegistryError::Timestamp { source })?;
        let line = format!("{stamp} {}\n", event.render(&self.interface));
        let write_error = |source| RegistryError::Write {
            path: self.path.clone(),
            source,
        };
        let mut file = open_append(&self.path).map_err(write_error)?;
        file.write_all(line.as_bytes()).map_err(write_error)?;
        Ok(())
    }
}
