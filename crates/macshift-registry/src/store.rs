use std::fs::{self, Permissions};
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use macshift_link::{HardwareAddress, InterfaceName, LinkControl};
use nix::sys::signal::kill;
use nix::unistd::{Pid, geteuid};
use tracing::{debug, info, warn};

use crate::REGISTRY_TARGET;
use crate::activity::ActivityLog;
use crate::errors::RegistryError;
use crate::files::{atomic_write, create_private_dir, read_if_present, remove_if_present};

const PID_EXTENSION: &str = "pid";
const ORIGINAL_EXTENSION: &str = "orig";
const LOG_EXTENSION: &str = "log";
const TRACE_EXTENSION: &str = "trace";

/// Outcome of [`Registry::capture_original`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    /// The interface's current address was recorded just now.
    Recorded(HardwareAddress),
    /// An earlier capture was kept untouched.
    Existing(HardwareAddress),
}

impl Capture {
    /// The address that will be restored.
    pub fn address(self) -> HardwareAddress {
        match self {
            Self::Recorded(address) | Self::Existing(address) => address,
        }
    }
}

/// Per-interface state rooted in a single owner-only directory.
#[derive(Debug, Clone)]
pub struct Registry {
    root: PathBuf,
}

impl Registry {
    /// Opens the registry at `root`, creating the directory when absent.
    ///
    /// An existing directory must be a real directory owned by the effective
    /// user; group and other permission bits are stripped.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let root = root.into();
        create_private_dir(&root).map_err(|source| RegistryError::Directory {
            path: root.clone(),
            source,
        })?;
        secure_root(&root, geteuid().as_raw())?;
        debug!(target: REGISTRY_TARGET, root = %root.display(), "registry opened");
        Ok(Self { root })
    }

    /// Directory holding every record.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of the worker pid record.
    pub fn pid_path(&self, interface: &InterfaceName) -> PathBuf {
        self.file(interface, PID_EXTENSION)
    }

    /// Location of the captured original address.
    pub fn original_path(&self, interface: &InterfaceName) -> PathBuf {
        self.file(interface, ORIGINAL_EXTENSION)
    }

    /// Location of the worker's diagnostic output.
    pub fn trace_path(&self, interface: &InterfaceName) -> PathBuf {
        self.file(interface, TRACE_EXTENSION)
    }

    /// Activity log for `interface`.
    pub fn activity_log(&self, interface: &InterfaceName) -> ActivityLog {
        ActivityLog::new(interface.clone(), self.file(interface, LOG_EXTENSION))
    }

    fn file(&self, interface: &InterfaceName, extension: &str) -> PathBuf {
        self.root.join(format!("{interface}.{extension}"))
    }

    /// Records the interface's current address unless one is already held.
    ///
    /// An existing record is never overwritten, so a second start while the
    /// interface carries a randomized address cannot lose the original.
    pub fn capture_original<L: LinkControl + ?Sized>(
        &self,
        interface: &InterfaceName,
        link: &L,
    ) -> Result<Capture, RegistryError> {
        if let Some(existing) = self.read_original(interface)? {
            debug!(
                target: REGISTRY_TARGET,
                interface = %interface,
                address = %existing,
                "original address already captured"
            );
            return Ok(Capture::Existing(existing));
        }
        let address = link
            .current_address(interface.as_str())
            .map_err(|source| RegistryError::Capture {
                interface: interface.to_string(),
                source,
            })?;
        let path = self.original_path(interface);
        atomic_write(&path, format!("{address}\n").as_bytes())
            .map_err(|source| RegistryError::Write { path, source })?;
        info!(
            target: REGISTRY_TARGET,
            interface = %interface,
            %address,
            "original address captured"
        );
        Ok(Capture::Recorded(address))
    }

    /// Reads the captured original; an absent or blank record is `None`.
    pub fn read_original(
        &self,
        interface: &InterfaceName,
    ) -> Result<Option<HardwareAddress>, RegistryError> {
        let path = self.original_path(interface);
        let Some(contents) = read_record(&path)? else {
            return Ok(None);
        };
        contents
            .parse()
            .map(Some)
            .map_err(|_| RegistryError::CorruptOriginal {
                path,
                value: contents,
            })
    }

    /// Removes the captured original.
    pub fn clear_original(&self, interface: &InterfaceName) -> Result<(), RegistryError> {
        remove_record(&self.original_path(interface))
    }

    /// Registers `pid` as the worker for `interface`; last write wins.
    pub fn write_pid(&self, interface: &InterfaceName, pid: u32) -> Result<(), RegistryError> {
        let path = self.pid_path(interface);
        atomic_write(&path, format!("{pid}\n").as_bytes())
            .map_err(|source| RegistryError::Write { path, source })?;
        debug!(target: REGISTRY_TARGET, interface = %interface, pid, "pid registered");
        Ok(())
    }

    /// Reads the registered worker pid.
    pub fn read_pid(&self, interface: &InterfaceName) -> Result<Option<u32>, RegistryError> {
        let path = self.pid_path(interface);
        let Some(contents) = read_record(&path)? else {
            return Ok(None);
        };
        contents
            .parse::<u32>()
            .map(Some)
            .map_err(|_| RegistryError::ParsePid {
                path,
                value: contents,
            })
    }

    /// Time since the pid record was last written.
    ///
    /// Workers register once at start-up, so this is the worker's uptime.
    /// A modification time in the future counts as zero.
    pub fn pid_age(&self, interface: &InterfaceName) -> Result<Option<Duration>, RegistryError> {
        let path = self.pid_path(interface);
        let modified = match fs::metadata(&path).and_then(|metadata| metadata.modified()) {
            Ok(modified) => modified,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(RegistryError::Read { path, source }),
        };
        Ok(Some(
            SystemTime::now()
                .duration_since(modified)
                .unwrap_or(Duration::ZERO),
        ))
    }

    /// Removes the pid registration.
    pub fn clear_pid(&self, interface: &InterfaceName) -> Result<(), RegistryError> {
        remove_record(&self.pid_path(interface))
    }

    /// Removes the pid registration only while it still names `pid`.
    ///
    /// Returns whether the record was removed. Workers use this on exit so a
    /// replacement registered after them is left in place.
    pub fn clear_pid_if(&self, interface: &InterfaceName, pid: u32) -> Result<bool, RegistryError> {
        match self.read_pid(interface) {
            Ok(Some(current)) if current == pid => {
                self.clear_pid(interface)?;
                Ok(true)
            }
            Ok(_) | Err(RegistryError::ParsePid { .. }) => {
                warn!(
                    target: REGISTRY_TARGET,
                    interface = %interface,
                    pid,
                    "pid record no longer names this worker; leaving it"
                );
                Ok(false)
            }
            Err(error) => Err(error),
        }
    }

    /// Zero-signal liveness probe. Any probe failure counts as dead.
    pub fn is_alive(pid: u32) -> bool {
        let Ok(raw) = i32::try_from(pid) else {
            return false;
        };
        if raw <= 0 {
            return false;
        }
        kill(Pid::from_raw(raw), None).is_ok()
    }
}

fn read_record(path: &Path) -> Result<Option<String>, RegistryError> {
    let contents = read_if_present(path).map_err(|source| RegistryError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(contents
        .map(|text| text.trim().to_owned())
        .filter(|text| !text.is_empty()))
}

fn remove_record(path: &Path) -> Result<(), RegistryError> {
    let removed = remove_if_present(path).map_err(|source| RegistryError::Remove {
        path: path.to_path_buf(),
        source,
    })?;
    if removed {
        debug!(target: REGISTRY_TARGET, file = %path.display(), "record removed");
    }
    Ok(())
}

/// Checks that `root` is a directory owned by `owner` and closes it to
/// everyone else.
fn secure_root(root: &Path, owner: u32) -> Result<(), RegistryError> {
    let untrusted = |reason: String| RegistryError::UntrustedDirectory {
        path: root.to_path_buf(),
        reason,
    };
    let metadata = fs::symlink_metadata(root).map_err(|source| RegistryError::Directory {
        path: root.to_path_buf(),
        source,
    })?;
    if metadata.file_type().is_symlink() {
        return Err(untrusted(String::from("it is a symbolic link")));
    }
    if !metadata.is_dir() {
        return Err(untrusted(String::from("it is not a directory")));
    }
    if metadata.uid() != owner {
        return Err(untrusted(format!(
            "it is owned by uid {}, not {owner}",
            metadata.uid()
        )));
    }
    let mode = metadata.mode() & 0o777;
    if mode & 0o077 != 0 {
        warn!(
            target: REGISTRY_TARGET,
            root = %root.display(),
            mode = format_args!("{mode:o}"),
            "restricting registry directory to its owner"
        );
        fs::set_permissions(root, Permissions::from_mode(0o700)).map_err(|source| {
            RegistryError::Directory {
                path: root.to_path_buf(),
                source,
            }
        })?;
    }
    Ok(())
}
