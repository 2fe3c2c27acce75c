//! Production [`LinkControl`] backed by the `ip` utility and sysfs.

use std::env;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use crate::address::HardwareAddress;
use crate::control::{LINK_TARGET, LinkControl, LinkError};
use crate::enumerate::up_interfaces;

/// Kernel directory holding one entry per network interface.
pub const DEFAULT_SYSFS_NET: &str = "/sys/class/net";

/// Drives interfaces through `ip link set` and reads state from sysfs.
#[derive(Debug, Clone)]
pub struct IpCommand {
    program: PathBuf,
    sysfs_root: PathBuf,
}

impl IpCommand {
    /// Resolves `program` to an executable and binds it to the default sysfs
    /// root.
    ///
    /// Programs containing a path separator are checked directly; bare names
    /// are searched for on `PATH`.
    pub fn locate(program: &str) -> Result<Self, LinkError> {
        let resolved = resolve_program(program).ok_or_else(|| LinkError::CommandMissing {
            program: program.to_owned(),
        })?;
        debug!(target: LINK_TARGET, program = %resolved.display(), "address utility located");
        Ok(Self {
            program: resolved,
            sysfs_root: PathBuf::from(DEFAULT_SYSFS_NET),
        })
    }

    /// Overrides the sysfs directory that is consulted for interface state.
    #[must_use]
    pub fn with_sysfs_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.sysfs_root = root.into();
        self
    }

    /// The resolved utility path.
    pub fn program(&self) -> &Path {
        &self.program
    }

    fn run_link_set(
        &self,
        operation: &'static str,
        interface: &str,
        arguments: &[&str],
    ) -> Result<(), LinkError> {
        let output = Command::new(&self.program)
            .args(["link", "set", "dev", interface])
            .args(arguments)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| LinkError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        let reason = match stderr.trim() {
            "" => output.status.to_string(),
            text => text.to_owned(),
        };
        Err(LinkError::CommandFailed {
            operation,
            interface: interface.to_owned(),
            reason,
        })
    }
}

impl LinkControl for IpCommand {
    fn exists(&self, interface: &str) -> bool {
        !interface.is_empty() && self.sysfs_root.join(interface).exists()
    }

    fn current_address(&self, interface: &str) -> Result<HardwareAddress, LinkError> {
        let path = self.sysfs_root.join(interface).join("address");
        let raw = fs::read_to_string(&path).map_err(|source| LinkError::ReadAddress {
            interface: interface.to_owned(),
            source,
        })?;
        raw.parse().map_err(|_| LinkError::ParseAddress {
            interface: interface.to_owned(),
            value: raw.trim().to_owned(),
        })
    }

    fn bring_down(&self, interface: &str) -> Result<(), LinkError> {
        self.run_link_set("bring down", interface, &["down"])
    }

    fn set_address(&self, interface: &str, address: HardwareAddress) -> Result<(), LinkError> {
        let rendered = address.to_string();
        self.run_link_set("set address", interface, &["address", &rendered])
    }

    fn bring_up(&self, interface: &str) -> Result<(), LinkError> {
        self.run_link_set("bring up", interface, &["up"])
    }

    fn list_up_interfaces(&self) -> Result<Vec<String>, LinkError> {
        up_interfaces()
    }
}

fn resolve_program(program: &str) -> Option<PathBuf> {
    if program.is_empty() {
        return None;
    }
    if program.contains('/') {
        let candidate = PathBuf::from(program);
        return is_executable(&candidate).then_some(candidate);
    }
    let search = env::var_os("PATH")?;
    env::split_paths(&search)
        .map(|dir| dir.join(OsStr::new(program)))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|metadata| metadata.is_file() && has_execute_bit(&metadata))
}

#[cfg(unix)]
fn has_execute_bit(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn has_execute_bit(_metadata: &fs::Metadata) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn fake_sysfs(interface: &str, address: &str) -> TempDir {
        let root = TempDir::new().expect("temp sysfs");
        let entry = root.path().join(interface);
        fs::create_dir(&entry).expect("interface dir");
        fs::write(entry.join("address"), address).expect("address file");
        root
    }

    fn fake_program(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("ip");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("script");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod");
        path
    }

    fn command_for(program: &Path, sysfs: &Path) -> IpCommand {
        IpCommand::locate(program.to_str().expect("utf-8 path"))
            .expect("program located")
            .with_sysfs_root(sysfs)
    }

    #[test]
    fn reads_current_address_from_sysfs() {
        let sysfs = fake_sysfs("eth0", "aa:bb:cc:dd:ee:ff\n");
        let bin = TempDir::new().expect("bin dir");
        let command = command_for(&fake_program(bin.path(), "exit 0"), sysfs.path());

        assert!(command.exists("eth0"));
        assert!(!command.exists("eth1"));
        let address = command.current_address("eth0").expect("address readable");
        assert_eq!(address.to_string(), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn reports_unparseable_sysfs_address() {
        let sysfs = fake_sysfs("eth0", "garbage\n");
        let bin = TempDir::new().expect("bin dir");
        let command = command_for(&fake_program(bin.path(), "exit 0"), sysfs.path());

        let error = command.current_address("eth0").expect_err("garbage rejected");
        assert!(matches!(error, LinkError::ParseAddress { ref value, .. } if value == "garbage"));
    }

    #[test]
    fn missing_program_is_reported() {
        let error = IpCommand::locate("/nonexistent/macshift-ip").expect_err("missing");
        assert!(matches!(error, LinkError::CommandMissing { .. }));
    }

    #[test]
    fn non_executable_program_is_missing() {
        let bin = TempDir::new().expect("bin dir");
        let path = bin.path().join("ip");
        fs::write(&path, "#!/bin/sh\n").expect("script");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).expect("chmod");

        let error = IpCommand::locate(path.to_str().expect("utf-8 path")).expect_err("not executable");
        assert!(matches!(error, LinkError::CommandMissing { .. }));
    }

    #[test]
    fn passes_link_arguments_to_program() {
        let sysfs = fake_sysfs("eth0", "aa:bb:cc:dd:ee:ff\n");
        let bin = TempDir::new().expect("bin dir");
        let log = bin.path().join("calls");
        let script = format!("echo \"$@\" >> '{}'", log.display());
        let command = command_for(&fake_program(bin.path(), &script), sysfs.path());
        let address: HardwareAddress = "02:00:00:01:02:03".parse().expect("address");

        command.bring_down("eth0").expect("down");
        command.set_address("eth0", address).expect("set");
        command.bring_up("eth0").expect("up");

        let calls = fs::read_to_string(&log).expect("call log");
        assert_eq!(
            calls,
            "link set dev eth0 down\nlink set dev eth0 address 02:00:00:01:02:03\nlink set dev eth0 up\n"
        );
    }

    #[test]
    fn surfaces_stderr_on_failure() {
        let sysfs = fake_sysfs("eth0", "aa:bb:cc:dd:ee:ff\n");
        let bin = TempDir::new().expect("bin dir");
        let command = command_for(
            &fake_program(bin.path(), "echo 'RTNETLINK answers: Operation not permitted' >&2\nexit 2"),
            sysfs.path(),
        );

        let error = command.bring_down("eth0").expect_err("failure surfaces");
        match error {
            LinkError::CommandFailed {
                operation, reason, ..
            } => {
                assert_eq!(operation, "bring down");
                assert_eq!(reason, "RTNETLINK answers: Operation not permitted");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
