use std::env;

use camino::Utf8PathBuf;

#[cfg(unix)]
use dirs::runtime_dir;
#[cfg(unix)]
use nix::unistd::geteuid;

use crate::logging::LogFormat;

/// Milliseconds between two address changes.
pub const DEFAULT_INTERVAL_MS: u64 = 500;

/// Smallest interval accepted by [`crate::Config::validate`].
pub const MIN_INTERVAL_MS: u64 = 100;

/// Largest interval accepted by [`crate::Config::validate`].
pub const MAX_INTERVAL_MS: u64 = 60_000;

/// Locally administered, unicast prefix for generated addresses.
pub const DEFAULT_ADDRESS_PREFIX: &str = "02:00:00";

/// Program used to mutate interface state.
pub const DEFAULT_IP_COMMAND: &str = "ip";

/// How long `start` waits for a worker to register its own pid.
pub const DEFAULT_SPAWN_GRACE_MS: u64 = 1_000;

/// How long `stop` waits for a worker to release its registration.
pub const DEFAULT_STOP_GRACE_MS: u64 = 2_000;

/// Default log filter expression used by both binaries.
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Owned log filter value.
pub fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default tracing output format.
pub fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Owned address prefix value.
pub fn default_address_prefix() -> String {
    DEFAULT_ADDRESS_PREFIX.to_owned()
}

/// Owned `ip` program name.
pub fn default_ip_command() -> String {
    DEFAULT_IP_COMMAND.to_owned()
}

/// Computes the default registry directory.
///
/// Prefers `$XDG_RUNTIME_DIR/macshift`; otherwise falls back to a per-user
/// namespace under the system temporary directory so two accounts never
/// share pid or original-address files.
pub fn default_state_dir() -> Utf8PathBuf {
    #[cfg(unix)]
    {
        if let Some(dir) = runtime_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok()) {
            return dir.join("macshift");
        }
        fallback_base_directory()
            .join("macshift")
            .join(format!("uid-{}", geteuid().as_raw()))
    }

    #[cfg(not(unix))]
    {
        fallback_base_directory().join("macshift")
    }
}

fn fallback_base_directory() -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(env::temp_dir()).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}
