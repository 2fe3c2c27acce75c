//! The seam between address rotation logic and the host's link layer.

use std::io;

use nix::errno::Errno;
use thiserror::Error;
use tracing::{debug, warn};

use crate::address::HardwareAddress;

pub(crate) const LINK_TARGET: &str = "macshift::link";

/// Errors surfaced by link-layer operations.
#[derive(Debug, Error)]
pub enum LinkError {
    /// The address utility could not be found on the search path.
    #[error("required command '{program}' was not found")]
    CommandMissing {
        /// Program that was looked up.
        program: String,
    },
    /// The address utility could not be started.
    #[error("failed to run '{program}': {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The address utility ran but reported failure.
    #[error("{operation} on '{interface}' failed: {reason}")]
    CommandFailed {
        /// Short operation name such as `set address`.
        operation: &'static str,
        /// Interface the operation targeted.
        interface: String,
        /// Trimmed diagnostic output, or the exit status when silent.
        reason: String,
    },
    /// The current hardware address could not be read.
    #[error("failed to read address of '{interface}': {source}")]
    ReadAddress {
        /// Interface being queried.
        interface: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The kernel reported something that is not a hardware address.
    #[error("interface '{interface}' reported unreadable address '{value}'")]
    ParseAddress {
        /// Interface being queried.
        interface: String,
        /// Raw text that failed to parse.
        value: String,
    },
    /// Listing interfaces failed.
    #[error("failed to enumerate interfaces: {source}")]
    Enumerate {
        /// Underlying errno.
        #[source]
        source: Errno,
    },
}

/// Operations the supervisor and workers need from the host's link layer.
#[cfg_attr(test, mockall::automock)]
pub trait LinkControl {
    /// Returns true when the interface is known to the kernel.
    fn exists(&self, interface: &str) -> bool;

    /// Reads the interface's current hardware address.
    fn current_address(&self, interface: &str) -> Result<HardwareAddress, LinkError>;

    /// Administratively disables the interface.
    fn bring_down(&self, interface: &str) -> Result<(), LinkError>;

    /// Assigns a hardware address. The interface is expected to be down.
    fn set_address(&self, interface: &str, address: HardwareAddress) -> Result<(), LinkError>;

    /// Administratively enables the interface.
    fn bring_up(&self, interface: &str) -> Result<(), LinkError>;

    /// Names of interfaces that are up, excluding loopback, in host order.
    fn list_up_interfaces(&self) -> Result<Vec<String>, LinkError>;
}

impl<T: LinkControl + ?Sized> LinkControl for &T {
    fn exists(&self, interface: &str) -> bool {
        (**self).exists(interface)
    }

    fn current_address(&self, interface: &str) -> Result<HardwareAddress, LinkError> {
        (**self).current_address(interface)
    }

    fn bring_down(&self, interface: &str) -> Result<(), LinkError> {
        (**self).bring_down(interface)
    }

    fn set_address(&self, interface: &str, address: HardwareAddress) -> Result<(), LinkError> {
        (**self).set_address(interface, address)
    }

    fn bring_up(&self, interface: &str) -> Result<(), LinkError> {
        (**self).bring_up(interface)
    }

    fn list_up_interfaces(&self) -> Result<Vec<String>, LinkError> {
        (**self).list_up_interfaces()
    }
}

/// Runs the down, set, up sequence for one address change.
///
/// Bring-up is attempted even when an earlier step fails so that a rejected
/// address never leaves the interface disabled. The first error observed is
/// returned.
pub fn apply_address<L: LinkControl + ?Sized>(
    link: &L,
    interface: &str,
    address: HardwareAddress,
) -> Result<(), LinkError> {
    let changed = link
        .bring_down(interface)
        .and_then(|()| link.set_address(interface, address));
    let raised = link.bring_up(interface);
    match (changed, raised) {
        (Err(error), raised) => {
            if let Err(up_error) = raised {
                warn!(
                    target: LINK_TARGET,
                    interface,
                    error = %up_error,
                    "bring-up after failed change also failed"
                );
            }
            Err(error)
        }
        (Ok(()), Err(error)) => Err(error),
        (Ok(()), Ok(())) => {
            debug!(target: LINK_TARGET, interface, %address, "address applied");
            Ok(())
        }
    }
}
