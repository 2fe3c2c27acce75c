//! Link-layer primitives used by the supervisor and its workers.
//!
//! Everything that touches a real network interface sits behind the
//! [`LinkControl`] trait: existence checks, reading the current hardware
//! address, the down/set/up sequence, and enumeration of interfaces that are
//! administratively up. [`IpCommand`] is the production implementation; it
//! shells out to the `ip` utility and reads sysfs.

mod address;
mod control;
mod enumerate;
mod ip;
mod name;

pub use address::{AddressParseError, AddressPrefix, HardwareAddress, PrefixError};
pub use control::{LinkControl, LinkError, apply_address};
pub use enumerate::up_interfaces;
pub use ip::{DEFAULT_SYSFS_NET, IpCommand};
pub use name::{InterfaceName, InterfaceNameError, MAX_INTERFACE_NAME_LEN};
