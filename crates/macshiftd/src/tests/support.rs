//! In-memory collaborators shared by the worker test suites.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use macshift_link::{HardwareAddress, LinkControl, LinkError};

use crate::process::{ShutdownError, ShutdownSignal};

#[derive(Default)]
struct LinkState {
    addresses: HashMap<String, HardwareAddress>,
    down: HashSet<String>,
    reject_sets: bool,
    operations: Vec<String>,
}

/// Link layer double holding addresses in memory.
#[derive(Clone, Default)]
pub(crate) struct FakeLink {
    state: Arc<Mutex<LinkState>>,
}

impl FakeLink {
    pub(crate) fn with_interface(name: &str, address: &str) -> Self {
        let link = Self::default();
        link.lock().addresses.insert(
            name.to_owned(),
            address.parse().expect("test address should parse"),
        );
        link
    }

    pub(crate) fn reject_sets(&self) {
        self.lock().reject_sets = true;
    }

    pub(crate) fn address_of(&self, name: &str) -> Option<HardwareAddress> {
        self.lock().addresses.get(name).copied()
    }

    pub(crate) fn is_down(&self, name: &str) -> bool {
        self.lock().down.contains(name)
    }

    pub(crate) fn operations(&self) -> Vec<String> {
        self.lock().operations.clone()
    }

    fn lock(&self) -> MutexGuard<'_, LinkState> {
        self.state.lock().expect("fake link mutex poisoned")
    }

    fn require(state: &LinkState, interface: &str) -> Result<(), LinkError> {
        if state.addresses.contains_key(interface) {
            Ok(())
        } else {
            Err(LinkError::CommandFailed {
                operation: "lookup",
                interface: interface.to_owned(),
                reason: String::from("Cannot find device"),
            })
        }
    }
}

impl LinkControl for FakeLink {
    fn exists(&self, interface: &str) -> bool {
        self.lock().addresses.contains_key(interface)
    }

    fn current_address(&self, interface: &str) -> Result<HardwareAddress, LinkError> {
        let state = self.lock();
        Self::require(&state, interface)?;
        Ok(state.addresses[interface])
    }

    fn bring_down(&self, interface: &str) -> Result<(), LinkError> {
        let mut state = self.lock();
        Self::require(&state, interface)?;
        state.operations.push(format!("down {interface}"));
        state.down.insert(interface.to_owned());
        Ok(())
    }

    fn set_address(&self, interface: &str, address: HardwareAddress) -> Result<(), LinkError> {
        let mut state = self.lock();
        Self::require(&state, interface)?;
        state.operations.push(format!("set {interface} {address}"));
        if state.reject_sets {
            return Err(LinkError::CommandFailed {
                operation: "set address",
                interface: interface.to_owned(),
                reason: String::from("Operation not permitted"),
            });
        }
        state.addresses.insert(interface.to_owned(), address);
        Ok(())
    }

    fn bring_up(&self, interface: &str) -> Result<(), LinkError> {
        let mut state = self.lock();
        Self::require(&state, interface)?;
        state.operations.push(format!("up {interface}"));
        state.down.remove(interface);
        Ok(())
    }

    fn list_up_interfaces(&self) -> Result<Vec<String>, LinkError> {
        let state = self.lock();
        let mut names: Vec<String> = state
            .addresses
            .keys()
            .filter(|name| !state.down.contains(*name))
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }
}

/// Shutdown double that fires after a fixed number of sleeps.
#[derive(Clone)]
pub(crate) struct CountdownShutdown {
    remaining: Arc<AtomicUsize>,
}

impl CountdownShutdown {
    /// Requests termination on the `sleeps`-th wait (1-based).
    pub(crate) fn after(sleeps: usize) -> Self {
        Self {
            remaining: Arc::new(AtomicUsize::new(sleeps)),
        }
    }
}

impl ShutdownSignal for CountdownShutdown {
    fn wait_timeout(&self, _timeout: Duration) -> Result<bool, ShutdownError> {
        let previous = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
                Some(left.saturating_sub(1))
            })
            .unwrap_or(0);
        Ok(previous <= 1)
    }
}

/// Shutdown double whose listener has died.
pub(crate) struct BrokenShutdown;

impl ShutdownSignal for BrokenShutdown {
    fn wait_timeout(&self, _timeout: Duration) -> Result<bool, ShutdownError> {
        Err(ShutdownError::Disconnected)
    }
}
