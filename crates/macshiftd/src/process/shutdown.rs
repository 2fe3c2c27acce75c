use std::io;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};
use thiserror::Error;
use tracing::{debug, info};

use super::PROCESS_TARGET;

/// Termination signals that start restoration.
pub const TERMINATION_SIGNALS: [i32; 4] = [SIGTERM, SIGINT, SIGHUP, SIGQUIT];

/// Abstraction over termination notification.
pub trait ShutdownSignal: Send + Sync {
    /// Sleeps for at most `timeout`, returning `true` as soon as termination
    /// has been requested. Once requested, every later call returns `true`
    /// immediately.
    fn wait_timeout(&self, timeout: Duration) -> Result<bool, ShutdownError>;
}

/// Errors reported by shutdown signal listeners.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Spawning the listener thread failed.
    #[error("failed to spawn signal listener: {source}")]
    Listener {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The listener thread went away without delivering a signal.
    #[error("signal listener stopped unexpectedly")]
    Disconnected,
    /// Another thread panicked while holding the receiver.
    #[error("signal receiver lock poisoned")]
    Poisoned,
}

/// Listens for termination signals on a dedicated thread.
///
/// Signals are forwarded over a channel the worker loop sleeps on, so the
/// loop only observes termination between address changes. Repeated signals
/// queue up and are ignored once the first has been seen.
pub struct SystemShutdownSignal {
    receiver: Mutex<Receiver<i32>>,
    requested: AtomicBool,
    handle: Handle,
    listener: Option<JoinHandle<()>>,
}

impl SystemShutdownSignal {
    /// Registers handlers for [`TERMINATION_SIGNALS`] and starts the listener.
    pub fn install() -> Result<Self, ShutdownError> {
        let mut signals =
            Signals::new(TERMINATION_SIGNALS).map_err(|source| ShutdownError::Install { source })?;
        let handle = signals.handle();
        let (sender, receiver) = mpsc::channel();
        let listener = thread::Builder::new()
            .name(String::from("macshiftd-signals"))
            .spawn(move || {
                for signal in signals.forever() {
                    if sender.send(signal).is_err() {
                        break;
                    }
                }
            })
            .map_err(|source| ShutdownError::Listener { source })?;
        debug!(target: PROCESS_TARGET, "termination handlers installed");
        Ok(Self {
            receiver: Mutex::new(receiver),
            requested: AtomicBool::new(false),
            handle,
            listener: Some(listener),
        })
    }
}

impl ShutdownSignal for SystemShutdownSignal {
    fn wait_timeout(&self, timeout: Duration) -> Result<bool, ShutdownError> {
        if self.requested.load(Ordering::SeqCst) {
            return Ok(true);
        }
        let receiver = self.receiver.lock().map_err(|_| ShutdownError::Poisoned)?;
        match receiver.recv_timeout(timeout) {
            Ok(signal) => {
                info!(target: PROCESS_TARGET, signal, "termination signal received");
                self.requested.store(true, Ordering::SeqCst);
                Ok(true)
            }
            Err(RecvTimeoutError::Timeout) => Ok(false),
            Err(RecvTimeoutError::Disconnected) => Err(ShutdownError::Disconnected),
        }
    }
}

impl Drop for SystemShutdownSignal {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(listener) = self.listener.take() {
            let _ = listener.join();
        }
    }
}
