//! In-memory collaborators shared by the supervisor test suites.

use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::ExitStatus as ChildStatus;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use camino::Utf8PathBuf;
use tempfile::TempDir;

use macshift_config::Config;
use macshift_link::{HardwareAddress, InterfaceName, LinkControl, LinkError};
use macshift_registry::Registry;

use crate::config::ConfigLoader;
use crate::errors::AppError;
use crate::host::Host;
use crate::supervisor::process::WorkerHandle;
use crate::supervisor::{ProcessControl, SupervisorError, Termination, WorkerSpawner};
use crate::targets::Prompter;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().expect("test double mutex poisoned")
}

#[derive(Default)]
struct LinkState {
    addresses: HashMap<String, HardwareAddress>,
    loopback: HashSet<String>,
    operations: Vec<String>,
}

/// Link layer double holding addresses in memory.
#[derive(Clone, Default)]
pub(crate) struct FakeLink {
    state: Arc<Mutex<LinkState>>,
}

impl FakeLink {
    pub(crate) fn with_interface(self, name: &str, address: &str) -> Self {
        lock(&self.state).addresses.insert(
            name.to_owned(),
            address.parse().expect("test address should parse"),
        );
        self
    }

    /// Adds an interface the kernel flags as loopback.
    pub(crate) fn with_loopback(self, name: &str) -> Self {
        let link = self.with_interface(name, "00:00:00:00:00:00");
        lock(&link.state).loopback.insert(name.to_owned());
        link
    }

    pub(crate) fn set_current(&self, name: &str, address: &str) {
        lock(&self.state).addresses.insert(
            name.to_owned(),
            address.parse().expect("test address should parse"),
        );
    }

    pub(crate) fn address_of(&self, name: &str) -> Option<HardwareAddress> {
        lock(&self.state).addresses.get(name).copied()
    }

    pub(crate) fn operations(&self) -> Vec<String> {
        lock(&self.state).operations.clone()
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

    fn record(&self, interface: &str, operation: String) -> Result<(), LinkError> {
        let mut state = lock(&self.state);
        Self::require(&state, interface)?;
        state.operations.push(operation);
        Ok(())
    }
}

impl LinkControl for FakeLink {
    fn exists(&self, interface: &str) -> bool {
        lock(&self.state).addresses.contains_key(interface)
    }

    fn current_address(&self, interface: &str) -> Result<HardwareAddress, LinkError> {
        let state = lock(&self.state);
        Self::require(&state, interface)?;
        Ok(state.addresses[interface])
    }

    fn bring_down(&self, interface: &str) -> Result<(), LinkError> {
        self.record(interface, format!("down {interface}"))
    }

    fn set_address(&self, interface: &str, address: HardwareAddress) -> Result<(), LinkError> {
        self.record(interface, format!("set {interface} {address}"))?;
        lock(&self.state)
            .addresses
            .insert(interface.to_owned(), address);
        Ok(())
    }

    fn bring_up(&self, interface: &str) -> Result<(), LinkError> {
        self.record(interface, format!("up {interface}"))
    }

    fn list_up_interfaces(&self) -> Result<Vec<String>, LinkError> {
        let state = lock(&self.state);
        let mut names: Vec<String> = state
            .addresses
            .keys()
            .filter(|name| !state.loopback.contains(*name))
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }
}

/// Prompter replaying one canned answer.
pub(crate) struct ScriptedPrompter {
    answer: String,
    prompts: Vec<String>,
}

impl ScriptedPrompter {
    pub(crate) fn answering(answer: &str) -> Self {
        Self {
            answer: answer.to_owned(),
            prompts: Vec::new(),
        }
    }

    pub(crate) fn prompts(&self) -> &[String] {
        &self.prompts
    }
}

impl Prompter for ScriptedPrompter {
    fn prompt(&mut self, message: &str) -> io::Result<String> {
        self.prompts.push(message.to_owned());
        Ok(self.answer.clone())
    }
}

/// How a fake worker behaves right after launch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SpawnMode {
    /// Writes its own pid file immediately.
    Registers,
    /// Keeps running without registering.
    Silent,
    /// Exits with status 1 before registering.
    Exits,
}

struct FakeWorker {
    pid: u32,
    exited: bool,
}

impl WorkerHandle for FakeWorker {
    fn id(&self) -> u32 {
        self.pid
    }

    fn try_exit(&mut self) -> io::Result<Option<ChildStatus>> {
        Ok(self.exited.then(|| ChildStatus::from_raw(1 << 8)))
    }
}

/// Spawner double that marks launched pids alive in [`FakeProcesses`].
#[derive(Clone)]
pub(crate) struct FakeSpawner {
    mode: SpawnMode,
    processes: FakeProcesses,
    next_pid: Arc<AtomicU32>,
    launched: Arc<Mutex<Vec<String>>>,
}

impl FakeSpawner {
    pub(crate) fn new(mode: SpawnMode, processes: FakeProcesses) -> Self {
        Self {
            mode,
            processes,
            next_pid: Arc::new(AtomicU32::new(5000)),
            launched: Arc::default(),
        }
    }

    pub(crate) fn launched(&self) -> Vec<String> {
        lock(&self.launched).clone()
    }
}

impl WorkerSpawner for FakeSpawner {
    fn spawn(
        &self,
        interface: &InterfaceName,
        trace: &Path,
    ) -> Result<Box<dyn WorkerHandle>, SupervisorError> {
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        lock(&self.launched).push(interface.to_string());
        let registry = Registry::open(trace.parent().expect("trace lives in the registry"))?;
        match self.mode {
            SpawnMode::Registers => {
                registry.write_pid(interface, pid)?;
                self.processes.mark_alive(pid);
            }
            SpawnMode::Silent => self.processes.mark_alive(pid),
            SpawnMode::Exits => {}
        }
        Ok(Box::new(FakeWorker {
            pid,
            exited: self.mode == SpawnMode::Exits,
        }))
    }
}

/// How a live fake worker reacts to SIGTERM.
#[derive(Clone, Default)]
pub(crate) enum TermReaction {
    /// Exits without touching the registry.
    #[default]
    Exits,
    /// Restores the captured original, clears its records, then exits.
    RestoresAndExits { registry: Registry, link: FakeLink },
    /// Ignores the signal and stays registered.
    Ignores,
    /// The signal cannot be delivered.
    Refuses,
}

/// Process table double.
#[derive(Clone, Default)]
pub(crate) struct FakeProcesses {
    alive: Arc<Mutex<HashSet<u32>>>,
    signalled: Arc<Mutex<Vec<u32>>>,
    reaction: Arc<Mutex<TermReaction>>,
}

impl FakeProcesses {
    pub(crate) fn mark_alive(&self, pid: u32) {
        lock(&self.alive).insert(pid);
    }

    pub(crate) fn react_with(&self, reaction: TermReaction) {
        *lock(&self.reaction) = reaction;
    }

    pub(crate) fn signalled(&self) -> Vec<u32> {
        lock(&self.signalled).clone()
    }

    fn restore_like_a_worker(registry: &Registry, link: &FakeLink, pid: u32) {
        let interfaces: Vec<String> = lock(&link.state).addresses.keys().cloned().collect();
        for interface in interfaces {
            let interface = name(&interface);
            if registry.read_pid(&interface).ok().flatten() != Some(pid) {
                continue;
            }
            if let Some(original) = registry.read_original(&interface).expect("readable original") {
                link.set_current(interface.as_str(), &original.to_string());
                registry.clear_original(&interface).expect("clear original");
            }
            registry.clear_pid_if(&interface, pid).expect("clear pid");
        }
    }
}

impl ProcessControl for FakeProcesses {
    fn is_alive(&self, pid: u32) -> bool {
        lock(&self.alive).contains(&pid)
    }

    fn terminate(&self, pid: u32) -> Result<Termination, SupervisorError> {
        let reaction = lock(&self.reaction).clone();
        if let TermReaction::Refuses = reaction {
            return Err(SupervisorError::SignalFailed {
                pid,
                source: nix::errno::Errno::EPERM,
            });
        }
        if !lock(&self.alive).contains(&pid) {
            return Ok(Termination::AlreadyGone);
        }
        lock(&self.signalled).push(pid);
        match reaction {
            TermReaction::Exits | TermReaction::Refuses => {
                lock(&self.alive).remove(&pid);
            }
            TermReaction::RestoresAndExits { registry, link } => {
                Self::restore_like_a_worker(&registry, &link, pid);
                lock(&self.alive).remove(&pid);
            }
            TermReaction::Ignores => {}
        }
        Ok(Termination::Delivered)
    }
}

/// Loader returning a fixed configuration.
pub(crate) struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    pub(crate) fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self, _args: &[OsString]) -> Result<Config, AppError> {
        Ok(self.config.clone())
    }
}

/// Host double wiring the fakes together.
pub(crate) struct FakeHost {
    pub(crate) link: FakeLink,
    pub(crate) spawner: FakeSpawner,
    pub(crate) processes: FakeProcesses,
    pub(crate) privileged: bool,
    pub(crate) dependency_present: bool,
    pub(crate) answer: String,
}

impl FakeHost {
    pub(crate) fn new(link: FakeLink) -> Self {
        let processes = FakeProcesses::default();
        Self {
            link,
            spawner: FakeSpawner::new(SpawnMode::Registers, processes.clone()),
            processes,
            privileged: true,
            dependency_present: true,
            answer: String::new(),
        }
    }
}

impl Host for FakeHost {
    type Link = FakeLink;

    fn link(&self, _config: &Config) -> Result<FakeLink, LinkError> {
        if self.dependency_present {
            Ok(self.link.clone())
        } else {
            Err(LinkError::CommandMissing {
                program: String::from("ip"),
            })
        }
    }

    fn is_privileged(&self) -> bool {
        self.privileged
    }

    fn spawner(&self, _config_arguments: &[OsString]) -> Box<dyn WorkerSpawner> {
        Box::new(self.spawner.clone())
    }

    fn processes(&self) -> Box<dyn ProcessControl> {
        Box::new(self.processes.clone())
    }

    fn prompter(&self) -> Box<dyn Prompter> {
        Box::new(ScriptedPrompter::answering(&self.answer))
    }
}

/// Configuration rooted in a private temporary directory.
pub(crate) struct TestState {
    dir: TempDir,
}

impl TestState {
    pub(crate) fn new() -> Self {
        Self {
            dir: TempDir::new().expect("temp dir"),
        }
    }

    pub(crate) fn config(&self) -> Config {
        let state_dir = Utf8PathBuf::from_path_buf(self.dir.path().join("state"))
            .expect("temp path should be UTF-8");
        Config {
            state_dir,
            spawn_grace_ms: 50,
            stop_grace_ms: 50,
            ..Config::default()
        }
    }

    pub(crate) fn registry(&self) -> Registry {
        Registry::open(self.config().state_dir.as_std_path()).expect("registry opens")
    }
}

pub(crate) fn name(interface: &str) -> InterfaceName {
    InterfaceName::new(interface).expect("valid interface name")
}
