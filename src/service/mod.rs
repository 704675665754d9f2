//! The injection service: owns the attachment and hands out typed handles
//!
//! Lifecycle:
//!
//! ```text
//! Uninitialized -> Attaching -> Attached -> (Detached -> Attaching)* -> ShuttingDown -> Stopped
//! ```
//!
//! [`InjectionService::initialize`] blocks until exactly one matching process
//! is attached. [`InjectionService::start`] spawns the watcher and ticker loops.
//! Address resolution and handle construction only work while `Attached`.

mod loops;

pub use crate::core::ShutdownSignal;

use crate::config::ServiceConfig;
use crate::core::types::{Address, MemoryError, MemoryResult, ServiceState};
use crate::memory::{
    describe, ActiveMemorySet, ChainResolver, Memory, MemoryBinding, MemoryType,
    MemoryTypeRegistry, OffsetChain,
};
use crate::process::{ProcessAttacher, ProcessLocator, ProcessSelector, SharedProcess};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// State shared between the service and its loops
pub(crate) struct ServiceInner {
    attacher: ProcessAttacher,
    registry: MemoryTypeRegistry,
    active: Arc<ActiveMemorySet>,
    config: ServiceConfig,
    shutdown: Arc<ShutdownSignal>,
    state: RwLock<ServiceState>,
    process: RwLock<Option<SharedProcess>>,
    // Written by the watcher, and by `install` when an attachment begins
    alive: AtomicBool,
    // Bumped on every successful attach; a ticker only serves its own attachment
    attachment: AtomicU64,
    // Exits seen by the watcher, one per Attached -> Detached transition
    exits: AtomicU64,
    watcher: Mutex<Option<JoinHandle<()>>>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl ServiceInner {
    fn state(&self) -> ServiceState {
        *read(&self.state)
    }

    /// Moves to `next` if the lifecycle allows it
    fn transition(&self, next: ServiceState) -> bool {
        let mut state = write(&self.state);
        if !state.can_transition_to(next) {
            debug!(from = %*state, to = %next, "Ignoring state transition");
            return false;
        }
        info!(from = %*state, to = %next, "Service state changed");
        *state = next;
        true
    }

    /// Replaces the attached process and enters `Attached`
    fn install(&self, process: SharedProcess) -> bool {
        let mut state = write(&self.state);
        if !state.can_transition_to(ServiceState::Attached) {
            debug!(pid = process.pid(), state = %*state, "Discarding late attachment");
            return false;
        }

        *write(&self.process) = Some(process);
        self.attachment.fetch_add(1, Ordering::SeqCst);
        self.alive.store(true, Ordering::SeqCst);
        info!(from = %*state, to = %ServiceState::Attached, "Service state changed");
        *state = ServiceState::Attached;
        true
    }

    fn current_process(&self) -> Option<SharedProcess> {
        read(&self.process).clone()
    }

    /// The attached process, only while `Attached`
    fn ready_process(&self) -> MemoryResult<SharedProcess> {
        let state = read(&self.state);
        if !state.is_ready() {
            return Err(MemoryError::ProcessNotReady(*state));
        }
        read(&self.process)
            .clone()
            .ok_or(MemoryError::ProcessNotReady(*state))
    }

    fn spawn_ticker(self: &Arc<Self>) {
        let attachment = self.attachment.load(Ordering::SeqCst);
        let handle = tokio::spawn(loops::run_ticker(Arc::clone(self), attachment));
        // A previous ticker exits on its own once it sees the new attachment
        *lock(&self.ticker) = Some(handle);
    }
}

/// Attaches to the target process and hands out typed memory handles
#[derive(Clone)]
pub struct InjectionService {
    inner: Arc<ServiceInner>,
}

impl InjectionService {
    /// Creates a service with the built-in accessor list
    pub fn new(
        locator: Arc<dyn ProcessLocator>,
        selector: ProcessSelector,
        config: ServiceConfig,
    ) -> MemoryResult<Self> {
        Ok(Self::with_registry(
            locator,
            selector,
            config,
            MemoryTypeRegistry::builtin()?,
        ))
    }

    pub fn with_registry(
        locator: Arc<dyn ProcessLocator>,
        selector: ProcessSelector,
        config: ServiceConfig,
        registry: MemoryTypeRegistry,
    ) -> Self {
        let attacher = ProcessAttacher::with_backoff(locator, selector, config.attach.backoff());

        InjectionService {
            inner: Arc::new(ServiceInner {
                attacher,
                registry,
                active: Arc::new(ActiveMemorySet::new()),
                config,
                shutdown: Arc::new(ShutdownSignal::new()),
                state: RwLock::new(ServiceState::Uninitialized),
                process: RwLock::new(None),
                alive: AtomicBool::new(false),
                attachment: AtomicU64::new(0),
                exits: AtomicU64::new(0),
                watcher: Mutex::new(None),
                ticker: Mutex::new(None),
            }),
        }
    }

    /// Waits until exactly one matching process is attached.
    ///
    /// Attach failures are retried with backoff, never returned. Fails only if
    /// the service is not `Uninitialized` or shutdown interrupts the wait.
    pub async fn initialize(&self) -> MemoryResult<()> {
        let inner = &self.inner;
        if !inner.transition(ServiceState::Attaching) {
            return Err(MemoryError::ProcessNotReady(inner.state()));
        }

        info!(
            selector = %inner.attacher.selector(),
            accessors = inner.registry.len(),
            "Initializing injection service"
        );

        let Some(process) = inner.attacher.attach_until(&inner.shutdown).await else {
            return Err(MemoryError::ProcessNotReady(inner.state()));
        };
        if inner.install(process) {
            Ok(())
        } else {
            Err(MemoryError::ProcessNotReady(inner.state()))
        }
    }

    /// Spawns the watcher and ticker loops. Must run inside a tokio runtime.
    pub fn start(&self) -> MemoryResult<()> {
        let inner = &self.inner;
        let state = inner.state();
        if !state.is_ready() {
            return Err(MemoryError::ProcessNotReady(state));
        }

        let mut watcher = lock(&inner.watcher);
        if watcher.is_some() {
            debug!("Background loops already running");
            return Ok(());
        }
        // The ticker goes first: once the watcher runs it may reattach and
        // start its own ticker for the newer attachment
        inner.spawn_ticker();
        *watcher = Some(tokio::spawn(loops::run_watcher(Arc::clone(inner))));
        drop(watcher);

        info!("Background loops started");
        Ok(())
    }

    /// Stops both loops, waits for them and releases the process
    pub async fn shutdown(&self) {
        let inner = &self.inner;
        if !inner.transition(ServiceState::ShuttingDown) {
            return;
        }
        inner.shutdown.trigger();

        let watcher = lock(&inner.watcher).take();
        let ticker = lock(&inner.ticker).take();
        for handle in [watcher, ticker].into_iter().flatten() {
            if let Err(e) = handle.await {
                warn!("Background loop ended abnormally: {}", e);
            }
        }

        inner.alive.store(false, Ordering::SeqCst);
        write(&inner.process).take();
        inner.transition(ServiceState::Stopped);
    }

    /// Resolves composed offset chains to an address
    pub fn get_address(&self, chains: &[OffsetChain]) -> MemoryResult<Address> {
        let process = self.inner.ready_process()?;
        ChainResolver::new(process.as_ref()).resolve(chains)
    }

    /// Module base plus `delta`, without dereferencing
    pub fn get_base_address(&self, delta: u64) -> MemoryResult<Address> {
        let process = self.inner.ready_process()?;
        Ok(process.base_address().wrapping_add(delta))
    }

    /// Resolves independent requests in parallel; one result per request
    pub fn get_addresses(
        &self,
        requests: &[Vec<OffsetChain>],
    ) -> MemoryResult<Vec<MemoryResult<Address>>> {
        let process = self.inner.ready_process()?;
        Ok(ChainResolver::new(process.as_ref()).resolve_many(requests))
    }

    /// Resolves `chains` and binds a typed handle to the result.
    ///
    /// The handle joins the refresh set until it is retired or dropped.
    pub fn get_memory<T: MemoryType>(
        &self,
        chains: &[OffsetChain],
    ) -> MemoryResult<Arc<Memory<T>>> {
        let inner = &self.inner;
        let process = inner.ready_process()?;
        let factory = inner.registry.lookup::<T>()?;
        let address = ChainResolver::new(process.as_ref()).resolve(chains)?;

        let memory = Arc::new(factory(MemoryBinding {
            process,
            address,
            description: describe(T::NAME, chains, address),
            active: Arc::clone(&inner.active),
        }));
        inner.active.insert(&memory);

        debug!(id = memory.id(), "Bound {}", memory.describe());
        Ok(memory)
    }

    pub fn state(&self) -> ServiceState {
        self.inner.state()
    }

    /// Liveness as last observed by the watcher
    pub fn is_alive(&self) -> bool {
        self.inner.alive.load(Ordering::SeqCst)
    }

    /// The current process handle, possibly stale while detached
    pub fn process(&self) -> Option<SharedProcess> {
        self.inner.current_process()
    }

    /// How many times the watcher has seen the attached process exit
    pub fn exit_count(&self) -> u64 {
        self.inner.exits.load(Ordering::SeqCst)
    }

    /// Number of handles subscribed to refresh
    pub fn active_count(&self) -> usize {
        self.inner.active.len()
    }

    pub fn registry(&self) -> &MemoryTypeRegistry {
        &self.inner.registry
    }

    /// Install directory: the parent of the executable's directory
    pub fn game_path(&self) -> Option<PathBuf> {
        let process = self.inner.current_process()?;
        let path = process.executable_path()?;
        path.parent()?.parent().map(PathBuf::from)
    }
}
