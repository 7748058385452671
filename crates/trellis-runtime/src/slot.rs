//! Activation slot - the presentation-facing lifecycle unit
//!
//! A slot owns one target surface and drives one remote into it: resolve
//! the manifest, load the contract through the resilient loader, activate
//! onto a private child surface, and guarantee deactivation on teardown.
//!
//! Slots re-enter `Loading` whenever their remote name or context changes.
//! Runs are numbered; a run re-checks its generation after every suspension
//! point and silently abandons all further side effects once superseded, so
//! a stale slow load can never mount over a newer one.

use crate::registry::RootRegistry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};
use trellis_loader::{AddressBook, ResilientLoader};
use trellis_types::{RemoteError, SurfaceHandle, VisibilityContext};

/// Observable state of a slot.
#[derive(Debug, Clone)]
pub enum SlotState {
    /// A run is resolving and loading the remote.
    Loading,
    /// The remote is activated onto the slot's child surface.
    Mounted,
    /// The last run failed; the error carries the failing stage.
    Error(Arc<RemoteError>),
}

impl SlotState {
    pub fn is_loading(&self) -> bool {
        matches!(self, SlotState::Loading)
    }

    pub fn is_mounted(&self) -> bool {
        matches!(self, SlotState::Mounted)
    }

    pub fn error(&self) -> Option<&RemoteError> {
        match self {
            SlotState::Error(err) => Some(err),
            _ => None,
        }
    }
}

type TeardownFn = Box<dyn FnOnce() + Send>;

/// One remote activated into one target surface.
pub struct ActivationSlot {
    target: SurfaceHandle,
    remote: Mutex<String>,
    context: Mutex<Arc<VisibilityContext>>,

    address_book: Arc<AddressBook>,
    loader: Arc<ResilientLoader>,
    registry: Arc<RootRegistry>,

    /// Private child surface the remote renders into.
    child: Mutex<Option<SurfaceHandle>>,
    /// Deactivation recorded by the last successful mount; runs exactly once.
    cleanup: Mutex<Option<TeardownFn>>,
    /// Current run generation; bumping it supersedes in-flight runs.
    generation: AtomicU64,
    state: watch::Sender<SlotState>,
}

impl ActivationSlot {
    pub fn new(
        target: SurfaceHandle,
        remote: impl Into<String>,
        context: Arc<VisibilityContext>,
        address_book: Arc<AddressBook>,
        loader: Arc<ResilientLoader>,
        registry: Arc<RootRegistry>,
    ) -> Self {
        let (state, _) = watch::channel(SlotState::Loading);
        Self {
            target,
            remote: Mutex::new(remote.into()),
            context: Mutex::new(context),
            address_book,
            loader,
            registry,
            child: Mutex::new(None),
            cleanup: Mutex::new(None),
            generation: AtomicU64::new(0),
            state,
        }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> SlotState {
        self.state.borrow().clone()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SlotState> {
        self.state.subscribe()
    }

    pub fn target(&self) -> &SurfaceHandle {
        &self.target
    }

    /// The private child surface of the current mount, if any.
    pub fn child(&self) -> Option<SurfaceHandle> {
        self.child.lock().expect("slot child lock poisoned").clone()
    }

    /// Run the slot with its current remote and context.
    pub async fn activate(&self) {
        let generation = self.next_generation();
        self.run(generation).await;
    }

    /// Switch to a different remote: tears the current mount down, then
    /// re-runs. Supersedes any in-flight run.
    pub async fn set_remote(&self, remote: impl Into<String>) {
        let remote = remote.into();
        {
            let mut current = self.remote.lock().expect("slot remote lock poisoned");
            if *current == remote {
                return;
            }
            *current = remote;
        }
        let generation = self.next_generation();
        self.teardown();
        self.run(generation).await;
    }

    /// Re-run with a new cascaded context. The existing child surface is
    /// kept so the remote re-renders in place through the root registry.
    pub async fn set_context(&self, context: Arc<VisibilityContext>) {
        *self.context.lock().expect("slot context lock poisoned") = context;
        let generation = self.next_generation();
        self.run(generation).await;
    }

    /// Tear the slot down: supersede any in-flight run, invoke the recorded
    /// deactivation exactly once, and detach the child surface.
    pub fn close(&self) {
        self.next_generation();
        self.teardown();
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    #[instrument(skip(self), fields(target = %self.target.id()))]
    async fn run(&self, generation: u64) {
        let remote = self.remote.lock().expect("slot remote lock poisoned").clone();
        let context = self
            .context
            .lock()
            .expect("slot context lock poisoned")
            .clone();

        self.state.send_replace(SlotState::Loading);
        let child = self.ensure_child(&remote);

        let manifest = match self.address_book.resolve().await {
            Ok(manifest) => manifest,
            Err(err) => {
                self.fail(generation, &remote, err);
                return;
            }
        };
        if !self.is_current(generation) {
            debug!(remote = %remote, "Run superseded during manifest resolution; abandoning");
            return;
        }

        let contract = match self
            .loader
            .fetch_with_retry(&remote, &manifest, &context)
            .await
        {
            Ok(contract) => contract,
            Err(err) => {
                self.fail(generation, &remote, err);
                return;
            }
        };
        if !self.is_current(generation) {
            debug!(remote = %remote, "Run superseded during load; abandoning");
            return;
        }

        if let Err(err) = contract.activate(child.clone(), context).await {
            self.fail(generation, &remote, err);
            return;
        }
        if !self.is_current(generation) {
            // Activation landed just as a newer run took over. If the slot
            // still holds this child, the newer run mounted onto it (a
            // context change keeps the child), so it must not be torn down;
            // only an orphaned child is rolled back.
            if self.child_is_current(&child) {
                debug!(remote = %remote, "Run superseded during activation; newer run owns the surface");
            } else {
                debug!(remote = %remote, "Run superseded during activation; rolling back");
                contract.deactivate(child.clone());
                self.registry.deactivate(Some(&child));
            }
            return;
        }

        let registry = self.registry.clone();
        let teardown_child = child.clone();
        let teardown_contract = contract.clone();
        *self.cleanup.lock().expect("slot cleanup lock poisoned") = Some(Box::new(move || {
            teardown_contract.deactivate(teardown_child.clone());
            registry.deactivate(Some(&teardown_child));
        }));

        self.state.send_replace(SlotState::Mounted);
        info!(remote = %remote, surface = %child.id(), "Remote mounted");
    }

    /// Record a failed run: state becomes `Error` unless a newer run has
    /// already taken over.
    fn fail(&self, generation: u64, remote: &str, err: RemoteError) {
        if !self.is_current(generation) {
            debug!(remote = %remote, "Superseded run failed; discarding error");
            return;
        }
        warn!(remote = %remote, stage = ?err.stage(), error = %err, "Remote failed to mount");
        self.state.send_replace(SlotState::Error(Arc::new(err)));
    }

    /// Whether `child` is still the slot's current child surface.
    fn child_is_current(&self, child: &SurfaceHandle) -> bool {
        self.child
            .lock()
            .expect("slot child lock poisoned")
            .as_ref()
            .map(|current| Arc::ptr_eq(current, child))
            .unwrap_or(false)
    }

    /// The private child surface, created on first use.
    fn ensure_child(&self, remote: &str) -> SurfaceHandle {
        let mut child = self.child.lock().expect("slot child lock poisoned");
        match child.as_ref() {
            Some(existing) => existing.clone(),
            None => {
                let created = self.target.create_child(format!("remote:{remote}"));
                *child = Some(created.clone());
                created
            }
        }
    }

    fn teardown(&self) {
        if let Some(cleanup) = self
            .cleanup
            .lock()
            .expect("slot cleanup lock poisoned")
            .take()
        {
            cleanup();
        }
        if let Some(child) = self.child.lock().expect("slot child lock poisoned").take() {
            self.target.remove_child(&child);
        }
    }
}

impl Drop for ActivationSlot {
    fn drop(&mut self) {
        self.teardown();
    }
}
