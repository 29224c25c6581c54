//! Phase-grouped, priority-ordered system execution with per-system fault
//! isolation.
//!
//! # Lifecycle
//!
//! Each system kind moves through
//! `Unregistered -> Registered(Enabled) <-> Registered(Disabled) -> Unregistered`.
//! Registration binds the scheduler's [`ServiceContext`] and runs the init
//! hook; a failed init leaves the system registered but disabled.
//! [`SystemScheduler::cleanup_all_systems`] returns every kind to
//! `Unregistered`.
//!
//! # Ordering
//!
//! Within a phase, enabled systems run by priority, then kind name, then
//! registration order. The order is recomputed lazily: enabling, disabling
//! or registering only marks the phase dirty. A pass iterates over a
//! snapshot taken when it starts, so systems may toggle other systems while
//! the phase is running:
//! - a system disabled mid-pass is skipped for the rest of that pass
//! - a system enabled or registered mid-pass first runs on the next pass
//!
//! # Example
//!
//! ```
//! use stratum_core::context::ServiceContext;
//! use stratum_core::error::HookResult;
//! use stratum_core::scheduler::SystemScheduler;
//! use stratum_core::system::{System, SystemPhase, SystemPriority};
//!
//! struct Harvest {
//!     yields: u32,
//! }
//!
//! impl System for Harvest {
//!     fn execute(&mut self, _ctx: &ServiceContext) -> HookResult {
//!         self.yields += 1;
//!         Ok(())
//!     }
//! }
//!
//! let scheduler = SystemScheduler::new(&ServiceContext::standalone());
//! let harvest = scheduler.register_system(
//!     Harvest { yields: 0 },
//!     SystemPhase::Update,
//!     SystemPriority::Normal,
//! );
//!
//! scheduler.execute_all_systems();
//! scheduler.execute_all_systems();
//!
//! assert_eq!(harvest.with(|h| h.yields), Some(2));
//! ```

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};
use std::time::Instant;

use tracing::{debug, error, info, trace, warn};

use crate::context::ServiceContext;
use crate::error::{HookError, HookResult};
use crate::fault::{self, FaultKind};
use crate::system::{System, SystemInfo, SystemKind, SystemPhase, SystemPriority, SystemStats};
use crate::type_tag::AsAny;

// =============================================================================
// Registration Slot
// =============================================================================

/// One registered system and its bookkeeping.
struct SystemSlot {
    kind: SystemKind,
    phase: SystemPhase,
    priority: SystemPriority,
    /// Registration order, the last tie-breaker.
    sequence: u64,
    enabled: Cell<bool>,
    initialized: Cell<bool>,
    stats: Cell<SystemStats>,
    system: RefCell<Box<dyn System>>,
}

impl SystemSlot {
    /// Runs `hook` against the system unless one of its hooks is already running.
    fn call(&self, hook: impl FnOnce(&mut Box<dyn System>) -> HookResult) -> HookResult {
        match self.system.try_borrow_mut() {
            Ok(mut system) => hook(&mut *system),
            Err(_) => Err(HookError::failed("re-entrant hook call")),
        }
    }

    fn typed<S: System, R>(&self, f: impl FnOnce(&mut S) -> R) -> Option<R> {
        let mut system = self.system.try_borrow_mut().ok()?;
        (**system).as_any_mut().downcast_mut::<S>().map(f)
    }

    fn info(&self) -> SystemInfo {
        SystemInfo {
            kind: self.kind,
            phase: self.phase,
            priority: self.priority,
            enabled: self.enabled.get(),
            initialized: self.initialized.get(),
            stats: self.stats.get(),
        }
    }
}

// =============================================================================
// Phase Group
// =============================================================================

/// The systems registered into one phase.
#[derive(Default)]
struct PhaseGroup {
    /// Every registered member, in registration order.
    members: Vec<Rc<SystemSlot>>,
    /// Enabled members in execution order. Stale while `dirty`.
    order: Vec<Rc<SystemSlot>>,
    dirty: bool,
}

impl PhaseGroup {
    fn sorted(&self, enabled_only: bool) -> Vec<Rc<SystemSlot>> {
        let mut slots: Vec<Rc<SystemSlot>> = self
            .members
            .iter()
            .filter(|slot| !enabled_only || slot.enabled.get())
            .cloned()
            .collect();
        slots.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.kind.name().cmp(b.kind.name()))
                .then_with(|| a.sequence.cmp(&b.sequence))
        });
        slots
    }

    /// Returns the execution order, re-sorting first if it is stale.
    fn execution_order(&mut self) -> Vec<Rc<SystemSlot>> {
        if self.dirty {
            self.order = self.sorted(true);
            self.dirty = false;
        }
        self.order.clone()
    }
}

// =============================================================================
// System Handle
// =============================================================================

/// Typed handle to a registered system.
///
/// The handle does not keep the system alive: once the system is torn down
/// by [`SystemScheduler::cleanup_all_systems`] every accessor returns `None`.
pub struct SystemHandle<S> {
    kind: SystemKind,
    slot: Weak<SystemSlot>,
    _marker: PhantomData<fn() -> S>,
}

impl<S: System> SystemHandle<S> {
    fn new(slot: &Rc<SystemSlot>) -> Self {
        Self {
            kind: slot.kind,
            slot: Rc::downgrade(slot),
            _marker: PhantomData,
        }
    }

    /// Returns the system's kind.
    #[must_use]
    pub fn kind(&self) -> SystemKind {
        self.kind
    }

    /// Runs `f` with mutable access to the system.
    ///
    /// Returns `None` if the system is no longer registered, or if called
    /// from inside one of its own hooks.
    pub fn with<R>(&self, f: impl FnOnce(&mut S) -> R) -> Option<R> {
        self.slot.upgrade()?.typed(f)
    }

    /// Returns a snapshot of the registration.
    #[must_use]
    pub fn info(&self) -> Option<SystemInfo> {
        self.slot.upgrade().map(|slot| slot.info())
    }

    /// Returns `true` while the system is registered.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.slot.strong_count() > 0
    }
}

impl<S> Clone for SystemHandle<S> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            slot: Weak::clone(&self.slot),
            _marker: PhantomData,
        }
    }
}

impl<S> fmt::Debug for SystemHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemHandle")
            .field("kind", &self.kind)
            .field("registered", &(self.slot.strong_count() > 0))
            .finish()
    }
}

// =============================================================================
// Scheduler
// =============================================================================

/// Owns the registered systems and runs them phase by phase.
///
/// The scheduler is always behind an `Rc` (see [`SystemScheduler::new`]) so
/// the context it hands to systems can point back at it. Every method takes
/// `&self`; systems reach the scheduler through
/// [`ServiceContext::scheduler`] and may call any of them from their hooks.
pub struct SystemScheduler {
    context: ServiceContext,
    /// Every registration, in registration order.
    slots: RefCell<Vec<Rc<SystemSlot>>>,
    by_kind: RefCell<HashMap<SystemKind, Rc<SystemSlot>>>,
    groups: [RefCell<PhaseGroup>; SystemPhase::ALL.len()],
    profiling: Cell<bool>,
    next_sequence: Cell<u64>,
}

impl SystemScheduler {
    /// Creates a scheduler sharing the registry and bus of `services`.
    ///
    /// The scheduler keeps its own copy of the context, bound to itself.
    #[must_use]
    pub fn new(services: &ServiceContext) -> Rc<Self> {
        Rc::new_cyclic(|weak| Self {
            context: services.with_scheduler(Weak::clone(weak)),
            slots: RefCell::new(Vec::new()),
            by_kind: RefCell::new(HashMap::new()),
            groups: std::array::from_fn(|_| RefCell::new(PhaseGroup::default())),
            profiling: Cell::new(false),
            next_sequence: Cell::new(0),
        })
    }

    /// Returns the context handed to every hook.
    #[must_use]
    pub fn context(&self) -> &ServiceContext {
        &self.context
    }

    /// Turns duration and execution-count recording on or off.
    pub fn set_profiling(&self, enabled: bool) {
        self.profiling.set(enabled);
    }

    /// Returns `true` if execution profiling is on.
    #[must_use]
    pub fn profiling(&self) -> bool {
        self.profiling.get()
    }

    // -------------------------------------------------------------------------
    // Registration
    // -------------------------------------------------------------------------

    /// Registers `system` into `phase` at `priority` and runs its init hook.
    ///
    /// If a system of the same kind is already registered, the new instance
    /// is dropped, a warning is logged, and the returned handle refers to the
    /// existing registration.
    ///
    /// # Arguments
    ///
    /// * `system` - The system instance; the scheduler takes ownership
    /// * `phase` - Phase the system runs in
    /// * `priority` - Tier within the phase
    ///
    /// # Returns
    ///
    /// A typed handle to the registered system.
    pub fn register_system<S: System>(
        &self,
        system: S,
        phase: SystemPhase,
        priority: SystemPriority,
    ) -> SystemHandle<S> {
        let kind = SystemKind::of::<S>();

        let existing = self.by_kind.borrow().get(&kind).cloned();
        if let Some(slot) = existing {
            warn!(
                system = %kind,
                fault = %FaultKind::RegistrationConflict,
                phase = %slot.phase,
                "system already registered; keeping the original"
            );
            return SystemHandle::new(&slot);
        }

        let sequence = self.next_sequence.get();
        self.next_sequence.set(sequence + 1);

        let slot = Rc::new(SystemSlot {
            kind,
            phase,
            priority,
            sequence,
            enabled: Cell::new(true),
            initialized: Cell::new(false),
            stats: Cell::new(SystemStats::default()),
            system: RefCell::new(Box::new(system)),
        });

        self.slots.borrow_mut().push(Rc::clone(&slot));
        self.by_kind.borrow_mut().insert(kind, Rc::clone(&slot));
        {
            let mut group = self.groups[phase.index()].borrow_mut();
            group.members.push(Rc::clone(&slot));
            group.dirty = true;
        }
        debug!(system = %kind, phase = %phase, priority = %priority, "system registered");

        self.initialize_slot(&slot);
        SystemHandle::new(&slot)
    }

    fn initialize_slot(&self, slot: &SystemSlot) -> bool {
        let result = fault::contain(|| slot.call(|system| system.initialize(&self.context)));
        match result {
            Ok(()) => {
                slot.initialized.set(true);
                true
            }
            Err(err) => {
                slot.initialized.set(false);
                self.set_slot_enabled(slot, false);
                error!(
                    system = %slot.kind,
                    fault = %FaultKind::InitializationFailure,
                    error = %err,
                    "system initialization failed; system disabled"
                );
                false
            }
        }
    }

    fn cleanup_slot(&self, slot: &SystemSlot) {
        let result = fault::contain(|| slot.call(|system| system.cleanup(&self.context)));
        slot.initialized.set(false);
        if let Err(err) = result {
            error!(
                system = %slot.kind,
                fault = %FaultKind::CleanupFault,
                error = %err,
                "system cleanup failed"
            );
        }
    }

    fn slot(&self, kind: SystemKind) -> Option<Rc<SystemSlot>> {
        self.by_kind.borrow().get(&kind).cloned()
    }

    // -------------------------------------------------------------------------
    // Enable / Disable
    // -------------------------------------------------------------------------

    /// Adds system `S` back to its phase's enabled set.
    ///
    /// Returns `false` if `S` is not registered.
    pub fn enable_system<S: System>(&self) -> bool {
        self.set_system_enabled(SystemKind::of::<S>(), true)
    }

    /// Removes system `S` from its phase's enabled set. Its state and stats
    /// are kept.
    ///
    /// Returns `false` if `S` is not registered.
    pub fn disable_system<S: System>(&self) -> bool {
        self.set_system_enabled(SystemKind::of::<S>(), false)
    }

    /// Untyped form of [`enable_system`](Self::enable_system).
    pub fn enable_system_kind(&self, kind: SystemKind) -> bool {
        self.set_system_enabled(kind, true)
    }

    /// Untyped form of [`disable_system`](Self::disable_system).
    pub fn disable_system_kind(&self, kind: SystemKind) -> bool {
        self.set_system_enabled(kind, false)
    }

    /// Sets whether `kind` is in its phase's enabled set.
    ///
    /// Returns `false` if `kind` is not registered.
    pub fn set_system_enabled(&self, kind: SystemKind, enabled: bool) -> bool {
        let Some(slot) = self.slot(kind) else {
            debug!(system = %kind, enabled, "toggle ignored: system not registered");
            return false;
        };
        self.set_slot_enabled(&slot, enabled);
        true
    }

    fn set_slot_enabled(&self, slot: &SystemSlot, enabled: bool) {
        if slot.enabled.get() == enabled {
            return;
        }
        slot.enabled.set(enabled);
        self.groups[slot.phase.index()].borrow_mut().dirty = true;
        debug!(system = %slot.kind, enabled, "system toggled");
    }

    // -------------------------------------------------------------------------
    // Execution
    // -------------------------------------------------------------------------

    /// Runs the execute hook of every enabled system in `phase`.
    ///
    /// A failing system is logged and counted, then the next system runs.
    pub fn execute_phase(&self, phase: SystemPhase) {
        let order = self.groups[phase.index()].borrow_mut().execution_order();
        trace!(phase = %phase, systems = order.len(), "executing phase");

        for slot in &order {
            if !slot.enabled.get() {
                trace!(system = %slot.kind, "skipped: disabled during pass");
                continue;
            }
            self.execute_slot(slot);
        }
    }

    fn execute_slot(&self, slot: &SystemSlot) {
        let started = self.profiling.get().then(Instant::now);
        let result = fault::contain(|| slot.call(|system| system.execute(&self.context)));

        let mut stats = slot.stats.get();
        if let Some(started) = started {
            stats.last_duration = started.elapsed();
            stats.execution_count += 1;
        }
        if let Err(err) = result {
            stats.fault_count += 1;
            error!(
                system = %slot.kind,
                phase = %slot.phase,
                fault = %FaultKind::RuntimeExecutionFault,
                error = %err,
                "system execution failed"
            );
        }
        slot.stats.set(stats);
    }

    /// Runs the per-tick phases: PreUpdate, Update, then PostUpdate.
    ///
    /// Initialization, Render and Cleanup are run explicitly with
    /// [`execute_phase`](Self::execute_phase).
    pub fn execute_all_systems(&self) {
        for phase in SystemPhase::TICK {
            self.execute_phase(phase);
        }
    }

    // -------------------------------------------------------------------------
    // Bulk Lifecycle
    // -------------------------------------------------------------------------

    /// Cleans up and re-initializes every system, in registration order.
    ///
    /// Stats are reset. A system whose re-init fails is disabled; the rest
    /// are still reset. A successful re-init does not change whether the
    /// system is enabled.
    pub fn reset_all_systems(&self) {
        let slots = self.slots.borrow().clone();
        let mut failed = 0_usize;
        for slot in &slots {
            self.cleanup_slot(slot);
            slot.stats.set(SystemStats::default());
            if !self.initialize_slot(slot) {
                failed += 1;
            }
        }
        info!(systems = slots.len(), failed, "systems reset");
    }

    /// Cleans up every system, then drops every registration.
    ///
    /// Outstanding [`SystemHandle`]s go dead. Systems still queued in an
    /// in-flight phase pass are skipped.
    pub fn cleanup_all_systems(&self) {
        let slots = self.slots.borrow().clone();
        for slot in &slots {
            self.cleanup_slot(slot);
            slot.enabled.set(false);
        }

        self.slots.borrow_mut().clear();
        self.by_kind.borrow_mut().clear();
        for group in &self.groups {
            *group.borrow_mut() = PhaseGroup::default();
        }
        info!(systems = slots.len(), "all systems cleaned up");
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Runs `f` with mutable access to system `S`.
    ///
    /// Returns `None` if `S` is not registered, or if called from inside one
    /// of `S`'s own hooks.
    pub fn with_system<S: System, R>(&self, f: impl FnOnce(&mut S) -> R) -> Option<R> {
        self.slot(SystemKind::of::<S>())?.typed(f)
    }

    /// Returns a handle to system `S`, if registered.
    #[must_use]
    pub fn handle<S: System>(&self) -> Option<SystemHandle<S>> {
        self.slot(SystemKind::of::<S>())
            .map(|slot| SystemHandle::new(&slot))
    }

    /// Returns a snapshot of system `S`'s registration.
    #[must_use]
    pub fn system_info<S: System>(&self) -> Option<SystemInfo> {
        self.system_info_kind(SystemKind::of::<S>())
    }

    /// Untyped form of [`system_info`](Self::system_info).
    #[must_use]
    pub fn system_info_kind(&self, kind: SystemKind) -> Option<SystemInfo> {
        self.slot(kind).map(|slot| slot.info())
    }

    /// Snapshots of every registration, in registration order.
    #[must_use]
    pub fn system_infos(&self) -> Vec<SystemInfo> {
        self.slots.borrow().iter().map(|slot| slot.info()).collect()
    }

    /// Every system registered in `phase`, enabled or not, in the order
    /// they would run.
    #[must_use]
    pub fn systems_in_phase(&self, phase: SystemPhase) -> Vec<SystemKind> {
        self.groups[phase.index()]
            .borrow()
            .sorted(false)
            .iter()
            .map(|slot| slot.kind)
            .collect()
    }

    /// The enabled systems of `phase`, in execution order.
    #[must_use]
    pub fn execution_order(&self, phase: SystemPhase) -> Vec<SystemKind> {
        self.groups[phase.index()]
            .borrow_mut()
            .execution_order()
            .iter()
            .map(|slot| slot.kind)
            .collect()
    }

    /// Returns `true` if system `S` is registered.
    #[must_use]
    pub fn is_registered<S: System>(&self) -> bool {
        self.by_kind.borrow().contains_key(&SystemKind::of::<S>())
    }

    /// Returns `true` if system `S` is registered and enabled.
    #[must_use]
    pub fn is_enabled<S: System>(&self) -> bool {
        self.slot(SystemKind::of::<S>())
            .is_some_and(|slot| slot.enabled.get())
    }

    /// Number of registered systems.
    #[must_use]
    pub fn system_count(&self) -> usize {
        self.slots.borrow().len()
    }
}

impl fmt::Debug for SystemScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemScheduler")
            .field("systems", &self.system_infos())
            .field("profiling", &self.profiling.get())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
