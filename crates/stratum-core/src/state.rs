//! Game-state machine.
//!
//! The machine moves between [`GameState`]s. A transition runs the exit hook
//! of the state being left, applies the entered state's [`SystemToggle`],
//! runs the entered state's enter hook, then publishes [`StateChanged`].
//!
//! # Initializing
//!
//! `Initializing` is not a resting state. Its default enter hook sets up a
//! new game (clears every entity, runs the Initialization phase, runs the
//! setup hooks) and then switches to `Playing` before returning. Because the
//! nested transition publishes first, observers see
//! `Initializing -> Playing` before `MainMenu -> Initializing`.
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use stratum_core::context::ServiceContext;
//! use stratum_core::event::handler;
//! use stratum_core::scheduler::SystemScheduler;
//! use stratum_core::state::{GameState, StateChanged, StateMachine};
//!
//! let scheduler = SystemScheduler::new(&ServiceContext::standalone());
//! let machine = StateMachine::new(scheduler.context().clone());
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let sink = Rc::clone(&seen);
//! let on_change = handler(move |e: &StateChanged| {
//!     sink.borrow_mut().push((e.previous, e.current));
//!     Ok(())
//! });
//! scheduler.context().events().subscribe(&on_change);
//!
//! machine.change_state(GameState::Initializing);
//!
//! assert_eq!(machine.current_state(), GameState::Playing);
//! assert_eq!(
//!     *seen.borrow(),
//!     vec![
//!         (GameState::Initializing, GameState::Playing),
//!         (GameState::MainMenu, GameState::Initializing),
//!     ]
//! );
//! ```

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace};

use crate::context::ServiceContext;
use crate::error::HookResult;
use crate::event::GameEvent;
use crate::fault::{self, FaultKind};
use crate::scheduler::SystemScheduler;
use crate::system::{System, SystemKind, SystemPhase};

// =============================================================================
// Game State
// =============================================================================

/// Top-level mode of the game.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameState {
    /// Title screen. The initial state.
    #[default]
    MainMenu,
    /// Setting up a new game. Immediately chains into `Playing`.
    Initializing,
    /// Normal play.
    Playing,
    /// Play suspended.
    Paused,
    /// A battle is being resolved.
    Battle,
    /// The game has ended.
    GameOver,
}

impl GameState {
    /// Every state, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::MainMenu,
        Self::Initializing,
        Self::Playing,
        Self::Paused,
        Self::Battle,
        Self::GameOver,
    ];
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MainMenu => write!(f, "MainMenu"),
            Self::Initializing => write!(f, "Initializing"),
            Self::Playing => write!(f, "Playing"),
            Self::Paused => write!(f, "Paused"),
            Self::Battle => write!(f, "Battle"),
            Self::GameOver => write!(f, "GameOver"),
        }
    }
}

/// Published after every completed state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChanged {
    /// State that was left.
    pub previous: GameState,
    /// State that was entered.
    pub current: GameState,
}

impl GameEvent for StateChanged {}

// =============================================================================
// System Toggle
// =============================================================================

/// Systems to enable and disable when a state is entered.
///
/// Enables are applied before disables, so a kind listed in both ends up
/// disabled. Kinds that are not registered are ignored.
///
/// # Example
///
/// ```
/// use stratum_core::context::ServiceContext;
/// use stratum_core::error::HookResult;
/// use stratum_core::state::SystemToggle;
/// use stratum_core::system::System;
///
/// struct Production;
/// impl System for Production {
///     fn execute(&mut self, _ctx: &ServiceContext) -> HookResult { Ok(()) }
/// }
///
/// struct Battle;
/// impl System for Battle {
///     fn execute(&mut self, _ctx: &ServiceContext) -> HookResult { Ok(()) }
/// }
///
/// let battle = SystemToggle::new().enable::<Battle>().disable::<Production>();
/// assert_eq!(battle.enabled().len(), 1);
/// assert_eq!(battle.disabled().len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemToggle {
    enable: Vec<SystemKind>,
    disable: Vec<SystemKind>,
}

impl SystemToggle {
    /// Creates an empty toggle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds system `S` to the enable list.
    #[must_use]
    pub fn enable<S: System>(self) -> Self {
        self.enable_kind(SystemKind::of::<S>())
    }

    /// Adds system `S` to the disable list.
    #[must_use]
    pub fn disable<S: System>(self) -> Self {
        self.disable_kind(SystemKind::of::<S>())
    }

    /// Adds `kind` to the enable list.
    #[must_use]
    pub fn enable_kind(mut self, kind: SystemKind) -> Self {
        if !self.enable.contains(&kind) {
            self.enable.push(kind);
        }
        self
    }

    /// Adds `kind` to the disable list.
    #[must_use]
    pub fn disable_kind(mut self, kind: SystemKind) -> Self {
        if !self.disable.contains(&kind) {
            self.disable.push(kind);
        }
        self
    }

    /// Kinds enabled on entry.
    #[must_use]
    pub fn enabled(&self) -> &[SystemKind] {
        &self.enable
    }

    /// Kinds disabled on entry.
    #[must_use]
    pub fn disabled(&self) -> &[SystemKind] {
        &self.disable
    }

    /// Returns `true` if the toggle changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.enable.is_empty() && self.disable.is_empty()
    }

    /// Applies the toggle to `scheduler`.
    pub fn apply(&self, scheduler: &SystemScheduler) {
        for kind in &self.enable {
            scheduler.enable_system_kind(*kind);
        }
        for kind in &self.disable {
            scheduler.disable_system_kind(*kind);
        }
    }
}

// =============================================================================
// State Machine
// =============================================================================

/// Hook run on entering or leaving a state, or during new-game setup.
pub type StateHook = Rc<dyn Fn(&StateMachine) -> HookResult>;

/// Wraps a closure as a [`StateHook`].
pub fn state_hook<F>(f: F) -> StateHook
where
    F: Fn(&StateMachine) -> HookResult + 'static,
{
    Rc::new(f)
}

/// Drives [`GameState`] transitions.
///
/// Hooks receive the machine itself, so they may read its state, reach the
/// shared services through [`StateMachine::context`], or trigger a further
/// transition. Every hook runs inside a fault boundary: a failing hook is
/// logged and the transition completes regardless.
pub struct StateMachine {
    context: ServiceContext,
    current: Cell<GameState>,
    previous: Cell<Option<GameState>>,
    toggles: RefCell<HashMap<GameState, SystemToggle>>,
    enter_hooks: RefCell<HashMap<GameState, StateHook>>,
    exit_hooks: RefCell<HashMap<GameState, StateHook>>,
    setup_hooks: RefCell<Vec<StateHook>>,
    run_initialization_phase: Cell<bool>,
}

impl StateMachine {
    /// Creates a machine in [`GameState::MainMenu`].
    ///
    /// `context` should be bound to a scheduler (see
    /// [`SystemScheduler::context`]); without one, toggles and the
    /// Initialization phase are skipped.
    #[must_use]
    pub fn new(context: ServiceContext) -> Self {
        let mut enter_hooks: HashMap<GameState, StateHook> = HashMap::new();
        enter_hooks.insert(GameState::Initializing, Rc::new(Self::set_up_new_game));

        Self {
            context,
            current: Cell::new(GameState::MainMenu),
            previous: Cell::new(None),
            toggles: RefCell::new(HashMap::new()),
            enter_hooks: RefCell::new(enter_hooks),
            exit_hooks: RefCell::new(HashMap::new()),
            setup_hooks: RefCell::new(Vec::new()),
            run_initialization_phase: Cell::new(true),
        }
    }

    /// Returns the shared services.
    #[must_use]
    pub fn context(&self) -> &ServiceContext {
        &self.context
    }

    /// Returns the current state.
    #[must_use]
    pub fn current_state(&self) -> GameState {
        self.current.get()
    }

    /// Returns the state before the most recent transition.
    #[must_use]
    pub fn previous_state(&self) -> Option<GameState> {
        self.previous.get()
    }

    /// Returns `true` if the machine is in `state`.
    #[must_use]
    pub fn is_in(&self, state: GameState) -> bool {
        self.current.get() == state
    }

    /// Sets the systems toggled on entering `state`, replacing any previous toggle.
    pub fn set_toggle(&self, state: GameState, toggle: SystemToggle) {
        self.toggles.borrow_mut().insert(state, toggle);
    }

    /// Returns the toggle applied on entering `state`.
    #[must_use]
    pub fn toggle(&self, state: GameState) -> Option<SystemToggle> {
        self.toggles.borrow().get(&state).cloned()
    }

    /// Sets the enter hook of `state`.
    ///
    /// Replacing the hook of [`GameState::Initializing`] also replaces the
    /// built-in new-game setup, including the chain into `Playing`; add
    /// setup steps with [`on_setup`](Self::on_setup) instead.
    pub fn on_enter(&self, state: GameState, hook: StateHook) {
        self.enter_hooks.borrow_mut().insert(state, hook);
    }

    /// Sets the exit hook of `state`.
    pub fn on_exit(&self, state: GameState, hook: StateHook) {
        self.exit_hooks.borrow_mut().insert(state, hook);
    }

    /// Adds a step to new-game setup. Steps run in the order added, after
    /// the Initialization phase.
    pub fn on_setup(&self, hook: StateHook) {
        self.setup_hooks.borrow_mut().push(hook);
    }

    /// Sets whether new-game setup runs the Initialization phase.
    pub fn set_run_initialization_phase(&self, run: bool) {
        self.run_initialization_phase.set(run);
    }

    /// Transitions to `next`.
    ///
    /// Does nothing if the machine is already in `next`. Otherwise, in order:
    /// 1. the exit hook of the current state runs
    /// 2. the current state becomes `next`
    /// 3. `next`'s toggle is applied
    /// 4. `next`'s enter hook runs (and may transition again)
    /// 5. [`StateChanged`] is published synchronously
    pub fn change_state(&self, next: GameState) {
        let previous = self.current.get();
        if previous == next {
            trace!(state = %next, "state unchanged");
            return;
        }

        let exit = self.exit_hooks.borrow().get(&previous).cloned();
        self.run_hook(exit.as_ref(), "exit", previous);

        self.previous.set(Some(previous));
        self.current.set(next);

        let toggle = self.toggles.borrow().get(&next).cloned();
        if let Some(toggle) = toggle {
            match self.context.scheduler() {
                Some(scheduler) => toggle.apply(&scheduler),
                None => debug!(state = %next, "toggle skipped: no scheduler"),
            }
        }

        let enter = self.enter_hooks.borrow().get(&next).cloned();
        self.run_hook(enter.as_ref(), "enter", next);

        info!(previous = %previous, current = %next, "game state changed");
        self.context
            .events()
            .trigger_event(&StateChanged { previous, current: next });
    }

    fn run_hook(&self, hook: Option<&StateHook>, stage: &'static str, state: GameState) {
        let Some(hook) = hook else {
            return;
        };
        if let Err(err) = fault::contain(|| hook(self)) {
            error!(
                state = %state,
                hook = stage,
                fault = %FaultKind::RuntimeExecutionFault,
                error = %err,
                "state hook failed"
            );
        }
    }

    /// Built-in enter hook of [`GameState::Initializing`].
    fn set_up_new_game(&self) -> HookResult {
        self.context.entities_mut().clear_all_entities();

        if self.run_initialization_phase.get() {
            if let Some(scheduler) = self.context.scheduler() {
                scheduler.execute_phase(SystemPhase::Initialization);
            }
        }

        let steps = self.setup_hooks.borrow().clone();
        for step in &steps {
            self.run_hook(Some(step), "setup", GameState::Initializing);
        }
        debug!(steps = steps.len(), "new game set up");

        self.change_state(GameState::Playing);
        Ok(())
    }
}

impl fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("current", &self.current.get())
            .field("previous", &self.previous.get())
            .field("toggles", &self.toggles.borrow().len())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
