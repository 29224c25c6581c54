//! Host-facing owner of the backbone.
//!
//! A [`Simulation`] wires one entity registry, event bus, scheduler, game
//! state machine and turn cycle together and exposes the calls a host makes
//! from its main loop:
//!
//! 1. **TICK**: run PreUpdate, Update and PostUpdate, then drain the event queue
//! 2. **RENDER**: run the Render phase once per presented frame
//! 3. **TURN**: advance the turn cycle on player or AI input
//! 4. **SHUTDOWN**: run the Cleanup phase and tear every system down
//!
//! # Example
//!
//! ```
//! use stratum_core::context::ServiceContext;
//! use stratum_core::entity::components::Health;
//! use stratum_core::error::HookResult;
//! use stratum_core::simulation::Simulation;
//! use stratum_core::state::GameState;
//! use stratum_core::system::{System, SystemPhase, SystemPriority};
//!
//! /// Heals every damaged unit by one point per tick.
//! struct Regeneration;
//!
//! impl System for Regeneration {
//!     fn execute(&mut self, ctx: &ServiceContext) -> HookResult {
//!         let mut entities = ctx.entities_mut();
//!         for id in entities.entities_with::<Health>() {
//!             if let Some(health) = entities.entity_mut(id).and_then(|e| e.component_mut::<Health>()) {
//!                 health.heal(1);
//!             }
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let mut sim = Simulation::default();
//! sim.register_system(Regeneration, SystemPhase::Update, SystemPriority::Normal);
//! sim.new_game();
//! assert_eq!(sim.state(), GameState::Playing);
//!
//! let unit = sim.context().entities_mut().create_entity("infantry");
//! let mut health = Health::new(10);
//! health.damage(4);
//! sim.context().entities_mut().add_component(unit, health).unwrap();
//!
//! sim.tick();
//! sim.tick();
//!
//! let entities = sim.context().entities();
//! assert_eq!(entities.entity(unit).and_then(|e| e.component::<Health>()).map(|h| h.current), Some(8));
//! ```

use std::cell::{Ref, RefMut};
use std::fmt;
use std::rc::Rc;

use tracing::info;

use crate::config::CoreConfig;
use crate::context::ServiceContext;
use crate::event::EventBus;
use crate::registry::EntityRegistry;
use crate::scheduler::{SystemHandle, SystemScheduler};
use crate::state::{GameState, StateMachine};
use crate::system::{System, SystemPhase, SystemPriority};
use crate::turn::{TurnCycle, TurnPhase};

// =============================================================================
// Simulation
// =============================================================================

/// The registry, bus, scheduler, state machine and turn cycle of one game.
///
/// `Simulation` holds the only strong reference to its scheduler; contexts
/// handed to systems point at it weakly.
pub struct Simulation {
    config: CoreConfig,
    scheduler: Rc<SystemScheduler>,
    state: StateMachine,
    turns: TurnCycle,
    ticks: u64,
}

impl Simulation {
    /// Creates a simulation in [`GameState::MainMenu`] with no systems.
    ///
    /// # Arguments
    ///
    /// * `config` - Profiling, starting turn and setup behavior
    #[must_use]
    pub fn new(config: CoreConfig) -> Self {
        let services = ServiceContext::standalone();
        let scheduler = SystemScheduler::new(&services);
        scheduler.set_profiling(config.profiling);

        let state = StateMachine::new(scheduler.context().clone());
        state.set_run_initialization_phase(config.run_initialization_phase_on_setup);

        let turns = TurnCycle::starting_at(Rc::clone(services.events()), config.starting_turn);

        Self {
            config,
            scheduler,
            state,
            turns,
            ticks: 0,
        }
    }

    /// Registers a system. See [`SystemScheduler::register_system`].
    pub fn register_system<S: System>(
        &self,
        system: S,
        phase: SystemPhase,
        priority: SystemPriority,
    ) -> SystemHandle<S> {
        self.scheduler.register_system(system, phase, priority)
    }

    /// Runs one host tick: the per-tick phases, then the event queue.
    pub fn tick(&mut self) {
        self.scheduler.execute_all_systems();
        self.context().events().process_event_queue();
        self.ticks += 1;
    }

    /// Runs the Render phase.
    pub fn render(&self) {
        self.scheduler.execute_phase(SystemPhase::Render);
    }

    /// Starts a new game.
    ///
    /// Resets the turn cycle to the configured starting turn, then enters
    /// [`GameState::Initializing`], which sets the game up and chains into
    /// [`GameState::Playing`].
    pub fn new_game(&mut self) {
        info!(
            starting_turn = self.config.starting_turn,
            "starting new game"
        );
        self.turns.reset(self.config.starting_turn);
        self.state.change_state(GameState::Initializing);
    }

    /// Transitions the game state machine.
    pub fn change_state(&self, state: GameState) {
        self.state.change_state(state);
    }

    /// Advances the turn cycle by one phase.
    pub fn advance_phase(&mut self) {
        self.turns.next_phase();
    }

    /// Starts the next turn.
    pub fn advance_turn(&mut self) {
        self.turns.next_turn();
    }

    /// Runs the Cleanup phase, tears every system down and drops queued events.
    pub fn shutdown(&mut self) {
        self.scheduler.execute_phase(SystemPhase::Cleanup);
        self.scheduler.cleanup_all_systems();
        self.context().events().clear_event_queue();
        info!(ticks = self.ticks, "simulation shut down");
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Returns the context bound to this simulation's scheduler.
    #[must_use]
    pub fn context(&self) -> &ServiceContext {
        self.scheduler.context()
    }

    /// Borrows the entity registry.
    ///
    /// # Panics
    ///
    /// Panics if the registry is borrowed mutably.
    #[must_use]
    pub fn entities(&self) -> Ref<'_, EntityRegistry> {
        self.context().entities()
    }

    /// Borrows the entity registry mutably.
    ///
    /// # Panics
    ///
    /// Panics if the registry is already borrowed.
    #[must_use]
    pub fn entities_mut(&self) -> RefMut<'_, EntityRegistry> {
        self.context().entities_mut()
    }

    /// Returns the event bus.
    #[must_use]
    pub fn events(&self) -> &Rc<EventBus> {
        self.context().events()
    }

    /// Returns the scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &Rc<SystemScheduler> {
        &self.scheduler
    }

    /// Returns the game state machine, for configuring toggles and hooks.
    #[must_use]
    pub fn state_machine(&self) -> &StateMachine {
        &self.state
    }

    /// Returns the current game state.
    #[must_use]
    pub fn state(&self) -> GameState {
        self.state.current_state()
    }

    /// Returns the turn cycle.
    #[must_use]
    pub fn turns(&self) -> &TurnCycle {
        &self.turns
    }

    /// Returns the turn cycle mutably.
    #[must_use]
    pub fn turns_mut(&mut self) -> &mut TurnCycle {
        &mut self.turns
    }

    /// Returns the current turn number.
    #[must_use]
    pub fn turn(&self) -> u32 {
        self.turns.current_turn()
    }

    /// Returns the current turn phase.
    #[must_use]
    pub fn turn_phase(&self) -> TurnPhase {
        self.turns.current_phase()
    }

    /// Returns the number of completed ticks.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Returns the configuration the simulation was built with.
    #[must_use]
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new(CoreConfig::default())
    }
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("turns", &self.turns)
            .field("ticks", &self.ticks)
            .field("systems", &self.scheduler.system_count())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
