//! # Stratum Core
//!
//! Architectural backbone for turn-based strategy simulations.
//!
//! This crate provides the pieces every game system plugs into: an entity
//! registry, a phased system scheduler, a typed event bus and the game-state
//! and turn drivers. Everything runs on one thread, run-to-completion.
//!
//! ## Architecture
//!
//! - **Entities**: integer ids in an explicit arena, carrying typed components
//!   indexed by kind ([`registry::EntityRegistry`])
//! - **Systems**: units of behavior registered into a phase with a priority
//!   ([`scheduler::SystemScheduler`])
//! - **Events**: synchronous and deferred typed publish/subscribe
//!   ([`event::EventBus`])
//! - **Drivers**: the game-state machine and the turn cycle, which toggle
//!   systems and publish events ([`state::StateMachine`], [`turn::TurnCycle`])
//!
//! Systems receive a [`context::ServiceContext`] in every hook instead of
//! reaching for globals. Faults in user code are contained per system and
//! per handler; nothing a system does can abort a tick.
//!
//! ## Usage
//!
//! ```
//! use stratum_core::{GameState, Simulation};
//!
//! let mut sim = Simulation::default();
//! sim.new_game();
//! assert_eq!(sim.state(), GameState::Playing);
//!
//! sim.tick();
//! sim.advance_phase();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod context;
pub mod entity;
pub mod error;
pub mod event;
pub mod fault;
pub mod locator;
pub mod registry;
pub mod scheduler;
pub mod simulation;
pub mod state;
pub mod system;
pub mod turn;
pub mod type_tag;

pub use config::CoreConfig;
pub use context::ServiceContext;
pub use entity::{Component, ComponentKind, Entity, EntityId};
pub use error::{ComponentError, HookError, HookResult};
pub use event::{EventBus, EventKind, GameEvent, Handler};
pub use registry::EntityRegistry;
pub use scheduler::{SystemHandle, SystemScheduler};
pub use simulation::Simulation;
pub use state::{GameState, StateChanged, StateMachine, SystemToggle};
pub use system::{System, SystemInfo, SystemKind, SystemPhase, SystemPriority, SystemStats};
pub use turn::{PhaseChanged, TurnCycle, TurnPhase, TurnStarted};

#[cfg(test)]
mod tests;
