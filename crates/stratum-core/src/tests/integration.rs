//! Integration tests for the full backbone.
//!
//! These tests drive a [`Simulation`] the way a host does and check that
//! the registry, scheduler, bus, state machine and turn cycle cooperate:
//! - Phase ordering and fault isolation across ticks
//! - Events published by systems and drained at end of tick
//! - State toggles switching systems on and off
//! - Turn and phase events
//! - Entity lifecycle seen through the kind index

use std::rc::Rc;

use crate::config::CoreConfig;
use crate::context::ServiceContext;
use crate::entity::components::{GridPosition, Health, Identity};
use crate::entity::ComponentKind;
use crate::error::{HookError, HookResult};
use crate::event::{handler, GameEvent};
use crate::simulation::Simulation;
use crate::state::{GameState, StateChanged, SystemToggle};
use crate::system::{System, SystemPhase, SystemPriority};
use crate::turn::{PhaseChanged, TurnPhase, TurnStarted};

use super::helpers::{
    entries, execution_log, init_tracing, record_events, recording_system, ExecutionLog,
};

recording_system!(Resources, Research, Production, BattleSystem, Upkeep);

// =============================================================================
// Test Systems and Events
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct UnitDestroyed {
    unit: crate::entity::EntityId,
}
impl GameEvent for UnitDestroyed {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BountyPaid {
    amount: u32,
}
impl GameEvent for BountyPaid {}

/// Damages every unit each tick and queues `UnitDestroyed` for the fallen.
struct Attrition {
    damage: i32,
}

impl System for Attrition {
    fn execute(&mut self, ctx: &ServiceContext) -> HookResult {
        let fallen = {
            let mut entities = ctx.entities_mut();
            let mut fallen = Vec::new();
            for id in entities.entities_with::<Health>() {
                if let Some(health) = entities
                    .entity_mut(id)
                    .and_then(|e| e.component_mut::<Health>())
                {
                    health.damage(self.damage);
                    if health.is_depleted() {
                        fallen.push(id);
                    }
                }
            }
            fallen
        };
        for unit in fallen {
            ctx.events().queue_event(UnitDestroyed { unit });
        }
        Ok(())
    }
}

/// Removes destroyed units and pays a bounty for each.
///
/// Subscribes during init, so the subscription lives as long as the bus.
#[derive(Default)]
struct Graveyard {
    on_destroyed: Option<crate::event::Handler<UnitDestroyed>>,
}

impl System for Graveyard {
    fn initialize(&mut self, ctx: &ServiceContext) -> HookResult {
        let services = ctx.clone();
        let on_destroyed = handler(move |e: &UnitDestroyed| {
            services.entities_mut().destroy_entity(e.unit);
            services.events().queue_event(BountyPaid { amount: 10 });
            Ok(())
        });
        ctx.events().subscribe(&on_destroyed);
        self.on_destroyed = Some(on_destroyed);
        Ok(())
    }

    fn execute(&mut self, _ctx: &ServiceContext) -> HookResult {
        Ok(())
    }

    fn cleanup(&mut self, ctx: &ServiceContext) -> HookResult {
        if let Some(on_destroyed) = self.on_destroyed.take() {
            ctx.events().unsubscribe(&on_destroyed);
        }
        Ok(())
    }
}

fn spawn_unit(sim: &Simulation, name: &str, hp: i32, at: GridPosition) -> crate::entity::EntityId {
    let mut entities = sim.entities_mut();
    let id = entities.create_entity("unit");
    entities.add_component(id, Identity::new(name, 0)).unwrap();
    entities.add_component(id, Health::new(hp)).unwrap();
    entities.add_component(id, at).unwrap();
    id
}

fn describe_state(e: &StateChanged) -> String {
    format!("{}->{}", e.previous, e.current)
}

// =============================================================================
// Scenario Tests
// =============================================================================

mod scenario_tests {
    use super::*;

    #[test]
    fn higher_priority_runs_first_regardless_of_registration_order() {
        init_tracing();
        let log = execution_log();
        let sim = Simulation::default();
        sim.register_system(
            Research::new(&log),
            SystemPhase::Update,
            SystemPriority::Low,
        );
        sim.register_system(
            Resources::new(&log),
            SystemPhase::Update,
            SystemPriority::High,
        );
        log.borrow_mut().clear();

        sim.scheduler().execute_phase(SystemPhase::Update);

        assert_eq!(entries(&log), vec!["Resources", "Research"]);
    }

    #[test]
    fn five_phase_advances_start_turn_two() {
        init_tracing();
        let log = execution_log();
        let mut sim = Simulation::default();
        record_events(sim.events(), &log, |e: &PhaseChanged| {
            format!("phase {}->{}", e.previous, e.current)
        });
        record_events(sim.events(), &log, |e: &TurnStarted| {
            format!("turn {} {}", e.turn, e.phase)
        });

        let mut phases = Vec::new();
        for _ in 0..5 {
            sim.advance_phase();
            phases.push(sim.turn_phase());
        }

        assert_eq!(
            phases,
            vec![
                TurnPhase::Action,
                TurnPhase::Event,
                TurnPhase::Enemy,
                TurnPhase::Settlement,
                TurnPhase::Strategy,
            ]
        );
        assert_eq!(sim.turn(), 2);
        let log = entries(&log);
        assert_eq!(log.iter().filter(|e| e.starts_with("turn")).count(), 1);
        assert_eq!(log.iter().filter(|e| e.starts_with("phase")).count(), 4);
        assert!(!log.iter().any(|e| e == "phase Settlement->Strategy"));
        assert_eq!(log.last().map(String::as_str), Some("turn 2 Strategy"));
    }

    #[test]
    fn entering_initializing_ends_in_playing_with_two_events() {
        init_tracing();
        let log = execution_log();
        let sim = Simulation::default();
        record_events(sim.events(), &log, describe_state);

        sim.change_state(GameState::Initializing);

        assert_eq!(sim.state(), GameState::Playing);
        assert_eq!(
            entries(&log),
            vec!["Initializing->Playing", "MainMenu->Initializing"]
        );
    }

    #[test]
    fn intersection_with_unheld_kind_is_empty() {
        let sim = Simulation::default();
        spawn_unit(&sim, "scout", 5, GridPosition::new(0, 0));
        spawn_unit(&sim, "tank", 9, GridPosition::new(1, 0));

        let hits = sim.entities().entities_with_components(&[
            ComponentKind::of::<Health>(),
            ComponentKind::of::<super::Marker>(),
        ]);

        assert!(hits.is_empty());
    }
}

/// Never attached to anything.
struct Marker;
impl crate::entity::Component for Marker {}

// =============================================================================
// End-to-End Flows
// =============================================================================

mod flow_tests {
    use super::*;

    #[test]
    fn queued_events_cascade_within_one_tick() {
        init_tracing();
        let mut sim = Simulation::default();
        sim.register_system(
            Attrition { damage: 3 },
            SystemPhase::Update,
            SystemPriority::Normal,
        );
        sim.register_system(
            Graveyard::default(),
            SystemPhase::PostUpdate,
            SystemPriority::Normal,
        );
        let weak = spawn_unit(&sim, "militia", 3, GridPosition::new(2, 2));
        let strong = spawn_unit(&sim, "guard", 10, GridPosition::new(2, 2));

        let paid = execution_log();
        record_events(sim.events(), &paid, |e: &BountyPaid| e.amount.to_string());

        sim.tick();

        assert!(sim.entities().entity(weak).is_none());
        assert_eq!(
            sim.entities().entities_at_position(GridPosition::new(2, 2)),
            vec![strong]
        );
        assert_eq!(entries(&paid), vec!["10"]);
        assert_eq!(sim.events().queued_len(), 0);
    }

    #[test]
    fn shutdown_unsubscribes_system_handlers() {
        let mut sim = Simulation::default();
        sim.register_system(
            Graveyard::default(),
            SystemPhase::PostUpdate,
            SystemPriority::Normal,
        );
        assert_eq!(sim.events().subscriber_count::<UnitDestroyed>(), 1);

        sim.shutdown();

        assert_eq!(sim.events().subscriber_count::<UnitDestroyed>(), 0);
    }

    #[test]
    fn state_toggles_switch_systems_between_ticks() {
        let log = execution_log();
        let mut sim = Simulation::default();
        sim.register_system(
            Production::new(&log),
            SystemPhase::Update,
            SystemPriority::Normal,
        );
        sim.register_system(
            BattleSystem::new(&log),
            SystemPhase::Update,
            SystemPriority::High,
        );
        sim.scheduler().disable_system::<BattleSystem>();
        sim.state_machine().set_toggle(
            GameState::Playing,
            SystemToggle::new().enable::<Production>().disable::<BattleSystem>(),
        );
        sim.state_machine().set_toggle(
            GameState::Battle,
            SystemToggle::new().enable::<BattleSystem>().disable::<Production>(),
        );
        sim.state_machine().set_toggle(
            GameState::Paused,
            SystemToggle::new().disable::<Production>(),
        );
        sim.new_game();
        log.borrow_mut().clear();

        sim.tick();
        sim.change_state(GameState::Battle);
        sim.tick();
        sim.change_state(GameState::Playing);
        sim.tick();
        sim.change_state(GameState::Paused);
        sim.tick();

        assert_eq!(
            entries(&log),
            vec!["Production", "BattleSystem", "Production"]
        );
    }

    #[test]
    fn faulty_system_never_stops_the_tick() {
        init_tracing();
        let log = execution_log();
        let mut sim = Simulation::new(CoreConfig::default().with_profiling(true));
        let mut broken = Resources::new(&log);
        broken.panic_execute = true;
        sim.register_system(broken, SystemPhase::PreUpdate, SystemPriority::Critical);
        sim.register_system(
            Research::failing_execute(&log),
            SystemPhase::Update,
            SystemPriority::Normal,
        );
        sim.register_system(
            Upkeep::new(&log),
            SystemPhase::PostUpdate,
            SystemPriority::Normal,
        );
        log.borrow_mut().clear();

        for _ in 0..3 {
            sim.tick();
        }

        assert_eq!(
            entries(&log),
            vec![
                "Resources",
                "Research",
                "Upkeep",
                "Resources",
                "Research",
                "Upkeep",
                "Resources",
                "Research",
                "Upkeep",
            ]
        );
        let research = sim.scheduler().system_info::<Research>().unwrap();
        assert!(research.enabled);
        assert_eq!(research.stats.fault_count, 3);
        assert_eq!(research.stats.execution_count, 3);
    }

    #[test]
    fn failed_init_is_visible_and_recoverable_through_reset() {
        let log = execution_log();
        let sim = Simulation::default();
        let handle = sim.register_system(
            Research::failing_init(&log),
            SystemPhase::Update,
            SystemPriority::Normal,
        );
        assert!(!handle.info().unwrap().enabled);

        handle.with(|r| r.fail_init = false);
        sim.scheduler().reset_all_systems();
        sim.scheduler().enable_system::<Research>();

        let info = handle.info().unwrap();
        assert!(info.initialized);
        assert!(info.enabled);
        assert_eq!(
            entries(&log),
            vec!["Research:init", "Research:cleanup", "Research:init"]
        );
    }

    #[test]
    fn new_game_clears_previous_entities() {
        let mut sim = Simulation::default();
        sim.new_game();
        let first = spawn_unit(&sim, "old", 1, GridPosition::new(0, 0));

        sim.change_state(GameState::GameOver);
        sim.new_game();

        assert!(sim.entities().is_empty());
        let second = spawn_unit(&sim, "new", 1, GridPosition::new(0, 0));
        assert!(second > first);
    }

    #[test]
    fn system_can_drive_state_through_events() {
        /// Requests a battle once per tick.
        struct Skirmish;

        impl System for Skirmish {
            fn execute(&mut self, ctx: &ServiceContext) -> HookResult {
                ctx.events().queue_event(BattleRequested);
                Ok(())
            }
        }

        #[derive(Debug)]
        struct BattleRequested;
        impl GameEvent for BattleRequested {}

        let log: ExecutionLog = execution_log();
        let mut sim = Simulation::default();
        sim.register_system(Skirmish, SystemPhase::Update, SystemPriority::Normal);
        record_events(sim.events(), &log, describe_state);

        let requests = Rc::new(std::cell::Cell::new(0));
        let counter = Rc::clone(&requests);
        sim.events().subscribe(&handler(move |_: &BattleRequested| {
            counter.set(counter.get() + 1);
            Ok(())
        }));
        sim.new_game();

        sim.tick();
        if requests.get() > 0 {
            sim.change_state(GameState::Battle);
        }

        assert_eq!(sim.state(), GameState::Battle);
        assert_eq!(
            entries(&log),
            vec![
                "Initializing->Playing",
                "MainMenu->Initializing",
                "Playing->Battle",
            ]
        );
    }

    #[test]
    fn handler_error_in_state_event_is_contained() {
        let sim = Simulation::default();
        sim.events()
            .subscribe(&handler(|_: &StateChanged| Err(HookError::failed("ui missing"))));

        sim.change_state(GameState::Paused);

        assert_eq!(sim.state(), GameState::Paused);
    }
}

// =============================================================================
// Entity Lifecycle
// =============================================================================

mod entity_tests {
    use super::*;

    #[test]
    fn destroyed_entities_leave_no_trace() {
        let sim = Simulation::default();
        let ids: Vec<_> = (0..6)
            .map(|i| spawn_unit(&sim, "unit", 5, GridPosition::new(i, 0)))
            .collect();

        for id in ids.iter().step_by(2) {
            assert!(sim.entities_mut().destroy_entity(*id));
        }

        let entities = sim.entities();
        for id in ids.iter().step_by(2) {
            assert!(entities.entity(*id).is_none());
            for kind in entities.indexed_kinds() {
                assert!(!entities.entities_with_component(kind).contains(id));
            }
        }
        assert_eq!(entities.entities_with::<Health>().len(), 3);
    }
}
