//! Turn counter and the phase cycle within a turn.
//!
//! Each turn walks `Strategy -> Action -> Event -> Enemy -> Settlement`.
//! Advancing past `Settlement` starts the next turn instead of changing
//! phase, so that step publishes [`TurnStarted`] and no [`PhaseChanged`].

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::event::{EventBus, GameEvent};

// =============================================================================
// Turn Phase
// =============================================================================

/// Stage within a turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TurnPhase {
    /// Planning. Every turn starts here.
    #[default]
    Strategy,
    /// Player actions.
    Action,
    /// Random and scripted events.
    Event,
    /// Opponent moves.
    Enemy,
    /// End-of-turn bookkeeping. The last phase.
    Settlement,
}

impl TurnPhase {
    /// Every phase, in cycle order.
    pub const ALL: [Self; 5] = [
        Self::Strategy,
        Self::Action,
        Self::Event,
        Self::Enemy,
        Self::Settlement,
    ];

    /// The phase after this one within the same turn, or `None` after
    /// `Settlement`.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Strategy => Some(Self::Action),
            Self::Action => Some(Self::Event),
            Self::Event => Some(Self::Enemy),
            Self::Enemy => Some(Self::Settlement),
            Self::Settlement => None,
        }
    }
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strategy => write!(f, "Strategy"),
            Self::Action => write!(f, "Action"),
            Self::Event => write!(f, "Event"),
            Self::Enemy => write!(f, "Enemy"),
            Self::Settlement => write!(f, "Settlement"),
        }
    }
}

// =============================================================================
// Events
// =============================================================================

/// Published when a new turn begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnStarted {
    /// The new turn number.
    pub turn: u32,
    /// The phase the turn starts in.
    pub phase: TurnPhase,
}

impl GameEvent for TurnStarted {}

/// Published when the phase advances within a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseChanged {
    /// Phase that ended.
    pub previous: TurnPhase,
    /// Phase that began.
    pub current: TurnPhase,
}

impl GameEvent for PhaseChanged {}

// =============================================================================
// Turn Cycle
// =============================================================================

/// Turn counter plus current phase.
///
/// # New-turn flag
///
/// [`is_new_turn`](TurnCycle::is_new_turn) is raised by
/// [`next_turn`](TurnCycle::next_turn) and
/// [`set_current_turn`](TurnCycle::set_current_turn), and lowered only by the
/// next call to [`next_phase`](TurnCycle::next_phase). It stays raised for
/// everything that happens in between.
///
/// # Example
///
/// ```
/// use std::rc::Rc;
/// use stratum_core::event::EventBus;
/// use stratum_core::turn::{TurnCycle, TurnPhase};
///
/// let mut cycle = TurnCycle::new(Rc::new(EventBus::new()));
/// for _ in 0..5 {
///     cycle.next_phase();
/// }
/// assert_eq!(cycle.current_turn(), 2);
/// assert_eq!(cycle.current_phase(), TurnPhase::Strategy);
/// assert!(cycle.is_new_turn());
/// ```
pub struct TurnCycle {
    events: Rc<EventBus>,
    turn: u32,
    phase: TurnPhase,
    new_turn: bool,
}

impl TurnCycle {
    /// Creates a cycle at turn 1, `Strategy`, with the new-turn flag raised.
    #[must_use]
    pub fn new(events: Rc<EventBus>) -> Self {
        Self::starting_at(events, 1)
    }

    /// Creates a cycle at `turn`, `Strategy`, with the new-turn flag raised.
    #[must_use]
    pub fn starting_at(events: Rc<EventBus>, turn: u32) -> Self {
        Self {
            events,
            turn,
            phase: TurnPhase::Strategy,
            new_turn: true,
        }
    }

    /// Returns the turn counter.
    #[must_use]
    pub fn current_turn(&self) -> u32 {
        self.turn
    }

    /// Returns the current phase.
    #[must_use]
    pub fn current_phase(&self) -> TurnPhase {
        self.phase
    }

    /// Returns the new-turn flag.
    #[must_use]
    pub fn is_new_turn(&self) -> bool {
        self.new_turn
    }

    /// Sets the turn counter and raises the new-turn flag. The phase is kept
    /// and nothing is published.
    pub fn set_current_turn(&mut self, turn: u32) {
        self.turn = turn;
        self.new_turn = true;
    }

    /// Starts the next turn in `Strategy` and publishes [`TurnStarted`].
    ///
    /// The counter saturates at `u32::MAX`: past it, the turn restarts in
    /// `Strategy` without advancing the number, and a warning is logged.
    pub fn next_turn(&mut self) {
        self.turn = self.turn.checked_add(1).unwrap_or_else(|| {
            warn!(turn = self.turn, "turn counter saturated");
            u32::MAX
        });
        self.phase = TurnPhase::Strategy;
        self.new_turn = true;

        info!(turn = self.turn, "turn started");
        self.events.trigger_event(&TurnStarted {
            turn: self.turn,
            phase: self.phase,
        });
    }

    /// Advances one phase and publishes [`PhaseChanged`].
    ///
    /// From `Settlement` this calls [`next_turn`](Self::next_turn) instead,
    /// and no `PhaseChanged` is published.
    pub fn next_phase(&mut self) {
        self.new_turn = false;

        let previous = self.phase;
        let Some(next) = previous.next() else {
            self.next_turn();
            return;
        };

        self.phase = next;
        debug!(turn = self.turn, previous = %previous, current = %next, "turn phase changed");
        self.events.trigger_event(&PhaseChanged {
            previous,
            current: next,
        });
    }

    /// Returns to `Strategy` at `turn` with the new-turn flag raised, without
    /// publishing anything.
    pub fn reset(&mut self, turn: u32) {
        self.turn = turn;
        self.phase = TurnPhase::Strategy;
        self.new_turn = true;
    }
}

impl fmt::Debug for TurnCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TurnCycle")
            .field("turn", &self.turn)
            .field("phase", &self.phase)
            .field("new_turn", &self.new_turn)
            .finish_non_exhaustive()
    }
}
