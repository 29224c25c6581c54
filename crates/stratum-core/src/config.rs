//! Host-supplied settings for a [`Simulation`](crate::simulation::Simulation).
//!
//! Every field has a default, so a partial document deserializes cleanly:
//!
//! ```
//! use stratum_core::config::CoreConfig;
//!
//! let config: CoreConfig = serde_json::from_str(r#"{ "starting_turn": 5 }"#).unwrap();
//! assert_eq!(config.starting_turn, 5);
//! assert!(!config.profiling);
//! ```

use serde::{Deserialize, Serialize};

/// Settings applied when a simulation is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Record per-system durations and execution counts.
    pub profiling: bool,
    /// Turn number of a new game.
    pub starting_turn: u32,
    /// Whether new-game setup runs the Initialization phase.
    pub run_initialization_phase_on_setup: bool,
}

impl CoreConfig {
    /// Sets [`profiling`](Self::profiling).
    #[must_use]
    pub fn with_profiling(mut self, profiling: bool) -> Self {
        self.profiling = profiling;
        self
    }

    /// Sets [`starting_turn`](Self::starting_turn).
    #[must_use]
    pub fn with_starting_turn(mut self, turn: u32) -> Self {
        self.starting_turn = turn;
        self
    }

    /// Sets [`run_initialization_phase_on_setup`](Self::run_initialization_phase_on_setup).
    #[must_use]
    pub fn with_initialization_phase_on_setup(mut self, run: bool) -> Self {
        self.run_initialization_phase_on_setup = run;
        self
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            profiling: false,
            starting_turn: 1,
            run_initialization_phase_on_setup: true,
        }
    }
}
