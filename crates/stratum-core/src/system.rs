//! The system contract and the vocabulary the scheduler uses to order systems.
//!
//! A system is a unit of behavior registered into one [`SystemPhase`] with a
//! [`SystemPriority`]. It exposes three hooks, each receiving the shared
//! [`ServiceContext`] instead of reaching for globals.
//!
//! # Example
//!
//! ```
//! use stratum_core::context::ServiceContext;
//! use stratum_core::error::HookResult;
//! use stratum_core::system::{System, SystemKind};
//!
//! #[derive(Default)]
//! struct UpkeepSystem {
//!     ticks: u32,
//! }
//!
//! impl System for UpkeepSystem {
//!     fn execute(&mut self, _ctx: &ServiceContext) -> HookResult {
//!         self.ticks += 1;
//!         Ok(())
//!     }
//! }
//!
//! assert_eq!(SystemKind::of::<UpkeepSystem>().name(), "UpkeepSystem");
//! ```

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::context::ServiceContext;
use crate::error::HookResult;
use crate::type_tag::{short_type_name, AsAny};

// =============================================================================
// System Phase
// =============================================================================

/// Named stage of the per-tick schedule.
///
/// Phases run in declaration order. Only [`SystemPhase::TICK`] runs on every
/// host tick; the other three phases are driven by lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SystemPhase {
    /// Game setup, run when a new game initializes.
    Initialization,
    /// Before the main update.
    PreUpdate,
    /// Main per-tick logic.
    Update,
    /// After the main update.
    PostUpdate,
    /// Presentation, driven by the host's frame.
    Render,
    /// Teardown, run on shutdown.
    Cleanup,
}

impl SystemPhase {
    /// Every phase in execution order.
    pub const ALL: [Self; 6] = [
        Self::Initialization,
        Self::PreUpdate,
        Self::Update,
        Self::PostUpdate,
        Self::Render,
        Self::Cleanup,
    ];

    /// The phases run by each host tick, in order.
    pub const TICK: [Self; 3] = [Self::PreUpdate, Self::Update, Self::PostUpdate];

    /// Position of this phase in [`SystemPhase::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for SystemPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initialization => write!(f, "Initialization"),
            Self::PreUpdate => write!(f, "PreUpdate"),
            Self::Update => write!(f, "Update"),
            Self::PostUpdate => write!(f, "PostUpdate"),
            Self::Render => write!(f, "Render"),
            Self::Cleanup => write!(f, "Cleanup"),
        }
    }
}

// =============================================================================
// System Priority
// =============================================================================

/// Ordered tier within a phase. Lower tiers run earlier.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum SystemPriority {
    /// Runs first.
    Critical,
    /// Runs before normal systems.
    High,
    /// The default tier.
    #[default]
    Normal,
    /// Runs after normal systems.
    Low,
    /// Runs last.
    Lowest,
}

impl fmt::Display for SystemPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Critical => write!(f, "Critical"),
            Self::High => write!(f, "High"),
            Self::Normal => write!(f, "Normal"),
            Self::Low => write!(f, "Low"),
            Self::Lowest => write!(f, "Lowest"),
        }
    }
}

// =============================================================================
// System Kind
// =============================================================================

/// Identifier of a system type. A scheduler holds at most one system per kind.
///
/// Equality follows the Rust type; the short name breaks priority ties and
/// appears in logs.
#[derive(Clone, Copy)]
pub struct SystemKind {
    id: TypeId,
    name: &'static str,
}

impl SystemKind {
    /// Returns the kind of system type `S`.
    #[must_use]
    pub fn of<S: System>() -> Self {
        Self {
            id: TypeId::of::<S>(),
            name: short_type_name::<S>(),
        }
    }

    /// Returns the system type's name without its module path.
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.name
    }
}

impl PartialEq for SystemKind {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SystemKind {}

impl Hash for SystemKind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for SystemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SystemKind({})", self.name)
    }
}

impl fmt::Display for SystemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

// =============================================================================
// Stats and Info
// =============================================================================

/// Runtime statistics of a registered system.
///
/// `last_duration` and `execution_count` are only recorded while profiling is
/// on. `fault_count` is always recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SystemStats {
    /// Wall time of the most recent execute hook.
    pub last_duration: Duration,
    /// Number of profiled executions.
    pub execution_count: u64,
    /// Number of faulted execute hooks.
    pub fault_count: u64,
}

/// Snapshot of a registration, as returned by the scheduler's queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemInfo {
    /// The system's kind.
    pub kind: SystemKind,
    /// Phase the system runs in.
    pub phase: SystemPhase,
    /// Tier within the phase.
    pub priority: SystemPriority,
    /// Whether the system is in its phase's enabled set.
    pub enabled: bool,
    /// Whether the last init hook succeeded.
    pub initialized: bool,
    /// Runtime statistics.
    pub stats: SystemStats,
}

// =============================================================================
// System Trait
// =============================================================================

/// A unit of behavior hosted by the [`SystemScheduler`](crate::scheduler::SystemScheduler).
///
/// Every hook runs inside a fault boundary: returning an error or panicking
/// is logged and contained. A failing `initialize` disables the system; a
/// failing `execute` does not.
///
/// Hooks may call back into the scheduler through the context (enable or
/// disable other systems, look up another system), but a system cannot
/// reach itself re-entrantly while one of its own hooks is running.
pub trait System: AsAny {
    /// Called when the system is registered, and again on reset.
    ///
    /// # Errors
    ///
    /// An error leaves the system registered but disabled.
    fn initialize(&mut self, ctx: &ServiceContext) -> HookResult {
        let _ = ctx;
        Ok(())
    }

    /// Called once per pass of the system's phase while enabled.
    ///
    /// # Errors
    ///
    /// An error is logged and counted; the system stays enabled.
    fn execute(&mut self, ctx: &ServiceContext) -> HookResult;

    /// Called on reset and when all systems are torn down.
    ///
    /// # Errors
    ///
    /// An error is logged only.
    fn cleanup(&mut self, ctx: &ServiceContext) -> HookResult {
        let _ = ctx;
        Ok(())
    }
}
