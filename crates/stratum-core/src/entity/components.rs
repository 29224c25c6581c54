//! Component kinds the core itself relies on.
//!
//! Game-specific data (weapons, effects, production queues) lives with the
//! systems that own it. The core only needs a grid position for
//! [`EntityRegistry::entities_at_position`](crate::registry::EntityRegistry::entities_at_position),
//! plus identity and health, which nearly every unit and base carries.

use glam::IVec2;
use serde::{Deserialize, Serialize};

use super::Component;

/// Position of an entity on the strategy map grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPosition(pub IVec2);

impl GridPosition {
    /// Creates a position from grid coordinates.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self(IVec2::new(x, y))
    }

    /// Column.
    #[must_use]
    pub const fn x(self) -> i32 {
        self.0.x
    }

    /// Row.
    #[must_use]
    pub const fn y(self) -> i32 {
        self.0.y
    }
}

impl From<IVec2> for GridPosition {
    fn from(cell: IVec2) -> Self {
        Self(cell)
    }
}

impl Component for GridPosition {}

/// Display name and owning faction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Display name.
    pub name: String,
    /// Owning faction index.
    pub faction: u32,
}

impl Identity {
    /// Creates an identity.
    #[must_use]
    pub fn new(name: impl Into<String>, faction: u32) -> Self {
        Self {
            name: name.into(),
            faction,
        }
    }
}

impl Component for Identity {}

/// Hit points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// Remaining hit points.
    pub current: i32,
    /// Maximum hit points.
    pub max: i32,
}

impl Health {
    /// Creates full health with the given maximum.
    #[must_use]
    pub const fn new(max: i32) -> Self {
        Self { current: max, max }
    }

    /// Returns `true` once hit points reach zero.
    #[must_use]
    pub const fn is_depleted(&self) -> bool {
        self.current <= 0
    }

    /// Lowers hit points, never below zero.
    pub fn damage(&mut self, amount: i32) {
        self.current = (self.current - amount).max(0);
    }

    /// Raises hit points, never above the maximum.
    pub fn heal(&mut self, amount: i32) {
        self.current = (self.current + amount).min(self.max);
    }
}

impl Component for Health {}
