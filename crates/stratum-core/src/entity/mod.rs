//! Entity and component types.
//!
//! This module provides the core entity types:
//! - [`EntityId`]: Unique identifier for entities
//! - [`ComponentKind`]: Stable tag distinguishing categories of component data
//! - [`Component`]: Trait implemented by every piece of component data
//! - [`Entity`]: An identity with an unordered set of attached components
//!
//! # Architecture
//!
//! Entities live in an explicit arena, the
//! [`EntityRegistry`](crate::registry::EntityRegistry), and are addressed by
//! integer id. Components are boxed trait objects tagged with their
//! [`ComponentKind`]. Most kinds are singleton-per-entity; a kind opts into
//! multiple instances per entity through [`Component::multi_instance`].
//!
//! Attaching and detaching components always goes through the registry so
//! that its per-kind index mirrors what entities actually hold. An `&mut Entity`
//! obtained from the registry can mutate component data but cannot change
//! which components are attached.
//!
//! # Example
//!
//! ```
//! use stratum_core::entity::components::{GridPosition, Health};
//! use stratum_core::registry::EntityRegistry;
//!
//! let mut registry = EntityRegistry::new();
//! let scout = registry.create_entity("scout");
//! registry.add_component(scout, GridPosition::new(2, 3)).unwrap();
//! registry.add_component(scout, Health::new(40)).unwrap();
//!
//! let entity = registry.entity(scout).unwrap();
//! assert_eq!(entity.label(), "scout");
//! assert_eq!(entity.component::<Health>().map(|h| h.current), Some(40));
//! ```

pub mod components;

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::type_tag::{short_type_name, AsAny};

/// Unique identifier for an entity.
///
/// `EntityId` is a newtype wrapper around `u64`. The registry hands out ids
/// in increasing order starting at 1 and never reuses one.
///
/// # Ordering
///
/// Entity IDs are ordered by their numeric value, which is used to ensure
/// deterministic iteration order across all entities.
///
/// # Example
///
/// ```
/// use stratum_core::entity::EntityId;
///
/// let id1 = EntityId::new(1);
/// let id2 = EntityId::new(2);
///
/// assert!(id1 < id2);
/// assert_eq!(id1.as_u64(), 1);
/// ```
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Creates a new `EntityId` from a raw `u64` value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw `u64` value of this identifier.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}

impl From<EntityId> for u64 {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

/// Stable identifier for a category of component data.
///
/// Two kinds are equal when they name the same Rust type. The short type
/// name is carried for logs and error messages only.
#[derive(Clone, Copy)]
pub struct ComponentKind {
    id: TypeId,
    name: &'static str,
}

impl ComponentKind {
    /// Returns the kind of component type `T`.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: short_type_name::<T>(),
        }
    }

    /// Returns the component type's name without its module path.
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.name
    }
}

impl PartialEq for ComponentKind {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ComponentKind {}

impl Hash for ComponentKind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentKind({})", self.name)
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Data attached to an entity.
///
/// The lifecycle hooks are invoked by the owning entity: `initialize` when
/// the component is attached, `cleanup` when it is detached or its entity is
/// destroyed.
pub trait Component: AsAny {
    /// Called once when the component is attached to an entity.
    fn initialize(&mut self) {}

    /// Called once when the component is detached or its entity is destroyed.
    fn cleanup(&mut self) {}

    /// Whether an entity may hold more than one instance of this kind.
    ///
    /// Defaults to `false` (singleton-per-entity).
    fn multi_instance() -> bool
    where
        Self: Sized,
    {
        false
    }
}

struct Attached {
    kind: ComponentKind,
    component: Box<dyn Component>,
}

/// An identity with an unordered set of attached components.
///
/// Entities are created by and live inside an
/// [`EntityRegistry`](crate::registry::EntityRegistry).
pub struct Entity {
    id: EntityId,
    label: String,
    components: Vec<Attached>,
}

impl Entity {
    pub(crate) fn new(id: EntityId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            components: Vec::new(),
        }
    }

    /// Returns the entity's unique identifier.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Returns the descriptive label given at creation.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns `true` if at least one component of `kind` is attached.
    #[must_use]
    pub fn has_component(&self, kind: ComponentKind) -> bool {
        self.components.iter().any(|a| a.kind == kind)
    }

    /// Returns `true` if at least one `T` is attached.
    #[must_use]
    pub fn has<T: Component>(&self) -> bool {
        self.has_component(ComponentKind::of::<T>())
    }

    /// Returns the first attached `T`.
    #[must_use]
    pub fn component<T: Component>(&self) -> Option<&T> {
        self.components::<T>().next()
    }

    /// Returns the first attached `T` mutably.
    #[must_use]
    pub fn component_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.components_mut::<T>().next()
    }

    /// Iterates over every attached `T` in attachment order.
    pub fn components<T: Component>(&self) -> impl Iterator<Item = &T> + '_ {
        let kind = ComponentKind::of::<T>();
        self.components
            .iter()
            .filter(move |a| a.kind == kind)
            .filter_map(|a| (*a.component).as_any().downcast_ref::<T>())
    }

    /// Iterates mutably over every attached `T` in attachment order.
    pub fn components_mut<T: Component>(&mut self) -> impl Iterator<Item = &mut T> + '_ {
        let kind = ComponentKind::of::<T>();
        self.components
            .iter_mut()
            .filter(move |a| a.kind == kind)
            .filter_map(|a| (*a.component).as_any_mut().downcast_mut::<T>())
    }

    /// Returns the number of attached components of `kind`.
    #[must_use]
    pub fn count_of(&self, kind: ComponentKind) -> usize {
        self.components.iter().filter(|a| a.kind == kind).count()
    }

    /// Returns the distinct kinds attached, in first-attachment order.
    #[must_use]
    pub fn component_kinds(&self) -> Vec<ComponentKind> {
        let mut kinds: Vec<ComponentKind> = Vec::new();
        for attached in &self.components {
            if !kinds.contains(&attached.kind) {
                kinds.push(attached.kind);
            }
        }
        kinds
    }

    /// Returns the total number of attached components.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Attaches a component, running its `initialize` hook.
    pub(crate) fn attach(&mut self, kind: ComponentKind, mut component: Box<dyn Component>) {
        component.initialize();
        self.components.push(Attached { kind, component });
    }

    /// Detaches the first component of `kind`, running its `cleanup` hook.
    pub(crate) fn detach_first(&mut self, kind: ComponentKind) -> Option<Box<dyn Component>> {
        let position = self.components.iter().position(|a| a.kind == kind)?;
        let mut detached = self.components.remove(position).component;
        detached.cleanup();
        Some(detached)
    }

    /// Detaches every component of `kind`, running their `cleanup` hooks.
    pub(crate) fn detach_all(&mut self, kind: ComponentKind) -> usize {
        let before = self.components.len();
        self.components.retain_mut(|a| {
            if a.kind == kind {
                a.component.cleanup();
                false
            } else {
                true
            }
        });
        before - self.components.len()
    }

    /// Runs every component's `cleanup` hook. Called before the entity is dropped.
    pub(crate) fn cleanup_all(&mut self) {
        for attached in &mut self.components {
            attached.component.cleanup();
        }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("label", &self.label)
            .field(
                "components",
                &self.components.iter().map(|a| a.kind).collect::<Vec<_>>(),
            )
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
