//! Entity registry: entity lifecycle and per-kind component indices.
//!
//! The registry is the arena holding every entity in a game. It provides:
//! - Entity storage with deterministic iteration order (`BTreeMap`)
//! - A component-kind index answering "which entities hold kind K?"
//! - Entity lifecycle management (create/destroy/clear)
//!
//! # Index Synchronization
//!
//! The kind index is not discovered from entities; it is maintained on every
//! attach and detach. [`EntityRegistry::add_component`] and
//! [`EntityRegistry::remove_component`] do this for you. Components attached
//! by an external factory must be announced with
//! [`EntityRegistry::register_component_for_entity`] and withdrawn with
//! [`EntityRegistry::unregister_component_for_entity`].
//!
//! # Example
//!
//! ```
//! use stratum_core::entity::components::{GridPosition, Health};
//! use stratum_core::entity::ComponentKind;
//! use stratum_core::registry::EntityRegistry;
//!
//! let mut registry = EntityRegistry::new();
//! let tank = registry.create_entity("tank");
//! let depot = registry.create_entity("depot");
//! registry.add_component(tank, GridPosition::new(4, 4)).unwrap();
//! registry.add_component(tank, Health::new(80)).unwrap();
//! registry.add_component(depot, GridPosition::new(4, 4)).unwrap();
//!
//! let armed = registry.entities_with_components(&[
//!     ComponentKind::of::<GridPosition>(),
//!     ComponentKind::of::<Health>(),
//! ]);
//! assert_eq!(armed, vec![tank]);
//! assert_eq!(registry.entities_at_position(GridPosition::new(4, 4)), vec![tank, depot]);
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::{debug, trace};

use crate::entity::components::GridPosition;
use crate::entity::{Component, ComponentKind, Entity, EntityId};
use crate::error::ComponentError;
use crate::type_tag::AsAny;

/// Arena of entities plus a component-kind index.
///
/// # Determinism
///
/// Entities are stored in a `BTreeMap` and index sets are `BTreeSet`s, so
/// every multi-entity query returns ids in ascending order. Ids are assigned
/// monotonically starting at 1 and are never reused, not even after
/// [`clear_all_entities`](Self::clear_all_entities).
#[derive(Debug)]
pub struct EntityRegistry {
    /// Next id to hand out.
    next_id: u64,
    /// Entity storage with deterministic iteration order.
    entities: BTreeMap<EntityId, Entity>,
    /// Kind -> ids of live entities holding at least one component of that kind.
    ///
    /// A kind with no holders has no entry.
    index: HashMap<ComponentKind, BTreeSet<EntityId>>,
}

impl EntityRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: 1,
            entities: BTreeMap::new(),
            index: HashMap::new(),
        }
    }

    /// Creates an entity with no components.
    ///
    /// `label` is a descriptive kind label ("infantry", "city") kept for
    /// logs and debugging. Never fails.
    pub fn create_entity(&mut self, label: impl Into<String>) -> EntityId {
        let id = EntityId::new(self.next_id);
        self.next_id += 1;

        let entity = Entity::new(id, label);
        trace!(entity = %id, label = entity.label(), "entity created");
        self.entities.insert(id, entity);
        id
    }

    /// Destroys an entity, cleaning up its components and purging it from
    /// every kind index.
    ///
    /// Returns `false` if the id is unknown.
    pub fn destroy_entity(&mut self, id: EntityId) -> bool {
        let Some(mut entity) = self.entities.remove(&id) else {
            trace!(entity = %id, "destroy ignored: unknown entity");
            return false;
        };

        // Walk the index, not the entity: kinds announced through
        // `register_component_for_entity` have no attached instance.
        self.index.retain(|_, holders| {
            holders.remove(&id);
            !holders.is_empty()
        });
        entity.cleanup_all();
        trace!(entity = %id, "entity destroyed");
        true
    }

    /// Attaches a component and indexes it.
    ///
    /// The component's `initialize` hook runs before it becomes visible.
    ///
    /// # Errors
    ///
    /// - [`ComponentError::UnknownEntity`] if `id` is not alive
    /// - [`ComponentError::AlreadyAttached`] if `T` is singleton-per-entity
    ///   and the entity already holds one
    pub fn add_component<T: Component>(
        &mut self,
        id: EntityId,
        component: T,
    ) -> Result<(), ComponentError> {
        let kind = ComponentKind::of::<T>();
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(ComponentError::UnknownEntity(id))?;

        if !T::multi_instance() && entity.has_component(kind) {
            return Err(ComponentError::AlreadyAttached { entity: id, kind });
        }

        entity.attach(kind, Box::new(component));
        self.register_component_for_entity(kind, id);
        Ok(())
    }

    /// Detaches the first `T` from an entity and returns it.
    ///
    /// The entity is removed from `T`'s index once no instance remains.
    pub fn remove_component<T: Component>(&mut self, id: EntityId) -> Option<T> {
        let kind = ComponentKind::of::<T>();
        let entity = self.entities.get_mut(&id)?;
        let detached = entity.detach_first(kind)?;
        let still_held = entity.has_component(kind);

        if !still_held {
            self.unregister_component_for_entity(kind, id);
        }

        <dyn Component as AsAny>::into_any(detached)
            .downcast::<T>()
            .ok()
            .map(|boxed| *boxed)
    }

    /// Detaches every `T` from an entity. Returns how many were removed.
    pub fn remove_components<T: Component>(&mut self, id: EntityId) -> usize {
        let kind = ComponentKind::of::<T>();
        let Some(entity) = self.entities.get_mut(&id) else {
            return 0;
        };
        let removed = entity.detach_all(kind);
        if removed > 0 {
            self.unregister_component_for_entity(kind, id);
        }
        removed
    }

    /// Records that entity `id` holds a component of `kind`.
    ///
    /// Returns `false` (and records nothing) if the entity is not alive.
    /// Idempotent.
    pub fn register_component_for_entity(&mut self, kind: ComponentKind, id: EntityId) -> bool {
        if !self.entities.contains_key(&id) {
            debug!(entity = %id, component = %kind, "index registration ignored: unknown entity");
            return false;
        }
        self.index.entry(kind).or_default().insert(id);
        true
    }

    /// Records that entity `id` no longer holds a component of `kind`.
    ///
    /// Returns `false` if the entity was not indexed under `kind`.
    pub fn unregister_component_for_entity(&mut self, kind: ComponentKind, id: EntityId) -> bool {
        self.unindex(kind, id)
    }

    fn unindex(&mut self, kind: ComponentKind, id: EntityId) -> bool {
        let Some(holders) = self.index.get_mut(&kind) else {
            return false;
        };
        let removed = holders.remove(&id);
        if holders.is_empty() {
            self.index.remove(&kind);
        }
        removed
    }

    /// Returns a reference to an entity by ID.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Returns a mutable reference to an entity by ID.
    ///
    /// Component data can be edited through it; attaching and detaching must
    /// go through the registry.
    #[must_use]
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Returns `true` if the entity is alive.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Ids of entities holding at least one component of `kind`, ascending.
    #[must_use]
    pub fn entities_with_component(&self, kind: ComponentKind) -> Vec<EntityId> {
        self.index
            .get(&kind)
            .map(|holders| holders.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Typed form of [`entities_with_component`](Self::entities_with_component).
    #[must_use]
    pub fn entities_with<T: Component>(&self) -> Vec<EntityId> {
        self.entities_with_component(ComponentKind::of::<T>())
    }

    /// Ids of entities holding every listed kind, ascending.
    ///
    /// Empty if any kind has no holders, or if `kinds` is empty.
    #[must_use]
    pub fn entities_with_components(&self, kinds: &[ComponentKind]) -> Vec<EntityId> {
        let mut sets = Vec::with_capacity(kinds.len());
        for kind in kinds {
            match self.index.get(kind) {
                Some(holders) => sets.push(holders),
                None => return Vec::new(),
            }
        }

        // Walk the smallest set, check membership in the others.
        sets.sort_by_key(|holders| holders.len());
        let Some((smallest, rest)) = sets.split_first() else {
            return Vec::new();
        };
        smallest
            .iter()
            .copied()
            .filter(|id| rest.iter().all(|holders| holders.contains(id)))
            .collect()
    }

    /// Ids of entities whose [`GridPosition`] equals `pos`, ascending.
    ///
    /// Linear scan over position holders.
    #[must_use]
    pub fn entities_at_position(&self, pos: GridPosition) -> Vec<EntityId> {
        let Some(holders) = self.index.get(&ComponentKind::of::<GridPosition>()) else {
            return Vec::new();
        };
        holders
            .iter()
            .copied()
            .filter(|id| {
                self.entities
                    .get(id)
                    .and_then(Entity::component::<GridPosition>)
                    .is_some_and(|held| *held == pos)
            })
            .collect()
    }

    /// Iterates over all entities in ascending id order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.entities.values()
    }

    /// Iterates over all entity ids in ascending order.
    pub fn entity_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys().copied()
    }

    /// Returns the number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if no entity is alive.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Destroys every entity and empties the index.
    ///
    /// Component `cleanup` hooks run in ascending entity order. The id
    /// counter keeps counting.
    pub fn clear_all_entities(&mut self) {
        let count = self.entities.len();
        for entity in self.entities.values_mut() {
            entity.cleanup_all();
        }
        self.entities.clear();
        self.index.clear();
        debug!(count, "all entities cleared");
    }

    /// Returns the kinds that currently have at least one holder.
    #[must_use]
    pub fn indexed_kinds(&self) -> Vec<ComponentKind> {
        self.index.keys().copied().collect()
    }
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
