//! Explicit wiring of the shared services.
//!
//! A [`ServiceContext`] is handed to every system hook and every state hook.
//! It replaces process-wide singletons: whoever holds a context can reach the
//! entity registry, the event bus and the scheduler that owns it, and nothing
//! else is global.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::event::EventBus;
use crate::registry::EntityRegistry;
use crate::scheduler::SystemScheduler;

/// Cheap-to-clone handle to the registry, bus and scheduler.
///
/// The scheduler is held weakly so systems may keep a context without
/// forming a reference cycle with the scheduler that owns them.
#[derive(Clone)]
pub struct ServiceContext {
    entities: Rc<RefCell<EntityRegistry>>,
    events: Rc<EventBus>,
    scheduler: Weak<SystemScheduler>,
}

impl ServiceContext {
    /// Creates a context without a scheduler.
    ///
    /// The scheduler builds its own context from this one with
    /// [`with_scheduler`](Self::with_scheduler).
    #[must_use]
    pub fn new(entities: Rc<RefCell<EntityRegistry>>, events: Rc<EventBus>) -> Self {
        Self {
            entities,
            events,
            scheduler: Weak::new(),
        }
    }

    /// Creates a context over a fresh registry and bus.
    #[must_use]
    pub fn standalone() -> Self {
        Self::new(
            Rc::new(RefCell::new(EntityRegistry::new())),
            Rc::new(EventBus::new()),
        )
    }

    /// Returns a copy of this context bound to `scheduler`.
    #[must_use]
    pub fn with_scheduler(&self, scheduler: Weak<SystemScheduler>) -> Self {
        Self {
            entities: Rc::clone(&self.entities),
            events: Rc::clone(&self.events),
            scheduler,
        }
    }

    /// Borrows the entity registry.
    ///
    /// # Panics
    ///
    /// Panics if the registry is currently borrowed mutably.
    #[must_use]
    pub fn entities(&self) -> Ref<'_, EntityRegistry> {
        self.entities.borrow()
    }

    /// Borrows the entity registry mutably.
    ///
    /// Release the borrow before publishing events whose handlers touch
    /// entities.
    ///
    /// # Panics
    ///
    /// Panics if the registry is already borrowed.
    #[must_use]
    pub fn entities_mut(&self) -> RefMut<'_, EntityRegistry> {
        self.entities.borrow_mut()
    }

    /// Returns the shared registry handle.
    #[must_use]
    pub fn entity_registry(&self) -> &Rc<RefCell<EntityRegistry>> {
        &self.entities
    }

    /// Returns the event bus.
    #[must_use]
    pub fn events(&self) -> &Rc<EventBus> {
        &self.events
    }

    /// Returns the scheduler, if one is bound and still alive.
    #[must_use]
    pub fn scheduler(&self) -> Option<Rc<SystemScheduler>> {
        self.scheduler.upgrade()
    }
}

impl fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceContext")
            .field(
                "entities",
                &self.entities.try_borrow().map(|r| r.entity_count()).ok(),
            )
            .field("subscribed_events", &self.events.subscribed_kind_count())
            .field("has_scheduler", &(self.scheduler.strong_count() > 0))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_services() {
        let ctx = ServiceContext::standalone();
        let other = ctx.clone();

        let id = ctx.entities_mut().create_entity("city");

        assert!(other.entities().contains(id));
        assert!(Rc::ptr_eq(ctx.events(), other.events()));
    }

    #[test]
    fn standalone_has_no_scheduler() {
        let ctx = ServiceContext::standalone();
        assert!(ctx.scheduler().is_none());
    }

    #[test]
    fn scheduler_binding_is_weak() {
        let ctx = ServiceContext::standalone();
        let scheduler = SystemScheduler::new(&ctx);
        let bound = scheduler.context().clone();

        assert!(bound.scheduler().is_some());
        drop(scheduler);
        assert!(bound.scheduler().is_none());
    }
}
