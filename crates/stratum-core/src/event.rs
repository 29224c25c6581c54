//! Typed publish/subscribe with a deferred FIFO queue.
//!
//! Events are plain Rust types implementing [`GameEvent`]. Handlers are
//! reference-counted closures ([`Handler`]); the `Rc` doubles as the handle
//! used to unsubscribe, and subscribing the same `Rc` twice is ignored.
//!
//! # Delivery
//!
//! - [`EventBus::trigger_event`] dispatches synchronously, in subscription order.
//! - [`EventBus::queue_event`] buffers an event; [`EventBus::process_event_queue`]
//!   drains the buffer in waves until it is empty.
//!
//! Both paths go through the same dispatch routine: the handler list is
//! snapshotted before the first call, and every call runs inside a fault
//! boundary so a failing handler is logged and the next one still runs.
//!
//! # Example
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use stratum_core::event::{handler, EventBus, GameEvent};
//!
//! #[derive(Debug)]
//! struct CityFounded {
//!     population: u32,
//! }
//! impl GameEvent for CityFounded {}
//!
//! let bus = EventBus::new();
//! let total = Rc::new(Cell::new(0));
//! let sink = Rc::clone(&total);
//! let on_founded = handler(move |e: &CityFounded| {
//!     sink.set(sink.get() + e.population);
//!     Ok(())
//! });
//! bus.subscribe(&on_founded);
//!
//! bus.trigger_event(&CityFounded { population: 3 });
//! bus.queue_event(CityFounded { population: 4 });
//! assert_eq!(total.get(), 3);
//!
//! bus.process_event_queue();
//! assert_eq!(total.get(), 7);
//! ```

use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use tracing::{debug, error, trace};

use crate::error::{HookError, HookResult};
use crate::fault::{self, FaultKind};
use crate::type_tag::short_type_name;

/// Marker for types that can travel on the [`EventBus`].
pub trait GameEvent: Any + fmt::Debug {}

/// A subscribed event handler.
pub type Handler<E> = Rc<dyn Fn(&E) -> HookResult>;

/// Wraps a closure as a [`Handler`].
pub fn handler<E, F>(f: F) -> Handler<E>
where
    E: GameEvent,
    F: Fn(&E) -> HookResult + 'static,
{
    Rc::new(f)
}

/// Stable identifier of an event type.
#[derive(Clone, Copy)]
pub struct EventKind {
    id: TypeId,
    name: &'static str,
}

impl EventKind {
    /// Returns the kind of event type `E`.
    #[must_use]
    pub fn of<E: GameEvent>() -> Self {
        Self {
            id: TypeId::of::<E>(),
            name: short_type_name::<E>(),
        }
    }

    /// Returns the event type's name without its module path.
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.name
    }
}

impl PartialEq for EventKind {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventKind {}

impl Hash for EventKind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventKind({})", self.name)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

// =============================================================================
// Internals
// =============================================================================

type ErasedHandler = Rc<dyn Fn(&dyn Any) -> HookResult>;

struct Subscriber {
    /// Address of the typed handler's allocation.
    identity: *const (),
    call: ErasedHandler,
}

struct QueuedEvent {
    kind: EventKind,
    payload: Box<dyn Any>,
}

fn identity_of<E: GameEvent>(handler: &Handler<E>) -> *const () {
    Rc::as_ptr(handler).cast::<()>()
}

fn erase<E: GameEvent>(handler: &Handler<E>) -> ErasedHandler {
    let typed = Rc::clone(handler);
    Rc::new(move |payload: &dyn Any| match payload.downcast_ref::<E>() {
        Some(event) => typed(event),
        None => Err(HookError::failed(format!(
            "payload is not a {}",
            short_type_name::<E>()
        ))),
    })
}

/// Holds the drain flag for one wave.
struct DrainGuard<'a>(&'a Cell<bool>);

impl<'a> DrainGuard<'a> {
    fn engage(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

// =============================================================================
// Event Bus
// =============================================================================

/// Typed publish/subscribe plus a deferred FIFO queue.
///
/// All operations take `&self` so handlers holding the bus can subscribe,
/// unsubscribe and queue events while a dispatch is in flight.
pub struct EventBus {
    subscribers: RefCell<HashMap<EventKind, Vec<Subscriber>>>,
    queue: RefCell<VecDeque<QueuedEvent>>,
    draining: Cell<bool>,
}

impl EventBus {
    /// Creates a bus with no subscribers and an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: RefCell::new(HashMap::new()),
            queue: RefCell::new(VecDeque::new()),
            draining: Cell::new(false),
        }
    }

    /// Subscribes `handler` to events of type `E`.
    ///
    /// Returns `false` if this exact handler is already subscribed to `E`.
    pub fn subscribe<E: GameEvent>(&self, handler: &Handler<E>) -> bool {
        let kind = EventKind::of::<E>();
        let identity = identity_of(handler);

        let mut subscribers = self.subscribers.borrow_mut();
        let list = subscribers.entry(kind).or_default();
        if list.iter().any(|s| s.identity == identity) {
            debug!(event = %kind, "duplicate subscription ignored");
            return false;
        }
        list.push(Subscriber {
            identity,
            call: erase(handler),
        });
        trace!(event = %kind, subscribers = list.len(), "handler subscribed");
        true
    }

    /// Unsubscribes `handler` from events of type `E`.
    ///
    /// The kind's entry is dropped once its last handler leaves. Returns
    /// `false` if the handler was not subscribed.
    pub fn unsubscribe<E: GameEvent>(&self, handler: &Handler<E>) -> bool {
        let kind = EventKind::of::<E>();
        let identity = identity_of(handler);

        let mut subscribers = self.subscribers.borrow_mut();
        let Some(list) = subscribers.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|s| s.identity != identity);
        let removed = list.len() < before;
        if list.is_empty() {
            subscribers.remove(&kind);
        }
        removed
    }

    /// Dispatches `event` to every handler of `E`, synchronously.
    ///
    /// Handlers subscribed or unsubscribed during the dispatch do not change
    /// who receives this event.
    pub fn trigger_event<E: GameEvent>(&self, event: &E) {
        self.dispatch(EventKind::of::<E>(), event);
    }

    /// Appends `event` to the deferred queue.
    pub fn queue_event<E: GameEvent>(&self, event: E) {
        let kind = EventKind::of::<E>();
        let mut queue = self.queue.borrow_mut();
        queue.push_back(QueuedEvent {
            kind,
            payload: Box::new(event),
        });
        trace!(event = %kind, queued = queue.len(), "event queued");
    }

    /// Drains the deferred queue, including events queued while draining.
    ///
    /// Each wave dispatches exactly the events present when it started, in
    /// FIFO order; events queued by handlers land in the next wave. Waves
    /// repeat until the queue is empty. A call made while a wave is in
    /// progress returns immediately.
    pub fn process_event_queue(&self) {
        if self.draining.get() {
            trace!("nested queue drain ignored");
            return;
        }

        loop {
            let wave = self.queue.borrow().len();
            if wave == 0 {
                break;
            }

            let _guard = DrainGuard::engage(&self.draining);
            debug!(wave, "draining event wave");
            for _ in 0..wave {
                let next = self.queue.borrow_mut().pop_front();
                let Some(queued) = next else {
                    // Cleared by a handler.
                    break;
                };
                self.dispatch(queued.kind, &*queued.payload);
            }
        }
    }

    fn dispatch(&self, kind: EventKind, payload: &dyn Any) {
        let snapshot: Vec<ErasedHandler> = self
            .subscribers
            .borrow()
            .get(&kind)
            .map(|list| list.iter().map(|s| Rc::clone(&s.call)).collect())
            .unwrap_or_default();

        if snapshot.is_empty() {
            trace!(event = %kind, "no subscribers");
            return;
        }

        for (index, call) in snapshot.iter().enumerate() {
            if let Err(err) = fault::contain(|| call(payload)) {
                error!(
                    event = %kind,
                    handler = index,
                    fault = %FaultKind::RuntimeExecutionFault,
                    error = %err,
                    "event handler failed"
                );
            }
        }
    }

    /// Removes every handler of `E`.
    pub fn clear_event_handlers<E: GameEvent>(&self) {
        self.subscribers.borrow_mut().remove(&EventKind::of::<E>());
    }

    /// Removes every handler of every kind.
    pub fn clear_all_event_handlers(&self) {
        self.subscribers.borrow_mut().clear();
    }

    /// Drops every queued event without dispatching it.
    pub fn clear_event_queue(&self) {
        let dropped = {
            let mut queue = self.queue.borrow_mut();
            let len = queue.len();
            queue.clear();
            len
        };
        if dropped > 0 {
            debug!(dropped, "event queue cleared");
        }
    }

    /// Number of handlers subscribed to `E`.
    #[must_use]
    pub fn subscriber_count<E: GameEvent>(&self) -> usize {
        self.subscribers
            .borrow()
            .get(&EventKind::of::<E>())
            .map_or(0, Vec::len)
    }

    /// Number of event kinds with at least one handler.
    #[must_use]
    pub fn subscribed_kind_count(&self) -> usize {
        self.subscribers.borrow().len()
    }

    /// Number of events waiting in the queue.
    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Returns `true` while a queue wave is being dispatched.
    #[must_use]
    pub fn is_draining(&self) -> bool {
        self.draining.get()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribed_kinds", &self.subscribed_kind_count())
            .field("queued", &self.queued_len())
            .field("draining", &self.draining.get())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
