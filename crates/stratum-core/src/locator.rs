//! Thread-local service locator for legacy call sites.
//!
//! New code receives a [`ServiceContext`] through its hooks. Code that cannot
//! be threaded a context yet may look one up here after the host installs it.
//! Nothing in this crate reads the locator.

use std::cell::RefCell;

use tracing::debug;

use crate::context::ServiceContext;

thread_local! {
    static INSTALLED: RefCell<Option<ServiceContext>> = const { RefCell::new(None) };
}

/// Installs `context` for the current thread, returning the one it replaces.
#[deprecated(note = "pass the ServiceContext to the code that needs it")]
pub fn install(context: ServiceContext) -> Option<ServiceContext> {
    debug!("service locator installed");
    INSTALLED.with(|slot| slot.borrow_mut().replace(context))
}

/// Returns a clone of the installed context, if any.
#[deprecated(note = "pass the ServiceContext to the code that needs it")]
#[must_use]
pub fn current() -> Option<ServiceContext> {
    INSTALLED.with(|slot| slot.borrow().clone())
}

/// Removes and returns the installed context.
#[deprecated(note = "pass the ServiceContext to the code that needs it")]
pub fn uninstall() -> Option<ServiceContext> {
    INSTALLED.with(|slot| slot.borrow_mut().take())
}
