//! Fault boundaries around user code.
//!
//! Every call into a system hook or event handler goes through [`contain`],
//! which folds both returned errors and panics into a [`HookError`]. The
//! caller decides what the fault means: the scheduler disables a system whose
//! init failed, while runtime faults are only logged and counted.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::error::{HookError, HookResult};

/// Classification of contained faults, used as a structured log field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// A system kind was registered twice. The first registration wins.
    RegistrationConflict,
    /// A system's init hook failed. The system is disabled but stays registered.
    InitializationFailure,
    /// A system's execute hook, an event handler or a state hook failed.
    /// Nothing is disabled.
    RuntimeExecutionFault,
    /// A system's cleanup hook failed. Logged only.
    CleanupFault,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RegistrationConflict => write!(f, "registration_conflict"),
            Self::InitializationFailure => write!(f, "initialization_failure"),
            Self::RuntimeExecutionFault => write!(f, "runtime_execution_fault"),
            Self::CleanupFault => write!(f, "cleanup_fault"),
        }
    }
}

/// Runs `hook`, converting a panic into [`HookError::Panicked`].
///
/// Unwind safety is asserted: the core's own state is only touched through
/// `Cell`/`RefCell`, whose borrows are released during unwinding.
pub fn contain<F>(hook: F) -> HookResult
where
    F: FnOnce() -> HookResult,
{
    match panic::catch_unwind(AssertUnwindSafe(hook)) {
        Ok(result) => result,
        Err(payload) => Err(HookError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
