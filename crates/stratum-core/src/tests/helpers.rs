//! Test helpers: recording systems, event recorders and log setup.
//!
//! Recording systems append to a shared [`ExecutionLog`]: `"Name"` for each
//! execute, `"Name:init"` and `"Name:cleanup"` for the other hooks. That
//! makes ordering assertions a plain comparison of string vectors.

use std::cell::RefCell;
use std::rc::Rc;

use tracing_subscriber::EnvFilter;

use crate::event::{handler, EventBus, GameEvent, Handler};

// =============================================================================
// Execution Log
// =============================================================================

/// Shared, append-only record of what ran.
pub(crate) type ExecutionLog = Rc<RefCell<Vec<String>>>;

/// Creates an empty log.
pub(crate) fn execution_log() -> ExecutionLog {
    Rc::new(RefCell::new(Vec::new()))
}

/// Returns a copy of the log's entries.
pub(crate) fn entries(log: &ExecutionLog) -> Vec<String> {
    log.borrow().clone()
}

// =============================================================================
// Recording Systems
// =============================================================================

/// Defines one test system per name. Each records its hooks into an
/// [`ExecutionLog`] and can be told to fail or panic.
///
/// ```ignore
/// recording_system!(Economy, Research);
/// let economy = Economy::failing_execute(&log);
/// ```
macro_rules! recording_system {
    ($($name:ident),+ $(,)?) => {
        $(
            #[allow(dead_code)]
            #[derive(Debug)]
            pub(crate) struct $name {
                log: $crate::tests::helpers::ExecutionLog,
                pub(crate) fail_init: bool,
                pub(crate) panic_init: bool,
                pub(crate) fail_execute: bool,
                pub(crate) panic_execute: bool,
                pub(crate) runs: u32,
                pub(crate) inits: u32,
                pub(crate) cleanups: u32,
            }

            #[allow(dead_code)]
            impl $name {
                pub(crate) fn new(log: &$crate::tests::helpers::ExecutionLog) -> Self {
                    Self {
                        log: ::std::rc::Rc::clone(log),
                        fail_init: false,
                        panic_init: false,
                        fail_execute: false,
                        panic_execute: false,
                        runs: 0,
                        inits: 0,
                        cleanups: 0,
                    }
                }

                pub(crate) fn failing_init(log: &$crate::tests::helpers::ExecutionLog) -> Self {
                    Self {
                        fail_init: true,
                        ..Self::new(log)
                    }
                }

                pub(crate) fn failing_execute(log: &$crate::tests::helpers::ExecutionLog) -> Self {
                    Self {
                        fail_execute: true,
                        ..Self::new(log)
                    }
                }

                fn record(&self, entry: String) {
                    self.log.borrow_mut().push(entry);
                }
            }

            impl $crate::system::System for $name {
                fn initialize(
                    &mut self,
                    _ctx: &$crate::context::ServiceContext,
                ) -> $crate::error::HookResult {
                    self.inits += 1;
                    self.record(format!("{}:init", stringify!($name)));
                    if self.panic_init {
                        panic!("{} init panicked", stringify!($name));
                    }
                    if self.fail_init {
                        return Err($crate::error::HookError::failed("init refused"));
                    }
                    Ok(())
                }

                fn execute(
                    &mut self,
                    _ctx: &$crate::context::ServiceContext,
                ) -> $crate::error::HookResult {
                    self.runs += 1;
                    self.record(stringify!($name).to_string());
                    if self.panic_execute {
                        panic!("{} execute panicked", stringify!($name));
                    }
                    if self.fail_execute {
                        return Err($crate::error::HookError::failed("execute refused"));
                    }
                    Ok(())
                }

                fn cleanup(
                    &mut self,
                    _ctx: &$crate::context::ServiceContext,
                ) -> $crate::error::HookResult {
                    self.cleanups += 1;
                    self.record(format!("{}:cleanup", stringify!($name)));
                    Ok(())
                }
            }
        )+
    };
}

pub(crate) use recording_system;

// =============================================================================
// Event Recording
// =============================================================================

/// Subscribes a handler that appends `describe(event)` to `log`.
///
/// The returned handler can be used to unsubscribe.
pub(crate) fn record_events<E, F>(bus: &EventBus, log: &ExecutionLog, describe: F) -> Handler<E>
where
    E: GameEvent,
    F: Fn(&E) -> String + 'static,
{
    let sink = Rc::clone(log);
    let recorder = handler(move |event: &E| {
        sink.borrow_mut().push(describe(event));
        Ok(())
    });
    bus.subscribe(&recorder);
    recorder
}

// =============================================================================
// Logging
// =============================================================================

/// Routes `tracing` output through the test harness. Honors `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs a subscriber.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
