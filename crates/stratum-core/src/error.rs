//! Error types.
//!
//! Faults raised by user code (system hooks, event handlers, state hooks) are
//! [`HookError`]s. They are always contained by the caller and never
//! propagate out of the core. [`ComponentError`] reports misuse of the
//! component attachment API.

use thiserror::Error;

use crate::entity::{ComponentKind, EntityId};

/// Failure reported by a system hook, event handler or state hook.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
    /// The hook returned an error.
    #[error("{0}")]
    Failed(String),
    /// The hook panicked. Carries the panic message when it was a string.
    #[error("panicked: {0}")]
    Panicked(String),
}

impl HookError {
    /// Creates a [`HookError::Failed`] from any message.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Returns `true` if the hook panicked rather than returning an error.
    #[must_use]
    pub const fn is_panic(&self) -> bool {
        matches!(self, Self::Panicked(_))
    }
}

/// Result type returned by every hook.
pub type HookResult = Result<(), HookError>;

/// Misuse of the component attachment API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComponentError {
    /// The target entity is not alive in the registry.
    #[error("entity {0} does not exist")]
    UnknownEntity(EntityId),
    /// A second instance of a singleton component kind was attached.
    #[error("entity {entity} already has a {kind} component")]
    AlreadyAttached {
        /// Entity the component was offered to.
        entity: EntityId,
        /// Kind of the rejected component.
        kind: ComponentKind,
    },
}
