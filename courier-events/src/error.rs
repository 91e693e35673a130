//! Dispatch errors

use crate::handler::HandlerError;
use crate::registry::RegistryError;

/// Error returned by a dispatch call
///
/// Handler and registry failures are carried as-is; the dispatcher never
/// aggregates or retries.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Dispatch cancelled")]
    Cancelled,

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Handler(#[from] HandlerError),

    #[error("Event of kind {actual} passed to wrapper for {expected}")]
    EventKindMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Registry returned an absent handler entry for {contract}")]
    AbsentHandler { contract: &'static str },
}

impl DispatchError {
    /// Whether the work was abandoned rather than failed
    ///
    /// True for the dispatcher's own cancellation and for handlers that
    /// report [`HandlerError::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Handler(error) => error.is_cancelled(),
            _ => false,
        }
    }

    /// The handler error, when a handler failed
    pub fn handler_error(&self) -> Option<&HandlerError> {
        match self {
            Self::Handler(error) => Some(error),
            _ => None,
        }
    }
}
