//! Handler registry seam
//!
//! The dispatcher does not own handlers. It asks a [`HandlerRegistry`] for a
//! fresh [`ResolutionScope`] per event and resolves every handler for the
//! event's contract inside that scope. Scopes are released when dropped.

use crate::handler::{HandlerContract, HandlerInstance};

/// Source of handler instances
pub trait HandlerRegistry: Send + Sync {
    /// Open a new resolution scope
    ///
    /// Must be safe to call concurrently and return an independent scope per call.
    fn create_scope(&self) -> Result<Box<dyn ResolutionScope>, RegistryError>;
}

/// Bounded lookup context for one event's processing
///
/// Implementations release whatever the scope holds in `Drop`.
pub trait ResolutionScope: Send + Sync {
    /// All handlers registered for `contract`, in registry order
    ///
    /// `None` entries stand for registrations that produced no instance.
    fn resolve_all(
        &self,
        contract: &HandlerContract,
    ) -> Result<Vec<Option<HandlerInstance>>, RegistryError>;

    /// Identifier used in logs
    fn scope_id(&self) -> u64 {
        0
    }
}

/// Registry errors
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Resolution scope unavailable: {0}")]
    ScopeUnavailable(String),

    #[error("Failed to resolve handlers for {contract}: {reason}")]
    ResolutionFailed { contract: String, reason: String },

    #[error("Handler {handler} does not implement {expected} (registered as {actual})")]
    ContractMismatch {
        handler: String,
        expected: String,
        actual: String,
    },
}

impl RegistryError {
    pub fn resolution_failed(contract: &HandlerContract, reason: impl Into<String>) -> Self {
        Self::ResolutionFailed {
            contract: contract.name().to_string(),
            reason: reason.into(),
        }
    }
}
