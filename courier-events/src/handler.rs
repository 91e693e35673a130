//! Handler contract and the erased handler values a registry hands out

use crate::event::{Event, EventKind};
use async_trait::async_trait;
use std::any::{Any, TypeId};
use std::fmt::{self, Debug};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Event handler contract for one event type
///
/// Any number of handlers may implement the contract for the same event type.
#[async_trait]
pub trait EventHandler<E: Event>: Send + Sync {
    /// Handle the event
    async fn handle(&self, event: &E, cancel: &CancellationToken) -> Result<(), HandlerError>;

    /// Name used in logs
    fn handler_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Error raised by a handler
///
/// The dispatcher never constructs these; it only passes them through.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("Handler failed: {0}")]
    HandlerFailed(String),

    #[error("Event processing error: {0}")]
    ProcessingError(String),

    #[error("Handler observed cancellation")]
    Cancelled,

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
    /// Wrap any error type
    pub fn other<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Other(Box::new(error))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Runtime descriptor of the contract `dyn EventHandler<E>`
///
/// This is the key registries look handlers up by.
#[derive(Clone, Copy)]
pub struct HandlerContract {
    id: TypeId,
    name: &'static str,
    event: EventKind,
}

impl HandlerContract {
    pub fn of<E: Event>() -> Self {
        Self {
            id: TypeId::of::<dyn EventHandler<E>>(),
            name: std::any::type_name::<dyn EventHandler<E>>(),
            event: EventKind::of::<E>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Event kind the contract is parameterized by
    pub fn event_kind(&self) -> EventKind {
        self.event
    }
}

impl PartialEq for HandlerContract {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for HandlerContract {}

impl Hash for HandlerContract {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Debug for HandlerContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HandlerContract").field(&self.name).finish()
    }
}

impl fmt::Display for HandlerContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Erased handler value resolved from a registry
///
/// Holds an `Arc<dyn EventHandler<E>>` behind `dyn Any` together with the
/// contract it was registered under.
#[derive(Clone)]
pub struct HandlerInstance {
    inner: Arc<dyn Any + Send + Sync>,
    contract: HandlerContract,
    name: &'static str,
}

impl HandlerInstance {
    /// Erase a concrete handler
    pub fn new<E, H>(handler: H) -> Self
    where
        E: Event,
        H: EventHandler<E> + 'static,
    {
        Self::from_shared::<E>(Arc::new(handler))
    }

    /// Erase an already shared handler
    pub fn from_shared<E: Event>(handler: Arc<dyn EventHandler<E>>) -> Self {
        let name = handler.handler_name();
        Self {
            inner: Arc::new(handler),
            contract: HandlerContract::of::<E>(),
            name,
        }
    }

    /// Contract the handler was registered under
    pub fn contract(&self) -> HandlerContract {
        self.contract
    }

    pub fn handler_name(&self) -> &'static str {
        self.name
    }

    /// Narrow back to the typed contract
    pub fn downcast<E: Event>(&self) -> Option<Arc<dyn EventHandler<E>>> {
        self.inner
            .downcast_ref::<Arc<dyn EventHandler<E>>>()
            .cloned()
    }

    /// Whether two instances share the same handler allocation
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Debug for HandlerInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerInstance")
            .field("handler", &self.name)
            .field("contract", &self.contract)
            .finish()
    }
}
