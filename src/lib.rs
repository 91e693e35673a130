// Courier - typed in-process domain event dispatch for Rust
//
// This library resolves the handlers registered for each event's concrete
// type from a scoped registry and invokes them one after another, with
// cooperative cancellation.

// Re-export core functionality
pub use courier_events::*;

// Re-export optional crates
#[cfg(feature = "registry")]
pub use courier_registry;

#[cfg(feature = "config")]
pub use courier_config;

#[cfg(feature = "log")]
pub use courier_log;

#[cfg(feature = "testing")]
pub use courier_testing;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        CancellationToken, DispatchError, DispatcherConfig, Event, EventDispatcher, EventHandler,
        EventKind, HandlerError, HandlerRegistry, PendingEvents, ResolutionScope,
    };

    #[cfg(feature = "registry")]
    pub use courier_registry::{Lifetime, ServiceRegistry};

    pub use async_trait::async_trait;
    pub use std::sync::Arc;
}
