//! Typed in-process domain event dispatch for Courier
//!
//! Delivers each domain event to every handler registered for its exact
//! runtime type. Events travel as `Arc<dyn Event>`; handlers are written
//! against `EventHandler<E>` for a concrete `E`. The gap between the two is
//! bridged once per event kind by the resolution cache and once per
//! invocation by a small typed wrapper.
//!
//! ## Features
//!
//! - **Open event set** - no central enum of event types
//! - **Typed handlers** - handlers never see `dyn Any`
//! - **Cached resolution** - contract derivation happens once per kind
//! - **Scoped lookups** - one registry scope per dispatched event
//! - **Cancellation** - honoured before every event and every handler
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use courier_events::*;
//! use async_trait::async_trait;
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Debug)]
//! struct UserRegistered {
//!     email: String,
//! }
//!
//! impl Event for UserRegistered {}
//!
//! struct WelcomeEmail;
//!
//! #[async_trait]
//! impl EventHandler<UserRegistered> for WelcomeEmail {
//!     async fn handle(
//!         &self,
//!         event: &UserRegistered,
//!         _cancel: &CancellationToken,
//!     ) -> Result<(), HandlerError> {
//!         println!("Sending welcome email to {}", event.email);
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), DispatchError> {
//!     let registry = courier_registry::ServiceRegistry::new();
//!     registry.register_singleton::<UserRegistered, _>(WelcomeEmail);
//!
//!     let dispatcher = EventDispatcher::new(Arc::new(registry));
//!
//!     let mut pending = PendingEvents::new();
//!     pending.raise(UserRegistered { email: "alice@example.com".into() });
//!
//!     dispatcher.dispatch(pending.take(), &CancellationToken::new()).await
//! }
//! ```
//!
//! ## Error Handling
//!
//! The first failing handler ends the call and its error is returned as
//! `DispatchError::Handler`. Nothing is retried or aggregated.
//!
//! ```rust,ignore
//! match dispatcher.dispatch(events, &cancel).await {
//!     Ok(()) => {}
//!     Err(e) if e.is_cancelled() => println!("dispatch abandoned"),
//!     Err(e) => eprintln!("dispatch failed: {}", e),
//! }
//! ```

pub mod dispatcher;
pub mod error;
pub mod event;
pub mod handler;
pub mod registry;
pub mod resolution;
pub mod wrapper;

pub use dispatcher::{DispatcherConfig, EventDispatcher, EventDispatcherBuilder};
pub use error::DispatchError;
pub use event::{ErasedEvent, Event, EventKind, EventMetadata, PendingEvents};
pub use handler::{EventHandler, HandlerContract, HandlerError, HandlerInstance};
pub use registry::{HandlerRegistry, RegistryError, ResolutionScope};
pub use resolution::{KindBinding, MonomorphicDeriver, ResolutionCache, TypeDeriver};
pub use wrapper::{InvocationWrapper, TypedInvocationWrapper, WrapperFactory, WrapperType};

pub use tokio_util::sync::CancellationToken;
