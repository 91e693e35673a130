//! Scoped handler registry for Courier
//!
//! A small dependency-injection style registry that supplies handler
//! instances to the event dispatcher. Every dispatched event gets its own
//! [`RegistryScope`]; scoped handlers live exactly as long as that scope.
//!
//! ## Lifetimes
//!
//! | Lifetime | Instances |
//! |---|---|
//! | `Singleton` | one, shared by every scope |
//! | `Scoped` | one per scope, created on first resolve |
//! | `Transient` | one per resolve |
//!
//! ## Example
//!
//! ```rust,ignore
//! use courier_registry::ServiceRegistry;
//!
//! let registry = ServiceRegistry::builder()
//!     .singleton::<OrderPlaced, _>(AuditTrail::new())
//!     .scoped::<OrderPlaced, _, _>(|| ReserveStock::new(pool.clone()))
//!     .build();
//!
//! let dispatcher = EventDispatcher::new(Arc::new(registry.clone()));
//! ```

mod registry;
mod scope;

pub use registry::{Lifetime, ServiceRegistry, ServiceRegistryBuilder};
pub use scope::RegistryScope;
