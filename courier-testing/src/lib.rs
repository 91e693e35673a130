//! Testing utilities for Courier
//!
//! - **CallTrace** - ordered log of handler invocations
//! - **ScriptedHandler** - records calls, then succeeds, fails, cancels or waits
//! - **ScriptedRegistry** - hands out fixed entries and counts scope releases
//! - **CountingDeriver** - counts resolution-cache derivations per event kind
//! - Sample events (`AccountOpened`, `FundsDeposited`, `AccountFrozen`)
//!
//! ```rust,ignore
//! use courier_testing::*;
//!
//! let trace = CallTrace::new();
//! let registry = ScriptedRegistry::new()
//!     .with::<AccountOpened, _>(ScriptedHandler::recording("H1", &trace))
//!     .with::<AccountOpened, _>(ScriptedHandler::failing("H2", &trace));
//!
//! let dispatcher = EventDispatcher::new(Arc::new(registry.clone()));
//! let err = dispatcher
//!     .dispatch(vec![erased(AccountOpened { seq: 1 })], &CancellationToken::new())
//!     .await
//!     .unwrap_err();
//!
//! assert_eq!(trace.labels(), vec!["H1(AccountOpened#1)", "H2(AccountOpened#1)"]);
//! assert_eq!(registry.open_scopes(), 0);
//! ```

pub mod events;
pub mod handlers;
pub mod registry;

pub use events::{AccountFrozen, AccountOpened, FundsDeposited, Labeled, erased};
pub use handlers::{Behavior, Call, CallTrace, ScriptedHandler};
pub use registry::{CountingDeriver, ScriptedRegistry};
