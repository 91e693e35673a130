// Scripted registry and counting deriver

use courier_events::{
    Event, EventHandler, EventKind, HandlerContract, HandlerInstance, HandlerRegistry,
    KindBinding, MonomorphicDeriver, RegistryError, ResolutionScope, TypeDeriver,
};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type Entries = HashMap<HandlerContract, Vec<Option<HandlerInstance>>>;

#[derive(Default)]
struct ScriptState {
    entries: Mutex<Entries>,
    opened: AtomicU64,
    released: AtomicUsize,
    fail_scopes: AtomicBool,
    fail_resolution: AtomicBool,
}

/// Registry returning exactly the entries it was given
///
/// Lets tests return absent entries, fail scope creation or resolution,
/// and check that every scope was released.
#[derive(Clone, Default)]
pub struct ScriptedRegistry {
    state: Arc<ScriptState>,
}

impl ScriptedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler for `E`
    pub fn with<E, H>(self, handler: H) -> Self
    where
        E: Event,
        H: EventHandler<E> + 'static,
    {
        self.push(HandlerContract::of::<E>(), Some(HandlerInstance::new::<E, H>(handler)));
        self
    }

    /// Append an absent entry for `E`
    pub fn with_absent<E: Event>(self) -> Self {
        self.push(HandlerContract::of::<E>(), None);
        self
    }

    /// Append a raw entry under `contract`, whatever it holds
    pub fn with_entry(self, contract: HandlerContract, entry: Option<HandlerInstance>) -> Self {
        self.push(contract, entry);
        self
    }

    fn push(&self, contract: HandlerContract, entry: Option<HandlerInstance>) {
        self.state
            .entries
            .lock()
            .unwrap()
            .entry(contract)
            .or_default()
            .push(entry);
    }

    /// Make `create_scope` fail from now on
    pub fn fail_scopes(&self) {
        self.state.fail_scopes.store(true, Ordering::SeqCst);
    }

    /// Make `resolve_all` fail from now on
    pub fn fail_resolution(&self) {
        self.state.fail_resolution.store(true, Ordering::SeqCst);
    }

    pub fn scopes_opened(&self) -> u64 {
        self.state.opened.load(Ordering::SeqCst)
    }

    pub fn scopes_released(&self) -> usize {
        self.state.released.load(Ordering::SeqCst)
    }

    /// Scopes opened and not yet released
    pub fn open_scopes(&self) -> usize {
        self.scopes_opened() as usize - self.scopes_released()
    }
}

impl HandlerRegistry for ScriptedRegistry {
    fn create_scope(&self) -> Result<Box<dyn ResolutionScope>, RegistryError> {
        if self.state.fail_scopes.load(Ordering::SeqCst) {
            return Err(RegistryError::ScopeUnavailable("scripted failure".to_string()));
        }

        let id = self.state.opened.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Box::new(ScriptedScope {
            id,
            state: self.state.clone(),
        }))
    }
}

struct ScriptedScope {
    id: u64,
    state: Arc<ScriptState>,
}

impl ResolutionScope for ScriptedScope {
    fn resolve_all(
        &self,
        contract: &HandlerContract,
    ) -> Result<Vec<Option<HandlerInstance>>, RegistryError> {
        if self.state.fail_resolution.load(Ordering::SeqCst) {
            return Err(RegistryError::resolution_failed(contract, "scripted failure"));
        }

        Ok(self
            .state
            .entries
            .lock()
            .unwrap()
            .get(contract)
            .cloned()
            .unwrap_or_default())
    }

    fn scope_id(&self) -> u64 {
        self.id
    }
}

impl Drop for ScriptedScope {
    fn drop(&mut self) {
        self.state.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Type deriver that counts derivations per event kind
#[derive(Default)]
pub struct CountingDeriver {
    counts: Mutex<HashMap<TypeId, usize>>,
}

impl CountingDeriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total derivations
    pub fn count(&self) -> usize {
        self.counts.lock().unwrap().values().sum()
    }

    /// Derivations for event type `E`
    pub fn count_for<E: Event>(&self) -> usize {
        self.counts
            .lock()
            .unwrap()
            .get(&TypeId::of::<E>())
            .copied()
            .unwrap_or(0)
    }
}

impl TypeDeriver for CountingDeriver {
    fn derive(&self, kind: &EventKind) -> KindBinding {
        *self.counts.lock().unwrap().entry(kind.id()).or_insert(0) += 1;
        MonomorphicDeriver.derive(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{AccountFrozen, AccountOpened};
    use crate::handlers::{CallTrace, ScriptedHandler};

    #[test]
    fn test_scripted_entries_in_order() {
        let trace = CallTrace::new();
        let registry = ScriptedRegistry::new()
            .with::<AccountOpened, _>(ScriptedHandler::recording("H1", &trace))
            .with_absent::<AccountOpened>()
            .with::<AccountOpened, _>(ScriptedHandler::recording("H2", &trace));

        let scope = registry.create_scope().unwrap();
        let entries = scope.resolve_all(&HandlerContract::of::<AccountOpened>()).unwrap();

        assert_eq!(entries.len(), 3);
        assert!(entries[1].is_none());
        assert!(entries[0].as_ref().unwrap().handler_name().contains("ScriptedHandler"));
        assert!(scope
            .resolve_all(&HandlerContract::of::<AccountFrozen>())
            .unwrap()
            .is_empty());

        assert_eq!(registry.open_scopes(), 1);
        drop(scope);
        assert_eq!(registry.open_scopes(), 0);
    }

    #[test]
    fn test_scripted_failures() {
        let registry = ScriptedRegistry::new();
        registry.fail_resolution();
        let scope = registry.create_scope().unwrap();
        assert!(matches!(
            scope.resolve_all(&HandlerContract::of::<AccountOpened>()),
            Err(RegistryError::ResolutionFailed { .. })
        ));

        registry.fail_scopes();
        assert!(registry.create_scope().is_err());
    }

    #[test]
    fn test_counting_deriver() {
        let deriver = CountingDeriver::new();
        let kind = EventKind::of::<AccountOpened>();

        let binding = deriver.derive(&kind);
        deriver.derive(&kind);

        assert!(binding.kind.is::<AccountOpened>());
        assert_eq!(deriver.count_for::<AccountOpened>(), 2);
        assert_eq!(deriver.count_for::<AccountFrozen>(), 0);
        assert_eq!(deriver.count(), 2);
    }
}
