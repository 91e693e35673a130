//! Type resolution cache
//!
//! Maps a runtime [`EventKind`] to the handler contract and wrapper type
//! instantiated for it. The derivation is a pure function of the kind, so
//! entries are computed once, shared by every dispatcher using the cache and
//! never invalidated.

use crate::event::{Event, EventKind};
use crate::handler::HandlerContract;
use crate::wrapper::WrapperType;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::any::TypeId;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

static GLOBAL_CACHE: Lazy<Arc<ResolutionCache>> = Lazy::new(|| Arc::new(ResolutionCache::new()));

/// Contract and wrapper instantiation derived for one event kind
#[derive(Debug, Clone, Copy)]
pub struct KindBinding {
    pub kind: EventKind,
    pub contract: HandlerContract,
    pub wrapper: WrapperType,
}

impl KindBinding {
    /// Instantiate the binding for `E`
    pub fn of<E: Event>() -> Self {
        Self {
            kind: EventKind::of::<E>(),
            contract: HandlerContract::of::<E>(),
            wrapper: WrapperType::of::<E>(),
        }
    }
}

/// Derives the binding for a runtime kind
pub trait TypeDeriver: Send + Sync {
    fn derive(&self, kind: &EventKind) -> KindBinding;
}

/// Derives bindings through the binder monomorphised into each [`EventKind`]
#[derive(Debug, Clone, Copy, Default)]
pub struct MonomorphicDeriver;

impl TypeDeriver for MonomorphicDeriver {
    fn derive(&self, kind: &EventKind) -> KindBinding {
        kind.bind()
    }
}

/// Concurrent memoization table from event kind to [`KindBinding`]
///
/// Lookups hit a sharded map, so readers never lock the whole table.
/// Concurrent misses on the same kind may derive twice; the first insert wins
/// and every caller observes that entry.
pub struct ResolutionCache {
    entries: DashMap<TypeId, Arc<KindBinding>>,
    deriver: Arc<dyn TypeDeriver>,
}

impl ResolutionCache {
    /// Create an empty cache using [`MonomorphicDeriver`]
    pub fn new() -> Self {
        Self::with_deriver(Arc::new(MonomorphicDeriver))
    }

    /// Create an empty cache with a custom deriver
    pub fn with_deriver(deriver: Arc<dyn TypeDeriver>) -> Self {
        Self {
            entries: DashMap::new(),
            deriver,
        }
    }

    /// Process-wide cache, created on first use and kept for the process lifetime
    pub fn global() -> Arc<ResolutionCache> {
        GLOBAL_CACHE.clone()
    }

    /// Binding for `kind`, deriving and memoizing it on first sight
    pub fn resolve(&self, kind: &EventKind) -> Arc<KindBinding> {
        if let Some(entry) = self.entries.get(&kind.id()) {
            trace!(event_kind = kind.name(), "Resolution cache hit");
            return entry.value().clone();
        }

        let derived = Arc::new(self.deriver.derive(kind));
        debug!(
            event_kind = kind.name(),
            contract = derived.contract.name(),
            wrapper = derived.wrapper.name(),
            "Derived handler contract for event kind"
        );

        self.entries.entry(kind.id()).or_insert(derived).value().clone()
    }

    /// Handler contract instantiated for `kind`
    pub fn resolve_handler_contract(&self, kind: &EventKind) -> HandlerContract {
        self.resolve(kind).contract
    }

    /// Wrapper type instantiated for `kind`
    pub fn resolve_wrapper_type(&self, kind: &EventKind) -> WrapperType {
        self.resolve(kind).wrapper
    }

    /// Resolve `E` ahead of its first dispatch
    pub fn warm<E: Event>(&self) -> Arc<KindBinding> {
        self.resolve(&EventKind::of::<E>())
    }

    pub fn contains(&self, kind: &EventKind) -> bool {
        self.entries.contains_key(&kind.id())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ResolutionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ResolutionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolutionCache")
            .field("entries", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct AccountOpened;

    impl Event for AccountOpened {}

    #[derive(Debug)]
    struct AccountClosed;

    impl Event for AccountClosed {}

    #[derive(Default)]
    struct CountingDeriver {
        calls: AtomicUsize,
    }

    impl TypeDeriver for CountingDeriver {
        fn derive(&self, kind: &EventKind) -> KindBinding {
            self.calls.fetch_add(1, Ordering::SeqCst);
            MonomorphicDeriver.derive(kind)
        }
    }

    #[test]
    fn test_binding_matches_kind() {
        let binding = KindBinding::of::<AccountOpened>();

        assert!(binding.kind.is::<AccountOpened>());
        assert_eq!(binding.contract, HandlerContract::of::<AccountOpened>());
        assert_eq!(binding.wrapper, WrapperType::of::<AccountOpened>());
    }

    #[test]
    fn test_resolve_memoizes_per_kind() {
        let deriver = Arc::new(CountingDeriver::default());
        let cache = ResolutionCache::with_deriver(deriver.clone());
        let opened = EventKind::of::<AccountOpened>();

        assert!(cache.is_empty());
        let first = cache.resolve(&opened);
        let second = cache.resolve(&opened);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(deriver.calls.load(Ordering::SeqCst), 1);

        cache.resolve(&EventKind::of::<AccountClosed>());
        assert_eq!(deriver.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_contract_and_wrapper_lookups() {
        let cache = ResolutionCache::new();
        let closed = EventKind::of::<AccountClosed>();

        assert_eq!(
            cache.resolve_handler_contract(&closed),
            HandlerContract::of::<AccountClosed>()
        );
        assert_eq!(
            cache.resolve_wrapper_type(&closed),
            WrapperType::of::<AccountClosed>()
        );
        assert!(cache.contains(&closed));
        assert!(!cache.contains(&EventKind::of::<AccountOpened>()));
    }

    #[test]
    fn test_warm() {
        let cache = ResolutionCache::new();
        let binding = cache.warm::<AccountOpened>();

        assert!(binding.kind.is::<AccountOpened>());
        assert!(cache.contains(&EventKind::of::<AccountOpened>()));
    }

    #[test]
    fn test_concurrent_first_use_converges() {
        let cache = Arc::new(ResolutionCache::new());
        let kind = EventKind::of::<AccountOpened>();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || cache.resolve(&kind))
            })
            .collect();

        let bindings: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(cache.len(), 1);
        let stored = cache.resolve(&kind);
        for binding in bindings {
            assert_eq!(binding.contract, stored.contract);
        }
    }

    #[test]
    fn test_global_is_shared() {
        let a = ResolutionCache::global();
        let b = ResolutionCache::global();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
