// Handler registration table

use crate::scope::RegistryScope;
use courier_events::{
    Event, EventHandler, HandlerContract, HandlerInstance, HandlerRegistry, RegistryError,
    ResolutionScope,
};
use dashmap::DashMap;
use std::any::TypeId;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tracing::{debug, trace};

/// How long a resolved handler instance lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// One instance shared by every scope
    Singleton,
    /// One instance per resolution scope
    Scoped,
    /// A new instance on every resolve
    Transient,
}

type Factory = Arc<dyn Fn() -> Option<HandlerInstance> + Send + Sync>;

#[derive(Clone)]
pub(crate) enum Producer {
    Instance(HandlerInstance),
    Factory(Factory),
}

#[derive(Clone)]
pub(crate) struct Registration {
    pub(crate) id: u64,
    pub(crate) lifetime: Lifetime,
    pub(crate) producer: Producer,
}

impl Registration {
    pub(crate) fn produce(&self) -> Option<HandlerInstance> {
        match &self.producer {
            Producer::Instance(instance) => Some(instance.clone()),
            Producer::Factory(factory) => factory(),
        }
    }
}

pub(crate) struct RegistryInner {
    pub(crate) registrations: DashMap<TypeId, Vec<Registration>>,
    next_registration: AtomicU64,
    next_scope: AtomicU64,
    pub(crate) open_scopes: AtomicUsize,
    closed: AtomicBool,
}

/// Handler registry with per-event resolution scopes
///
/// Handlers are registered against the contract `dyn EventHandler<E>` and
/// resolved in registration order.
#[derive(Clone)]
pub struct ServiceRegistry {
    inner: Arc<RegistryInner>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        debug!("Creating new handler registry");
        Self {
            inner: Arc::new(RegistryInner {
                registrations: DashMap::new(),
                next_registration: AtomicU64::new(1),
                next_scope: AtomicU64::new(1),
                open_scopes: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn builder() -> ServiceRegistryBuilder {
        ServiceRegistryBuilder::new()
    }

    /// Register a handler instance shared by all scopes
    pub fn register_singleton<E, H>(&self, handler: H)
    where
        E: Event,
        H: EventHandler<E> + 'static,
    {
        self.insert::<E>(
            Lifetime::Singleton,
            Producer::Instance(HandlerInstance::new::<E, H>(handler)),
            std::any::type_name::<H>(),
        );
    }

    /// Register an already shared handler as a singleton
    pub fn register_shared<E: Event>(&self, handler: Arc<dyn EventHandler<E>>) {
        let name = handler.handler_name();
        self.insert::<E>(
            Lifetime::Singleton,
            Producer::Instance(HandlerInstance::from_shared::<E>(handler)),
            name,
        );
    }

    /// Register a factory invoked once per resolution scope
    pub fn register_scoped<E, H, F>(&self, factory: F)
    where
        E: Event,
        H: EventHandler<E> + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        self.insert::<E>(
            Lifetime::Scoped,
            Producer::Factory(Arc::new(move || Some(HandlerInstance::new::<E, H>(factory())))),
            std::any::type_name::<H>(),
        );
    }

    /// Register a factory invoked on every resolve
    pub fn register_transient<E, H, F>(&self, factory: F)
    where
        E: Event,
        H: EventHandler<E> + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        self.insert::<E>(
            Lifetime::Transient,
            Producer::Factory(Arc::new(move || Some(HandlerInstance::new::<E, H>(factory())))),
            std::any::type_name::<H>(),
        );
    }

    /// Register a transient factory that may decline to produce a handler
    ///
    /// A declined resolve shows up as an absent entry.
    pub fn register_optional<E, H, F>(&self, factory: F)
    where
        E: Event,
        H: EventHandler<E> + 'static,
        F: Fn() -> Option<H> + Send + Sync + 'static,
    {
        self.insert::<E>(
            Lifetime::Transient,
            Producer::Factory(Arc::new(move || factory().map(HandlerInstance::new::<E, H>))),
            std::any::type_name::<H>(),
        );
    }

    fn insert<E: Event>(&self, lifetime: Lifetime, producer: Producer, handler: &'static str) {
        let contract = HandlerContract::of::<E>();
        let id = self.inner.next_registration.fetch_add(1, Ordering::Relaxed);

        trace!(contract = contract.name(), handler, "Registering handler");
        self.inner
            .registrations
            .entry(contract.id())
            .or_default()
            .push(Registration {
                id,
                lifetime,
                producer,
            });

        debug!(
            contract = contract.name(),
            handler,
            lifetime = ?lifetime,
            "Handler registered"
        );
    }

    /// Number of registrations for event type `E`
    pub fn handler_count<E: Event>(&self) -> usize {
        self.inner
            .registrations
            .get(&HandlerContract::of::<E>().id())
            .map(|r| r.len())
            .unwrap_or(0)
    }

    pub fn is_registered<E: Event>(&self) -> bool {
        self.handler_count::<E>() > 0
    }

    /// Remove every registration for event type `E`
    pub fn unregister_all<E: Event>(&self) {
        let contract = HandlerContract::of::<E>();
        self.inner.registrations.remove(&contract.id());

        debug!(contract = contract.name(), "Unregistered all handlers");
    }

    /// Remove every registration
    pub fn clear(&self) {
        let count = self.inner.registrations.len();
        self.inner.registrations.clear();

        debug!(contract_count = count, "Cleared handler registry");
    }

    /// Refuse new scopes; scopes already open keep working until dropped
    pub fn shutdown(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        debug!(
            open_scopes = self.open_scopes(),
            "Handler registry shut down"
        );
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Scopes created and not yet released
    pub fn open_scopes(&self) -> usize {
        self.inner.open_scopes.load(Ordering::SeqCst)
    }

    /// Total number of scopes ever created
    pub fn scopes_created(&self) -> u64 {
        self.inner.next_scope.load(Ordering::SeqCst) - 1
    }

    /// Open a concrete scope
    pub fn open_scope(&self) -> Result<RegistryScope, RegistryError> {
        if self.is_shutdown() {
            return Err(RegistryError::ScopeUnavailable(
                "handler registry has been shut down".to_string(),
            ));
        }

        let id = self.inner.next_scope.fetch_add(1, Ordering::SeqCst);
        self.inner.open_scopes.fetch_add(1, Ordering::SeqCst);
        trace!(scope = id, "Opened resolution scope");

        Ok(RegistryScope::new(id, self.inner.clone()))
    }
}

impl HandlerRegistry for ServiceRegistry {
    fn create_scope(&self) -> Result<Box<dyn ResolutionScope>, RegistryError> {
        Ok(Box::new(self.open_scope()?))
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("contracts", &self.inner.registrations.len())
            .field("open_scopes", &self.open_scopes())
            .finish()
    }
}

/// Fluent registry setup
pub struct ServiceRegistryBuilder {
    registry: ServiceRegistry,
}

impl ServiceRegistryBuilder {
    pub fn new() -> Self {
        Self {
            registry: ServiceRegistry::new(),
        }
    }

    pub fn singleton<E, H>(self, handler: H) -> Self
    where
        E: Event,
        H: EventHandler<E> + 'static,
    {
        self.registry.register_singleton::<E, H>(handler);
        self
    }

    pub fn scoped<E, H, F>(self, factory: F) -> Self
    where
        E: Event,
        H: EventHandler<E> + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        self.registry.register_scoped::<E, H, F>(factory);
        self
    }

    pub fn transient<E, H, F>(self, factory: F) -> Self
    where
        E: Event,
        H: EventHandler<E> + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        self.registry.register_transient::<E, H, F>(factory);
        self
    }

    pub fn build(self) -> ServiceRegistry {
        self.registry
    }
}

impl Default for ServiceRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
