//! Domain event dispatcher

use crate::error::DispatchError;
use crate::event::{Event, EventKind};
use crate::registry::HandlerRegistry;
use crate::resolution::{ResolutionCache, TypeDeriver};
use crate::wrapper::WrapperFactory;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, debug_span, trace, warn};

/// Dispatcher configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Enable dispatch logging
    pub enable_logging: bool,

    /// Treat absent registry entries as errors instead of skipping them
    pub strict_handler_entries: bool,

    /// Log a warning when an event kind has no handlers
    pub warn_on_unhandled: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            enable_logging: true,
            strict_handler_entries: false,
            warn_on_unhandled: false,
        }
    }
}

/// Delivers domain events to every handler registered for their kind
///
/// Within one call, events are processed in order and the handlers of each
/// event run one after another in registry order. The first failure or an
/// observed cancellation ends the whole call. Independent calls may run
/// concurrently; they share only the resolution cache.
#[derive(Clone)]
pub struct EventDispatcher {
    registry: Arc<dyn HandlerRegistry>,
    cache: Arc<ResolutionCache>,
    wrappers: WrapperFactory,
    config: Arc<DispatcherConfig>,
}

impl EventDispatcher {
    /// Create a dispatcher backed by the process-wide resolution cache
    pub fn new(registry: Arc<dyn HandlerRegistry>) -> Self {
        Self::builder(registry).build()
    }

    pub fn builder(registry: Arc<dyn HandlerRegistry>) -> EventDispatcherBuilder {
        EventDispatcherBuilder::new(registry)
    }

    pub fn cache(&self) -> &Arc<ResolutionCache> {
        &self.cache
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Dispatch a sequence of events
    ///
    /// Lazy iterators are advanced one event at a time.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let dispatcher = EventDispatcher::new(registry);
    /// dispatcher.dispatch(order.events.take(), &CancellationToken::new()).await?;
    /// ```
    pub async fn dispatch<I>(
        &self,
        events: I,
        cancel: &CancellationToken,
    ) -> Result<(), DispatchError>
    where
        I: IntoIterator<Item = Arc<dyn Event>>,
        I::IntoIter: Send,
    {
        let mut dispatched = 0usize;

        for event in events {
            self.dispatch_event(event.as_ref(), cancel).await?;
            dispatched += 1;
        }

        if self.config.enable_logging {
            debug!(events = dispatched, "Dispatched domain events");
        }

        Ok(())
    }

    /// Dispatch events produced by a stream
    ///
    /// Waiting for the next event also observes cancellation.
    pub async fn dispatch_stream<S>(
        &self,
        events: S,
        cancel: &CancellationToken,
    ) -> Result<(), DispatchError>
    where
        S: Stream<Item = Arc<dyn Event>> + Send,
    {
        futures::pin_mut!(events);
        let mut dispatched = 0usize;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DispatchError::Cancelled),
                next = events.next() => next,
            };

            let Some(event) = next else {
                break;
            };

            self.dispatch_event(event.as_ref(), cancel).await?;
            dispatched += 1;
        }

        if self.config.enable_logging {
            debug!(events = dispatched, "Dispatched streamed domain events");
        }

        Ok(())
    }

    /// Dispatch a single event
    pub async fn dispatch_one(
        &self,
        event: Arc<dyn Event>,
        cancel: &CancellationToken,
    ) -> Result<(), DispatchError> {
        self.dispatch_event(event.as_ref(), cancel).await
    }

    async fn dispatch_event(
        &self,
        event: &dyn Event,
        cancel: &CancellationToken,
    ) -> Result<(), DispatchError> {
        if cancel.is_cancelled() {
            return Err(DispatchError::Cancelled);
        }

        let kind = event.kind();
        let span = debug_span!("dispatch_event", event = event.event_name(), kind = kind.name());

        self.run_handlers(event, kind, cancel).instrument(span).await
    }

    async fn run_handlers(
        &self,
        event: &dyn Event,
        kind: EventKind,
        cancel: &CancellationToken,
    ) -> Result<(), DispatchError> {
        // Released on drop, whichever way this function returns.
        let scope = self.registry.create_scope()?;

        let contract = self.cache.resolve_handler_contract(&kind);
        let handlers = scope.resolve_all(&contract)?;

        if handlers.is_empty() {
            if self.config.warn_on_unhandled {
                warn!(contract = contract.name(), "No handlers registered for event kind");
            }
            return Ok(());
        }

        if self.config.enable_logging {
            debug!(
                scope = scope.scope_id(),
                handlers = handlers.len(),
                "Resolved handlers for event"
            );
        }

        for (position, entry) in handlers.into_iter().enumerate() {
            let Some(handler) = entry else {
                if self.config.strict_handler_entries {
                    return Err(DispatchError::AbsentHandler {
                        contract: contract.name(),
                    });
                }
                trace!(position, "Skipping absent handler entry");
                continue;
            };

            if cancel.is_cancelled() {
                if self.config.enable_logging {
                    debug!(position, "Dispatch cancelled before handler invocation");
                }
                return Err(DispatchError::Cancelled);
            }

            let wrapper = self.wrappers.create_wrapper(&handler, &kind)?;
            trace!(handler = wrapper.handler_name(), position, "Invoking handler");

            wrapper.handle(event, cancel).await?;
        }

        Ok(())
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("cache", &self.cache)
            .field("config", &self.config)
            .finish()
    }
}

/// Event dispatcher builder
pub struct EventDispatcherBuilder {
    registry: Arc<dyn HandlerRegistry>,
    cache: Option<Arc<ResolutionCache>>,
    config: DispatcherConfig,
}

impl EventDispatcherBuilder {
    pub fn new(registry: Arc<dyn HandlerRegistry>) -> Self {
        Self {
            registry,
            cache: None,
            config: DispatcherConfig::default(),
        }
    }

    /// Use a specific resolution cache instead of the process-wide one
    pub fn cache(mut self, cache: Arc<ResolutionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Use a fresh cache backed by `deriver`
    pub fn deriver(mut self, deriver: Arc<dyn TypeDeriver>) -> Self {
        self.cache = Some(Arc::new(ResolutionCache::with_deriver(deriver)));
        self
    }

    pub fn config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Enable/disable logging
    pub fn enable_logging(mut self, enabled: bool) -> Self {
        self.config.enable_logging = enabled;
        self
    }

    /// Enable/disable rejection of absent handler entries
    pub fn strict_handler_entries(mut self, enabled: bool) -> Self {
        self.config.strict_handler_entries = enabled;
        self
    }

    /// Enable/disable warnings for unhandled event kinds
    pub fn warn_on_unhandled(mut self, enabled: bool) -> Self {
        self.config.warn_on_unhandled = enabled;
        self
    }

    pub fn build(self) -> EventDispatcher {
        let cache = self.cache.unwrap_or_else(ResolutionCache::global);
        EventDispatcher {
            registry: self.registry,
            wrappers: WrapperFactory::new(cache.clone()),
            cache,
            config: Arc::new(self.config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{EventHandler, HandlerContract, HandlerError, HandlerInstance};
    use crate::registry::{RegistryError, ResolutionScope};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Ping(u32);

    impl Event for Ping {}

    #[derive(Debug)]
    struct Pong;

    impl Event for Pong {}

    type Trace = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        name: &'static str,
        trace: Trace,
        fail: bool,
    }

    #[async_trait]
    impl EventHandler<Ping> for Recorder {
        async fn handle(
            &self,
            event: &Ping,
            _cancel: &CancellationToken,
        ) -> Result<(), HandlerError> {
            self.trace.lock().unwrap().push(format!("{}({})", self.name, event.0));
            if self.fail {
                return Err(HandlerError::HandlerFailed(self.name.to_string()));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct FixedRegistry {
        entries: HashMap<HandlerContract, Vec<Option<HandlerInstance>>>,
        open: Arc<AtomicUsize>,
    }

    struct FixedScope {
        entries: HashMap<HandlerContract, Vec<Option<HandlerInstance>>>,
        open: Arc<AtomicUsize>,
    }

    impl HandlerRegistry for FixedRegistry {
        fn create_scope(&self) -> Result<Box<dyn ResolutionScope>, RegistryError> {
            self.open.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FixedScope {
                entries: self.entries.clone(),
                open: self.open.clone(),
            }))
        }
    }

    impl ResolutionScope for FixedScope {
        fn resolve_all(
            &self,
            contract: &HandlerContract,
        ) -> Result<Vec<Option<HandlerInstance>>, RegistryError> {
            Ok(self.entries.get(contract).cloned().unwrap_or_default())
        }
    }

    impl Drop for FixedScope {
        fn drop(&mut self) {
            self.open.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn recorder(name: &'static str, trace: &Trace, fail: bool) -> Option<HandlerInstance> {
        Some(HandlerInstance::new::<Ping, _>(Recorder {
            name,
            trace: trace.clone(),
            fail,
        }))
    }

    fn pings(ids: &[u32]) -> Vec<Arc<dyn Event>> {
        ids.iter().map(|id| Arc::new(Ping(*id)) as Arc<dyn Event>).collect()
    }

    fn dispatcher(registry: FixedRegistry) -> (EventDispatcher, Arc<AtomicUsize>) {
        let open = registry.open.clone();
        let dispatcher = EventDispatcher::builder(Arc::new(registry))
            .cache(Arc::new(ResolutionCache::new()))
            .build();
        (dispatcher, open)
    }

    #[tokio::test]
    async fn test_handlers_run_in_registry_order() {
        let trace = Trace::default();
        let mut registry = FixedRegistry::default();
        registry.entries.insert(
            HandlerContract::of::<Ping>(),
            vec![recorder("a", &trace, false), None, recorder("b", &trace, false)],
        );
        let (dispatcher, open) = dispatcher(registry);

        dispatcher
            .dispatch(pings(&[1, 2]), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(*trace.lock().unwrap(), vec!["a(1)", "b(1)", "a(2)", "b(2)"]);
        assert_eq!(open.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unhandled_kind_is_not_an_error() {
        let (dispatcher, open) = dispatcher(FixedRegistry::default());

        dispatcher
            .dispatch_one(Arc::new(Pong), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(open.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failure_stops_remaining_work() {
        let trace = Trace::default();
        let mut registry = FixedRegistry::default();
        registry.entries.insert(
            HandlerContract::of::<Ping>(),
            vec![recorder("a", &trace, true), recorder("b", &trace, false)],
        );
        let (dispatcher, open) = dispatcher(registry);

        let err = dispatcher
            .dispatch(pings(&[1, 2]), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DispatchError::Handler(HandlerError::HandlerFailed(ref name)) if name == "a"
        ));
        assert_eq!(*trace.lock().unwrap(), vec!["a(1)"]);
        assert_eq!(open.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let trace = Trace::default();
        let mut registry = FixedRegistry::default();
        registry
            .entries
            .insert(HandlerContract::of::<Ping>(), vec![recorder("a", &trace, false)]);
        let (dispatcher, _) = dispatcher(registry);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = dispatcher.dispatch(pings(&[1]), &cancel).await.unwrap_err();

        assert!(err.is_cancelled());
        assert!(trace.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_strict_mode_rejects_absent_entries() {
        let trace = Trace::default();
        let mut registry = FixedRegistry::default();
        registry.entries.insert(
            HandlerContract::of::<Ping>(),
            vec![None, recorder("a", &trace, false)],
        );
        let open = registry.open.clone();
        let dispatcher = EventDispatcher::builder(Arc::new(registry))
            .cache(Arc::new(ResolutionCache::new()))
            .strict_handler_entries(true)
            .build();

        let err = dispatcher
            .dispatch(pings(&[1]), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::AbsentHandler { .. }));
        assert!(trace.lock().unwrap().is_empty());
        assert_eq!(open.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dispatch_stream() {
        let trace = Trace::default();
        let mut registry = FixedRegistry::default();
        registry
            .entries
            .insert(HandlerContract::of::<Ping>(), vec![recorder("a", &trace, false)]);
        let (dispatcher, _) = dispatcher(registry);

        let events = futures::stream::iter(pings(&[5, 6]));
        dispatcher
            .dispatch_stream(events, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(*trace.lock().unwrap(), vec!["a(5)", "a(6)"]);
    }

    #[tokio::test]
    async fn test_dispatch_stream_observes_cancellation_while_waiting() {
        let (dispatcher, _) = dispatcher(FixedRegistry::default());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = dispatcher
            .dispatch_stream(futures::stream::pending(), &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_builder_defaults_to_global_cache() {
        let dispatcher = EventDispatcher::new(Arc::new(FixedRegistry::default()));

        assert!(Arc::ptr_eq(dispatcher.cache(), &ResolutionCache::global()));
        assert_eq!(dispatcher.config(), &DispatcherConfig::default());
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: DispatcherConfig =
            serde_json::from_str(r#"{"strict_handler_entries": true}"#).unwrap();

        assert!(config.enable_logging);
        assert!(config.strict_handler_entries);
        assert!(!config.warn_on_unhandled);
    }
}
