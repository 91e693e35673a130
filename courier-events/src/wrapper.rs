//! Invocation wrappers
//!
//! A wrapper closes over one handler narrowed to `dyn EventHandler<E>` and
//! exposes a kind-erased entry point. The dispatcher only ever holds the
//! event as `&dyn Event`; the wrapper is the single place where that value is
//! narrowed back to `&E`.

use crate::error::DispatchError;
use crate::event::{Event, EventKind};
use crate::handler::{EventHandler, HandlerContract, HandlerInstance};
use crate::registry::RegistryError;
use crate::resolution::ResolutionCache;
use async_trait::async_trait;
use std::any::TypeId;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Kind-erased handler invocation
#[async_trait]
pub trait InvocationWrapper: Send + Sync {
    /// Invoke the wrapped handler
    ///
    /// `event` must be of the kind the wrapper was built for.
    async fn handle(
        &self,
        event: &dyn Event,
        cancel: &CancellationToken,
    ) -> Result<(), DispatchError>;

    fn handler_name(&self) -> &'static str;

    fn event_kind(&self) -> EventKind;
}

/// Wrapper statically bound to event type `E`
pub struct TypedInvocationWrapper<E: Event> {
    handler: Arc<dyn EventHandler<E>>,
}

impl<E: Event> TypedInvocationWrapper<E> {
    pub fn new(handler: Arc<dyn EventHandler<E>>) -> Self {
        Self { handler }
    }

    /// Narrow an erased registry value to the contract for `E`
    pub fn from_instance(instance: &HandlerInstance) -> Result<Self, DispatchError> {
        match instance.downcast::<E>() {
            Some(handler) => Ok(Self::new(handler)),
            None => Err(RegistryError::ContractMismatch {
                handler: instance.handler_name().to_string(),
                expected: HandlerContract::of::<E>().name().to_string(),
                actual: instance.contract().name().to_string(),
            }
            .into()),
        }
    }
}

#[async_trait]
impl<E: Event> InvocationWrapper for TypedInvocationWrapper<E> {
    async fn handle(
        &self,
        event: &dyn Event,
        cancel: &CancellationToken,
    ) -> Result<(), DispatchError> {
        let event = event.as_any().downcast_ref::<E>().ok_or_else(|| {
            DispatchError::EventKindMismatch {
                expected: std::any::type_name::<E>(),
                actual: event.kind().name(),
            }
        })?;

        self.handler.handle(event, cancel).await?;
        Ok(())
    }

    fn handler_name(&self) -> &'static str {
        self.handler.handler_name()
    }

    fn event_kind(&self) -> EventKind {
        EventKind::of::<E>()
    }
}

type ConstructFn = fn(&HandlerInstance) -> Result<Box<dyn InvocationWrapper>, DispatchError>;

/// Runtime descriptor of `TypedInvocationWrapper<E>`
#[derive(Clone, Copy)]
pub struct WrapperType {
    event: TypeId,
    name: &'static str,
    construct: ConstructFn,
}

impl WrapperType {
    pub fn of<E: Event>() -> Self {
        Self {
            event: TypeId::of::<E>(),
            name: std::any::type_name::<TypedInvocationWrapper<E>>(),
            construct: construct_typed::<E>,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Build a wrapper of this type around `instance`
    pub fn create(
        &self,
        instance: &HandlerInstance,
    ) -> Result<Box<dyn InvocationWrapper>, DispatchError> {
        (self.construct)(instance)
    }
}

fn construct_typed<E: Event>(
    instance: &HandlerInstance,
) -> Result<Box<dyn InvocationWrapper>, DispatchError> {
    Ok(Box::new(TypedInvocationWrapper::<E>::from_instance(instance)?))
}

impl PartialEq for WrapperType {
    fn eq(&self, other: &Self) -> bool {
        self.event == other.event
    }
}

impl Eq for WrapperType {}

impl fmt::Debug for WrapperType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WrapperType").field(&self.name).finish()
    }
}

/// Produces invocation wrappers for (handler, event kind) pairs
#[derive(Debug, Clone)]
pub struct WrapperFactory {
    cache: Arc<ResolutionCache>,
}

impl WrapperFactory {
    pub fn new(cache: Arc<ResolutionCache>) -> Self {
        Self { cache }
    }

    /// Wrap `handler` for events of `kind`
    pub fn create_wrapper(
        &self,
        handler: &HandlerInstance,
        kind: &EventKind,
    ) -> Result<Box<dyn InvocationWrapper>, DispatchError> {
        self.cache.resolve_wrapper_type(kind).create(handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::HandlerError;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct ParcelScanned {
        barcode: String,
    }

    impl Event for ParcelScanned {}

    #[derive(Debug)]
    struct ParcelLost;

    impl Event for ParcelLost {}

    #[derive(Default)]
    struct ScanLog {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EventHandler<ParcelScanned> for ScanLog {
        async fn handle(
            &self,
            event: &ParcelScanned,
            _cancel: &CancellationToken,
        ) -> Result<(), HandlerError> {
            self.seen.lock().unwrap().push(event.barcode.clone());
            Ok(())
        }
    }

    struct Rejecting;

    #[async_trait]
    impl EventHandler<ParcelScanned> for Rejecting {
        async fn handle(
            &self,
            _event: &ParcelScanned,
            _cancel: &CancellationToken,
        ) -> Result<(), HandlerError> {
            Err(HandlerError::ProcessingError("unreadable".into()))
        }
    }

    #[tokio::test]
    async fn test_wrapper_delegates_to_handler() {
        let log = Arc::new(ScanLog::default());
        let instance = HandlerInstance::from_shared::<ParcelScanned>(log.clone());
        let factory = WrapperFactory::new(Arc::new(ResolutionCache::new()));

        let wrapper = factory
            .create_wrapper(&instance, &EventKind::of::<ParcelScanned>())
            .unwrap();
        let event = ParcelScanned {
            barcode: "PX-1".into(),
        };
        wrapper
            .handle(&event, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(*log.seen.lock().unwrap(), vec!["PX-1".to_string()]);
        assert!(wrapper.event_kind().is::<ParcelScanned>());
        assert!(wrapper.handler_name().ends_with("ScanLog"));
    }

    #[tokio::test]
    async fn test_handler_error_passes_through() {
        let instance = HandlerInstance::new::<ParcelScanned, _>(Rejecting);
        let wrapper = WrapperType::of::<ParcelScanned>().create(&instance).unwrap();
        let event = ParcelScanned {
            barcode: "PX-2".into(),
        };

        let err = wrapper
            .handle(&event, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Handler(HandlerError::ProcessingError(ref msg)) if msg == "unreadable"
        ));
    }

    #[tokio::test]
    async fn test_event_kind_mismatch() {
        let instance = HandlerInstance::new::<ParcelScanned, _>(ScanLog::default());
        let wrapper = WrapperType::of::<ParcelScanned>().create(&instance).unwrap();

        let err = wrapper
            .handle(&ParcelLost, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::EventKindMismatch { .. }));
    }

    #[test]
    fn test_contract_mismatch() {
        let instance = HandlerInstance::new::<ParcelScanned, _>(ScanLog::default());
        let result = WrapperType::of::<ParcelLost>().create(&instance);

        assert!(matches!(
            result,
            Err(DispatchError::Registry(RegistryError::ContractMismatch { .. }))
        ));
    }
}
