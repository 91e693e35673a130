// Recording handlers

use crate::events::Labeled;
use async_trait::async_trait;
use courier_events::{CancellationToken, Event, EventHandler, HandlerError};
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One recorded handler invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub handler: String,
    pub event: String,
    /// Address of the event the handler received
    pub address: usize,
}

impl Call {
    /// `"H1(AccountOpened#1)"`
    pub fn label(&self) -> String {
        format!("{}({})", self.handler, self.event)
    }
}

/// Shared, ordered log of handler invocations
#[derive(Debug, Clone, Default)]
pub struct CallTrace {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl CallTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record<E: Event + Labeled>(&self, handler: &str, event: &E) {
        self.calls.lock().unwrap().push(Call {
            handler: handler.to_string(),
            event: event.label(),
            address: event as *const E as usize,
        });
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Recorded calls as `handler(event)` strings
    pub fn labels(&self) -> Vec<String> {
        self.calls().iter().map(Call::label).collect()
    }

    /// Number of calls made by `handler`
    pub fn count_for(&self, handler: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.handler == handler)
            .count()
    }

    pub fn len(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }
}

/// What a [`ScriptedHandler`] does after recording the call
#[derive(Debug, Clone)]
pub enum Behavior {
    Succeed,
    /// Return `HandlerError::HandlerFailed` with the handler name
    Fail,
    /// Cancel the token the dispatcher passed in, then succeed
    CancelDispatch,
    /// Sleep, then succeed
    Delay(Duration),
    /// Wait until the token is cancelled and report `HandlerError::Cancelled`
    AwaitCancellation,
}

/// Handler that records every invocation in a [`CallTrace`]
pub struct ScriptedHandler<E> {
    name: String,
    trace: CallTrace,
    behavior: Behavior,
    _event: PhantomData<fn(&E)>,
}

impl<E> ScriptedHandler<E> {
    pub fn new(name: impl Into<String>, trace: &CallTrace, behavior: Behavior) -> Self {
        Self {
            name: name.into(),
            trace: trace.clone(),
            behavior,
            _event: PhantomData,
        }
    }

    pub fn recording(name: impl Into<String>, trace: &CallTrace) -> Self {
        Self::new(name, trace, Behavior::Succeed)
    }

    pub fn failing(name: impl Into<String>, trace: &CallTrace) -> Self {
        Self::new(name, trace, Behavior::Fail)
    }

    pub fn cancelling(name: impl Into<String>, trace: &CallTrace) -> Self {
        Self::new(name, trace, Behavior::CancelDispatch)
    }

    pub fn delayed(name: impl Into<String>, trace: &CallTrace, delay: Duration) -> Self {
        Self::new(name, trace, Behavior::Delay(delay))
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl<E: Event + Labeled> EventHandler<E> for ScriptedHandler<E> {
    async fn handle(&self, event: &E, cancel: &CancellationToken) -> Result<(), HandlerError> {
        self.trace.record(&self.name, event);

        match &self.behavior {
            Behavior::Succeed => Ok(()),
            Behavior::Fail => Err(HandlerError::HandlerFailed(self.name.clone())),
            Behavior::CancelDispatch => {
                cancel.cancel();
                Ok(())
            }
            Behavior::Delay(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(())
            }
            Behavior::AwaitCancellation => {
                cancel.cancelled().await;
                Err(HandlerError::Cancelled)
            }
        }
    }
}
