//! Event definitions and runtime event kinds

use crate::resolution::KindBinding;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::fmt::{self, Debug};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use uuid::Uuid;

/// Domain event trait
///
/// An event is an immutable value describing something that has happened.
/// It is identified solely by its concrete type; payloads are opaque to the
/// dispatcher. Type-erasure helpers come from [`ErasedEvent`], which is
/// implemented automatically.
pub trait Event: ErasedEvent + Send + Sync + Debug + 'static {
    /// Human readable event name, the Rust type name by default
    fn event_name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Type-erased view of an event
///
/// Blanket-implemented for every [`Event`]; do not implement by hand.
pub trait ErasedEvent {
    /// Cast to Any for downcasting
    fn as_any(&self) -> &dyn Any;

    /// Runtime kind of this event
    fn kind(&self) -> EventKind;
}

impl<E: Event> ErasedEvent for E {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn kind(&self) -> EventKind {
        EventKind::of::<E>()
    }
}

/// Runtime identity of an event type
///
/// Carries the `TypeId` plus a binder monomorphised for the concrete type,
/// which is what lets a value known only at runtime be turned back into a
/// statically typed handler contract. Equality and hashing use the `TypeId`.
#[derive(Clone, Copy)]
pub struct EventKind {
    id: TypeId,
    name: &'static str,
    binder: fn() -> KindBinding,
}

impl EventKind {
    /// Kind of a statically known event type
    pub fn of<E: Event>() -> Self {
        Self {
            id: TypeId::of::<E>(),
            name: std::any::type_name::<E>(),
            binder: KindBinding::of::<E>,
        }
    }

    /// Kind of an erased event
    pub fn of_val(event: &dyn Event) -> Self {
        event.kind()
    }

    /// `TypeId` of the concrete event type
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Rust type name of the concrete event type
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether this kind describes `E`
    pub fn is<E: Event>(&self) -> bool {
        self.id == TypeId::of::<E>()
    }

    pub(crate) fn bind(&self) -> KindBinding {
        (self.binder)()
    }
}

impl PartialEq for EventKind {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventKind {}

impl Hash for EventKind {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Debug for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EventKind").field(&self.name).finish()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Optional event metadata that concrete events may embed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event ID
    pub id: Uuid,

    /// Timestamp when the event was raised
    pub occurred_at: DateTime<Utc>,

    /// Optional correlation ID for tracing
    pub correlation_id: Option<Uuid>,

    /// Optional causation ID (ID of the event that caused this event)
    pub causation_id: Option<Uuid>,
}

impl EventMetadata {
    /// Create new event metadata
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            correlation_id: None,
            causation_id: None,
        }
    }

    /// Set correlation ID
    pub fn with_correlation_id(mut self, id: Uuid) -> Self {
        self.correlation_id = Some(id);
        self
    }

    /// Set causation ID
    pub fn with_causation_id(mut self, id: Uuid) -> Self {
        self.causation_id = Some(id);
        self
    }

    /// Metadata for an event caused by the event described by `self`
    pub fn caused(&self) -> Self {
        Self {
            correlation_id: Some(self.correlation_id.unwrap_or(self.id)),
            causation_id: Some(self.id),
            ..Self::new()
        }
    }
}

impl Default for EventMetadata {
    fn default() -> Self {
        Self::new()
    }
}

/// Domain events raised by an aggregate and not yet dispatched
#[derive(Debug, Default)]
pub struct PendingEvents {
    events: Vec<Arc<dyn Event>>,
}

impl PendingEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new domain event
    pub fn raise<E: Event>(&mut self, event: E) {
        self.events.push(Arc::new(event));
    }

    /// Record an already erased event
    pub fn raise_shared(&mut self, event: Arc<dyn Event>) {
        self.events.push(event);
    }

    /// Drain the recorded events, in the order they were raised
    pub fn take(&mut self) -> Vec<Arc<dyn Event>> {
        std::mem::take(&mut self.events)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Event>> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl IntoIterator for PendingEvents {
    type Item = Arc<dyn Event>;
    type IntoIter = std::vec::IntoIter<Arc<dyn Event>>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}
