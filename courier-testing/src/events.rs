// Sample events for tests

use courier_events::Event;
use std::sync::Arc;

/// Events that can describe themselves in a call trace
pub trait Labeled {
    fn label(&self) -> String;
}

/// Sample event: an account was opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountOpened {
    pub seq: u32,
}

impl Event for AccountOpened {}

impl Labeled for AccountOpened {
    fn label(&self) -> String {
        format!("AccountOpened#{}", self.seq)
    }
}

/// Sample event: funds were deposited
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundsDeposited {
    pub seq: u32,
    pub amount: u64,
}

impl Event for FundsDeposited {}

impl Labeled for FundsDeposited {
    fn label(&self) -> String {
        format!("FundsDeposited#{}", self.seq)
    }
}

/// Sample event with no handlers in most tests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountFrozen {
    pub seq: u32,
}

impl Event for AccountFrozen {}

impl Labeled for AccountFrozen {
    fn label(&self) -> String {
        format!("AccountFrozen#{}", self.seq)
    }
}

/// Erase a single event for a dispatch batch
pub fn erased<E: Event>(event: E) -> Arc<dyn Event> {
    Arc::new(event)
}
