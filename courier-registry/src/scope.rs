// Per-event resolution scope

use crate::registry::{Lifetime, RegistryInner};
use courier_events::{HandlerContract, HandlerInstance, RegistryError, ResolutionScope};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tracing::{debug, trace};

/// Resolution scope handed out by [`ServiceRegistry`](crate::ServiceRegistry)
///
/// Scoped registrations are instantiated at most once per scope. Dropping
/// the scope releases those instances.
pub struct RegistryScope {
    id: u64,
    registry: Arc<RegistryInner>,
    scoped: Mutex<HashMap<u64, Option<HandlerInstance>>>,
}

impl RegistryScope {
    pub(crate) fn new(id: u64, registry: Arc<RegistryInner>) -> Self {
        Self {
            id,
            registry,
            scoped: Mutex::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Number of scoped instances created so far
    pub fn scoped_instances(&self) -> usize {
        self.scoped.lock().len()
    }
}

impl ResolutionScope for RegistryScope {
    fn resolve_all(
        &self,
        contract: &HandlerContract,
    ) -> Result<Vec<Option<HandlerInstance>>, RegistryError> {
        // Snapshot so factories never run under a registry shard lock.
        let registrations = match self.registry.registrations.get(&contract.id()) {
            Some(registrations) => registrations.value().clone(),
            None => {
                trace!(scope = self.id, contract = contract.name(), "No registrations");
                return Ok(Vec::new());
            }
        };

        let mut resolved = Vec::with_capacity(registrations.len());
        for registration in &registrations {
            let instance = match registration.lifetime {
                Lifetime::Singleton | Lifetime::Transient => registration.produce(),
                Lifetime::Scoped => {
                    let existing = self.scoped.lock().get(&registration.id).cloned();
                    match existing {
                        Some(instance) => instance,
                        None => {
                            let created = registration.produce();
                            self.scoped
                                .lock()
                                .entry(registration.id)
                                .or_insert(created)
                                .clone()
                        }
                    }
                }
            };
            resolved.push(instance);
        }

        trace!(
            scope = self.id,
            contract = contract.name(),
            count = resolved.len(),
            "Resolved handlers"
        );
        Ok(resolved)
    }

    fn scope_id(&self) -> u64 {
        self.id
    }
}

impl Drop for RegistryScope {
    fn drop(&mut self) {
        let released = self.scoped.get_mut().len();
        self.registry.open_scopes.fetch_sub(1, Ordering::SeqCst);

        debug!(
            scope = self.id,
            scoped_instances = released,
            "Released resolution scope"
        );
    }
}
