//! Instance directory
//!
//! Maps addresses to registered ledger instances. Every instance in a
//! deployment shares one directory; resolution is the only discovery
//! mechanism, so an unregistered address is simply not a nesting
//! implementer. The address a resolution runs against always comes from
//! the caller or from a stored ownership record, never from the directory
//! itself.

use crate::interface::Nestable;
use crate::types::Address;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Address book of registered ledger instances
#[derive(Default)]
pub struct Directory {
    instances: RwLock<HashMap<Address, Arc<dyn Nestable>>>,
}

impl Directory {
    /// Create an empty directory
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register an instance under its own address, replacing any previous
    /// registration there
    pub fn register(&self, instance: Arc<dyn Nestable>) {
        let addr = instance.address();
        self.instances.write().insert(addr, instance);
        tracing::debug!(address = %addr, "ledger instance registered");
    }

    /// Drop the registration for an address; true if one existed
    pub fn deregister(&self, addr: Address) -> bool {
        let removed = self.instances.write().remove(&addr).is_some();
        if removed {
            tracing::debug!(address = %addr, "ledger instance deregistered");
        }
        removed
    }

    /// Resolve an address to its registered instance
    pub fn resolve(&self, addr: Address) -> Option<Arc<dyn Nestable>> {
        self.instances.read().get(&addr).cloned()
    }

    /// Capability probe for an address
    pub fn supports_nesting_interface(&self, addr: Address) -> bool {
        self.resolve(addr)
            .map(|instance| instance.supports_nesting())
            .unwrap_or(false)
    }

    /// Number of registered instances
    pub fn len(&self) -> usize {
        self.instances.read().len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.instances.read().is_empty()
    }
}
