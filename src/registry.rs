//! Named (component) schema registry with deferred resolution.
//!
//! Producers register a resolver closure under a component name and return a
//! [`RefNode`](crate::schema::RefNode) right away. Nothing is materialized until
//! [`SchemaRegistry::drain_all`] runs, so two classes referring to each other
//! only ever see references to one another, never the concrete bodies.

use crate::error::Result;
use crate::schema::SchemaNode;
use indexmap::IndexMap;
use log::debug;
use std::collections::HashSet;

/// Deferred resolver for one component. It receives the generation context so
/// it can classify nested types and register further components.
pub type SchemaThunk<C> = Box<dyn FnOnce(&mut C) -> Result<SchemaNode>>;

/// A context that owns a registry of resolvers expecting that same context.
pub trait RegistryHost: Sized {
    fn registry(&mut self) -> &mut SchemaRegistry<Self>;
}

pub struct SchemaRegistry<C> {
    /// Resolvers waiting for the drain phase, in registration order
    pending: IndexMap<String, SchemaThunk<C>>,
    /// Materialized components
    resolved: IndexMap<String, SchemaNode>,
    /// Every name ever registered, including the one being drained right now
    claimed: HashSet<String>,
}

impl<C> SchemaRegistry<C> {
    pub fn new() -> Self {
        Self {
            pending: IndexMap::new(),
            resolved: IndexMap::new(),
            claimed: HashSet::new(),
        }
    }

    /// Registers `resolver` under `name` unless the name is already taken.
    ///
    /// The resolver is stored, not called. It runs once, during
    /// [`SchemaRegistry::drain_all`].
    ///
    /// # Arguments
    ///
    /// * `name` - Component name, as used in `#/components/schemas/{name}`
    /// * `resolver` - Closure producing the component body from the host context
    ///
    /// # Returns
    ///
    /// `true` when the resolver was stored. The first registration always
    /// wins; later ones are dropped without being invoked.
    pub fn register<F>(&mut self, name: impl Into<String>, resolver: F) -> bool
    where
        F: FnOnce(&mut C) -> Result<SchemaNode> + 'static,
    {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }
        debug!("Registering component schema {}", name);
        self.claimed.insert(name.clone());
        self.pending.insert(name, Box::new(resolver));
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.claimed.contains(name)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn resolved(&self) -> &IndexMap<String, SchemaNode> {
        &self.resolved
    }

    pub fn into_resolved(self) -> IndexMap<String, SchemaNode> {
        self.resolved
    }

    fn next_pending(&mut self) -> Option<(String, SchemaThunk<C>)> {
        self.pending.shift_remove_index(0)
    }
}

impl<C: RegistryHost> SchemaRegistry<C> {
    /// Invokes pending resolvers until none remain.
    ///
    /// A resolver may register new names; they join the pending set and are
    /// drained in the same loop. Each name is resolved exactly once.
    pub fn drain_all(host: &mut C) -> Result<()> {
        debug!("Draining {} pending component schemas", host.registry().pending_count());
        while let Some((name, resolver)) = host.registry().next_pending() {
            debug!("Resolving component schema {}", name);
            let schema = resolver(host)?;
            host.registry().resolved.insert(name, schema);
        }
        Ok(())
    }
}

impl<C> Default for SchemaRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}
