//! Handler registry
//!
//! Maps a host operator type name to the handler rewriting it. The registry is built explicitly
//! by the caller before a pass runs and is only read while rewriting.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{CanonicalizeError, Result};
use crate::ir::{Graph, NodeId};

/// Rewrites one host operation into target operations.
///
/// Implementations receive the graph and the source operation, emit the replacement fragment
/// and return its final node. The source operation is left in place for the pass to remove.
pub trait Handler: Send + Sync {
    fn canonicalize(&self, graph: &mut Graph, node: NodeId) -> Result<NodeId>;
}

impl<F> Handler for F
where
    F: Fn(&mut Graph, NodeId) -> Result<NodeId> + Send + Sync,
{
    fn canonicalize(&self, graph: &mut Graph, node: NodeId) -> Result<NodeId> {
        self(graph, node)
    }
}

pub type SymbolHandler = Arc<dyn Handler>;

/// Registry of handlers keyed by host operator type.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, SymbolHandler>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every handler shipped with this crate.
    pub fn with_default_handlers() -> Self {
        Self::from_handlers(crate::handlers::default_handlers())
    }

    /// Build a registry from `(name, handler)` pairs, later pairs winning over earlier ones.
    pub fn from_handlers<I, S>(handlers: I) -> Self
    where
        I: IntoIterator<Item = (S, SymbolHandler)>,
        S: Into<String>,
    {
        let mut registry = Self::new();
        for (name, handler) in handlers {
            registry.insert(name.into(), handler);
        }
        registry
    }

    /// Register `handler` for `name`, returning the handler it replaced.
    ///
    /// A second registration under the same name silently wins over the first one.
    pub fn register<H>(&mut self, name: impl Into<String>, handler: H) -> Option<SymbolHandler>
    where
        H: Handler + 'static,
    {
        self.insert(name.into(), Arc::new(handler))
    }

    fn insert(&mut self, name: String, handler: SymbolHandler) -> Option<SymbolHandler> {
        let previous = self.handlers.insert(name.clone(), handler);
        if previous.is_some() {
            log::debug!("Handler for `{name}` overwritten");
        }
        previous
    }

    pub fn lookup(&self, name: &str) -> Option<SymbolHandler> {
        self.handlers.get(name).cloned()
    }

    /// Like [`lookup`](Self::lookup), reporting a miss as an unsupported operator.
    pub fn get_handler(&self, name: &str) -> Result<SymbolHandler> {
        self.lookup(name)
            .ok_or_else(|| CanonicalizeError::UnregisteredOperator(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered operator names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.names())
            .finish()
    }
}
