//! # Route Metadata
//!
//! The data records of the registration pipeline: the mutable
//! [`RouteMethodEntry`] accumulated by decorations, the finalized
//! [`PendingRoute`], and the shared [`PendingRoutes`] table the mounting
//! router drains at startup.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;

use crate::chain::Handler;
use crate::method::Method;
use crate::registry::OwnerId;

/// Verb and path set by a route decoration
#[derive(Debug, Clone)]
pub struct RouteConfig {
    /// Route verb
    pub method: Method,
    /// Normalized route path, relative to the owner's prefix
    pub path: String,
}

/// One declared handler, mutable until finalized
///
/// At most one entry exists per `(owner, method_name)` pair; repeated
/// decorations on the same method merge into it.
pub struct RouteMethodEntry {
    /// Owning controller handle
    pub owner: OwnerId,
    /// Handler name within the owner
    pub method_name: String,
    /// Prepended middleware, most recently applied first
    pub front: Vec<Handler>,
    /// The final handler of the chain
    pub terminal: Option<Handler>,
    /// Verb and path; absent until a route decoration runs
    pub route: Option<RouteConfig>,
    /// Mount priority, higher mounts earlier
    pub priority: i32,
    /// Free-form metadata injected at request time
    pub meta: Value,
    /// Removes the route from the authentication gate's scope
    pub auth_excluded: bool,
}

impl RouteMethodEntry {
    pub(crate) fn new(owner: OwnerId, method_name: impl Into<String>) -> Self {
        Self {
            owner,
            method_name: method_name.into(),
            front: Vec::new(),
            terminal: None,
            route: None,
            priority: 0,
            meta: Value::Object(serde_json::Map::new()),
            auth_excluded: false,
        }
    }

    /// The composed handler chain: prepended middleware, then the terminal
    pub(crate) fn into_handlers(self) -> Vec<Handler> {
        let mut handlers = self.front;
        if let Some(terminal) = self.terminal {
            handlers.push(terminal);
        }
        handlers
    }
}

impl std::fmt::Debug for RouteMethodEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteMethodEntry")
            .field("owner", &self.owner)
            .field("method_name", &self.method_name)
            .field("front", &self.front.len())
            .field("terminal", &self.terminal.is_some())
            .field("route", &self.route)
            .field("priority", &self.priority)
            .field("auth_excluded", &self.auth_excluded)
            .finish()
    }
}

/// A finalized, mount-ready route
pub struct PendingRoute {
    /// Owning controller handle, used to resolve the prefix at mount time
    pub owner: OwnerId,
    /// Route verb
    pub method: Method,
    /// Normalized route path, still relative to the owner's prefix
    pub path: String,
    /// Mount priority
    pub priority: i32,
    /// Metadata injected per request
    pub meta: Value,
    /// Whether the authentication gate skips this route
    pub auth_excluded: bool,
    /// The composed handler chain
    pub handlers: Vec<Handler>,
}

#[derive(Default)]
struct Inner {
    routes: Vec<PendingRoute>,
    prefixes: HashMap<OwnerId, String>,
}

/// Shared table of routes awaiting mounting
///
/// Also carries the per-owner prefix slots written by the finalizer (a
/// single slot per owner, last write wins). The mounter consumes the
/// accumulated routes exactly once per mount pass via [`Self::drain`], so
/// repeated independent mount cycles work as expected in tests.
#[derive(Clone, Default)]
pub struct PendingRoutes {
    inner: Arc<Mutex<Inner>>,
}

impl PendingRoutes {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a finalized route
    pub fn push(&self, route: PendingRoute) {
        self.lock().routes.push(route);
    }

    /// Record an owner's path prefix (last write wins)
    pub fn set_prefix(&self, owner: OwnerId, prefix: impl Into<String>) {
        self.lock().prefixes.insert(owner, prefix.into());
    }

    /// Atomically snapshot the accumulated routes and clear the table
    ///
    /// Finalize calls racing a later registration cycle can never interleave
    /// with a mount pass: the snapshot happens under a single lock.
    #[must_use]
    pub fn drain(&self) -> (Vec<PendingRoute>, HashMap<OwnerId, String>) {
        let mut inner = self.lock();
        let routes = std::mem::take(&mut inner.routes);
        let prefixes = inner.prefixes.clone();
        (routes, prefixes)
    }

    /// Number of routes currently awaiting mounting
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().routes.len()
    }

    /// Whether the table is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().routes.is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for PendingRoutes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRoutes").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(owner: OwnerId, path: &str) -> PendingRoute {
        PendingRoute {
            owner,
            method: Method::Get,
            path: path.to_string(),
            priority: 0,
            meta: json!({}),
            auth_excluded: false,
            handlers: Vec::new(),
        }
    }

    #[test]
    fn test_drain_clears_table() {
        let table = PendingRoutes::new();
        let owner = OwnerId::for_tests(0);
        table.push(sample(owner, "/a"));
        table.push(sample(owner, "/b"));
        assert_eq!(table.len(), 2);

        let (routes, _) = table.drain();
        assert_eq!(routes.len(), 2);
        assert!(table.is_empty());

        let (routes, _) = table.drain();
        assert!(routes.is_empty());
    }

    #[test]
    fn test_prefix_slot_last_write_wins() {
        let table = PendingRoutes::new();
        let owner = OwnerId::for_tests(7);
        table.set_prefix(owner, "/old");
        table.set_prefix(owner, "/user");

        let (_, prefixes) = table.drain();
        assert_eq!(prefixes.get(&owner).map(String::as_str), Some("/user"));
    }

    #[test]
    fn test_prefixes_survive_drain() {
        let table = PendingRoutes::new();
        let owner = OwnerId::for_tests(1);
        table.set_prefix(owner, "/user");
        let _ = table.drain();

        table.push(sample(owner, "/later"));
        let (_, prefixes) = table.drain();
        assert!(prefixes.contains_key(&owner));
    }
}
