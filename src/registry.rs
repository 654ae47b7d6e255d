//! # Metadata Registry & Decorations
//!
//! The registration-time half of the crate. A [`Registry`] accumulates
//! per-method route metadata through explicit decoration calls, merging
//! repeated declarations on the same method in whatever order they arrive.
//! [`Registry::finalize`] then flushes an owner's entries into the shared
//! pending table for the mounting router to consume.
//!
//! The registry is an ordinary value owned by the application, not process
//! state: several independent registries (and therefore routers) can coexist
//! in one process.

use serde_json::Value;

use crate::chain::Handler;
use crate::error::{Error, Result};
use crate::method::Method;
use crate::path;
use crate::route::{PendingRoute, PendingRoutes, RouteConfig, RouteMethodEntry};
use crate::validation::Required;

/// Stable handle identifying a controller grouping
///
/// Assigned by [`Registry::owner`] at construction time; never derived from
/// type names, so identically named controllers in different modules cannot
/// collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(usize);

impl OwnerId {
    #[cfg(test)]
    pub(crate) fn for_tests(index: usize) -> Self {
        Self(index)
    }
}

/// Partial per-method options merged by [`Registry::update_method_options`]
///
/// Only fields that are `Some` overwrite the existing entry; everything else
/// is left untouched, which makes decoration order irrelevant for
/// non-conflicting fields.
#[derive(Default)]
pub struct MethodOptions {
    /// Route verb and path
    pub route: Option<RouteConfig>,
    /// Mount priority
    pub priority: Option<i32>,
    /// Request-time metadata
    pub meta: Option<Value>,
    /// Exclusion from the authentication gate
    pub auth_excluded: Option<bool>,
}

/// Accumulates route declarations until they are finalized
pub struct Registry {
    owner_names: Vec<String>,
    entries: Vec<RouteMethodEntry>,
    pending: PendingRoutes,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Create a registry with its own pending table
    #[must_use]
    pub fn new() -> Self {
        Self::with_table(PendingRoutes::new())
    }

    /// Create a registry flushing into an existing pending table
    #[must_use]
    pub fn with_table(pending: PendingRoutes) -> Self {
        Self {
            owner_names: Vec::new(),
            entries: Vec::new(),
            pending,
        }
    }

    /// Allocate a controller handle
    ///
    /// The name is kept for diagnostics only; identity is the handle.
    pub fn owner(&mut self, name: impl Into<String>) -> OwnerId {
        self.owner_names.push(name.into());
        OwnerId(self.owner_names.len() - 1)
    }

    /// Diagnostic name of an owner
    #[must_use]
    pub fn owner_name(&self, owner: OwnerId) -> &str {
        self.owner_names.get(owner.0).map_or("<unknown>", String::as_str)
    }

    /// Handle to the pending table this registry flushes into
    #[must_use]
    pub fn pending(&self) -> PendingRoutes {
        self.pending.clone()
    }

    fn entry_mut(&mut self, owner: OwnerId, name: &str) -> &mut RouteMethodEntry {
        let position = self
            .entries
            .iter()
            .position(|e| e.owner == owner && e.method_name == name);
        match position {
            Some(i) => &mut self.entries[i],
            None => {
                self.entries.push(RouteMethodEntry::new(owner, name));
                self.entries.last_mut().expect("just pushed")
            }
        }
    }

    /// Insert or merge partial options for `(owner, name)`
    ///
    /// Inserts a fresh entry when none exists; otherwise overwrites only the
    /// fields present in `options`. Decorations never raise errors;
    /// malformed configuration surfaces at finalize/mount time.
    pub fn update_method_options(&mut self, owner: OwnerId, name: &str, options: MethodOptions) {
        let entry = self.entry_mut(owner, name);
        if let Some(route) = options.route {
            entry.route = Some(route);
        }
        if let Some(priority) = options.priority {
            entry.priority = priority;
        }
        if let Some(meta) = options.meta {
            entry.meta = meta;
        }
        if let Some(auth_excluded) = options.auth_excluded {
            entry.auth_excluded = auth_excluded;
        }
    }

    /// Bind the terminal handler for `(owner, name)`
    pub fn bind(&mut self, owner: OwnerId, name: &str, handler: Handler) {
        self.entry_mut(owner, name).terminal = Some(handler);
    }

    /// Prepend a middleware handler to `(owner, name)`
    ///
    /// The most recently prepended handler runs first.
    pub fn prepend(&mut self, owner: OwnerId, name: &str, handler: Handler) {
        self.entry_mut(owner, name).front.insert(0, handler);
    }

    /// Start a decoration builder for one handler method
    pub fn method<'a>(&'a mut self, owner: OwnerId, name: &str) -> RouteBuilder<'a> {
        RouteBuilder {
            registry: self,
            owner,
            name: name.to_string(),
        }
    }

    /// Flush an owner's accumulated entries into the pending table
    ///
    /// No-op when the owner holds no entries (controllers without routes are
    /// legal). Records the owner's path prefix (a single slot, last write
    /// wins) and moves every entry out of the registry.
    ///
    /// # Errors
    ///
    /// Fails fast with [`Error::MissingRoute`] when an entry never received
    /// a route verb decoration, or [`Error::MissingHandler`] when no
    /// terminal handler was bound.
    pub fn finalize(&mut self, owner: OwnerId, prefix: &str) -> Result<()> {
        let mut drained = Vec::new();
        let mut i = 0;
        while i < self.entries.len() {
            if self.entries[i].owner == owner {
                drained.push(self.entries.swap_remove(i));
            } else {
                i += 1;
            }
        }
        if drained.is_empty() {
            return Ok(());
        }

        self.pending.set_prefix(owner, prefix);

        for entry in drained {
            let Some(route) = entry.route.clone() else {
                return Err(Error::MissingRoute {
                    owner: self.owner_name(owner).to_string(),
                    method_name: entry.method_name,
                });
            };
            if entry.terminal.is_none() {
                return Err(Error::MissingHandler {
                    owner: self.owner_name(owner).to_string(),
                    method_name: entry.method_name,
                });
            }

            let priority = entry.priority;
            let meta = entry.meta.clone();
            let auth_excluded = entry.auth_excluded;
            self.pending.push(PendingRoute {
                owner,
                method: route.method,
                path: route.path,
                priority,
                meta,
                auth_excluded,
                handlers: entry.into_handlers(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("owners", &self.owner_names)
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// Fluent decoration surface for one handler method
///
/// Each call writes one decoration into the registry immediately; calls can
/// arrive in any order and later writes win on conflicting fields.
pub struct RouteBuilder<'a> {
    registry: &'a mut Registry,
    owner: OwnerId,
    name: String,
}

impl RouteBuilder<'_> {
    /// Declare the route verb and path (path is normalized)
    pub fn route(self, method: Method, route_path: &str) -> Self {
        let config = RouteConfig {
            method,
            path: path::normalize(route_path),
        };
        self.registry.update_method_options(
            self.owner,
            &self.name,
            MethodOptions {
                route: Some(config),
                ..MethodOptions::default()
            },
        );
        self
    }

    /// Declare a GET route
    pub fn get(self, route_path: &str) -> Self {
        self.route(Method::Get, route_path)
    }

    /// Declare a POST route
    pub fn post(self, route_path: &str) -> Self {
        self.route(Method::Post, route_path)
    }

    /// Declare a PUT route
    pub fn put(self, route_path: &str) -> Self {
        self.route(Method::Put, route_path)
    }

    /// Declare a DELETE route
    pub fn delete(self, route_path: &str) -> Self {
        self.route(Method::Delete, route_path)
    }

    /// Declare a PATCH route
    pub fn patch(self, route_path: &str) -> Self {
        self.route(Method::Patch, route_path)
    }

    /// Declare a route answering every verb
    pub fn all(self, route_path: &str) -> Self {
        self.route(Method::All, route_path)
    }

    /// Set the mount priority (higher mounts earlier)
    pub fn priority(self, priority: i32) -> Self {
        self.registry.update_method_options(
            self.owner,
            &self.name,
            MethodOptions {
                priority: Some(priority),
                ..MethodOptions::default()
            },
        );
        self
    }

    /// Attach request-time metadata
    pub fn meta(self, meta: Value) -> Self {
        self.registry.update_method_options(
            self.owner,
            &self.name,
            MethodOptions {
                meta: Some(meta),
                ..MethodOptions::default()
            },
        );
        self
    }

    /// Exclude this route from the authentication gate
    pub fn unless(self) -> Self {
        self.registry.update_method_options(
            self.owner,
            &self.name,
            MethodOptions {
                auth_excluded: Some(true),
                ..MethodOptions::default()
            },
        );
        self
    }

    /// Bind the terminal handler
    pub fn bind(self, handler: Handler) -> Self {
        self.registry.bind(self.owner, &self.name, handler);
        self
    }

    /// Prepend a middleware handler (most recently added runs first)
    pub fn middleware(self, handler: Handler) -> Self {
        self.registry.prepend(self.owner, &self.name, handler);
        self
    }

    /// Prepend a validation gate built from the given rules
    pub fn required(self, rules: Required) -> Self {
        let gate = rules.into_handler();
        self.middleware(gate)
    }
}
