//! # Route Mounter & Dispatcher
//!
//! The startup half of request routing. [`mount`] drains the shared pending
//! table in one atomic snapshot, orders the routes by priority and
//! specificity, interleaves the metadata-injection middleware and the
//! optional authentication gate, and registers each chain on a
//! [`Mountable`] target.
//!
//! [`Dispatcher`] is the bundled `Mountable`: a radix-trie router over
//! `matchit`, one trie per verb, mirroring how incoming requests are
//! dispatched at the boundary. Path matching itself stays entirely inside
//! `matchit`; this module never reimplements it.

use std::collections::HashMap;

use matchit::Router as MatchitRouter;
use serde_json::Value;
use tracing::info;

use crate::auth::{self, AuthConfig};
use crate::chain::{handler_fn, Chain, Handler};
use crate::error::{Error, Result};
use crate::method::{Method, CONCRETE_METHODS};
use crate::path;
use crate::route::PendingRoutes;

/// Registration surface of an underlying router
pub trait Mountable {
    /// Register a handler chain for a verb and mount path
    ///
    /// # Errors
    ///
    /// Implementations reject malformed or conflicting path patterns with
    /// [`Error::InvalidRoutePattern`]; this aborts startup.
    fn register(&mut self, method: Method, mount_path: &str, chain: Chain) -> Result<()>;
}

/// Middleware that injects a route's metadata into the request context
///
/// Prepended to every mounted chain so handlers can read the metadata the
/// route was declared with.
#[must_use]
pub fn set_meta(meta: Value) -> Handler {
    handler_fn(move |ctx, next| {
        let meta = meta.clone();
        async move {
            ctx.with(|c| c.meta = meta);
            next.run(ctx).await
        }
    })
}

/// Drain the pending table and register every route on `target`
///
/// Ordering: priority descending, ties broken by path specificity. At
/// equal priority a fully static path mounts before one containing a `:`
/// parameter token (comparator: index of the first token, ascending, with
/// `-1` for static paths).
///
/// The gate handler is built once per mount pass when authentication is
/// configured, and prepended (outermost) to every route that is not
/// auth-excluded. The metadata-injection handler is always prepended.
///
/// Returns the number of routes registered. Mounting normally runs exactly
/// once per server start; calling again later consumes whatever accumulated
/// in the table since the previous drain.
///
/// # Errors
///
/// Propagates registration failures from the target; these are fatal
/// configuration errors.
pub fn mount<R: Mountable>(
    table: &PendingRoutes,
    target: &mut R,
    authentication: Option<&AuthConfig>,
) -> Result<usize> {
    let (mut routes, prefixes) = table.drain();

    routes.sort_by_key(|r| path::specificity(&r.path));
    routes.sort_by(|a, b| b.priority.cmp(&a.priority));

    let gate = authentication.map(auth::gate);

    let mut mounted = 0;
    for route in routes {
        let prefix = prefixes
            .get(&route.owner)
            .map_or("", String::as_str);
        let mount_path = path::join(prefix, &route.path);

        let mut handlers = route.handlers;
        handlers.insert(0, set_meta(route.meta));
        if let Some(gate) = &gate {
            if !route.auth_excluded {
                handlers.insert(0, gate.clone());
            }
        }

        info!(method = %route.method, path = %mount_path, priority = route.priority, "mounting route");
        target.register(route.method, &mount_path, Chain::new(handlers))?;
        mounted += 1;
    }
    Ok(mounted)
}

/// Result of dispatching one request line
pub enum DispatchOutcome {
    /// A route matched; run its chain with the extracted path parameters
    Matched {
        /// The mounted handler chain
        chain: Chain,
        /// Extracted path parameters
        params: HashMap<String, String>,
    },
    /// The path exists under other verbs; answer 405 with an Allow header
    MethodNotAllowed {
        /// Verbs that do match the path
        allowed: Vec<Method>,
    },
    /// Nothing matched; answer 404
    NotFound,
}

/// Radix-trie dispatch table, one trie per verb
#[derive(Default)]
pub struct Dispatcher {
    tables: HashMap<Method, MatchitRouter<usize>>,
    chains: Vec<Chain>,
}

impl Dispatcher {
    /// Create an empty dispatcher
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered routes (an `all` route counts once)
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.chains.len()
    }

    /// Match a request line against the registered routes
    #[must_use]
    pub fn dispatch(&self, method: Method, request_path: &str) -> DispatchOutcome {
        if let Some(table) = self.tables.get(&method) {
            if let Ok(matched) = table.at(request_path) {
                let params = matched
                    .params
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect();
                return DispatchOutcome::Matched {
                    chain: self.chains[*matched.value].clone(),
                    params,
                };
            }
        }

        let allowed: Vec<Method> = CONCRETE_METHODS
            .into_iter()
            .filter(|m| *m != method)
            .filter(|m| {
                self.tables
                    .get(m)
                    .is_some_and(|t| t.at(request_path).is_ok())
            })
            .collect();

        if allowed.is_empty() {
            DispatchOutcome::NotFound
        } else {
            DispatchOutcome::MethodNotAllowed { allowed }
        }
    }
}

impl Mountable for Dispatcher {
    fn register(&mut self, method: Method, mount_path: &str, chain: Chain) -> Result<()> {
        let pattern = path::to_matchit(mount_path);
        let id = self.chains.len();
        self.chains.push(chain);

        let methods: &[Method] = if method == Method::All {
            &CONCRETE_METHODS
        } else {
            std::slice::from_ref(&method)
        };

        for m in methods {
            self.tables
                .entry(*m)
                .or_default()
                .insert(&pattern, id)
                .map_err(|e| Error::InvalidRoutePattern {
                    pattern: mount_path.to_string(),
                    reason: e.to_string(),
                })?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.chains.len())
            .finish()
    }
}
