//! # Request Context
//!
//! Per-request state threaded through a handler chain. A [`Context`] holds
//! parsed request data (params, query, headers, JSON body), the metadata
//! injected for the matched route, verified claims, and the response slot.
//!
//! Handlers share the context through [`Ctx`], a cheaply cloneable handle.
//! Locks are taken for single mutations and never held across `.await`, so
//! the tokio cooperative model needs no further coordination.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::graphql::GraphqlState;
use crate::method::Method;

/// Per-request mutable state
#[derive(Debug)]
pub struct Context {
    /// Request verb
    pub method: Method,
    /// Request path, without the query string
    pub path: String,
    /// Path parameters extracted by the underlying router
    pub params: HashMap<String, String>,
    /// Parsed query-string parameters
    pub query: HashMap<String, String>,
    /// Request headers, keys lowercased
    pub headers: HashMap<String, String>,
    /// Parsed JSON request body, `Null` when absent
    pub request_body: Value,
    /// Route metadata injected by the mounting router
    pub meta: Value,
    /// Verified JWT claims, set by the authentication gate
    pub claims: Option<Value>,
    /// Response status override; defaults from the body state
    pub status: Option<u16>,
    /// GraphQL invocation state; presence also disables the validation gate
    pub graphql: Option<GraphqlState>,
    body: Option<Value>,
}

impl Context {
    /// Create an empty context for the given request line
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: HashMap::new(),
            query: HashMap::new(),
            headers: HashMap::new(),
            request_body: Value::Null,
            meta: Value::Object(serde_json::Map::new()),
            claims: None,
            status: None,
            graphql: None,
            body: None,
        }
    }

    /// Get a request header by name (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Set or override a request header
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
    }

    /// Write the response body
    ///
    /// During a GraphQL invocation this writes into the per-field slot of
    /// the shared body store, keyed by the current field's response key, so
    /// handler code stays GraphQL-unaware.
    pub fn set_body(&mut self, value: Value) {
        if let Some(graphql) = &mut self.graphql {
            graphql.body.insert(graphql.info.path_key.clone(), value);
        } else {
            self.body = Some(value);
        }
    }

    /// Read back the response body, if written
    #[must_use]
    pub fn body(&self) -> Option<Value> {
        if let Some(graphql) = &self.graphql {
            graphql.body.get(&graphql.info.path_key).cloned()
        } else {
            self.body.clone()
        }
    }
}

/// Shared handle to a request's [`Context`]
///
/// Cloning is cheap; every handler in a chain works on the same state.
#[derive(Clone, Debug)]
pub struct Ctx {
    inner: Arc<Mutex<Context>>,
}

impl Ctx {
    /// Wrap a context for chain execution
    #[must_use]
    pub fn new(context: Context) -> Self {
        Self {
            inner: Arc::new(Mutex::new(context)),
        }
    }

    /// Run a closure with exclusive access to the context
    ///
    /// The lock is released before the closure's result is returned; never
    /// call `.await` inside.
    pub fn with<R>(&self, f: impl FnOnce(&mut Context) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut guard)
    }

    /// Write the response body (see [`Context::set_body`])
    pub fn set_body(&self, value: Value) {
        self.with(|c| c.set_body(value));
    }

    /// Read the response body
    #[must_use]
    pub fn body(&self) -> Option<Value> {
        self.with(|c| c.body())
    }

    /// Set the response status code
    pub fn set_status(&self, status: u16) {
        self.with(|c| c.status = Some(status));
    }

    /// Clone the injected route metadata
    #[must_use]
    pub fn meta(&self) -> Value {
        self.with(|c| c.meta.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphql::ResolverInfo;
    use serde_json::json;

    #[test]
    fn test_body_roundtrip() {
        let mut ctx = Context::new(Method::Get, "/user");
        assert_eq!(ctx.body(), None);
        ctx.set_body(json!({"userName": "skm"}));
        assert_eq!(ctx.body(), Some(json!({"userName": "skm"})));
    }

    #[test]
    fn test_header_case_insensitive() {
        let mut ctx = Context::new(Method::Get, "/");
        ctx.set_header("Authorization", "Bearer x");
        assert_eq!(ctx.header("authorization"), Some("Bearer x"));
        assert_eq!(ctx.header("AUTHORIZATION"), Some("Bearer x"));
    }

    #[test]
    fn test_graphql_body_routed_by_field_key() {
        let mut ctx = Context::new(Method::Post, "/graphql");
        ctx.graphql = Some(GraphqlState {
            root: Value::Null,
            args: json!({}),
            info: ResolverInfo::new("getUser"),
            body: serde_json::Map::new(),
        });

        ctx.set_body(json!({"username": "skmdev"}));
        let state = ctx.graphql.as_ref().unwrap();
        assert_eq!(state.body.get("getUser"), Some(&json!({"username": "skmdev"})));
        assert_eq!(ctx.body(), Some(json!({"username": "skmdev"})));
    }

    #[test]
    fn test_shared_handle() {
        let ctx = Ctx::new(Context::new(Method::Get, "/"));
        let clone = ctx.clone();
        clone.set_body(json!(true));
        assert_eq!(ctx.body(), Some(json!(true)));
    }
}
