//! # GraphQL Adapter
//!
//! Bridges handler chains into GraphQL field resolvers. A resolver built
//! with [`resolver`] installs a [`GraphqlState`] on the request context
//! before running its chain, so every middleware sees the invocation's
//! root value, arguments, and field information.
//!
//! Body writes are keyed per field: two resolvers executing against the
//! same request context each get their own slot in a shared map, keyed by
//! [`ResolverInfo::path_key`]. The resolver's return value is whatever its
//! chain wrote to its own slot, `null` when nothing was written.
//!
//! When a [`GraphqlState`] is present the request-validation gate steps
//! aside; argument checking belongs to the GraphQL schema itself.

use std::sync::Arc;

use serde_json::Value;

use crate::chain::{BoxFuture, Chain, Handler};
use crate::context::Ctx;
use crate::error::RequestError;

/// Field-level information for one resolver invocation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolverInfo {
    /// Response key of the field being resolved (the alias when one is
    /// used, otherwise the field name)
    pub path_key: String,
}

impl ResolverInfo {
    /// Describe an invocation by its response key
    #[must_use]
    pub fn new(path_key: impl Into<String>) -> Self {
        Self {
            path_key: path_key.into(),
        }
    }
}

/// Per-invocation GraphQL state carried on the request context
#[derive(Clone, Debug, Default)]
pub struct GraphqlState {
    /// Parent object the field is resolved against
    pub root: Value,
    /// Field arguments
    pub args: Value,
    /// Invocation field information
    pub info: ResolverInfo,
    /// Response bodies of every resolver run against this request,
    /// keyed by field response key
    pub body: serde_json::Map<String, Value>,
}

impl Default for ResolverInfo {
    fn default() -> Self {
        Self::new("")
    }
}

/// A GraphQL field resolver backed by a handler chain
pub type Resolver = Arc<
    dyn Fn(Ctx, Value, Value, ResolverInfo) -> BoxFuture<Result<Value, RequestError>>
        + Send
        + Sync,
>;

/// Turn a handler chain into a field resolver
///
/// The chain runs with the invocation's [`GraphqlState`] installed on the
/// context; any body map from an earlier invocation on the same request is
/// carried over so sibling fields keep their slots.
#[must_use]
pub fn resolver(handlers: Vec<Handler>) -> Resolver {
    let chain = Chain::new(handlers);
    Arc::new(move |ctx, root, args, info| {
        let chain = chain.clone();
        Box::pin(async move {
            let key = info.path_key.clone();
            ctx.with(|c| {
                let body = c.graphql.take().map(|g| g.body).unwrap_or_default();
                c.graphql = Some(GraphqlState {
                    root,
                    args,
                    info,
                    body,
                });
            });
            chain.run(ctx.clone()).await?;
            let value = ctx.with(|c| {
                c.graphql
                    .as_ref()
                    .and_then(|g| g.body.get(&key).cloned())
            });
            Ok(value.unwrap_or(Value::Null))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::handler_fn;
    use crate::context::Context;
    use crate::method::Method;
    use serde_json::json;

    fn echo_args() -> Vec<Handler> {
        vec![handler_fn(|ctx, _next| async move {
            let args = ctx.with(|c| {
                c.graphql
                    .as_ref()
                    .map(|g| g.args.clone())
                    .unwrap_or_default()
            });
            ctx.set_body(args);
            Ok(())
        })]
    }

    #[tokio::test]
    async fn test_resolver_returns_chain_body() {
        let resolve = resolver(echo_args());
        let ctx = Ctx::new(Context::new(Method::Post, "/graphql"));

        let out = resolve(
            ctx,
            Value::Null,
            json!({"userId": 7}),
            ResolverInfo::new("getUser"),
        )
        .await
        .unwrap();
        assert_eq!(out, json!({"userId": 7}));
    }

    #[tokio::test]
    async fn test_resolver_without_body_yields_null() {
        let resolve = resolver(vec![handler_fn(|_ctx, _next| async { Ok(()) })]);
        let ctx = Ctx::new(Context::new(Method::Post, "/graphql"));

        let out = resolve(ctx, Value::Null, json!({}), ResolverInfo::new("ping"))
            .await
            .unwrap();
        assert_eq!(out, Value::Null);
    }

    #[tokio::test]
    async fn test_sibling_fields_keep_independent_slots() {
        let resolve = resolver(echo_args());
        let ctx = Ctx::new(Context::new(Method::Post, "/graphql"));

        let first = resolve(
            ctx.clone(),
            Value::Null,
            json!({"name": "skmdev"}),
            ResolverInfo::new("getUser"),
        )
        .await
        .unwrap();
        let second = resolve(
            ctx.clone(),
            Value::Null,
            json!({"page": 1}),
            ResolverInfo::new("getUsers"),
        )
        .await
        .unwrap();

        assert_eq!(first, json!({"name": "skmdev"}));
        assert_eq!(second, json!({"page": 1}));

        // The shared map still holds the first field's slot.
        let kept = ctx.with(|c| {
            c.graphql
                .as_ref()
                .and_then(|g| g.body.get("getUser").cloned())
        });
        assert_eq!(kept, Some(json!({"name": "skmdev"})));
    }

    #[tokio::test]
    async fn test_resolver_error_propagates() {
        let resolve = resolver(vec![handler_fn(|_ctx, _next| async {
            Err(RequestError::Internal("boom".to_string()))
        })]);
        let ctx = Ctx::new(Context::new(Method::Post, "/graphql"));

        let err = resolve(ctx, Value::Null, json!({}), ResolverInfo::new("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::Internal(_)));
    }
}
