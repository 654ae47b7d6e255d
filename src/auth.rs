//! # Authentication Gate
//!
//! JWT verification middleware built once at mount time and prepended to
//! every route that is not auth-excluded. The gate owns only the exclusion
//! pattern list and the token extraction strategy; signature verification
//! itself is delegated to `jsonwebtoken` (HS256).

use std::sync::Arc;

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::Value;
use tracing::warn;

use crate::chain::{handler_fn, Handler};
use crate::context::Context;
use crate::error::RequestError;
use crate::path::PathPattern;

/// Where the gate looks for the token
#[derive(Clone)]
pub enum TokenExtractor {
    /// `Authorization: Bearer <token>` header
    BearerHeader,
    /// A named query-string parameter
    QueryParam(String),
    /// Caller-supplied extraction
    Custom(Arc<dyn Fn(&Context) -> Option<String> + Send + Sync>),
}

impl TokenExtractor {
    fn extract(&self, context: &Context) -> Option<String> {
        match self {
            Self::BearerHeader => context
                .header("authorization")
                .and_then(|h| h.strip_prefix("Bearer "))
                .map(str::to_string),
            Self::QueryParam(name) => context.query.get(name).cloned(),
            Self::Custom(f) => f(context),
        }
    }
}

impl std::fmt::Debug for TokenExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BearerHeader => f.write_str("BearerHeader"),
            Self::QueryParam(name) => f.debug_tuple("QueryParam").field(name).finish(),
            Self::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// Authentication configuration for the mounting router
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Shared HS256 secret
    pub secret: String,
    /// Token extraction strategy
    pub token_from: TokenExtractor,
    /// Path patterns reachable without a token (`:name` tokens match any
    /// single segment)
    pub excluded: Vec<String>,
}

impl AuthConfig {
    /// Gate requests with the given shared secret, token taken from the
    /// `Authorization` header
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            token_from: TokenExtractor::BearerHeader,
            excluded: Vec::new(),
        }
    }

    /// Change the token extraction strategy
    #[must_use]
    pub fn token_from(mut self, extractor: TokenExtractor) -> Self {
        self.token_from = extractor;
        self
    }

    /// Add an exclusion pattern
    #[must_use]
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.excluded.push(pattern.into());
        self
    }
}

struct GateState {
    key: DecodingKey,
    validation: Validation,
    patterns: Vec<PathPattern>,
    extractor: TokenExtractor,
}

/// Build the gate handler once for a mount pass
///
/// Verified claims are stored on the context for downstream handlers; a
/// missing or invalid token aborts the chain with
/// [`RequestError::Unauthorized`].
#[must_use]
pub fn gate(config: &AuthConfig) -> Handler {
    let state = Arc::new(GateState {
        key: DecodingKey::from_secret(config.secret.as_bytes()),
        validation: Validation::new(Algorithm::HS256),
        patterns: config.excluded.iter().map(|p| PathPattern::parse(p)).collect(),
        extractor: config.token_from.clone(),
    });

    handler_fn(move |ctx, next| {
        let state = Arc::clone(&state);
        async move {
            let (request_path, token) =
                ctx.with(|c| (c.path.clone(), state.extractor.extract(c)));

            if state.patterns.iter().any(|p| p.matches(&request_path)) {
                return next.run(ctx).await;
            }

            let Some(token) = token else {
                return Err(RequestError::Unauthorized {
                    reason: "missing authorization token".to_string(),
                });
            };

            match decode::<Value>(&token, &state.key, &state.validation) {
                Ok(data) => {
                    ctx.with(|c| c.claims = Some(data.claims));
                    next.run(ctx).await
                }
                Err(e) => {
                    warn!(path = %request_path, "JWT validation failed: {e}");
                    Err(RequestError::Unauthorized {
                        reason: "invalid authorization token".to_string(),
                    })
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Chain;
    use crate::context::Ctx;
    use crate::method::Method;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &str = "skmdev";

    fn signed_token() -> String {
        let claims = json!({
            "foo": "bar",
            "exp": jsonwebtoken::get_current_timestamp() + 3600,
        });
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_missing_token_rejected() {
        let config = AuthConfig::new(SECRET);
        let chain = Chain::new(vec![gate(&config)]);
        let ctx = Ctx::new(crate::context::Context::new(Method::Get, "/user"));

        let err = chain.run(ctx).await.unwrap_err();
        assert_eq!(err.status(), 401);
    }

    #[tokio::test]
    async fn test_valid_token_sets_claims() {
        let config = AuthConfig::new(SECRET);
        let chain = Chain::new(vec![gate(&config)]);
        let mut context = crate::context::Context::new(Method::Get, "/user");
        context.set_header("authorization", format!("Bearer {}", signed_token()));
        let ctx = Ctx::new(context);

        chain.run(ctx.clone()).await.unwrap();
        let claims = ctx.with(|c| c.claims.clone()).unwrap();
        assert_eq!(claims["foo"], "bar");
    }

    #[tokio::test]
    async fn test_tampered_token_rejected() {
        let config = AuthConfig::new(SECRET);
        let chain = Chain::new(vec![gate(&config)]);
        let mut context = crate::context::Context::new(Method::Get, "/user");
        context.set_header("authorization", format!("Bearer {}x", signed_token()));
        let ctx = Ctx::new(context);

        let err = chain.run(ctx).await.unwrap_err();
        assert_eq!(err.status(), 401);
    }

    #[tokio::test]
    async fn test_excluded_pattern_bypasses_gate() {
        let config = AuthConfig::new(SECRET).exclude("/graphql");
        let chain = Chain::new(vec![gate(&config)]);
        let ctx = Ctx::new(crate::context::Context::new(Method::Post, "/graphql"));

        chain.run(ctx).await.unwrap();
    }

    #[tokio::test]
    async fn test_param_token_in_exclusion_pattern() {
        let config = AuthConfig::new(SECRET).exclude("/public/:file");
        let chain = Chain::new(vec![gate(&config)]);

        let ctx = Ctx::new(crate::context::Context::new(Method::Get, "/public/logo.png"));
        chain.run(ctx).await.unwrap();

        let ctx = Ctx::new(crate::context::Context::new(Method::Get, "/private/logo.png"));
        let err = chain.run(ctx).await.unwrap_err();
        assert_eq!(err.status(), 401);
    }

    #[tokio::test]
    async fn test_query_param_extractor() {
        let config =
            AuthConfig::new(SECRET).token_from(TokenExtractor::QueryParam("token".to_string()));
        let chain = Chain::new(vec![gate(&config)]);
        let mut context = crate::context::Context::new(Method::Get, "/user");
        context.query.insert("token".to_string(), signed_token());
        let ctx = Ctx::new(context);

        chain.run(ctx.clone()).await.unwrap();
        assert!(ctx.with(|c| c.claims.is_some()));
    }
}
