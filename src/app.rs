//! # Application
//!
//! Wires the registry, the mounter, and the dispatcher into a runnable
//! application. Controllers are plain registrar functions that receive the
//! registry, describe their routes through builder calls, and finalize;
//! [`AppBuilder::build`] runs every registrar, mounts the resulting route
//! table onto a [`Dispatcher`], and hands back an [`App`] that turns
//! decoded requests into responses.
//!
//! Registrar failures and route-table inconsistencies are fatal: the
//! application refuses to start rather than serve a partial route set.

use std::sync::Arc;

use serde_json::json;
use tracing::{error, info};

use crate::auth::AuthConfig;
use crate::context::{Context, Ctx};
use crate::error::{Error, RequestError, Result};
use crate::method::Method;
use crate::path;
use crate::registry::Registry;
use crate::request::RequestParts;
use crate::router::{self, DispatchOutcome, Dispatcher};
use crate::server::Response;

/// Routing-layer configuration
#[derive(Clone, Default)]
pub struct RouterConfig {
    /// JWT authentication; `None` leaves every route open
    pub authentication: Option<AuthConfig>,
}

impl RouterConfig {
    /// Configuration with no authentication
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable the authentication gate
    #[must_use]
    pub fn with_authentication(mut self, authentication: AuthConfig) -> Self {
        self.authentication = Some(authentication);
        self
    }
}

/// A controller registration function
///
/// Runs once at startup with exclusive access to the registry. Returning
/// an error aborts the build.
pub type Registrar = Box<dyn FnOnce(&mut Registry) -> Result<()> + Send>;

/// Collects registrars and builds the routed [`App`]
pub struct AppBuilder {
    config: RouterConfig,
    registrars: Vec<Registrar>,
}

impl AppBuilder {
    /// Start building with the given configuration
    #[must_use]
    pub fn new(config: RouterConfig) -> Self {
        Self {
            config,
            registrars: Vec::new(),
        }
    }

    /// Queue a controller registrar
    #[must_use]
    pub fn register(
        mut self,
        registrar: impl FnOnce(&mut Registry) -> Result<()> + Send + 'static,
    ) -> Self {
        self.registrars.push(Box::new(registrar));
        self
    }

    /// Run every registrar and mount the accumulated routes
    ///
    /// # Errors
    ///
    /// Propagates registrar failures, incomplete route declarations
    /// ([`Error::MissingRoute`], [`Error::MissingHandler`]), and pattern
    /// conflicts from the dispatcher. Any of these aborts startup.
    pub fn build(self) -> Result<App> {
        let mut registry = Registry::new();
        for registrar in self.registrars {
            registrar(&mut registry)?;
        }

        let mut dispatcher = Dispatcher::new();
        let mounted = router::mount(
            &registry.pending(),
            &mut dispatcher,
            self.config.authentication.as_ref(),
        )?;
        info!(routes = mounted, "application routes mounted");

        Ok(App {
            dispatcher: Arc::new(dispatcher),
        })
    }
}

/// A fully mounted application
#[derive(Clone, Debug)]
pub struct App {
    dispatcher: Arc<Dispatcher>,
}

impl App {
    /// Number of mounted routes
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.dispatcher.route_count()
    }

    /// Dispatch one decoded request and produce the response
    ///
    /// Unmatched paths answer 404; matched paths under the wrong verb
    /// answer 405 with an `Allow` header. A chain that completes without
    /// writing a body also answers 404, matching the behavior of a handler
    /// that never produced output.
    pub async fn handle(&self, parts: RequestParts) -> Response {
        let request_path = path::normalize(&parts.path);

        let (chain, params) = match self.dispatcher.dispatch(parts.method, &request_path) {
            DispatchOutcome::Matched { chain, params } => (chain, params),
            DispatchOutcome::MethodNotAllowed { allowed } => {
                let allow = allowed
                    .into_iter()
                    .map(Method::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                return Response::json(json!({"error": "Method Not Allowed"}).to_string())
                    .with_status(405)
                    .with_header("Allow", &allow);
            }
            DispatchOutcome::NotFound => {
                return Response::json(json!({"error": "Not Found"}).to_string())
                    .with_status(404);
            }
        };

        let context = match parts.into_context(params) {
            Ok(context) => context,
            Err(err) => {
                return Response::json(json!({"error": err.to_string()}).to_string())
                    .with_status(400);
            }
        };

        let ctx = Ctx::new(context);
        match chain.run(ctx.clone()).await {
            Ok(()) => Self::success_response(&ctx),
            Err(err) => Self::error_response(&err),
        }
    }

    fn success_response(ctx: &Ctx) -> Response {
        let (status, body) = ctx.with(|c: &mut Context| (c.status, c.body()));
        match (body, status) {
            (Some(body), Some(status)) => Response::json(body.to_string()).with_status(status),
            (Some(body), None) => Response::json(body.to_string()),
            // An explicit status with no body is a deliberate empty
            // response; only a handler that set neither falls back to 404.
            (None, Some(status)) => Response::default().with_status(status),
            (None, None) => {
                Response::json(json!({"error": "Not Found"}).to_string()).with_status(404)
            }
        }
    }

    fn error_response(err: &RequestError) -> Response {
        let status = err.status();
        let body = match err {
            RequestError::Validation(validation) => json!({
                "error": validation.message,
                "errors": validation.errors,
            }),
            RequestError::Unauthorized { reason } => json!({"error": reason}),
            RequestError::DoubleContinuation | RequestError::Internal(_) => {
                error!(error = %err, "request failed");
                json!({"error": "Internal Server Error"})
            }
        };
        Response::json(body.to_string()).with_status(status)
    }
}

impl std::fmt::Debug for RouterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterConfig")
            .field("authentication", &self.authentication.is_some())
            .finish()
    }
}

/// Report a registrar failure as [`Error::Registrar`]
///
/// Convenience for registrars that validate their own configuration.
pub fn registrar_error(reason: impl Into<String>) -> Error {
    Error::Registrar {
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenExtractor;
    use crate::chain::handler_fn;
    use crate::validation::{Required, Schema};
    use jsonwebtoken::{encode, get_current_timestamp, EncodingKey, Header};
    use serde_json::{json, Value};

    const SECRET: &str = "skmdev";

    fn token() -> String {
        let claims = json!({
            "sub": "user1",
            "exp": get_current_timestamp() + 3600,
        });
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn login_schema() -> Schema {
        Schema::object()
            .prop("userEmail", Schema::string())
            .prop("password", Schema::string())
            .require(["userEmail", "password"])
    }

    /// Mirrors a typical user controller: a prefix, open and guarded
    /// routes, validation on login, and a metadata route.
    fn user_controller(registry: &mut Registry) -> Result<()> {
        let owner = registry.owner("UserController");

        registry
            .method(owner, "get_user")
            .get("/:userId")
            .bind(handler_fn(|ctx, _next| async move {
                let id = ctx.with(|c| c.params.get("userId").cloned());
                ctx.set_body(json!({"userId": id}));
                Ok(())
            }));

        registry
            .method(owner, "login")
            .post("/login")
            .unless()
            .required(Required::new().body(login_schema()))
            .bind(handler_fn(|ctx, _next| async move {
                let email = ctx.with(|c| c.request_body["userEmail"].clone());
                ctx.set_body(json!({"user": email, "token": "issued"}));
                Ok(())
            }));

        registry
            .method(owner, "meta")
            .get("/meta")
            .meta(json!({"test": "cc"}))
            .bind(handler_fn(|ctx, _next| async move {
                let meta = ctx.meta();
                ctx.set_body(meta);
                Ok(())
            }));

        registry.finalize(owner, "/user")
    }

    fn guarded_app() -> App {
        let auth = AuthConfig::new(SECRET).token_from(TokenExtractor::BearerHeader);
        AppBuilder::new(RouterConfig::new().with_authentication(auth))
            .register(user_controller)
            .build()
            .unwrap()
    }

    fn body_json(response: &Response) -> Value {
        serde_json::from_str(&response.body).unwrap()
    }

    #[tokio::test]
    async fn test_guarded_route_without_token_is_401() {
        let app = guarded_app();
        let response = app
            .handle(RequestParts::new(Method::Get, "/user/1"))
            .await;
        assert_eq!(response.status, 401);
    }

    #[tokio::test]
    async fn test_guarded_route_with_token_succeeds() {
        let app = guarded_app();
        let request = RequestParts::new(Method::Get, "/user/1")
            .header("authorization", format!("Bearer {}", token()));
        let response = app.handle(request).await;
        assert_eq!(response.status, 200);
        assert_eq!(body_json(&response)["userId"], "1");
    }

    #[tokio::test]
    async fn test_excluded_login_skips_gate_but_validates() {
        let app = guarded_app();
        let request = RequestParts::new(Method::Post, "/user/login").json(&json!({}));
        let response = app.handle(request).await;
        assert_eq!(response.status, 412);
        let body = body_json(&response);
        assert_eq!(body["error"], "userEmail is required, password is required");
        assert_eq!(body["errors"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_excluded_login_with_valid_body_succeeds() {
        let app = guarded_app();
        let request = RequestParts::new(Method::Post, "/user/login")
            .json(&json!({"userEmail": "skmdev@gmail.com", "password": "123"}));
        let response = app.handle(request).await;
        assert_eq!(response.status, 200);
        assert_eq!(body_json(&response)["user"], "skmdev@gmail.com");
    }

    #[tokio::test]
    async fn test_meta_route_sees_injected_metadata() {
        let app = guarded_app();
        let request = RequestParts::new(Method::Get, "/user/meta")
            .header("authorization", format!("Bearer {}", token()));
        let response = app.handle(request).await;
        assert_eq!(response.status, 200);
        assert_eq!(body_json(&response)["test"], "cc");
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let app = guarded_app();
        let response = app
            .handle(RequestParts::new(Method::Get, "/nowhere"))
            .await;
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn test_wrong_verb_is_405_with_allow() {
        let app = guarded_app();
        let response = app
            .handle(RequestParts::new(Method::Delete, "/user/login"))
            .await;
        assert_eq!(response.status, 405);
        // GET also matches through the `/user/:userId` param route.
        assert_eq!(
            response.headers.get("Allow").map(String::as_str),
            Some("GET, POST")
        );
    }

    #[tokio::test]
    async fn test_trailing_slash_matches() {
        let app = guarded_app();
        let request = RequestParts::new(Method::Post, "/user/login/")
            .json(&json!({"userEmail": "a@b.c", "password": "x"}));
        let response = app.handle(request).await;
        assert_eq!(response.status, 200);
    }

    #[tokio::test]
    async fn test_handler_without_body_is_404() {
        let app = AppBuilder::new(RouterConfig::new())
            .register(|registry| {
                let owner = registry.owner("EmptyController");
                registry
                    .method(owner, "nothing")
                    .get("/nothing")
                    .bind(handler_fn(|_ctx, _next| async { Ok(()) }));
                registry.finalize(owner, "/")
            })
            .build()
            .unwrap();

        let response = app
            .handle(RequestParts::new(Method::Get, "/nothing"))
            .await;
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn test_status_override_applies() {
        let app = AppBuilder::new(RouterConfig::new())
            .register(|registry| {
                let owner = registry.owner("CreateController");
                registry
                    .method(owner, "create")
                    .post("/things")
                    .bind(handler_fn(|ctx, _next| async move {
                        ctx.set_status(201);
                        ctx.set_body(json!({"created": true}));
                        Ok(())
                    }));
                registry.finalize(owner, "/")
            })
            .build()
            .unwrap();

        let response = app
            .handle(RequestParts::new(Method::Post, "/things"))
            .await;
        assert_eq!(response.status, 201);
    }

    #[tokio::test]
    async fn test_explicit_status_without_body_sends_empty_response() {
        let app = AppBuilder::new(RouterConfig::new())
            .register(|registry| {
                let owner = registry.owner("ThingController");
                registry
                    .method(owner, "remove")
                    .delete("/things/:id")
                    .bind(handler_fn(|ctx, _next| async move {
                        ctx.set_status(204);
                        Ok(())
                    }));
                registry.finalize(owner, "/")
            })
            .build()
            .unwrap();

        let response = app
            .handle(RequestParts::new(Method::Delete, "/things/7"))
            .await;
        assert_eq!(response.status, 204);
        assert!(response.body.is_empty());
    }

    #[tokio::test]
    async fn test_double_continuation_is_500() {
        let app = AppBuilder::new(RouterConfig::new())
            .register(|registry| {
                let owner = registry.owner("BrokenController");
                registry
                    .method(owner, "broken")
                    .get("/broken")
                    .middleware(handler_fn(|ctx, next| async move {
                        next.run(ctx.clone()).await?;
                        next.run(ctx).await
                    }))
                    .bind(handler_fn(|ctx, _next| async move {
                        ctx.set_body(json!({"ok": true}));
                        Ok(())
                    }));
                registry.finalize(owner, "/")
            })
            .build()
            .unwrap();

        let response = app.handle(RequestParts::new(Method::Get, "/broken")).await;
        assert_eq!(response.status, 500);
    }

    #[test]
    fn test_registrar_failure_aborts_build() {
        let result = AppBuilder::new(RouterConfig::new())
            .register(|_registry| Err(registrar_error("bad controller")))
            .build();
        assert!(matches!(result, Err(Error::Registrar { .. })));
    }

    #[test]
    fn test_unbound_route_aborts_build() {
        let result = AppBuilder::new(RouterConfig::new())
            .register(|registry| {
                let owner = registry.owner("HalfController");
                registry.method(owner, "half").get("/half");
                registry.finalize(owner, "/")
            })
            .build();
        assert!(matches!(result, Err(Error::MissingHandler { .. })));
    }
}
