//! # Waypost
//!
//! Declarative routing and request-validation layer on Hyper and Tokio.
//! Controllers describe their routes through builder calls against an
//! explicit [`registry::Registry`]; finalizing a controller moves its
//! routes into a shared pending table, and mounting drains that table onto
//! a radix-trie dispatcher in priority order with static paths winning
//! ties over parameterized ones.
//!
//! ## Modules
//!
//! - `registry` - Route metadata registry and the builder decoration API
//! - `route` - Per-method route entries and the shared pending table
//! - `router` - Route mounter and the matchit-backed dispatcher
//! - `chain` - Composable async handler chains with explicit continuation
//! - `context` - Per-request state shared across a chain
//! - `validation` - Declarative request schemas and the 412 gate
//! - `auth` - JWT authentication gate with path exclusions
//! - `graphql` - Handler chains as GraphQL field resolvers
//! - `app` - Registrar wiring and request-to-response handling
//! - `server` - HTTP server built on Hyper
//! - `request` - Request decoding with query parsing and body limits
//! - `path` - Path normalization, joining, and specificity
//! - `method` - The routing verb set
//! - `json` - High-performance JSON parsing with simd-json
//! - `error` - Error types and handling

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod app;
pub mod auth;
pub mod chain;
pub mod context;
pub mod error;
pub mod graphql;
pub mod json;
pub mod method;
pub mod path;
pub mod registry;
pub mod request;
pub mod route;
pub mod router;
pub mod server;
pub mod validation;

pub use app::{App, AppBuilder, Registrar, RouterConfig};
pub use auth::{AuthConfig, TokenExtractor};
pub use chain::{handler_fn, Chain, Handler, Next};
pub use context::{Context, Ctx};
pub use error::{Error, RequestError, Result};
pub use graphql::{resolver, GraphqlState, Resolver, ResolverInfo};
pub use json::{parse_json, to_json};
pub use method::Method;
pub use registry::{MethodOptions, OwnerId, Registry, RouteBuilder};
pub use request::RequestParts;
pub use route::PendingRoutes;
pub use router::{mount, DispatchOutcome, Dispatcher, Mountable};
pub use server::{Response, Server, ServerConfig};
pub use validation::{Required, Schema, SchemaType, SchemaValidator, ValidationError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install a JSON-formatted tracing subscriber honoring `RUST_LOG`
///
/// Call once at process start; later calls are ignored.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, "0.1.0");
    }
}
