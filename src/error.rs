//! # Error Handling
//!
//! Centralized error types for waypost.
//! Uses `thiserror` for ergonomic error definitions.
//!
//! Two families exist with very different lifecycles:
//!
//! - [`Error`]: configuration/startup errors. These are fatal: they abort
//!   application build or server start and are never turned into responses.
//! - [`RequestError`]: per-request errors flowing through a handler chain.
//!   The application boundary maps them to HTTP status codes; they never
//!   affect other in-flight requests.

use thiserror::Error;

use crate::validation::ValidationError;

/// Result type alias for startup/configuration operations
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal configuration and startup errors
#[derive(Error, Debug)]
pub enum Error {
    /// A finalized handler entry never received a route verb decoration
    #[error("No route declared for handler {owner}.{method_name}")]
    MissingRoute {
        /// Owning controller name
        owner: String,
        /// Handler method name within the owner
        method_name: String,
    },

    /// A finalized handler entry has no terminal handler bound
    #[error("No handler bound for {owner}.{method_name}")]
    MissingHandler {
        /// Owning controller name
        owner: String,
        /// Handler method name within the owner
        method_name: String,
    },

    /// An HTTP method string outside the supported set
    #[error("Unsupported HTTP method: {method}")]
    UnsupportedMethod {
        /// The offending method string
        method: String,
    },

    /// Invalid route pattern provided
    #[error("Invalid route pattern: {pattern}: {reason}")]
    InvalidRoutePattern {
        /// The invalid pattern
        pattern: String,
        /// Reason for invalidity
        reason: String,
    },

    /// A controller registrar failed; startup must abort
    #[error("Controller registration failed: {reason}")]
    Registrar {
        /// What the registrar reported
        reason: String,
    },

    /// Server failed to bind to the specified address
    #[error("Failed to bind server to {address}: {source}")]
    Bind {
        /// The address we tried to bind to
        address: String,
        /// The underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// HTTP protocol error
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// JSON parse failure from the fast-path parser
    #[error("JSON parse error: {reason}")]
    JsonParse {
        /// Parser diagnostic
        reason: String,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Request payload too large
    #[error("Payload too large: limit={limit} bytes, received={actual} bytes")]
    PayloadTooLarge {
        /// Max allowed size
        limit: usize,
        /// Actual size
        actual: usize,
    },
}

/// Recoverable per-request errors
///
/// Any handler in a chain may return one of these; the chain stops
/// immediately and the boundary responder turns it into a response.
#[derive(Error, Debug)]
pub enum RequestError {
    /// Query/body schema mismatch, surfaced as HTTP 412
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Missing or invalid credentials, surfaced as HTTP 401
    #[error("Unauthorized: {reason}")]
    Unauthorized {
        /// Why authentication failed
        reason: String,
    },

    /// A chain continuation was invoked more than once
    ///
    /// This is a programming error in a handler; it must fail loudly
    /// instead of double-executing downstream handlers.
    #[error("next() called multiple times")]
    DoubleContinuation,

    /// Handler-internal failure, surfaced as HTTP 500
    #[error("{0}")]
    Internal(String),
}

impl RequestError {
    /// HTTP status code this error maps to at the boundary
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::Validation(_) => 412,
            Self::Unauthorized { .. } => 401,
            Self::DoubleContinuation | Self::Internal(_) => 500,
        }
    }
}
