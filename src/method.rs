//! # HTTP Methods
//!
//! The route verb vocabulary of the registration layer. [`Method::All`] is a
//! registration-time pseudo-verb that expands to every concrete verb when
//! mounted; it never appears on an incoming request.

use crate::error::{Error, Result};

/// HTTP methods supported by the route decorations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// HTTP GET
    Get,
    /// HTTP POST
    Post,
    /// HTTP PUT
    Put,
    /// HTTP DELETE
    Delete,
    /// HTTP PATCH
    Patch,
    /// HTTP HEAD
    Head,
    /// HTTP OPTIONS
    Options,
    /// Registration-time wildcard covering every concrete verb
    All,
}

/// Every concrete verb, in the order `All` expands to
pub const CONCRETE_METHODS: [Method; 7] = [
    Method::Get,
    Method::Post,
    Method::Put,
    Method::Delete,
    Method::Patch,
    Method::Head,
    Method::Options,
];

impl Method {
    /// Parse a configuration-surface method string
    ///
    /// `del` is accepted as an alias for `delete`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedMethod`] for anything outside the
    /// supported set; this is a fatal configuration error.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(Self::Get),
            "post" => Ok(Self::Post),
            "put" => Ok(Self::Put),
            "del" | "delete" => Ok(Self::Delete),
            "patch" => Ok(Self::Patch),
            "head" => Ok(Self::Head),
            "options" => Ok(Self::Options),
            "all" => Ok(Self::All),
            _ => Err(Error::UnsupportedMethod {
                method: s.to_string(),
            }),
        }
    }

    /// Map an incoming hyper method onto the vocabulary
    ///
    /// Returns `None` for verbs the router never dispatches (CONNECT,
    /// TRACE, extensions); the boundary answers those with 405.
    #[must_use]
    pub fn from_hyper(method: &hyper::Method) -> Option<Self> {
        match *method {
            hyper::Method::GET => Some(Self::Get),
            hyper::Method::POST => Some(Self::Post),
            hyper::Method::PUT => Some(Self::Put),
            hyper::Method::DELETE => Some(Self::Delete),
            hyper::Method::PATCH => Some(Self::Patch),
            hyper::Method::HEAD => Some(Self::Head),
            hyper::Method::OPTIONS => Some(Self::Options),
            _ => None,
        }
    }

    /// Uppercase wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::All => "ALL",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
