//! # HTTP Request
//!
//! Decoded request data at the server boundary. [`RequestParts`] is
//! collected once from a hyper request (body size checked against the
//! configured limit) and then turned into a routing [`Context`] with the
//! path parameters the dispatcher extracted.

use std::collections::HashMap;

use http_body_util::BodyExt;
use hyper::body::Bytes;
use hyper::Request;
use serde_json::Value;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::method::Method;

/// A decoded request, independent of the transport that produced it
#[derive(Debug, Clone)]
pub struct RequestParts {
    /// Request verb
    pub method: Method,
    /// Request path, without the query string
    pub path: String,
    /// Parsed query parameters (duplicate keys: last value wins)
    pub query: HashMap<String, String>,
    /// Request headers, keys lowercased
    pub headers: HashMap<String, String>,
    /// Raw request body
    pub body: Option<Bytes>,
}

impl RequestParts {
    /// Build a request from a request line; the path may carry a query
    /// string
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let path = path.into();
        let (path, query_string) = match path.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (path, None),
        };

        Self {
            method,
            path,
            query: parse_query_string(query_string.as_deref()),
            headers: HashMap::new(),
            body: None,
        }
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Attach a JSON body
    #[must_use]
    pub fn json(mut self, value: &Value) -> Self {
        self.body = Some(Bytes::from(value.to_string()));
        self.headers
            .insert("content-type".to_string(), "application/json".to_string());
        self
    }

    /// Collect a hyper request, enforcing the body size limit
    ///
    /// An unparseable verb (TRACE, CONNECT) is rejected before the body is
    /// read.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedMethod`] for verbs outside the routing
    /// set, [`Error::PayloadTooLarge`] when the declared or actual body
    /// exceeds `max_body_size`, and [`Error::Http`] when collection fails.
    pub async fn from_hyper(
        req: Request<hyper::body::Incoming>,
        max_body_size: usize,
    ) -> Result<Self> {
        let method = Method::from_hyper(req.method()).ok_or_else(|| Error::UnsupportedMethod {
            method: req.method().to_string(),
        })?;

        let uri = req.uri();
        let path = uri.path().to_string();
        let query = parse_query_string(uri.query());

        let headers: HashMap<String, String> = req
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|val| (k.as_str().to_ascii_lowercase(), val.to_string()))
            })
            .collect();

        if let Some(len) = headers.get("content-length") {
            if let Ok(content_len) = len.parse::<usize>() {
                if content_len > max_body_size {
                    return Err(Error::PayloadTooLarge {
                        limit: max_body_size,
                        actual: content_len,
                    });
                }
            }
        }

        let bytes = BodyExt::collect(req.into_body()).await?.to_bytes();
        if bytes.len() > max_body_size {
            return Err(Error::PayloadTooLarge {
                limit: max_body_size,
                actual: bytes.len(),
            });
        }
        let body = (!bytes.is_empty()).then_some(bytes);

        Ok(Self {
            method,
            path,
            query,
            headers,
            body,
        })
    }

    /// Turn the request into a routing context with the path parameters
    /// the dispatcher extracted
    ///
    /// # Errors
    ///
    /// Returns [`Error::JsonParse`] when a non-empty body is not valid
    /// JSON.
    pub fn into_context(self, params: HashMap<String, String>) -> Result<Context> {
        let mut context = Context::new(self.method, self.path);
        context.params = params;
        context.query = self.query;
        context.headers = self.headers;
        context.request_body = match self.body {
            Some(bytes) => {
                let mut buf = bytes.to_vec();
                crate::json::parse_json_bytes(&mut buf)?
            }
            None => Value::Null,
        };
        Ok(context)
    }
}

/// Parse a query string, URL-decoding keys and values
fn parse_query_string(query: Option<&str>) -> HashMap<String, String> {
    query
        .map(|q| {
            q.split('&')
                .filter(|pair| !pair.is_empty())
                .filter_map(|pair| {
                    let mut parts = pair.splitn(2, '=');
                    let key = parts.next()?;
                    let value = parts.next().unwrap_or("");
                    Some((url_decode(key), url_decode(value)))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Basic URL decoding: `+` and `%XX` escapes
///
/// Malformed escapes are kept as-is rather than rejected; a query string
/// never fails to parse.
fn url_decode(s: &str) -> String {
    let input = s.as_bytes();
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;

    while i < input.len() {
        match input[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < input.len() => {
                let hi = (input[i + 1] as char).to_digit(16);
                let lo = (input[i + 2] as char).to_digit(16);
                if let (Some(hi), Some(lo)) = (hi, lo) {
                    out.push(((hi << 4) | lo) as u8);
                    i += 3;
                } else {
                    out.push(b'%');
                    i += 1;
                }
            }
            other => {
                out.push(other);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}
