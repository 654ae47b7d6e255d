//! # HTTP Server
//!
//! Hyper/Tokio front end for a mounted [`App`]. One task per connection,
//! graceful shutdown on SIGINT with a drain timeout, request-id tagging,
//! and an access-log line per request.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::StatusCode;
use hyper_util::rt::TokioIo;
use serde_json::json;
use tracing::{error, info};

use crate::app::App;
use crate::error::{Error, Result};
use crate::request::RequestParts;

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind
    pub address: SocketAddr,
    /// Enable keep-alive connections
    pub keep_alive: bool,
    /// Drain timeout for graceful shutdown
    pub shutdown_timeout: Duration,
    /// Max request body size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: ([127, 0, 0, 1], 8000).into(),
            keep_alive: true,
            shutdown_timeout: Duration::from_secs(30),
            max_body_size: 1024 * 1024,
        }
    }
}

/// An outgoing HTTP response
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: String,
    /// Content type
    pub content_type: String,
    /// Additional response headers
    pub headers: HashMap<String, String>,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: 200,
            body: String::new(),
            content_type: "application/json".to_string(),
            headers: HashMap::new(),
        }
    }
}

impl Response {
    /// A 200 JSON response
    #[must_use]
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    /// A 200 plain-text response
    #[must_use]
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            content_type: "text/plain".to_string(),
            ..Self::default()
        }
    }

    /// Set the status code
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Set a header
    #[must_use]
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.set_header(key, value);
        self
    }

    /// Set or override a header
    pub fn set_header(&mut self, key: &str, value: &str) {
        if key.eq_ignore_ascii_case("content-type") {
            self.content_type = value.to_string();
        } else {
            self.headers.insert(key.to_string(), value.to_string());
        }
    }

    fn into_hyper(self) -> hyper::Response<Full<Bytes>> {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut builder = hyper::Response::builder()
            .status(status)
            .header("Content-Type", &self.content_type);
        for (k, v) in &self.headers {
            builder = builder.header(k.as_str(), v.as_str());
        }

        builder
            .body(Full::new(Bytes::from(self.body)))
            .unwrap_or_else(|_| {
                hyper::Response::builder()
                    .status(StatusCode::INTERNAL_SERVER_ERROR)
                    .body(Full::new(Bytes::from("Internal Server Error")))
                    .unwrap()
            })
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .field("headers", &self.headers)
            .finish()
    }
}

/// HTTP server wrapping a mounted application
pub struct Server {
    config: ServerConfig,
    app: App,
}

impl Server {
    /// Wrap an application with the default configuration
    #[must_use]
    pub fn new(app: App) -> Self {
        Self {
            config: ServerConfig::default(),
            app,
        }
    }

    /// Replace the server configuration
    #[must_use]
    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Bind to an address
    #[must_use]
    pub fn bind(mut self, address: SocketAddr) -> Self {
        self.config.address = address;
        self
    }

    /// Run the accept loop until a shutdown signal arrives
    ///
    /// # Errors
    ///
    /// Returns [`Error::Bind`] when the listener cannot be set up;
    /// per-connection failures are logged and do not stop the loop.
    pub async fn serve(&self) -> Result<()> {
        let address = self.config.address;
        let listener = tokio::net::TcpListener::bind(address)
            .await
            .map_err(|source| Error::Bind {
                address: address.to_string(),
                source,
            })?;

        info!("server listening on http://{}", address);

        let app = self.app.clone();
        let max_body_size = self.config.max_body_size;
        let keep_alive = self.config.keep_alive;
        let active = Arc::new(AtomicUsize::new(0));

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    let (stream, remote_addr) = match accept_result {
                        Ok(accepted) => accepted,
                        Err(err) => {
                            error!("accept failed: {err}");
                            continue;
                        }
                    };
                    let io = TokioIo::new(stream);

                    let app = app.clone();
                    let active = Arc::clone(&active);

                    tokio::task::spawn(async move {
                        active.fetch_add(1, Ordering::Relaxed);

                        let service = service_fn(move |req| {
                            let app = app.clone();
                            async move {
                                let method = req.method().clone();
                                let request_path = req.uri().path().to_string();

                                let response =
                                    handle_request(&app, req, max_body_size).await;

                                info!(
                                    "{} - \"{} {}\" {}",
                                    remote_addr,
                                    method,
                                    request_path,
                                    response.status()
                                );
                                Ok::<_, hyper::Error>(response)
                            }
                        });

                        if let Err(err) = http1::Builder::new()
                            .keep_alive(keep_alive)
                            .serve_connection(io, service)
                            .await
                        {
                            error!("error serving connection: {err:?}");
                        }
                        active.fetch_sub(1, Ordering::Relaxed);
                    });
                }
                _ = shutdown_signal() => {
                    info!("shutdown signal received, draining connections");
                    break;
                }
            }
        }

        let drain = async {
            while active.load(Ordering::Relaxed) > 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        let _ = tokio::time::timeout(self.config.shutdown_timeout, drain).await;
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to install shutdown signal handler: {err}");
        std::future::pending::<()>().await;
    }
}

async fn handle_request(
    app: &App,
    req: hyper::Request<hyper::body::Incoming>,
    max_body_size: usize,
) -> hyper::Response<Full<Bytes>> {
    let mut parts = match RequestParts::from_hyper(req, max_body_size).await {
        Ok(parts) => parts,
        Err(Error::PayloadTooLarge { .. }) => {
            return Response::json(json!({"error": "Payload Too Large"}).to_string())
                .with_status(413)
                .into_hyper();
        }
        Err(Error::UnsupportedMethod { .. }) => {
            return Response::json(json!({"error": "Method Not Allowed"}).to_string())
                .with_status(405)
                .into_hyper();
        }
        Err(err) => {
            error!("failed to read request: {err}");
            return Response::json(json!({"error": "Bad Request"}).to_string())
                .with_status(400)
                .into_hyper();
        }
    };

    let request_id = parts
        .headers
        .entry("x-request-id".to_string())
        .or_insert_with(generate_request_id)
        .clone();

    let mut response = app.handle(parts).await;
    response.set_header("x-request-id", &request_id);
    response.into_hyper()
}

static REQUEST_COUNTER: AtomicUsize = AtomicUsize::new(1);

fn generate_request_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let counter = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{:x}-{:x}", now.as_nanos(), counter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_json_defaults() {
        let response = Response::json(r#"{"status": "ok"}"#);
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type, "application/json");
    }

    #[test]
    fn test_response_with_status() {
        let response = Response::text("Not Found").with_status(404);
        assert_eq!(response.status, 404);
    }

    #[test]
    fn test_response_content_type_header_routed() {
        let response = Response::json("{}").with_header("Content-Type", "text/html");
        assert_eq!(response.content_type, "text/html");
        assert!(response.headers.is_empty());
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.address.port(), 8000);
        assert!(config.keep_alive);
        assert_eq!(config.max_body_size, 1024 * 1024);
    }

    #[test]
    fn test_request_ids_are_unique() {
        assert_ne!(generate_request_id(), generate_request_id());
    }
}
