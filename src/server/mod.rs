// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP server implementation for Fetchgate.
//!
//! The server is a *thin* wrapper around **hyper-util**.  It owns the
//! listening socket, extracts and bounds the `url` query parameter, and
//! translates between Hyper's body types and the engine's streaming
//! [`ProxyResponse`].
//!
//! **Protocol support**
//! Uses `hyper_util::server::conn::auto::Builder`, so the same
//! connection transparently handles both HTTP/1.1 *and* HTTP/2.
//!
//! ## Body streaming
//! Upstream bodies are **streamed** straight through to the client; the
//! response body is a lazily-driven stream, so closing the client
//! connection drops it and with it the pinned upstream request.

mod health;

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::TryStreamExt;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as AutoBuilder;
use log::{debug, error, info, warn};
use reqwest::Body;
use serde::{Deserialize, Serialize};
use tokio::signal;
use tokio::sync::{RwLock, oneshot};
use tokio::task::{Id, JoinSet};

use crate::core::{FetchError, ProxyEngine, ProxyResponse};
use crate::logging;
use health::HealthServer;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Path of the single proxy endpoint.
const PROXY_PATH: &str = "/api/proxy/fetch";

/// Configuration for the HTTP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Port to listen on for health/readiness checks
    #[serde(default = "default_health_port")]
    pub health_port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_health_port() -> u16 {
    8081
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            health_port: default_health_port(),
        }
    }
}

/// HTTP server for the proxy.
#[derive(Debug, Clone)]
pub struct ProxyServer {
    /// Server configuration
    config: ServerConfig,
    /// Proxy engine
    engine: Arc<ProxyEngine>,
    /// Shutdown senders for each connection task
    shutdown_senders: Arc<RwLock<HashMap<Id, oneshot::Sender<()>>>>,
}

impl ProxyServer {
    /// Create a new proxy server with the given configuration and engine.
    pub fn new(config: ServerConfig, engine: Arc<ProxyEngine>) -> Self {
        Self {
            config,
            engine,
            shutdown_senders: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// The engine this server dispatches to.
    pub fn engine(&self) -> &Arc<ProxyEngine> {
        &self.engine
    }

    /// Start the proxy server.
    ///
    /// Runs until Ctrl-C or SIGTERM, then drains open connections
    /// gracefully with a bounded wait.
    pub async fn start(&self) -> Result<(), FetchError> {
        let addr = format!("{}:{}", self.config.host, self.config.port)
            .parse::<SocketAddr>()
            .map_err(|e| FetchError::Config(format!("invalid server address: {e}")))?;

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| FetchError::Config(format!("failed to bind {addr}: {e}")))?;

        info!("Fetchgate listening on http://{addr}");

        let health_server = HealthServer::new(self.config.health_port);
        health_server.set_ready();

        let ctrl_c = signal::ctrl_c();

        #[cfg(unix)]
        let mut term_stream = signal(SignalKind::terminate())
            .map_err(|e| FetchError::Config(format!("cannot install SIGTERM handler: {e}")))?;

        #[cfg(unix)]
        let sigterm = term_stream.recv();
        #[cfg(not(unix))]
        let sigterm = std::future::pending::<Option<()>>();

        tokio::pin!(ctrl_c);
        tokio::pin!(sigterm);

        let shutdown_senders = self.shutdown_senders.clone();
        let mut join_set = JoinSet::new();
        let engine = self.engine.clone();

        loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("Received Ctrl-C; initiating graceful shutdown");
                    break;
                }
                _ = &mut sigterm => {
                    info!("Received SIGTERM; initiating graceful shutdown");
                    break;
                }
                accept = listener.accept() => {
                    match accept {
                        Ok((stream, remote_addr)) => {
                            let engine = engine.clone();
                            let client_ip = remote_addr.ip().to_string();
                            let (tx, rx) = oneshot::channel();
                            let shutdown_senders_clone = shutdown_senders.clone();

                            let handle = join_set.spawn(async move {
                                let task_id = tokio::task::id();

                                let service = service_fn(move |req: Request<Incoming>| {
                                    handle_request(req, engine.clone(), client_ip.clone())
                                });
                                let io = TokioIo::new(stream);

                                let builder = {
                                    let mut b = AutoBuilder::new(TokioExecutor::new());
                                    b.http1();
                                    b.http2();
                                    b
                                };

                                let connection = builder.serve_connection(io, service);
                                let mut conn = std::pin::pin!(connection);

                                tokio::select! {
                                    res = &mut conn => {
                                        if let Err(e) = res {
                                            let err_str = e.to_string();
                                            if !err_str.contains("connection closed")
                                                && !err_str.contains("connection reset") {
                                                error!("Connection error: {e}");
                                            }
                                        }
                                    }
                                    _ = rx => {
                                        conn.as_mut().graceful_shutdown();
                                        if let Err(e) = conn.await {
                                            let err_str = e.to_string();
                                            if !err_str.contains("connection closed")
                                                && !err_str.contains("connection reset") {
                                                error!("Connection error during graceful shutdown: {e}");
                                            }
                                        }
                                    }
                                }

                                shutdown_senders_clone.write().await.remove(&task_id);
                            });

                            shutdown_senders.write().await.insert(handle.id(), tx);
                        }
                        Err(e) => error!("Accept error: {e}"),
                    }
                }
            }
        }

        info!("Shutting down; waiting for {} connection(s)", join_set.len());

        {
            let mut senders = shutdown_senders.write().await;
            for (_, sender) in senders.drain() {
                let _ = sender.send(());
            }
        }

        let drain_all = async {
            while let Some(res) = join_set.join_next().await {
                match res {
                    Ok(()) => {}
                    Err(e) if e.is_cancelled() => {}
                    Err(e) => error!("Connection task failed: {e}"),
                }
            }
        };

        let shutdown_timeout = tokio::time::Duration::from_secs(30);
        match tokio::time::timeout(shutdown_timeout, drain_all).await {
            Ok(()) => info!("All connections drained gracefully"),
            Err(_) => {
                warn!(
                    "Shutdown timed out after {}s; aborting remaining connections",
                    shutdown_timeout.as_secs()
                );
                join_set.shutdown().await;
            }
        }

        drop(health_server);

        info!("Shutdown complete");
        Ok(())
    }
}

/// Handle an incoming HTTP request.
async fn handle_request(
    req: Request<Incoming>,
    engine: Arc<ProxyEngine>,
    client_ip: String,
) -> Result<Response<Body>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let request_id = logging::request_id();

    debug!("[{request_id}] {method} {path} from {client_ip}");

    if path != PROXY_PATH {
        return Ok(plain_response(404, "Not Found"));
    }

    if method == Method::OPTIONS {
        return Ok(preflight_response());
    }

    if method != Method::GET {
        return Ok(plain_response(405, "Method Not Allowed"));
    }

    let raw_url = match query_param(req.uri().query(), "url") {
        Some(value) => value,
        None => {
            debug!("[{request_id}] rejected: missing url parameter");
            return Ok(plain_response(400, "URL parameter is required"));
        }
    };

    if raw_url.len() > engine.max_url_length() {
        debug!(
            "[{request_id}] rejected: url value of {} chars exceeds limit {}",
            raw_url.len(),
            engine.max_url_length()
        );
        return Ok(plain_response(400, "URL too long"));
    }

    match engine.handle(&raw_url).await {
        Ok(proxy_resp) => {
            debug!("[{request_id}] {raw_url} -> {}", proxy_resp.status);
            match convert_proxy_response(proxy_resp) {
                Ok(resp) => Ok(resp),
                Err(e) => {
                    error!("[{request_id}] failed to convert response for {raw_url}: {e}");
                    Ok(plain_response(500, "Internal Server Error"))
                }
            }
        }
        Err(e) => {
            let status = status_for(&e);
            match status {
                400 | 403 | 404 => warn!("[{request_id}] {raw_url} rejected ({status}): {e}"),
                _ => error!("[{request_id}] {raw_url} failed ({status}): {e}"),
            }
            Ok(plain_response(status, &e.to_string()))
        }
    }
}

/// Map an engine failure to the one status code it surfaces as.
fn status_for(err: &FetchError) -> u16 {
    match err {
        FetchError::InvalidUrl(_) | FetchError::UnsupportedScheme(_) => 400,
        FetchError::ForbiddenTarget(_) => 403,
        FetchError::UpstreamStatus(code) if *code < 500 => 404,
        FetchError::UpstreamStatus(_)
        | FetchError::BadRedirect(_)
        | FetchError::TooManyRedirects(_)
        | FetchError::Unreachable(_)
        | FetchError::Stream(_) => 502,
        FetchError::Timeout(_) => 504,
        FetchError::Config(_) | FetchError::Io(_) => 500,
    }
}

/// Extract a query parameter, percent-decoded.
fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    let query = query?;
    for pair in query.split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        if key == name {
            return match urlencoding::decode(value) {
                Ok(decoded) => Some(decoded.into_owned()),
                Err(_) => Some(value.to_string()),
            };
        }
    }
    None
}

/// Convert an engine response to a hyper response.
fn convert_proxy_response(resp: ProxyResponse) -> Result<Response<Body>, FetchError> {
    let stream = resp.body.into_data_stream().map_err(|e| {
        error!("Error streaming response body: {e}");
        std::io::Error::other(e)
    });

    let body = Body::wrap_stream(stream);

    let mut builder = Response::builder().status(resp.status);
    let mut_headers = builder
        .headers_mut()
        .ok_or_else(|| FetchError::Stream("unable to get mutable headers".to_string()))?;
    *mut_headers = resp.headers;

    builder
        .body(body)
        .map_err(|e| FetchError::Stream(e.to_string()))
}

/// CORS preflight answer for the proxy endpoint.
fn preflight_response() -> Response<Body> {
    Response::builder()
        .status(204)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type")
        .body(Body::from(""))
        .unwrap()
}

fn plain_response(status: u16, message: &str) -> Response<Body> {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain; charset=utf-8")
        .body(Body::from(Bytes::from(message.to_owned())))
        .unwrap()
}
