// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Core primitives – the error taxonomy, the streaming response type and
//! the engine that drives one proxy lifecycle.
//!
//! No protocol-level logic lives here; URL/SSRF checks sit in `guard`,
//! the redirect loop in `fetch`, and response shaping in `filters`.


use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::config::{Config, ProxyConfig};
use crate::fetch::RedirectingFetcher;
use crate::filters::{DecodeBodyFilter, HeaderPolicyFilter, ResponseFilter};
use crate::guard::{SsrfGuard, validate_url};
use crate::{debug_fmt, warn_fmt};

/// Errors that can occur while proxying a fetch.
///
/// The variants double as the reason codes surfaced to the HTTP layer;
/// `server` maps each to exactly one status code.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The supplied string is not a usable URL.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The URL scheme is not `http` or `https`.
    #[error("unsupported scheme '{0}': only HTTP and HTTPS are allowed")]
    UnsupportedScheme(String),

    /// The target is an internal or private network resource.
    #[error("forbidden target: {0}")]
    ForbiddenTarget(String),

    /// The redirect chain exceeded the configured hop limit.
    #[error("too many redirects (limit {0})")]
    TooManyRedirects(u32),

    /// A redirect response was missing or carried an unusable `Location`.
    #[error("bad redirect: {0}")]
    BadRedirect(String),

    /// The upstream could not be reached at all.
    #[error("upstream unreachable: {0}")]
    Unreachable(String),

    /// One fetch attempt exceeded its timeout.
    #[error("upstream timed out after {0:?}")]
    Timeout(Duration),

    /// The upstream answered with an error status.
    #[error("upstream returned {0}")]
    UpstreamStatus(u16),

    /// The body stream failed after the response had started.
    #[error("stream error: {0}")]
    Stream(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<crate::config::ConfigError> for FetchError {
    fn from(err: crate::config::ConfigError) -> Self {
        FetchError::Config(err.to_string())
    }
}

/// A streaming upstream response on its way to the client.
///
/// The body is piped exactly once and is never buffered in full.
#[derive(Debug)]
pub struct ProxyResponse {
    pub status: u16,
    pub headers: reqwest::header::HeaderMap,
    pub body: reqwest::Body,
}

/// Drives one proxy lifecycle: validate → guard → fetch (with redirects)
/// → response filters → stream to caller.
///
/// All tunables are materialised into an immutable [`ProxyConfig`] at
/// construction, so alternate values (short timeouts, custom blocklists)
/// can be injected in tests.
#[derive(Debug)]
pub struct ProxyEngine {
    /// Configuration the engine was built from
    pub config: Arc<Config>,
    proxy_config: ProxyConfig,
    guard: Arc<SsrfGuard>,
    fetcher: RedirectingFetcher,
    response_filters: Vec<Arc<dyn ResponseFilter>>,
}

impl ProxyEngine {
    /// Create a new engine, reading tunables from the `proxy.*` keys.
    pub fn new(config: Arc<Config>) -> Result<Self, FetchError> {
        let proxy_config = ProxyConfig::from_config(&config)?;
        Self::with_proxy_config(config, proxy_config)
    }

    /// Create a new engine with explicit tunables.
    pub fn with_proxy_config(
        config: Arc<Config>,
        proxy_config: ProxyConfig,
    ) -> Result<Self, FetchError> {
        let guard = Arc::new(SsrfGuard::new(&proxy_config)?);
        let fetcher = RedirectingFetcher::new(&proxy_config, guard.clone());

        // Decode first so the header filter sees (and strips) the
        // original content-encoding afterwards.
        let response_filters: Vec<Arc<dyn ResponseFilter>> = vec![
            Arc::new(DecodeBodyFilter::new()),
            Arc::new(HeaderPolicyFilter::new()),
        ];

        Ok(Self {
            config,
            proxy_config,
            guard,
            fetcher,
            response_filters,
        })
    }

    /// The tunables this engine runs with.
    pub fn proxy_config(&self) -> &ProxyConfig {
        &self.proxy_config
    }

    /// Longest accepted `url` value; enforced by the HTTP layer before
    /// [`handle`](Self::handle) is called.
    pub fn max_url_length(&self) -> usize {
        self.proxy_config.max_url_length
    }

    /// Run one full proxy lifecycle for `raw_url`.
    ///
    /// Returns the filtered, decoding response ready to be streamed, or
    /// the first error encountered. No network I/O happens before the
    /// URL has passed validation and the SSRF guard.
    pub async fn handle(&self, raw_url: &str) -> Result<ProxyResponse, FetchError> {
        let overall_start = Instant::now();

        let url = validate_url(raw_url)?;
        self.guard.check_url(&url)?;

        let mut response = match self.fetcher.fetch(url.clone()).await {
            Ok(response) => response,
            Err(e) => {
                warn_fmt!("Engine", "Fetch of {} failed: {}", url, e);
                return Err(e);
            }
        };

        for filter in &self.response_filters {
            response = filter.apply(response).await?;
        }

        debug_fmt!(
            "Engine",
            "{} -> {} in {:?}",
            url,
            response.status,
            overall_start.elapsed()
        );

        Ok(response)
    }
}
