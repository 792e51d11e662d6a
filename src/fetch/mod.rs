// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Upstream fetching with bounded, re-validated redirect following.
//!
//! The fetcher owns the redirect loop: reqwest's own redirect handling
//! is disabled so that every hop passes through the URL validator and
//! the SSRF guard before a connection is opened, and so that each
//! connection is pinned to an address that already passed validation.


use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, LOCATION};
use reqwest::redirect::Policy;
use tokio::time::timeout;
use url::Url;

use crate::config::ProxyConfig;
use crate::core::{FetchError, ProxyResponse};
use crate::guard::{SsrfGuard, validate_url};
use crate::{debug_fmt, trace_fmt, warn_fmt};

/// Header set sent with every upstream request. Many origins reject
/// requests that look like bare automation.
fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        reqwest::header::USER_AGENT,
        HeaderValue::from_static(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        ),
    );
    headers.insert(
        reqwest::header::ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,\
             image/webp,image/apng,*/*;q=0.8",
        ),
    );
    headers.insert(
        reqwest::header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("de-DE,de;q=0.9,en-US;q=0.8,en;q=0.7"),
    );
    headers.insert(
        reqwest::header::ACCEPT_ENCODING,
        HeaderValue::from_static("gzip, deflate, br"),
    );
    headers.insert(
        reqwest::header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache"),
    );
    headers.insert(reqwest::header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert("dnt", HeaderValue::from_static("1"));
    headers.insert(
        "upgrade-insecure-requests",
        HeaderValue::from_static("1"),
    );
    headers
}

/// Issues upstream GET requests and follows redirects up to a bound.
#[derive(Debug)]
pub struct RedirectingFetcher {
    timeout: Duration,
    max_redirects: u32,
    guard: Arc<SsrfGuard>,
}

impl RedirectingFetcher {
    /// Create a fetcher with the given tunables and guard.
    pub fn new(config: &ProxyConfig, guard: Arc<SsrfGuard>) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout),
            max_redirects: config.max_redirects,
            guard,
        }
    }

    /// Fetch `url`, following up to `max_redirects` redirect hops.
    ///
    /// Every hop – including the first – is resolved and validated
    /// before a connection is made to it. Redirect and error bodies are
    /// drained, not buffered. Nothing is retried.
    pub async fn fetch(&self, url: Url) -> Result<ProxyResponse, FetchError> {
        let mut current = url;
        let mut redirects_followed: u32 = 0;

        loop {
            let pinned = self.guard.resolve_pinned(&current).await?;
            let response = self.send(&current, &pinned).await?;
            let status = response.status().as_u16();

            if (300..400).contains(&status) {
                if redirects_followed >= self.max_redirects {
                    drain(response).await;
                    return Err(FetchError::TooManyRedirects(self.max_redirects));
                }

                let target = redirect_target(&response, &current)?;
                self.guard.check_url(&target)?;

                drain(response).await;

                debug_fmt!(
                    "Fetch",
                    "Redirect {} -> {} (hop {}/{})",
                    current,
                    target,
                    redirects_followed + 1,
                    self.max_redirects
                );

                current = target;
                redirects_followed += 1;
                continue;
            }

            if status >= 400 {
                drain(response).await;
                warn_fmt!(
                    "Fetch",
                    "Upstream {} returned {} after {} redirect(s)",
                    current,
                    status,
                    redirects_followed
                );
                return Err(FetchError::UpstreamStatus(status));
            }

            trace_fmt!(
                "Fetch",
                "Upstream {} answered {} after {} redirect(s)",
                current,
                status,
                redirects_followed
            );

            let headers = response.headers().clone();
            let body = reqwest::Body::wrap_stream(response.bytes_stream());

            return Ok(ProxyResponse {
                status,
                headers,
                body,
            });
        }
    }

    /// Send one GET, trying the pinned addresses in order.
    async fn send(
        &self,
        url: &Url,
        pinned: &[IpAddr],
    ) -> Result<reqwest::Response, FetchError> {
        let host = url
            .host_str()
            .ok_or_else(|| FetchError::InvalidUrl(format!("{url}: missing host")))?;
        let port = url.port_or_known_default().unwrap_or(80);
        let is_literal = host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<IpAddr>()
            .is_ok();

        let mut last_error: Option<FetchError> = None;

        for ip in pinned {
            let mut builder = reqwest::Client::builder()
                .redirect(Policy::none())
                .timeout(self.timeout)
                .default_headers(browser_headers())
                .no_proxy();

            if !is_literal {
                builder = builder.resolve(host, SocketAddr::new(*ip, port));
            }

            let client = builder.build().map_err(|e| {
                FetchError::Config(format!("failed to build HTTP client: {e}"))
            })?;

            match timeout(self.timeout, client.get(url.clone()).send()).await {
                Ok(Ok(response)) => return Ok(response),
                Ok(Err(err)) if err.is_timeout() => {
                    return Err(FetchError::Timeout(self.timeout));
                }
                Ok(Err(err)) => {
                    trace_fmt!("Fetch", "Connection to {} via {} failed: {}", url, ip, err);
                    last_error = Some(FetchError::Unreachable(err.to_string()));
                }
                Err(_) => return Err(FetchError::Timeout(self.timeout)),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            FetchError::Unreachable(format!("no usable addresses for {host}"))
        }))
    }
}

/// Extract and resolve the redirect target of a 3xx response.
fn redirect_target(
    response: &reqwest::Response,
    current: &Url,
) -> Result<Url, FetchError> {
    let location = response
        .headers()
        .get(LOCATION)
        .ok_or_else(|| FetchError::BadRedirect("missing Location header".to_string()))?
        .to_str()
        .map_err(|_| FetchError::BadRedirect("unreadable Location header".to_string()))?;

    // Relative Locations resolve against the URL being redirected from
    let target = current
        .join(location)
        .map_err(|e| FetchError::BadRedirect(format!("invalid Location '{location}': {e}")))?;

    validate_url(target.as_str())
}

/// Consume and discard a response body so the connection is reusable.
async fn drain(response: reqwest::Response) {
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        if chunk.is_err() {
            break;
        }
    }
}
