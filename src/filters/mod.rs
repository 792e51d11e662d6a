// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Response filters applied to the terminal upstream response.
//!
//! The engine runs a fixed chain: [`DecodeBodyFilter`] first (it needs
//! the original `content-encoding`), then [`HeaderPolicyFilter`] (which
//! strips that header along with the rest of its policy).


use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::fmt;

use crate::core::{FetchError, ProxyResponse};
use crate::decode;
use crate::trace_fmt;

/// A transformation applied to the upstream response before it is
/// handed to the client.
#[async_trait]
pub trait ResponseFilter: fmt::Debug + Send + Sync {
    /// Name shown in logs.
    fn name(&self) -> &str;

    /// Transform the response.
    async fn apply(&self, response: ProxyResponse) -> Result<ProxyResponse, FetchError>;
}

/// Hop-by-hop headers that must not cross the proxy boundary.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

/// Headers invalidated by transparent decoding; the body is re-chunked.
const BODY_REWRITE_HEADERS: &[&str] = &["content-encoding", "content-length"];

/// Upstream headers that would stop the client embedding the content.
const EMBED_RESTRICTING_HEADERS: &[&str] = &[
    "x-frame-options",
    "content-security-policy",
    "content-security-policy-report-only",
    "x-content-type-options",
    "strict-transport-security",
];

/// Decides which upstream headers reach the client and injects the
/// permissive embedding/CORS set.
#[derive(Debug, Default)]
pub struct HeaderPolicyFilter;

impl HeaderPolicyFilter {
    pub fn new() -> Self {
        Self
    }

    /// The pure header transformation, usable without a response.
    ///
    /// Multi-value headers are preserved; everything not on a drop list
    /// passes through unchanged.
    pub fn filter_headers(&self, upstream: &HeaderMap) -> HeaderMap {
        let mut filtered = HeaderMap::with_capacity(upstream.len());

        for (name, value) in upstream {
            let lower = name.as_str();
            if HOP_BY_HOP_HEADERS.contains(&lower)
                || BODY_REWRITE_HEADERS.contains(&lower)
                || EMBED_RESTRICTING_HEADERS.contains(&lower)
            {
                continue;
            }
            filtered.append(name.clone(), value.clone());
        }

        filtered.insert(
            HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("ALLOWALL"),
        );
        filtered.insert(
            HeaderName::from_static("access-control-allow-origin"),
            HeaderValue::from_static("*"),
        );
        filtered.insert(
            HeaderName::from_static("access-control-allow-methods"),
            HeaderValue::from_static("GET, POST, OPTIONS"),
        );
        filtered.insert(
            HeaderName::from_static("access-control-allow-headers"),
            HeaderValue::from_static("Content-Type, Authorization"),
        );

        filtered
    }
}

#[async_trait]
impl ResponseFilter for HeaderPolicyFilter {
    fn name(&self) -> &str {
        "header_policy"
    }

    async fn apply(&self, mut response: ProxyResponse) -> Result<ProxyResponse, FetchError> {
        let before = response.headers.len();
        response.headers = self.filter_headers(&response.headers);
        trace_fmt!(
            "HeaderPolicyFilter",
            "{} upstream header(s) in, {} out",
            before,
            response.headers.len()
        );
        Ok(response)
    }
}

/// Swaps the body for a stream that removes the transport
/// content-encoding (gzip, deflate, br).
#[derive(Debug, Default)]
pub struct DecodeBodyFilter;

impl DecodeBodyFilter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ResponseFilter for DecodeBodyFilter {
    fn name(&self) -> &str {
        "decode_body"
    }

    async fn apply(&self, mut response: ProxyResponse) -> Result<ProxyResponse, FetchError> {
        let encoding = response
            .headers
            .get(reqwest::header::CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_ascii_lowercase());

        if let Some(ref enc) = encoding {
            trace_fmt!("DecodeBodyFilter", "Decoding '{}' body", enc);
        }

        response.body = decode::decoding_body(response.body, encoding.as_deref());
        Ok(response)
    }
}
