// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! URL validation and SSRF guarding.
//!
//! Two layers of defence run before any connection is opened:
//!
//! 1. [`validate_url`] + [`SsrfGuard::check_url`] – synchronous checks on
//!    the URL string: scheme allow-list, exact host blocklist, and CIDR
//!    matching for IP literals. No DNS involved.
//! 2. [`SsrfGuard::resolve_pinned`] – resolves the host name, validates
//!    every resolved address against the blocked networks and returns
//!    the addresses the fetcher may pin its connection to. Binding the
//!    block decision to the address actually connected to closes the
//!    DNS-rebinding gap a string-only check leaves open.
//!
//! Both layers run again for every redirect hop.

#[cfg(test)]
mod tests;

use std::net::IpAddr;

use ipnetwork::IpNetwork;
use tokio::net::lookup_host;
use url::Url;

use crate::config::ProxyConfig;
use crate::core::FetchError;
use crate::debug_fmt;

/// Parse and validate a candidate URL.
///
/// Only `http` and `https` schemes pass; the URL must carry a host.
/// Performs no I/O.
pub fn validate_url(raw: &str) -> Result<Url, FetchError> {
    let url =
        Url::parse(raw).map_err(|e| FetchError::InvalidUrl(format!("{raw}: {e}")))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(FetchError::UnsupportedScheme(other.to_string())),
    }

    if url.host_str().is_none() {
        return Err(FetchError::InvalidUrl(format!("{raw}: missing host")));
    }

    Ok(url)
}

/// Classifies targets as internal/private or external.
///
/// Built once from [`ProxyConfig`] and immutable afterwards; safe to
/// share across requests.
#[derive(Debug)]
pub struct SsrfGuard {
    blocked_hosts: Vec<String>,
    blocked_networks: Vec<IpNetwork>,
}

impl SsrfGuard {
    /// Build a guard from the configured blocklists.
    pub fn new(config: &ProxyConfig) -> Result<Self, FetchError> {
        let blocked_hosts = config
            .blocked_hosts
            .iter()
            .map(|h| h.to_ascii_lowercase())
            .collect();

        let mut blocked_networks = Vec::with_capacity(config.blocked_networks.len());
        for entry in &config.blocked_networks {
            let network: IpNetwork = entry.parse().map_err(|e| {
                FetchError::Config(format!("invalid blocked network '{entry}': {e}"))
            })?;
            blocked_networks.push(network);
        }

        Ok(Self {
            blocked_hosts,
            blocked_networks,
        })
    }

    /// The string-level check: exact host blocklist, then CIDR matching
    /// when the host is an IP literal. Performs no DNS resolution.
    pub fn check_url(&self, url: &Url) -> Result<(), FetchError> {
        let hostname = bare_hostname(url)?;

        if self.blocked_hosts.iter().any(|blocked| *blocked == hostname) {
            return Err(FetchError::ForbiddenTarget(format!(
                "access to '{hostname}' is blocked"
            )));
        }

        if let Ok(ip) = hostname.parse::<IpAddr>() {
            self.check_ip(ip, &hostname)?;
        }

        Ok(())
    }

    /// Resolve the URL's host and validate every address.
    ///
    /// Returns the addresses the caller may connect to, in resolver
    /// order. Fails with [`FetchError::ForbiddenTarget`] when everything
    /// the name resolves to is blocked, and with
    /// [`FetchError::Unreachable`] when resolution fails or comes back
    /// empty. IP literals skip DNS and are re-checked directly.
    pub async fn resolve_pinned(&self, url: &Url) -> Result<Vec<IpAddr>, FetchError> {
        let hostname = bare_hostname(url)?;
        let port = url.port_or_known_default().unwrap_or(80);

        if let Ok(ip) = hostname.parse::<IpAddr>() {
            self.check_ip(ip, &hostname)?;
            return Ok(vec![ip]);
        }

        let addrs = lookup_host((hostname.as_str(), port)).await.map_err(|e| {
            FetchError::Unreachable(format!("DNS lookup for '{hostname}' failed: {e}"))
        })?;

        let mut allowed = Vec::new();
        let mut blocked = 0usize;
        for addr in addrs {
            match self.check_ip(addr.ip(), &hostname) {
                Ok(()) => allowed.push(addr.ip()),
                Err(_) => blocked += 1,
            }
        }

        if allowed.is_empty() {
            return Err(if blocked > 0 {
                FetchError::ForbiddenTarget(format!(
                    "'{hostname}' resolves only to blocked addresses"
                ))
            } else {
                FetchError::Unreachable(format!(
                    "DNS lookup for '{hostname}' returned no addresses"
                ))
            });
        }

        if blocked > 0 {
            debug_fmt!(
                "SsrfGuard",
                "'{}': {} resolved address(es) blocked, {} usable",
                hostname,
                blocked,
                allowed.len()
            );
        }

        Ok(allowed)
    }

    fn check_ip(&self, ip: IpAddr, host: &str) -> Result<(), FetchError> {
        if let Some(network) = self.blocked_networks.iter().find(|n| n.contains(ip)) {
            return Err(FetchError::ForbiddenTarget(format!(
                "'{host}' is within blocked range {network}"
            )));
        }

        // An IPv4-mapped IPv6 address must not smuggle a blocked v4 range
        if let IpAddr::V6(v6) = ip {
            if let Some(v4) = v6.to_ipv4_mapped() {
                let mapped = IpAddr::V4(v4);
                if let Some(network) =
                    self.blocked_networks.iter().find(|n| n.contains(mapped))
                {
                    return Err(FetchError::ForbiddenTarget(format!(
                        "'{host}' maps into blocked range {network}"
                    )));
                }
            }
        }

        Ok(())
    }
}

/// The URL's host with IPv6 brackets stripped, lowercased.
fn bare_hostname(url: &Url) -> Result<String, FetchError> {
    let host = url
        .host_str()
        .ok_or_else(|| FetchError::InvalidUrl(format!("{url}: missing host")))?;
    Ok(host
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_ascii_lowercase())
}
