// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed proxy configuration.
//!
//! [`ProxyConfig`] is materialised once from the `proxy` configuration
//! section when the engine is constructed and is immutable afterwards.
//! Every tunable has a production default, so a zero-config start is
//! safe.

use super::{Config, ConfigError};
use crate::logging::config::LoggingConfig;
use serde::{Deserialize, Serialize};

/// Tunables for one proxy engine instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Per-attempt upstream timeout in seconds. Bounds each fetch, not
    /// the whole redirect chain.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Maximum number of redirect hops followed for one request.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: u32,

    /// Longest accepted `url` query value, in characters after
    /// percent-decoding.
    #[serde(default = "default_max_url_length")]
    pub max_url_length: usize,

    /// Host names rejected outright, before any DNS resolution.
    #[serde(default = "default_blocked_hosts")]
    pub blocked_hosts: Vec<String>,

    /// CIDR ranges no connection may target, whether they appear as an
    /// IP literal in the URL or behind a resolved host name.
    #[serde(default = "default_blocked_networks")]
    pub blocked_networks: Vec<String>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_timeout() -> u64 {
    30
}

fn default_max_redirects() -> u32 {
    5
}

fn default_max_url_length() -> usize {
    2048
}

fn default_blocked_hosts() -> Vec<String> {
    ["localhost", "127.0.0.1", "0.0.0.0", "::1"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_blocked_networks() -> Vec<String> {
    [
        "10.0.0.0/8",
        "172.16.0.0/12",
        "192.168.0.0/16",
        "169.254.0.0/16",
        "127.0.0.0/8",
        "0.0.0.0/8",
        "fc00::/7",
        "::1/128",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            max_redirects: default_max_redirects(),
            max_url_length: default_max_url_length(),
            blocked_hosts: default_blocked_hosts(),
            blocked_networks: default_blocked_networks(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ProxyConfig {
    /// Materialise the tunables from a layered [`Config`].
    ///
    /// Each key is read individually so that flat sources (environment
    /// variables) and nested ones (files) both apply.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            timeout: config.get_or_default("proxy.timeout", defaults.timeout)?,
            max_redirects: config
                .get_or_default("proxy.max_redirects", defaults.max_redirects)?,
            max_url_length: config
                .get_or_default("proxy.max_url_length", defaults.max_url_length)?,
            blocked_hosts: config
                .get_or_default("proxy.blocked_hosts", defaults.blocked_hosts)?,
            blocked_networks: config
                .get_or_default("proxy.blocked_networks", defaults.blocked_networks)?,
            logging: config.get_or_default("proxy.logging", defaults.logging)?,
        })
    }
}
