// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Common test utilities and helpers for Fetchgate tests.

use fetchgate::config::{ConfigError, ConfigProvider};
use serde_json::{Value, json};

/// Test configuration provider backed by one nested JSON document.
///
/// Keys are dotted paths; `with_value` creates intermediate objects as
/// needed, so `with_value("proxy.timeout", 1)` yields `{"proxy":
/// {"timeout": 1}}` and the whole `proxy` section deserializes.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct TestConfigProvider {
    name: String,
    root: Value,
}

#[allow(dead_code)]
impl TestConfigProvider {
    /// Create an empty test config provider.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            root: json!({}),
        }
    }

    /// Set a value at a dotted key path.
    pub fn with_value(mut self, key: &str, value: impl Into<Value>) -> Self {
        let mut node = self
            .root
            .as_object_mut()
            .expect("config root is an object");

        let parts: Vec<&str> = key.split('.').collect();
        for part in &parts[..parts.len() - 1] {
            node = node
                .entry(part.to_string())
                .or_insert_with(|| json!({}))
                .as_object_mut()
                .expect("intermediate config nodes are objects");
        }
        node.insert(parts[parts.len() - 1].to_string(), value.into());
        self
    }

    /// Blocklists that keep loopback reachable so tests can proxy to
    /// local mock servers.
    pub fn with_loopback_allowed(self) -> Self {
        self.with_value("proxy.blocked_hosts", json!(["0.0.0.0"]))
            .with_value(
                "proxy.blocked_networks",
                json!([
                    "10.0.0.0/8",
                    "192.168.0.0/16",
                    "169.254.0.0/16",
                    "fc00::/7"
                ]),
            )
    }

    fn lookup(&self, key: &str) -> Option<&Value> {
        let mut current = &self.root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }
}

impl ConfigProvider for TestConfigProvider {
    fn has(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    fn provider_name(&self) -> &str {
        &self.name
    }

    fn get_raw(&self, key: &str) -> Result<Option<Value>, ConfigError> {
        Ok(self.lookup(key).cloned())
    }
}

/// Install the discard logger once for the whole test binary.
#[allow(dead_code)]
pub fn init_test_logging() {
    fetchgate::logging::test_logger::init_test_logger();
}

/// Find a free TCP port by binding to port 0 and releasing it.
#[allow(dead_code)]
pub async fn get_available_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}
