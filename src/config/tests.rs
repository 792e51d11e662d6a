// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::*;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::io::Write;

#[derive(Debug)]
struct MapProvider {
    name: &'static str,
    values: HashMap<String, Value>,
}

impl MapProvider {
    fn new(name: &'static str, entries: &[(&str, Value)]) -> Self {
        Self {
            name,
            values: entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }
}

impl ConfigProvider for MapProvider {
    fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn provider_name(&self) -> &str {
        self.name
    }

    fn get_raw(&self, key: &str) -> Result<Option<Value>, ConfigError> {
        Ok(self.values.get(key).cloned())
    }
}

#[test]
fn test_single_provider_lookup() {
    let config = Config::builder()
        .with_provider(MapProvider::new(
            "a",
            &[("proxy.timeout", json!(10)), ("server.host", json!("::"))],
        ))
        .build();

    let timeout: u64 = config.get("proxy.timeout").unwrap().unwrap();
    assert_eq!(timeout, 10);

    let missing: Option<String> = config.get("proxy.nope").unwrap();
    assert!(missing.is_none());
}

#[test]
fn test_later_provider_wins() {
    let config = Config::builder()
        .with_provider(MapProvider::new("base", &[("proxy.timeout", json!(30))]))
        .with_provider(MapProvider::new("override", &[("proxy.timeout", json!(3))]))
        .build();

    let timeout: u64 = config.get("proxy.timeout").unwrap().unwrap();
    assert_eq!(timeout, 3);
}

#[test]
fn test_get_or_default() {
    let config = Config::builder()
        .with_provider(MapProvider::new("a", &[("proxy.max_redirects", json!(2))]))
        .build();

    let redirects: u32 = config.get_or_default("proxy.max_redirects", 5).unwrap();
    assert_eq!(redirects, 2);

    let timeout: u64 = config.get_or_default("proxy.timeout", 30).unwrap();
    assert_eq!(timeout, 30);
}

#[test]
fn test_typed_deserialization_failure() {
    let config = Config::builder()
        .with_provider(MapProvider::new(
            "a",
            &[("proxy.timeout", json!("not a number"))],
        ))
        .build();

    let result: Result<Option<u64>, ConfigError> = config.get("proxy.timeout");
    assert!(matches!(result, Err(ConfigError::ParseError(_))));
}

#[test]
fn test_proxy_config_from_chain() {
    let config = Config::builder()
        .with_provider(MapProvider::new(
            "a",
            &[
                ("proxy.timeout", json!(7)),
                ("proxy.max_redirects", json!(1)),
            ],
        ))
        .build();

    let proxy = ProxyConfig::from_config(&config).unwrap();
    assert_eq!(proxy.timeout, 7);
    assert_eq!(proxy.max_redirects, 1);
    // Defaults fill the rest
    assert_eq!(proxy.max_url_length, 2048);
}

#[test]
fn test_file_provider_toml() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    writeln!(
        file,
        "[proxy]\ntimeout = 12\nblocked_hosts = [\"localhost\"]\n\n[server]\nport = 9999"
    )
    .unwrap();

    let provider = FileConfigProvider::new(file.path().to_str().unwrap()).unwrap();
    assert!(provider.has("proxy.timeout"));
    assert!(provider.has("server.port"));

    let config = Config::builder().with_provider(provider).build();
    let timeout: u64 = config.get("proxy.timeout").unwrap().unwrap();
    assert_eq!(timeout, 12);
    let hosts: Vec<String> = config.get("proxy.blocked_hosts").unwrap().unwrap();
    assert_eq!(hosts, vec!["localhost"]);
}

#[test]
fn test_file_provider_json() {
    let mut file = tempfile::Builder::new()
        .suffix(".json")
        .tempfile()
        .unwrap();
    write!(file, r#"{{"server": {{"host": "0.0.0.0", "port": 8088}}}}"#).unwrap();

    let provider = FileConfigProvider::new(file.path().to_str().unwrap()).unwrap();
    let host: Value = provider.get_raw("server.host").unwrap().unwrap();
    assert_eq!(host, json!("0.0.0.0"));
}

#[test]
fn test_file_provider_unsupported_extension() {
    let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
    let result = FileConfigProvider::new(file.path().to_str().unwrap());
    assert!(matches!(result, Err(ConfigError::ProviderError { .. })));
}

#[test]
fn test_file_provider_missing_file() {
    let result = FileConfigProvider::new("/nonexistent/fetchgate.toml");
    assert!(result.is_err());
}

#[test]
fn test_env_overrides_file() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    writeln!(file, "[proxy]\ntimeout = 30").unwrap();

    unsafe {
        std::env::set_var("LAYERTEST_PROXY_TIMEOUT", "5");
    }

    let config = Config::builder()
        .with_provider(FileConfigProvider::new(file.path().to_str().unwrap()).unwrap())
        .with_provider(EnvConfigProvider::new("LAYERTEST_"))
        .build();

    let timeout: u64 = config.get("proxy.timeout").unwrap().unwrap();
    assert_eq!(timeout, 5);

    unsafe {
        std::env::remove_var("LAYERTEST_PROXY_TIMEOUT");
    }
}
