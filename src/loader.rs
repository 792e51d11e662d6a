// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! High-level entry-point – "turn the key and go".
//!
//! The [`FetchgateLoader`] consumes configuration, initialises logging,
//! builds the [`ProxyEngine`] and returns a single [`Fetchgate`] ready
//! to [`start`](Fetchgate::start).

use log::LevelFilter;
use std::env;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{
    Config, ConfigError, ConfigProvider, EnvConfigProvider, FileConfigProvider,
};
use crate::core::{FetchError, ProxyEngine};
use crate::logging;
use crate::logging::config::LoggingConfig;
use crate::server::{ProxyServer, ServerConfig};

/// Errors that can occur during Fetchgate initialization.
#[derive(Error, Debug)]
pub enum LoaderError {
    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    /// Proxy error
    #[error("proxy error: {0}")]
    ProxyError(#[from] FetchError),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Builder for initializing and configuring Fetchgate.
#[derive(Debug, Default)]
pub struct FetchgateLoader {
    config: Option<Config>,
    config_file_path: Option<String>,
    use_env_vars: bool,
    env_prefix: Option<String>,
    custom_providers: Vec<Arc<dyn ConfigProvider>>,
}

impl FetchgateLoader {
    /// Create a new loader with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a fully built configuration to use, bypassing the other
    /// configuration sources.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a configuration file to load.
    pub fn with_config_file(mut self, file_path: &str) -> Self {
        self.config_file_path = Some(file_path.to_string());
        self
    }

    /// Enable environment variable configuration.
    pub fn with_env_vars(mut self) -> Self {
        self.use_env_vars = true;
        self
    }

    /// Set a custom prefix for environment variables (default is "FETCHGATE_").
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_string());
        self.use_env_vars = true;
        self
    }

    /// Add a custom configuration provider. Later providers override
    /// earlier ones, and all custom providers override env and file.
    pub fn with_provider<P: ConfigProvider + 'static>(mut self, provider: P) -> Self {
        self.custom_providers.push(Arc::new(provider));
        self
    }

    /// Build and initialize Fetchgate.
    pub fn build(self) -> Result<Fetchgate, LoaderError> {
        // Build the configuration
        let config = if let Some(config) = self.config {
            config
        } else {
            let mut config_builder = Config::builder();

            // File first so the environment can override it
            if let Some(file_path) = self.config_file_path {
                let file_provider = FileConfigProvider::new(&file_path)?;
                config_builder = config_builder.with_provider(file_provider);
            }

            if self.use_env_vars {
                let env_provider = match self.env_prefix {
                    Some(prefix) => EnvConfigProvider::new(&prefix),
                    None => EnvConfigProvider::default(),
                };
                config_builder = config_builder.with_provider(env_provider);
            }

            for provider in self.custom_providers {
                config_builder = config_builder.with_shared_provider(provider);
            }

            config_builder.build()
        };

        let config_arc = Arc::new(config);

        // Then initialize the logger
        let log_level = match env::var("RUST_LOG_LEVEL").ok().as_deref() {
            Some("trace") => LevelFilter::Trace,
            Some("debug") => LevelFilter::Debug,
            Some("info") => LevelFilter::Info,
            Some("warn") => LevelFilter::Warn,
            Some("error") => LevelFilter::Error,
            _ => LevelFilter::Info,
        };

        match config_arc.get::<LoggingConfig>("proxy.logging") {
            Ok(logging_config) => {
                logging::init_with_config(Some(log_level), logging_config);
            }
            Err(e) => {
                logging::init(Some(log_level));
                logging::log_warning(
                    "Startup",
                    format!("Failed to read logging configuration: {e}"),
                );
            }
        }

        log::info!("Fetchgate starting up");

        // Create the proxy engine
        let engine = ProxyEngine::new(config_arc.clone())?;

        // Get server configuration, key by key so flat sources apply
        let server_defaults = ServerConfig::default();
        let server_config = ServerConfig {
            host: config_arc.get_or_default("server.host", server_defaults.host)?,
            port: config_arc.get_or_default("server.port", server_defaults.port)?,
            health_port: config_arc
                .get_or_default("server.health_port", server_defaults.health_port)?,
        };

        // Create the proxy server
        let server = ProxyServer::new(server_config, Arc::new(engine));

        Ok(Fetchgate {
            config: config_arc,
            server,
        })
    }
}

/// Main Fetchgate struct that holds the initialized proxy.
#[derive(Debug, Clone)]
pub struct Fetchgate {
    config: Arc<Config>,
    server: ProxyServer,
}

impl Fetchgate {
    /// Create a new loader for initializing Fetchgate.
    pub fn loader() -> FetchgateLoader {
        FetchgateLoader::new()
    }

    /// Get the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the proxy server.
    pub fn server(&self) -> &ProxyServer {
        &self.server
    }

    /// Start the proxy server.
    pub async fn start(&self) -> Result<(), LoaderError> {
        self.server.start().await.map_err(LoaderError::ProxyError)
    }
}
