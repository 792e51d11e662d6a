// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fetchgate - an SSRF-guarded outbound HTTP fetch proxy.
//!
//! Fetchgate exposes a single endpoint, `GET /api/proxy/fetch?url=...`,
//! that fetches the given URL on the server's behalf and streams the
//! response back to the client. On the way through it:
//!
//! - validates the URL and rejects non-HTTP(S) schemes,
//! - blocks internal, private and link-local targets (SSRF protection),
//!   pinning every connection to an address that passed validation,
//! - follows redirects up to a configurable bound, re-validating every
//!   hop before any connection is made to it,
//! - strips hop-by-hop and embedding-restricting response headers and
//!   injects permissive CORS/frame headers,
//! - transparently removes `Content-Encoding` (gzip, deflate, brotli)
//!   so the client always receives raw bytes.
//!
//! # Configuration System
//!
//! Configuration is layered and pluggable:
//!
//! - **Multiple Configuration Sources**: Load configuration from files
//!   (JSON, TOML, YAML) and environment variables (`FETCHGATE_` prefix).
//! - **Layered Configuration**: Create a hierarchy of configuration
//!   providers with well-defined priorities.
//! - **Type Safety**: Parse configuration values into the appropriate
//!   Rust types.
//! - **Extensibility**: Implement the [`ConfigProvider`] trait to create
//!   custom configuration sources.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use fetchgate::Fetchgate;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let proxy = Fetchgate::loader()
//!     .with_env_vars()
//!     .with_config_file("fetchgate.toml")
//!     .build()?;
//!
//! proxy.start().await?;
//! # Ok(())
//! # }
//! ```

// Module declarations
pub mod config;
pub mod core;
pub mod decode;
pub mod fetch;
pub mod filters;
pub mod guard;
pub mod loader;
pub mod logging;
pub mod server;

// Re-export key types at the crate root for convenience
pub use config::{Config, ConfigError, ConfigProvider, ConfigProviderExt, ProxyConfig};
pub use core::{FetchError, ProxyEngine, ProxyResponse};
pub use fetch::RedirectingFetcher;
pub use filters::{DecodeBodyFilter, HeaderPolicyFilter, ResponseFilter};
pub use guard::{SsrfGuard, validate_url};
pub use loader::{Fetchgate, FetchgateLoader, LoaderError};
pub use server::{ProxyServer, ServerConfig};
