// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Minimal CLI wrapper so the library can run as a stand-alone proxy.
//!
//!  Build it with `cargo build --release --bin fetchgate`
//!  The binary honours FETCHGATE_CONFIG_FILE or falls back to
//!  /etc/fetchgate/config.toml; with neither present it starts on
//!  defaults.

use fetchgate::{Fetchgate, info_fmt};
use std::env;
use std::error::Error;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    println!("Starting Fetchgate");

    // Prefer FETCHGATE_CONFIG_FILE when present so the container user can
    // `docker run -v $(pwd)/config.toml:/etc/fetchgate/config.toml ...`
    let file_from_env = env::var("FETCHGATE_CONFIG_FILE").ok();

    // Base loader always pulls env vars; file path is optional.
    let mut loader = Fetchgate::loader().with_env_vars();
    if let Some(ref path) = file_from_env {
        println!("Using configuration from {path}");
        loader = loader.with_config_file(path);
    } else {
        // Conventional default inside the image
        let fallback_path = "/etc/fetchgate/config.toml";
        if std::path::Path::new(fallback_path).exists() {
            println!("Using default configuration path: {fallback_path}");
            loader = loader.with_config_file(fallback_path);
        } else {
            println!("No configuration file found; starting with defaults");
        }
    }

    let proxy = match loader.build() {
        Ok(p) => p,
        Err(e) => {
            println!("Failed to build proxy: {e}");
            return Err(e.into());
        }
    };

    match proxy.start().await {
        Ok(_) => {
            info_fmt!("Fetchgate", "Proxy server stopped gracefully");
        }
        Err(e) => {
            info_fmt!("Fetchgate", "Proxy server failed: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
