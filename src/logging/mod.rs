// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Logging utilities for Fetchgate.
//!
//! All code logs through the standard `log` facade. Depending on
//! configuration that facade is backed either by `env_logger` (plain
//! terminal output) or by a structured `slog` pipeline bridged in via
//! `slog-stdlog` (see `structured.rs`).

pub mod config;
pub mod structured;
pub mod test_logger;
mod wrapper;

use config::LoggingConfig;
use log::{LevelFilter, debug, error, info, trace, warn};
use once_cell::sync::OnceCell;
use std::sync::Once;
use structured::LoggerGuard;

static INIT: Once = Once::new();
static STRUCTURED_GUARD: OnceCell<LoggerGuard> = OnceCell::new();

/// Initialize plain logging with the specified level.
///
/// This function ensures logging is only initialized once.
pub fn init(level: Option<LevelFilter>) {
    INIT.call_once(|| {
        let env = env_logger::Env::default().filter_or(
            "RUST_LOG",
            level.map_or("info", |l| match l {
                LevelFilter::Trace => "trace",
                LevelFilter::Debug => "debug",
                LevelFilter::Info => "info",
                LevelFilter::Warn => "warn",
                LevelFilter::Error => "error",
                LevelFilter::Off => "off",
            }),
        );

        env_logger::Builder::from_env(env)
            .format_timestamp_millis()
            .format_target(true)
            .init();

        info!("Logging initialized at level: {}", log::max_level());
    });
}

/// Initialize logging from a [`LoggingConfig`].
///
/// When structured logging is enabled the global `slog` logger is
/// installed and the `log` facade is routed into it; otherwise this
/// falls back to [`init`].
pub fn init_with_config(level: Option<LevelFilter>, logging: Option<LoggingConfig>) {
    match logging {
        Some(cfg) if cfg.structured => {
            INIT.call_once(|| {
                let guard = structured::init_global_logger(&cfg.to_logger_config());
                let _ = STRUCTURED_GUARD.set(guard);

                if slog_stdlog::init().is_ok() {
                    log::set_max_level(level.unwrap_or(LevelFilter::Info));
                }

                info!("Structured logging initialized ({} format)", cfg.format);
            });
        }
        _ => init(level),
    }
}

/// Log an error with context and return the error.
///
/// This is useful for logging errors in a chain of Results.
pub fn log_error<E: std::fmt::Display>(context: &str, err: E) -> E {
    error!("{}: {}", context, err);
    err
}

/// Log a warning with context.
pub fn log_warning<E: std::fmt::Display>(context: &str, err: E) {
    warn!("{}: {}", context, err);
}

/// Log a debug message with context.
pub fn log_debug<M: std::fmt::Display>(context: &str, msg: M) {
    debug!("{}: {}", context, msg);
}

/// Log a trace message with context.
pub fn log_trace<M: std::fmt::Display>(context: &str, msg: M) {
    trace!("{}: {}", context, msg);
}

/// Log an info message with context.
pub fn log_info<M: std::fmt::Display>(context: &str, msg: M) {
    info!("{}: {}", context, msg);
}

/// Generate a unique ID used to correlate the log lines of one request.
pub fn request_id() -> String {
    structured::generate_trace_id()
}
