//! Logging setup for the `sqlpreview` binary.
//!
//! # Environment Variables
//!
//! - `SQLPREVIEW_DEBUG=true` - Enable debug logging
//! - `SQLPREVIEW_LOG_LEVEL=debug|info|warn|error|trace` - Set specific log level
//! - `SQLPREVIEW_LOG_FORMAT=json|pretty|compact` - Set output format (default: json)
//!
//! Logs go to stderr so stdout stays free for workflow commands.

use std::env;
use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static INIT: Once = Once::new();

/// Check if debug logging is enabled via `SQLPREVIEW_DEBUG`.
#[inline]
pub fn is_debug_enabled() -> bool {
    env::var("SQLPREVIEW_DEBUG")
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// Get the configured log level from `SQLPREVIEW_LOG_LEVEL`.
///
/// Defaults to "debug" if `SQLPREVIEW_DEBUG` is enabled, otherwise "warn".
pub fn get_log_level() -> &'static str {
    let fallback = if is_debug_enabled() { "debug" } else { "warn" };
    match env::var("SQLPREVIEW_LOG_LEVEL") {
        Ok(level) => match level.to_lowercase().as_str() {
            "trace" => "trace",
            "debug" => "debug",
            "info" => "info",
            "warn" => "warn",
            "error" => "error",
            _ => fallback,
        },
        Err(_) => fallback,
    }
}

/// Get the configured log format from `SQLPREVIEW_LOG_FORMAT`.
pub fn get_log_format() -> &'static str {
    env::var("SQLPREVIEW_LOG_FORMAT")
        .map(|f| match f.to_lowercase().as_str() {
            "pretty" => "pretty",
            "compact" => "compact",
            _ => "json",
        })
        .unwrap_or("json")
}

/// Initialize logging. Subsequent calls are no-ops.
///
/// Nothing is installed unless `SQLPREVIEW_DEBUG` or `SQLPREVIEW_LOG_LEVEL`
/// is set.
pub fn init() {
    INIT.call_once(|| {
        if !is_debug_enabled() && env::var("SQLPREVIEW_LOG_LEVEL").is_err() {
            return;
        }

        let level = get_log_level();
        let filter = EnvFilter::try_new(format!(
            "sqlpreview={},sqlpreview_engine={},sqlpreview_cli={}",
            level, level, level
        ))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

        let registry = tracing_subscriber::registry().with(filter);
        match get_log_format() {
            "json" => registry
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init(),
            "compact" => registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init(),
            _ => registry
                .with(fmt::layer().pretty().with_writer(std::io::stderr))
                .init(),
        }

        tracing::info!(
            level = level,
            format = get_log_format(),
            "sqlpreview logging initialized"
        );
    });
}
