//! Structured logging for the murk fog pipeline.
//!
//! Provides span-based, filterable logging via the `tracing` ecosystem:
//! console output with timestamps and module paths, plus JSON file logging in
//! debug builds for post-mortem analysis. The fog config's diagnostics
//! section can override the log level at init time.

use std::path::Path;

use murk_config::FogConfig;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber for the fog pipeline host.
///
/// Sets up:
/// - Console output with uptime timestamps, module paths, and severity levels
/// - JSON file logging in debug builds (optional)
/// - Environment-based filtering (respects RUST_LOG)
/// - Log level override from the fog config's diagnostics section
///
/// # Arguments
///
/// * `log_dir` - Optional directory for JSON log files (debug builds only)
/// * `debug_build` - Whether this is a debug build (enables file logging)
/// * `config` - Optional fog configuration for the log level override
///
/// # Examples
///
/// ```no_run
/// use murk_log::init_logging;
/// use murk_config::FogConfig;
///
/// // Basic initialization
/// init_logging(None, false, None);
///
/// // With config override
/// let config = FogConfig::default();
/// init_logging(None, false, Some(&config));
/// ```
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, config: Option<&FogConfig>) {
    let filter_str = match config {
        Some(config) if !config.diagnostics.log_level.is_empty() => {
            config.diagnostics.log_level.clone()
        }
        _ => "info".to_string(),
    };

    // Default filter, overridable via RUST_LOG env var.
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    // In debug builds, also log to a file for post-mortem analysis.
    if debug_build
        && let Some(log_dir) = log_dir
        && std::fs::create_dir_all(log_dir).is_ok()
        && let Ok(log_file) = std::fs::File::create(log_dir.join("murk.log"))
    {
        let file_layer = fmt::layer()
            .with_writer(std::sync::Arc::new(log_file))
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .json();

        subscriber.with(file_layer).init();
        return;
    }

    subscriber.init();
}

/// Create an `EnvFilter` with the default filter string (`info` for all
/// targets).
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new("info")
}
