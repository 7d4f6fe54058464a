//! Structured logging setup for applications built on tenckpt
//!
//! The library crates only emit `tracing` events (plan construction, checkpoint
//! releases, recomputation during backward). This module installs a subscriber
//! that renders them.
//!
//! # Example
//!
//! ```ignore
//! use tenckpt::tracing_support::{init_tracing, TracingConfig};
//!
//! init_tracing(TracingConfig::default())?;
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: filter directive (e.g. `RUST_LOG=tenckpt_ad=debug`)
//! - `TENCKPT_LOG_FORMAT`: `pretty` (default), `json` or `compact`

use anyhow::Result;
use tenckpt_ad::MemoryStats;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "tenckpt=info,warn";

/// Tracing output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TracingFormat {
    /// Multi-line human-readable output
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
    /// Single line per event
    Compact,
}

impl TracingFormat {
    /// Parse from string; unknown values fall back to [`TracingFormat::Pretty`]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => TracingFormat::Json,
            "compact" => TracingFormat::Compact,
            _ => TracingFormat::Pretty,
        }
    }
}

/// Subscriber configuration
#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub format: TracingFormat,
    /// Filter directive (e.g. `"tenckpt_ad=debug,info"`)
    pub filter: String,
    pub with_ansi: bool,
    pub with_target: bool,
    pub with_file: bool,
    pub with_line_number: bool,
}

impl TracingConfig {
    /// Configuration with an explicit filter, ignoring `RUST_LOG`
    pub fn with_filter(filter: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            ..Self::default()
        }
    }
}

impl Default for TracingConfig {
    fn default() -> Self {
        let format = std::env::var("TENCKPT_LOG_FORMAT")
            .map(|s| TracingFormat::parse(&s))
            .unwrap_or_default();
        let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_FILTER.to_string());

        Self {
            format,
            filter,
            with_ansi: true,
            with_target: true,
            with_file: false,
            with_line_number: false,
        }
    }
}

/// Install the global subscriber. Call once at application startup.
///
/// Fails if the filter directive does not parse or a global subscriber is
/// already installed.
#[cfg(feature = "tracing")]
pub fn init_tracing(config: TracingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.filter)?;

    match config.format {
        TracingFormat::Pretty => {
            let layer = fmt::layer()
                .pretty()
                .with_ansi(config.with_ansi)
                .with_target(config.with_target)
                .with_file(config.with_file)
                .with_line_number(config.with_line_number)
                .with_filter(filter);
            tracing_subscriber::registry().with(layer).try_init()?;
        }
        TracingFormat::Json => {
            let layer = fmt::layer()
                .json()
                .with_target(config.with_target)
                .with_file(config.with_file)
                .with_line_number(config.with_line_number)
                .with_filter(filter);
            tracing_subscriber::registry().with(layer).try_init()?;
        }
        TracingFormat::Compact => {
            let layer = fmt::layer()
                .compact()
                .with_ansi(config.with_ansi)
                .with_target(config.with_target)
                .with_file(config.with_file)
                .with_line_number(config.with_line_number)
                .with_filter(filter);
            tracing_subscriber::registry().with(layer).try_init()?;
        }
    }

    Ok(())
}

/// No-op when the `tracing` feature is disabled
#[cfg(not(feature = "tracing"))]
pub fn init_tracing(_config: TracingConfig) -> Result<()> {
    Ok(())
}

/// Emit a tape memory snapshot as a structured event
pub fn record_memory_stats(label: &str, stats: &MemoryStats) {
    tracing::info!(
        label = label,
        nodes = stats.num_nodes,
        resident_bytes = stats.resident_bytes(),
        saved_bytes = stats.saved_bytes,
        released_nodes = stats.released_nodes,
        released_bytes = stats.released_bytes,
        "tape_memory"
    );
}
