//! Logging setup
//!
//! One compact `tracing` subscriber for the whole process.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Log level configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    /// `--verbose`: request tracing and per-exchange detail
    Debug,
    Info,
}

impl LogLevel {
    fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
        }
    }
}

/// Directives for our crate and the gateway's request tracing
fn default_directives(level: LogLevel) -> String {
    let level = level.to_tracing_level();
    format!("contract_proxy={level},tower_http={level}")
}

/// Initialize the logger; `RUST_LOG` takes precedence over `level`
pub fn init_logger(level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
