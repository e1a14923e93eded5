//! # Nebula Log
//!
//! Installs a `tracing` subscriber for binaries and tests. Libraries only
//! emit events; the process decides where they go.
//!
//! ```no_run
//! nebula_log::auto_init()?;
//! tracing::info!(port = 8080, "server starting");
//! # Ok::<(), nebula_log::Error>(())
//! ```

#![forbid(unsafe_code)]

mod builder;
mod config;

use std::sync::Once;

pub use builder::LoggerBuilder;
pub use config::{Config, Format};

/// Result type for logger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for logger operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Filter parsing error
    #[error("Invalid filter: {0}")]
    Filter(String),

    /// A global subscriber is already installed
    #[error("Failed to install subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

static TEST_INIT: Once = Once::new();

/// Pick a configuration from the environment and build type
///
/// `NEBULA_LOG` or `RUST_LOG` selects [`Config::from_env`]; otherwise debug
/// builds get [`Config::development`] and release builds
/// [`Config::production`].
pub fn auto_init() -> Result<()> {
    if std::env::var("NEBULA_LOG").is_ok() || std::env::var("RUST_LOG").is_ok() {
        init_with(Config::from_env())
    } else if cfg!(debug_assertions) {
        init_with(Config::development())
    } else {
        init_with(Config::production())
    }
}

/// Initialize with default configuration
pub fn init() -> Result<()> {
    init_with(Config::default())
}

/// Initialize with custom configuration
pub fn init_with(config: Config) -> Result<()> {
    LoggerBuilder::from_config(config).build()
}

/// Initialize for tests; safe to call from every test
pub fn init_test() {
    TEST_INIT.call_once(|| {
        // The harness or another crate may already own the global default.
        if let Err(e) = init_with(Config::test()) {
            tracing::debug!(error = %e, "test subscriber not installed");
        }
    });
}
