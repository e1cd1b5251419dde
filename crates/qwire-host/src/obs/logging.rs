use tracing_subscriber::{fmt, EnvFilter};

use qwire_core::error::{QwireError, Result};

use crate::config::LoggingSection;

/// `RUST_LOG` wins over the configured filter.
pub fn env_filter(cfg: &LoggingSection) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(f) => Ok(f),
        Err(_) => EnvFilter::try_new(&cfg.filter)
            .map_err(|e| QwireError::BadRequest(format!("invalid logging.filter: {e}"))),
    }
}

/// Install the global fmt subscriber. A second call is an error.
pub fn init(cfg: &LoggingSection) -> Result<()> {
    fmt()
        .with_env_filter(env_filter(cfg)?)
        .try_init()
        .map_err(|e| QwireError::Internal(format!("logging init failed: {e}")))
}
