//! Tracing setup for page bridge processes.

#![warn(missing_docs, clippy::pedantic)]

use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Builds the filter: `RUST_LOG` when set and valid, otherwise `default`.
///
/// # Errors
///
/// Fails when `default` is not a valid filter directive.
pub fn env_filter(default: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(default).map_err(|err| anyhow!("invalid log filter `{default}`: {err}"))
}

/// Installs a global `fmt` subscriber filtered by [`env_filter`].
///
/// Returns `false` when a global subscriber was already installed, which
/// makes repeated calls harmless.
///
/// # Errors
///
/// Fails when `default` is not a valid filter directive.
pub fn init_tracing(default: &str) -> Result<bool> {
    let filter = env_filter(default)?;
    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()
        .is_ok();
    Ok(installed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_harmless() {
        init_tracing("info").unwrap();
        assert!(!init_tracing("debug").unwrap());
    }

    #[test]
    fn rejects_garbage_default() {
        // An explicit RUST_LOG would mask the default, so only check when unset.
        if std::env::var_os("RUST_LOG").is_none() {
            assert!(env_filter("bridge=loud").is_err());
        }
    }
}
