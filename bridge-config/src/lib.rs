//! Configuration for page bridge processes.
//!
//! Settings come from three layers, later ones winning: built-in defaults, an
//! optional JSON file, and environment variables. Authorized sites are the
//! exception: every layer adds to the list instead of replacing it.

#![warn(missing_docs, clippy::pedantic)]

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail, ensure};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Overrides [`BridgeConfig::child_call_timeout_ms`].
pub const ENV_TIMEOUT_MS: &str = "PAGE_BRIDGE_TIMEOUT_MS";
/// Overrides [`BridgeConfig::channel_capacity`].
pub const ENV_CHANNEL_CAPACITY: &str = "PAGE_BRIDGE_CHANNEL_CAPACITY";
/// Overrides [`BridgeConfig::max_concurrency`].
pub const ENV_MAX_CONCURRENCY: &str = "PAGE_BRIDGE_MAX_CONCURRENCY";
/// Overrides [`BridgeConfig::page_origin`].
pub const ENV_ORIGIN: &str = "PAGE_BRIDGE_ORIGIN";
/// Overrides [`BridgeConfig::log_filter`].
pub const ENV_LOG: &str = "PAGE_BRIDGE_LOG";
/// Comma-separated sites merged into [`BridgeConfig::authorized_sites`].
pub const ENV_AUTHORIZED_SITES: &str = "AUTHORIZED_SITES";
/// JSON array, or object with a `sites` array, merged into
/// [`BridgeConfig::authorized_sites`].
pub const ENV_AUTHORIZED_SITES_JSON: &str = "AUTHORIZED_SITES_JSON";

/// Runtime settings for one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Default wait for child responses, in milliseconds.
    pub child_call_timeout_ms: u64,
    /// Undelivered messages retained per window bus.
    pub channel_capacity: usize,
    /// Inbound calls dispatched at the same time.
    pub max_concurrency: usize,
    /// Origin of the page's own window.
    pub page_origin: String,
    /// Screen counts accepted by `layout.set`.
    pub allowed_screen_counts: Vec<usize>,
    /// Sites offered on every screen.
    pub authorized_sites: Vec<String>,
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            child_call_timeout_ms: 1500,
            channel_capacity: 256,
            max_concurrency: 32,
            page_origin: "http://localhost:3000".to_owned(),
            allowed_screen_counts: vec![1, 2, 3, 4, 20],
            authorized_sites: Vec::new(),
            log_filter: "info".to_owned(),
        }
    }
}

impl BridgeConfig {
    /// Reads a JSON configuration file. Missing fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or is not valid configuration JSON.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = serde_json::from_str(&raw)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        debug!(path = %path.display(), "config file loaded");
        Ok(config)
    }

    /// Defaults, then the file at `path` if given, then the process
    /// environment; validated.
    ///
    /// # Errors
    ///
    /// Propagates file, environment, and validation failures.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_path(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Overlays the process environment.
    ///
    /// # Errors
    ///
    /// Fails when a numeric variable does not parse or the sites JSON is
    /// malformed.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Overlays variables read through `lookup`.
    ///
    /// # Errors
    ///
    /// Same as [`apply_env`](Self::apply_env).
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = var(ENV_TIMEOUT_MS) {
            self.child_call_timeout_ms = parse_number(ENV_TIMEOUT_MS, &value)?;
        }
        if let Some(value) = var(ENV_CHANNEL_CAPACITY) {
            self.channel_capacity = parse_number(ENV_CHANNEL_CAPACITY, &value)?;
        }
        if let Some(value) = var(ENV_MAX_CONCURRENCY) {
            self.max_concurrency = parse_number(ENV_MAX_CONCURRENCY, &value)?;
        }
        if let Some(value) = var(ENV_ORIGIN) {
            self.page_origin = value.trim().to_owned();
        }
        if let Some(value) = var(ENV_LOG) {
            self.log_filter = value.trim().to_owned();
        }
        if let Some(value) = var(ENV_AUTHORIZED_SITES_JSON) {
            let sites = parse_sites_json(&value)
                .with_context(|| format!("invalid {ENV_AUTHORIZED_SITES_JSON}"))?;
            self.merge_sites(sites);
        }
        if let Some(value) = var(ENV_AUTHORIZED_SITES) {
            self.merge_sites(value.split(',').map(str::to_owned));
        }
        Ok(())
    }

    /// Appends `sites`, skipping blanks and ones already present.
    pub fn merge_sites<I>(&mut self, sites: I)
    where
        I: IntoIterator<Item = String>,
    {
        for site in sites {
            let site = site.trim();
            if site.is_empty() || self.authorized_sites.iter().any(|known| known == site) {
                continue;
            }
            self.authorized_sites.push(site.to_owned());
        }
    }

    /// Checks that the settings can drive a page.
    ///
    /// # Errors
    ///
    /// Rejects zero timeout, capacity, or concurrency, an empty or zero-only
    /// screen count set, and an empty page origin.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.child_call_timeout_ms > 0, "child_call_timeout_ms must be positive");
        ensure!(self.channel_capacity > 0, "channel_capacity must be positive");
        ensure!(self.max_concurrency > 0, "max_concurrency must be positive");
        ensure!(!self.page_origin.trim().is_empty(), "page_origin must not be empty");
        if self.allowed_screen_counts.is_empty() {
            bail!("allowed_screen_counts must not be empty");
        }
        ensure!(
            !self.allowed_screen_counts.contains(&0),
            "allowed_screen_counts must not contain 0"
        );
        Ok(())
    }

    /// [`child_call_timeout_ms`](Self::child_call_timeout_ms) as a duration.
    #[must_use]
    pub const fn child_call_timeout(&self) -> Duration {
        Duration::from_millis(self.child_call_timeout_ms)
    }
}

fn parse_number<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("{key} must be a non-negative integer, got `{value}`"))
}

/// Accepts `["a", "b"]` or `{"sites": ["a", "b"]}`.
fn parse_sites_json(raw: &str) -> Result<Vec<String>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Sites {
        List(Vec<String>),
        Object {
            #[serde(default)]
            sites: Vec<String>,
        },
    }

    Ok(match serde_json::from_str(raw)? {
        Sites::List(sites) | Sites::Object { sites } => sites,
    })
}
