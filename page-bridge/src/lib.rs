//! Cross-context tool-call bridge.
//!
//! An external controller drives a page through named tools; the page drives
//! tools exposed by its embedded children. This crate bundles the runtime
//! crates behind feature flags.

#![warn(missing_docs, clippy::pedantic)]

/// Shared identifiers, origins, and channel types.
pub use bridge_primitives as primitives;

/// Page runtime (enabled by `kernel` feature).
#[cfg(feature = "kernel")]
pub use bridge_kernel as kernel;

/// Tool registry (enabled by `tools` feature).
#[cfg(feature = "tools")]
pub use bridge_tools as tools;

/// Layout collaborator and state snapshots (enabled by `layout` feature).
#[cfg(feature = "layout")]
pub use bridge_layout as layout;

/// Configuration loading (enabled by `config` feature).
#[cfg(feature = "config")]
pub use bridge_config as config;

/// Tracing setup (enabled by `telemetry` feature).
#[cfg(feature = "telemetry")]
pub use bridge_telemetry as telemetry;
