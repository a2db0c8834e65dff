//! Shared error definitions for bridge primitives.

use thiserror::Error;

/// Result alias used throughout the bridge.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while manipulating bridge primitive types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// A target origin override could not be used.
    #[error("invalid target origin `{value}`: {reason}")]
    InvalidOrigin {
        /// The offending origin string.
        value: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// A request identifier failed validation.
    #[error("invalid request id: {reason}")]
    InvalidRequestId {
        /// Human-readable reason for rejection.
        reason: String,
    },
}
