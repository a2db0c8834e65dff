//! Correlation identifiers and child addressing.

use std::fmt::{self, Display, Formatter};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Position of an embedded child context inside the page, starting at zero.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChildIndex(usize);

impl ChildIndex {
    /// Wraps a raw zero-based position.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the raw zero-based position.
    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }
}

impl Display for ChildIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl From<usize> for ChildIndex {
    fn from(value: usize) -> Self {
        Self(value)
    }
}

/// Opaque token pairing an outbound call with its eventual response.
///
/// Identifiers arriving from the wire are accepted verbatim; only locally
/// generated ones follow the `prefix:child:millis:entropy` layout.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Creates an identifier from an existing token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequestId`] when the token is empty.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(Error::InvalidRequestId {
                reason: "request id cannot be empty".into(),
            });
        }
        Ok(Self(id))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<RequestId> for String {
    fn from(value: RequestId) -> Self {
        value.0
    }
}

/// Produces collision-resistant identifiers for outbound child calls.
///
/// Each identifier combines the addressed child, the current wall-clock
/// milliseconds, and 122 bits of random entropy, so concurrent calls to the
/// same or different children never share a token.
#[derive(Clone, Debug)]
pub struct RequestIdGenerator {
    prefix: String,
}

impl RequestIdGenerator {
    /// Creates a generator whose identifiers start with `prefix`.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Returns the configured prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Generates a fresh identifier for a call addressed to `child`.
    #[must_use]
    pub fn next(&self, child: ChildIndex) -> RequestId {
        let millis = Utc::now().timestamp_millis();
        let entropy = Uuid::new_v4().simple();
        RequestId(format!("{}:{child}:{millis}:{entropy}", self.prefix))
    }
}

impl Default for RequestIdGenerator {
    fn default() -> Self {
        Self::new("PAGE_B")
    }
}
