//! Target origin resolution for posted messages.

use std::fmt::{self, Display, Formatter};

use url::Url;

use crate::{Error, Result};

const WILDCARD: &str = "*";

/// Origin a message is addressed to; delivery only happens when it matches
/// the receiving context.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum TargetOrigin {
    /// Deliver regardless of the receiver's origin.
    Wildcard,
    /// Deliver only to a receiver whose origin equals this value.
    Exact(String),
}

impl TargetOrigin {
    /// Parses an explicit override such as `"*"` or `"https://example.com"`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOrigin`] when the value is empty.
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(Error::InvalidOrigin {
                value: value.to_owned(),
                reason: "origin cannot be empty".into(),
            });
        }
        if value == WILDCARD {
            return Ok(Self::Wildcard);
        }
        Ok(Self::Exact(value.trim_end_matches('/').to_owned()))
    }

    /// Derives the origin of `location`, resolved relative to `base`.
    ///
    /// Returns `None` when the location cannot be parsed or has an opaque
    /// origin (for example `about:blank` or `data:` URLs).
    #[must_use]
    pub fn from_location(location: &str, base: &str) -> Option<Self> {
        let resolved = match Url::parse(base) {
            Ok(base) => base.join(location).ok()?,
            Err(_) => Url::parse(location).ok()?,
        };
        let origin = resolved.origin();
        origin
            .is_tuple()
            .then(|| Self::Exact(origin.ascii_serialization()))
    }

    /// Picks the origin for a child call: explicit override first, then the
    /// origin of the child's current location, then the wildcard.
    #[must_use]
    pub fn resolve(explicit: Option<&str>, location: &str, base: &str) -> Self {
        explicit
            .and_then(|value| Self::parse(value).ok())
            .or_else(|| Self::from_location(location, base))
            .unwrap_or(Self::Wildcard)
    }

    /// Returns `true` when a context with `origin` may receive the message.
    #[must_use]
    pub fn admits(&self, origin: &str) -> bool {
        match self {
            Self::Wildcard => true,
            Self::Exact(expected) => expected == origin,
        }
    }

    /// Returns the wire representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Wildcard => WILDCARD,
            Self::Exact(origin) => origin,
        }
    }
}

impl Display for TargetOrigin {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
