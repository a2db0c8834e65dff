//! Messages carried on the shared channel.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::TargetOrigin;

/// Result alias for channel operations.
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Errors produced when posting into a context.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The receiving context no longer has any listener attached.
    #[error("context `{origin}` is closed")]
    Closed {
        /// Origin of the closed context.
        origin: String,
    },
}

/// A context able to receive posted messages (a window, a frame, a
/// controller).
pub trait MessageTarget: Send + Sync {
    /// Origin of the context, e.g. `https://example.com`.
    fn origin(&self) -> &str;

    /// Posts `message` into this context.
    ///
    /// A `target_origin` that does not admit [`MessageTarget::origin`] drops
    /// the message silently and still returns `Ok(())`, as does a live context
    /// nobody is listening on.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Closed`] when the context has been detached
    /// and cannot accept messages anymore.
    fn post_message(&self, message: ChannelMessage, target_origin: &TargetOrigin)
    -> ChannelResult<()>;
}

/// One delivery on the channel: the payload, the sender's origin, and a
/// handle for replying to the sender.
#[derive(Clone)]
pub struct ChannelMessage {
    data: Value,
    origin: Option<String>,
    source: Option<Arc<dyn MessageTarget>>,
}

impl fmt::Debug for ChannelMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelMessage")
            .field("data", &self.data)
            .field("origin", &self.origin)
            .field("source", &self.source.as_ref().map(|s| s.origin().to_owned()))
            .finish()
    }
}

impl ChannelMessage {
    /// Creates an anonymous message with no origin or reply handle.
    #[must_use]
    pub fn new(data: Value) -> Self {
        Self {
            data,
            origin: None,
            source: None,
        }
    }

    /// Creates a message sent from `source`, stamping its origin.
    #[must_use]
    pub fn from_source(data: Value, source: Arc<dyn MessageTarget>) -> Self {
        Self {
            data,
            origin: Some(source.origin().to_owned()),
            source: Some(source),
        }
    }

    /// Overrides the declared sender origin.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Returns the payload.
    #[must_use]
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Returns the sender origin, if known.
    #[must_use]
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref().filter(|origin| !origin.is_empty())
    }

    /// Returns the handle used to reply to the sender, if any.
    #[must_use]
    pub fn source(&self) -> Option<&Arc<dyn MessageTarget>> {
        self.source.as_ref()
    }

    /// Returns the value of the `type` discriminant, if the payload has one.
    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        self.data.get("type").and_then(Value::as_str)
    }
}
