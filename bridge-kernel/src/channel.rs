//! In-process broadcast channel standing in for a browsing context's message
//! queue.

use std::fmt;
use std::sync::Arc;

use bridge_primitives::{ChannelError, ChannelMessage, ChannelResult, MessageTarget, TargetOrigin};
use tokio::sync::broadcast;
use tracing::debug;

/// Default number of undelivered messages retained per bus.
pub const DEFAULT_BUS_CAPACITY: usize = 256;

/// Broadcast bus visible to every listener registered on one context.
#[derive(Clone)]
pub struct MessageBus {
    sender: broadcast::Sender<ChannelMessage>,
}

impl fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBus")
            .field("listeners", &self.sender.receiver_count())
            .finish()
    }
}

impl MessageBus {
    /// Creates a bus retaining up to `capacity` undelivered messages.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Registers a new listener.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChannelMessage> {
        self.sender.subscribe()
    }

    /// Delivers `message` to every listener, returning how many saw it.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Closed`] when nobody is listening.
    pub fn publish(&self, message: ChannelMessage, origin: &str) -> ChannelResult<usize> {
        self.sender.send(message).map_err(|_| ChannelError::Closed {
            origin: origin.to_owned(),
        })
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

/// A browsing context: an origin plus the bus its listeners subscribe to.
#[derive(Debug)]
pub struct Window {
    origin: String,
    bus: MessageBus,
}

impl Window {
    /// Creates a context for `origin` with the default bus capacity.
    #[must_use]
    pub fn new(origin: impl Into<String>) -> Arc<Self> {
        Self::with_capacity(origin, DEFAULT_BUS_CAPACITY)
    }

    /// Creates a context for `origin` whose bus retains `capacity` messages.
    #[must_use]
    pub fn with_capacity(origin: impl Into<String>, capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            origin: origin.into(),
            bus: MessageBus::new(capacity),
        })
    }

    /// Returns the context's bus.
    #[must_use]
    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    /// Registers a listener on this context.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChannelMessage> {
        self.bus.subscribe()
    }
}

impl MessageTarget for Window {
    fn origin(&self) -> &str {
        &self.origin
    }

    fn post_message(
        &self,
        message: ChannelMessage,
        target_origin: &TargetOrigin,
    ) -> ChannelResult<()> {
        if !target_origin.admits(&self.origin) {
            debug!(
                target = %target_origin,
                origin = %self.origin,
                "message dropped on origin mismatch"
            );
            return Ok(());
        }
        if self.bus.publish(message, &self.origin).is_err() {
            debug!(origin = %self.origin, "message dropped, nobody listening");
        }
        Ok(())
    }
}
