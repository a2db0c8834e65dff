//! Serves call envelopes arriving on a context's bus.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

use bridge_primitives::{ChannelMessage, TargetOrigin};
use tokio::sync::Semaphore;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::dispatcher::Dispatcher;
use crate::protocol::{CallEnvelope, Protocol, ResponseEnvelope};

/// Inbound calls a page dispatches at once unless told otherwise.
pub const DEFAULT_MAX_IN_FLIGHT: NonZeroUsize = NonZeroUsize::MIN.saturating_add(31);

/// Answers call envelopes of one protocol with dispatcher responses.
///
/// Replies go back to the message source, addressed to the sender's origin
/// when it is known and to `*` otherwise. Callers are not authenticated.
#[derive(Clone)]
pub struct InboundBridge {
    dispatcher: Arc<Dispatcher>,
    protocol: Protocol,
    max_in_flight: NonZeroUsize,
    permits: Arc<Semaphore>,
}

impl fmt::Debug for InboundBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundBridge")
            .field("protocol", &self.protocol)
            .field("in_flight", &self.in_flight())
            .field("max_in_flight", &self.max_in_flight)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl InboundBridge {
    /// Creates a bridge serving `protocol` calls through `dispatcher`, with
    /// at most `max_in_flight` calls dispatched at once.
    #[must_use]
    pub fn new(dispatcher: Arc<Dispatcher>, protocol: Protocol, max_in_flight: NonZeroUsize) -> Self {
        Self {
            dispatcher,
            protocol,
            max_in_flight,
            permits: Arc::new(Semaphore::new(max_in_flight.get())),
        }
    }

    /// Protocol whose calls this bridge answers.
    #[must_use]
    pub const fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Upper bound on calls dispatched at once.
    #[must_use]
    pub const fn max_in_flight(&self) -> NonZeroUsize {
        self.max_in_flight
    }

    /// Calls currently being dispatched.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.max_in_flight.get() - self.permits.available_permits()
    }

    /// Stops accepting calls. Calls still queued for a slot are dropped
    /// unanswered; calls already running finish and reply.
    pub fn close(&self) {
        self.permits.close();
    }

    /// Returns `true` once [`close`](Self::close) was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    /// Dispatches one message and sends the reply.
    ///
    /// Returns `false` without doing anything when the message is not a call
    /// of this bridge's protocol.
    pub async fn handle(&self, message: ChannelMessage) -> bool {
        let Some(envelope) = CallEnvelope::parse(message.data(), self.protocol) else {
            return false;
        };

        let response = self.dispatcher.call(&envelope.call).await;
        let reply = ResponseEnvelope::new(self.protocol, envelope.request_id, response.to_value());

        let Some(source) = message.source() else {
            warn!(protocol = self.protocol.call_type(), "call without source, reply dropped");
            return true;
        };
        let target = message
            .origin()
            .and_then(|origin| TargetOrigin::parse(origin).ok())
            .unwrap_or(TargetOrigin::Wildcard);

        if let Err(err) = source.post_message(ChannelMessage::new(reply.to_value()), &target) {
            warn!(error = %err, target = %target, "failed to send reply");
        }
        true
    }

    /// Spawns the loop serving every call received on `receiver`.
    ///
    /// Each call runs on its own task and waits there for a dispatch slot, so
    /// a suspended handler does not hold up later arrivals.
    #[must_use]
    pub fn listen(&self, mut receiver: broadcast::Receiver<ChannelMessage>) -> JoinHandle<()> {
        let bridge = self.clone();
        tokio::spawn(async move {
            loop {
                let message = match receiver.recv().await {
                    Ok(message) => message,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "inbound listener lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                if CallEnvelope::parse(message.data(), bridge.protocol).is_none() {
                    continue;
                }
                if bridge.is_closed() {
                    debug!(protocol = bridge.protocol.call_type(), "bridge closed, listener exiting");
                    break;
                }

                let worker = bridge.clone();
                tokio::spawn(async move {
                    let Ok(_slot) = Arc::clone(&worker.permits).acquire_owned().await else {
                        debug!(
                            request_id = %message.data()["requestId"],
                            "bridge closed, queued call dropped"
                        );
                        return;
                    };
                    worker.handle(message).await;
                });
            }
        })
    }
}
