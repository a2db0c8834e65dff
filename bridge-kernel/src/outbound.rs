//! Correlated calls from the page into its embedded children.
//!
//! Every call owns one entry in an id-keyed pending map. The entry is removed
//! by whichever comes first: the matching response, the timeout, or the caller
//! giving up on the wait. Removal and delivery happen under the same lock, so
//! a call can never be resolved twice.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bridge_layout::{Layout, LayoutError};
use bridge_primitives::{
    ChannelError, ChannelMessage, ChildIndex, MessageTarget, RequestId, RequestIdGenerator,
    TargetOrigin,
};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::protocol::{CallEnvelope, Protocol, ResponseEnvelope, ToolCall, generic_message};

/// Timeout applied when a call does not specify one.
pub const DEFAULT_CHILD_TIMEOUT: Duration = Duration::from_millis(1500);

/// Per-call overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// How long to wait for the response.
    pub timeout: Option<Duration>,
    /// Explicit target origin, e.g. `"*"` or `"https://child.example"`.
    pub target_origin: Option<String>,
}

impl CallOptions {
    /// Sets the wait timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the explicit target origin.
    #[must_use]
    pub fn with_target_origin(mut self, origin: impl Into<String>) -> Self {
        self.target_origin = Some(origin.into());
        self
    }
}

/// Outcome of a child call that reached the wait stage.
#[derive(Debug, Clone, PartialEq)]
pub enum ChildReply {
    /// The child answered; carries its `response` body.
    Response(Value),
    /// The timeout fired first.
    NoResponse,
}

impl ChildReply {
    /// Returns `true` when the child answered.
    #[must_use]
    pub const fn is_response(&self) -> bool {
        matches!(self, Self::Response(_))
    }

    /// Wire form: `{ok:true, response}` or `{ok:false, error:"no-response"}`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Serialize for ChildReply {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(2))?;
        match self {
            Self::Response(response) => {
                map.serialize_entry("ok", &true)?;
                map.serialize_entry("response", response)?;
            }
            Self::NoResponse => {
                map.serialize_entry("ok", &false)?;
                map.serialize_entry("error", "no-response")?;
            }
        }
        map.end()
    }
}

/// Failures detected before a call is sent.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChildCallError {
    /// The child could not be resolved.
    #[error(transparent)]
    Layout(#[from] LayoutError),
    /// The child's context was detached and refused the message.
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

impl ChildCallError {
    /// Stable error code for callers that branch on the failure kind.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Layout(LayoutError::UnknownChild { .. }) => "unknown_child",
            Self::Layout(LayoutError::NoContentWindow { .. }) => "no_content_window",
            Self::Layout(_) => "layout",
            Self::Channel(_) => "channel_closed",
        }
    }
}

type PendingMap = HashMap<RequestId, oneshot::Sender<Value>>;

/// Removes its entry from the pending map when dropped.
struct PendingEntry<'a> {
    pending: &'a Mutex<PendingMap>,
    id: RequestId,
}

impl PendingEntry<'_> {
    /// Takes the entry out of the map; `false` means a response already did.
    fn claim(&self) -> bool {
        lock(self.pending).remove(&self.id).is_some()
    }
}

impl Drop for PendingEntry<'_> {
    fn drop(&mut self) {
        lock(self.pending).remove(&self.id);
    }
}

fn lock(pending: &Mutex<PendingMap>) -> MutexGuard<'_, PendingMap> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Sends calls to children and pairs them with their responses.
pub struct ChildCaller {
    layout: Arc<dyn Layout>,
    window: Arc<dyn MessageTarget>,
    protocol: Protocol,
    ids: RequestIdGenerator,
    default_timeout: Duration,
    pending: Mutex<PendingMap>,
}

impl fmt::Debug for ChildCaller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildCaller")
            .field("origin", &self.window.origin())
            .field("protocol", &self.protocol)
            .field("default_timeout", &self.default_timeout)
            .field("pending", &self.pending_count())
            .finish_non_exhaustive()
    }
}

impl ChildCaller {
    /// Creates a caller for the page whose own context is `window`.
    #[must_use]
    pub fn new(layout: Arc<dyn Layout>, window: Arc<dyn MessageTarget>) -> Self {
        Self {
            layout,
            window,
            protocol: Protocol::CHILD,
            ids: RequestIdGenerator::default(),
            default_timeout: DEFAULT_CHILD_TIMEOUT,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Overrides the timeout applied when a call does not set one.
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Overrides the correlation id generator.
    #[must_use]
    pub fn with_id_generator(mut self, ids: RequestIdGenerator) -> Self {
        self.ids = ids;
        self
    }

    /// The layout children are resolved through.
    #[must_use]
    pub fn layout(&self) -> &Arc<dyn Layout> {
        &self.layout
    }

    /// Returns the timeout applied when a call does not set one.
    #[must_use]
    pub const fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Number of calls still waiting for a response.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Origin a message to child `index` is addressed to.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::UnknownChild`] when the index is out of range.
    pub fn target_origin(
        &self,
        index: ChildIndex,
        explicit: Option<&str>,
    ) -> Result<TargetOrigin, ChildCallError> {
        let context = self.layout.embedded_context(index)?;
        Ok(TargetOrigin::resolve(
            explicit,
            &context.url,
            &self.layout.page_location(),
        ))
    }

    fn resolve_child(
        &self,
        index: ChildIndex,
        explicit: Option<&str>,
    ) -> Result<(Arc<dyn MessageTarget>, TargetOrigin), ChildCallError> {
        let origin = self.target_origin(index, explicit)?;
        let target = self.layout.content_window(index)?;
        Ok((target, origin))
    }

    /// Calls `call.name` on child `index` and waits for its response.
    ///
    /// Resolves to [`ChildReply::Response`] when the matching response
    /// arrives first and to [`ChildReply::NoResponse`] when the timeout does.
    /// A response arriving later is dropped by [`route`](Self::route).
    ///
    /// # Errors
    ///
    /// Fails fast when the child index is out of range or the frame is empty,
    /// and without waiting when the child's context has been detached. A
    /// child that is loaded but never answers is not an error: the call
    /// resolves to [`ChildReply::NoResponse`] once the timeout elapses.
    pub async fn call_child(
        &self,
        index: ChildIndex,
        call: &ToolCall,
        options: &CallOptions,
    ) -> Result<ChildReply, ChildCallError> {
        let (target, origin) = self.resolve_child(index, options.target_origin.as_deref())?;
        let timeout = options.timeout.unwrap_or(self.default_timeout);

        let id = self.ids.next(index);
        let (sender, mut receiver) = oneshot::channel();
        lock(&self.pending).insert(id.clone(), sender);
        let entry = PendingEntry {
            pending: &self.pending,
            id,
        };

        let envelope = CallEnvelope::new(self.protocol, &entry.id, call);
        debug!(
            child = %index,
            request_id = %entry.id,
            tool = %call.name,
            target = %origin,
            "calling child"
        );
        let message = ChannelMessage::from_source(envelope.to_value(), Arc::clone(&self.window));
        target.post_message(message, &origin)?;

        match tokio::time::timeout(timeout, &mut receiver).await {
            Ok(Ok(response)) => Ok(ChildReply::Response(response)),
            Ok(Err(_)) => Ok(ChildReply::NoResponse),
            Err(_) => {
                if entry.claim() {
                    debug!(request_id = %entry.id, "child call timed out");
                    return Ok(ChildReply::NoResponse);
                }
                // The response claimed the entry as the timer fired; it was
                // written before the claim, so it is waiting in the receiver.
                Ok(receiver
                    .try_recv()
                    .map_or(ChildReply::NoResponse, ChildReply::Response))
            }
        }
    }

    /// Sends a fire-and-forget `GENERIC_MESSAGE` carrying `payload` to child
    /// `index`, returning the origin it was addressed to.
    ///
    /// # Errors
    ///
    /// Same fast failures as [`call_child`](Self::call_child).
    pub fn post_generic(
        &self,
        index: ChildIndex,
        payload: Value,
        explicit_origin: Option<&str>,
    ) -> Result<TargetOrigin, ChildCallError> {
        let (target, origin) = self.resolve_child(index, explicit_origin)?;
        let message = ChannelMessage::from_source(generic_message(payload), Arc::clone(&self.window));
        target.post_message(message, &origin)?;
        Ok(origin)
    }

    /// Offers a message to the pending calls.
    ///
    /// Returns `true` when it resolved one. Messages of another protocol,
    /// unknown ids, and duplicate or late responses are ignored.
    pub fn route(&self, message: &ChannelMessage) -> bool {
        let Some(envelope) = ResponseEnvelope::parse(message.data(), self.protocol) else {
            return false;
        };
        let Some(id) = envelope
            .request_id_str()
            .and_then(|id| RequestId::new(id).ok())
        else {
            return false;
        };

        let mut pending = lock(&self.pending);
        let Some(sender) = pending.remove(&id) else {
            debug!(request_id = %id, "response without pending call ignored");
            return false;
        };
        // Delivered while the lock is held so a racing timeout observes it.
        sender.send(envelope.response).is_ok()
    }

    /// Spawns the task feeding `receiver` into [`route`](Self::route).
    pub fn listen(
        self: &Arc<Self>,
        mut receiver: broadcast::Receiver<ChannelMessage>,
    ) -> JoinHandle<()> {
        let caller = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(message) => {
                        caller.route(&message);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "child response listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}
