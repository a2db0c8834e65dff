//! Page runtime: tool dispatch, inbound call handling, and correlated calls to
//! embedded children.
//!
//! A [`Page`] owns a [`Window`] (its own browsing context), a [`Layout`]
//! collaborator, and an immutable tool registry. Once started it answers call
//! envelopes arriving on its window and routes responses to the calls it made
//! into its children.

#![warn(missing_docs, clippy::pedantic)]

mod channel;
mod dispatcher;
mod inbound;
mod lifecycle;
mod outbound;
pub mod page_tools;
mod protocol;

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use bridge_layout::{DEFAULT_SCREEN_COUNTS, Layout, StateSnapshot};
use bridge_primitives::{ChildIndex, MessageTarget};
use bridge_tools::{Tool, ToolDescriptor, ToolError, ToolRegistry, ToolRegistryBuilder};
use serde_json::Value;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::info;

pub use channel::{DEFAULT_BUS_CAPACITY, MessageBus, Window};
pub use dispatcher::{ActionList, CallResponse, DispatchError, Dispatcher};
pub use inbound::{DEFAULT_MAX_IN_FLIGHT, InboundBridge};
pub use lifecycle::{LifecycleError, LifecycleEvent, LifecycleResult, PageState};
pub use outbound::{CallOptions, ChildCallError, ChildCaller, ChildReply, DEFAULT_CHILD_TIMEOUT};
pub use page_tools::PageTools;
pub use protocol::{
    CallEnvelope, GENERIC_MESSAGE_TYPE, Protocol, ResponseEnvelope, ToolCall, generic_message,
};

use lifecycle::Lifecycle;

/// Errors raised while building or running a page.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PageError {
    /// Tool registration failed.
    #[error(transparent)]
    Tools(#[from] ToolError),
    /// The requested lifecycle transition is not allowed.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// Result alias for page operations.
pub type PageResult<T> = Result<T, PageError>;

/// Configures a [`Page`] before it is frozen.
pub struct PageBuilder {
    window: Arc<Window>,
    layout: Arc<dyn Layout>,
    protocol: Protocol,
    discovery: Option<&'static str>,
    child_timeout: Duration,
    max_in_flight: NonZeroUsize,
    allowed_counts: Vec<usize>,
    extra_tools: ToolRegistryBuilder,
}

impl fmt::Debug for PageBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageBuilder")
            .field("origin", &self.window.origin())
            .field("protocol", &self.protocol)
            .field("discovery", &self.discovery)
            .field("child_timeout", &self.child_timeout)
            .field("max_in_flight", &self.max_in_flight)
            .field("extra_tools", &self.extra_tools)
            .finish_non_exhaustive()
    }
}

impl PageBuilder {
    fn new(window: Arc<Window>, layout: Arc<dyn Layout>, protocol: Protocol) -> Self {
        Self {
            window,
            layout,
            protocol,
            discovery: None,
            child_timeout: DEFAULT_CHILD_TIMEOUT,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            allowed_counts: DEFAULT_SCREEN_COUNTS.to_vec(),
            extra_tools: ToolRegistryBuilder::new(),
        }
    }

    /// Starts a page serving the child protocol (`B_CALL`), with the
    /// `meta.listActions` discovery tool built in.
    #[must_use]
    pub fn child(window: Arc<Window>, layout: Arc<dyn Layout>) -> Self {
        let mut builder = Self::new(window, layout, Protocol::CHILD);
        builder.discovery = Some(page_tools::LIST_ACTIONS);
        builder
    }

    /// Default timeout for calls into children.
    #[must_use]
    pub fn child_timeout(mut self, timeout: Duration) -> Self {
        self.child_timeout = timeout;
        self
    }

    /// Inbound calls dispatched at once; later arrivals wait for a slot.
    #[must_use]
    pub fn max_in_flight(mut self, limit: NonZeroUsize) -> Self {
        self.max_in_flight = limit;
        self
    }

    /// Screen counts advertised by `layout.set`.
    #[must_use]
    pub fn allowed_counts(mut self, counts: Vec<usize>) -> Self {
        self.allowed_counts = counts;
        self
    }

    /// Registers an application tool next to the page tools.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::DuplicateTool`] when two application tools share
    /// a name. Collisions with page tools are reported by
    /// [`build`](Self::build).
    pub fn with_tool<T>(mut self, descriptor: ToolDescriptor, tool: T) -> PageResult<Self>
    where
        T: Tool + 'static,
    {
        self.extra_tools.register_tool(descriptor, tool)?;
        Ok(self)
    }

    /// Freezes the registry and assembles the page.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::DuplicateTool`] when an application tool reuses a
    /// page tool or discovery name.
    pub fn build(self) -> PageResult<Page> {
        let caller = Arc::new(
            ChildCaller::new(
                Arc::clone(&self.layout),
                Arc::clone(&self.window) as Arc<dyn MessageTarget>,
            )
            .with_default_timeout(self.child_timeout),
        );

        let mut tools = ToolRegistry::builder();
        PageTools::new(
            Arc::clone(&self.layout),
            Arc::clone(&caller),
            self.allowed_counts,
        )
        .register(&mut tools)?;
        tools.merge(self.extra_tools)?;

        let mut dispatcher = Dispatcher::new(Arc::new(tools.build()), Arc::clone(&self.layout));
        if let Some(name) = self.discovery {
            dispatcher = dispatcher.with_discovery_tool(name)?;
        }
        let dispatcher = Arc::new(dispatcher);

        let inbound = InboundBridge::new(Arc::clone(&dispatcher), self.protocol, self.max_in_flight);

        Ok(Page {
            window: self.window,
            layout: self.layout,
            dispatcher,
            caller,
            inbound,
            lifecycle: Lifecycle::new(),
            listeners: Vec::new(),
        })
    }
}

/// A page: answers calls on its window and calls into its children.
pub struct Page {
    window: Arc<Window>,
    layout: Arc<dyn Layout>,
    dispatcher: Arc<Dispatcher>,
    caller: Arc<ChildCaller>,
    inbound: InboundBridge,
    lifecycle: Lifecycle,
    listeners: Vec<JoinHandle<()>>,
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("origin", &self.window.origin())
            .field("protocol", &self.inbound.protocol())
            .field("state", &self.lifecycle.state())
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

impl Page {
    /// Starts a page driven by an external controller (`A_CALL`).
    #[must_use]
    pub fn builder(window: Arc<Window>, layout: Arc<dyn Layout>) -> PageBuilder {
        PageBuilder::new(window, layout, Protocol::CONTROLLER)
    }

    /// Attaches the inbound and response listeners to the page's window.
    ///
    /// Both receivers are subscribed before this returns, so messages posted
    /// afterwards are never missed. Must be called inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidTransition`] when the page is already
    /// listening or has been stopped.
    pub fn start(&mut self) -> PageResult<()> {
        self.lifecycle.transition(LifecycleEvent::Start)?;

        let calls = self.window.subscribe();
        let responses = self.window.subscribe();
        self.listeners.push(self.inbound.listen(calls));
        self.listeners.push(self.caller.listen(responses));

        info!(
            origin = self.window.origin(),
            protocol = self.inbound.protocol().call_type(),
            tools = self.dispatcher.list_tools().len(),
            "page listening"
        );
        Ok(())
    }

    /// Detaches the listeners and refuses further inbound calls.
    ///
    /// Calls still waiting for a dispatch slot are dropped; pending child
    /// calls resolve through their timeout.
    pub fn stop(&mut self) {
        // Stop is accepted from every state.
        let _ = self.lifecycle.transition(LifecycleEvent::Stop);
        self.inbound.close();
        for listener in self.listeners.drain(..) {
            listener.abort();
        }
    }

    /// Current run state.
    #[must_use]
    pub fn state(&self) -> PageState {
        self.lifecycle.state()
    }

    /// The page's own browsing context.
    #[must_use]
    pub fn window(&self) -> &Arc<Window> {
        &self.window
    }

    /// The layout collaborator.
    #[must_use]
    pub fn layout(&self) -> &Arc<dyn Layout> {
        &self.layout
    }

    /// The dispatcher serving this page's tools.
    #[must_use]
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// The caller used to reach children.
    #[must_use]
    pub fn caller(&self) -> &Arc<ChildCaller> {
        &self.caller
    }

    /// Protocol whose calls this page answers.
    #[must_use]
    pub fn protocol(&self) -> Protocol {
        self.inbound.protocol()
    }

    /// Fresh layout snapshot.
    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        self.dispatcher.state()
    }

    /// Every callable tool in registration order.
    #[must_use]
    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.dispatcher.list_tools()
    }

    /// Tools plus the current layout.
    #[must_use]
    pub fn list_actions(&self) -> ActionList {
        self.dispatcher.list_actions()
    }

    /// Runs a tool directly, bypassing the channel.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> CallResponse {
        self.dispatcher.call_tool(name, arguments).await
    }

    /// Runs a raw `{name, arguments}` call body.
    pub async fn call(&self, call: &Value) -> CallResponse {
        self.dispatcher.call(call).await
    }

    /// Calls a tool inside child `index`.
    ///
    /// Responses are only routed while the page is listening.
    ///
    /// # Errors
    ///
    /// See [`ChildCaller::call_child`].
    pub async fn call_child(
        &self,
        index: ChildIndex,
        call: &ToolCall,
        options: &CallOptions,
    ) -> Result<ChildReply, ChildCallError> {
        self.caller.call_child(index, call, options).await
    }
}

impl Drop for Page {
    fn drop(&mut self) {
        for listener in self.listeners.drain(..) {
            listener.abort();
        }
    }
}
