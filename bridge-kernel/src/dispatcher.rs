//! Tool dispatch: resolves calls by name, runs handlers, and normalises the
//! outcome into a [`CallResponse`].

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bridge_layout::{Layout, StateSnapshot};
use bridge_tools::{ToolDescriptor, ToolError, ToolRegistry, ToolResult};
use chrono::Utc;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

/// Error codes carried by failed responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchError {
    /// No tool is registered under the requested name.
    UnknownTool,
    /// The handler ran and failed.
    ToolFailed,
}

/// Uniform envelope returned for every dispatched call.
///
/// Successful calls carry `result`; failures carry `error` plus either the
/// list of valid names (`available`) or the failure reason (`message`). The
/// layout snapshot is always attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallResponse {
    /// Whether the handler completed successfully.
    pub ok: bool,
    /// Handler output on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error code on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<DispatchError>,
    /// Failure reason for `tool_failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Valid tool names for `unknown_tool`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<Vec<String>>,
    /// Layout after the call.
    pub state: StateSnapshot,
}

impl CallResponse {
    fn success(result: Value, state: StateSnapshot) -> Self {
        Self {
            ok: true,
            result: Some(result),
            error: None,
            message: None,
            available: None,
            state,
        }
    }

    fn unknown_tool(available: Vec<String>, state: StateSnapshot) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(DispatchError::UnknownTool),
            message: None,
            available: Some(available),
            state,
        }
    }

    fn tool_failed(message: String, state: StateSnapshot) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(DispatchError::ToolFailed),
            message: Some(message),
            available: None,
            state,
        }
    }

    /// Serialises the response into channel data.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| json!({ "ok": false }))
    }
}

/// Discovery payload: every tool plus the current layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionList {
    /// Registered tools in registration order.
    pub tools: Vec<ToolDescriptor>,
    /// Current layout.
    pub state: StateSnapshot,
}

/// Resolves tool calls against an immutable registry.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    layout: Arc<dyn Layout>,
    discovery: Option<ToolDescriptor>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("discovery", &self.discovery.as_ref().map(ToolDescriptor::name))
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Creates a dispatcher over `registry`, snapshotting `layout`.
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>, layout: Arc<dyn Layout>) -> Self {
        Self {
            registry,
            layout,
            discovery: None,
        }
    }

    /// Advertises a built-in tool named `name` that answers with
    /// [`list_actions`](Self::list_actions).
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::DuplicateTool`] when the registry already holds a
    /// tool with that name.
    pub fn with_discovery_tool(mut self, name: &str) -> ToolResult<Self> {
        if self.registry.contains(name) {
            return Err(ToolError::DuplicateTool {
                name: name.to_owned(),
            });
        }
        self.discovery = Some(ToolDescriptor::new(
            name,
            "List available tools and the current state.",
        )?);
        Ok(self)
    }

    /// Returns the underlying registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Fresh layout snapshot.
    #[must_use]
    pub fn state(&self) -> StateSnapshot {
        StateSnapshot::capture(self.layout.as_ref())
    }

    /// Every callable tool, built-in discovery last.
    #[must_use]
    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        let mut tools = self.registry.descriptors();
        tools.extend(self.discovery.iter().cloned());
        tools
    }

    fn names(&self) -> Vec<String> {
        self.list_tools()
            .iter()
            .map(|descriptor| descriptor.name().to_owned())
            .collect()
    }

    /// Tools plus the current layout.
    #[must_use]
    pub fn list_actions(&self) -> ActionList {
        ActionList {
            tools: self.list_tools(),
            state: self.state(),
        }
    }

    /// Runs the tool named `name` with `arguments`.
    ///
    /// Never fails: unknown names and handler failures, panics included, come
    /// back as unsuccessful [`CallResponse`]s.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> CallResponse {
        info!(tool = name, ts = Utc::now().timestamp_millis(), "tool call");

        if self.discovery.as_ref().is_some_and(|d| d.name() == name) {
            let actions = serde_json::to_value(self.list_actions()).unwrap_or(Value::Null);
            return CallResponse::success(actions, self.state());
        }

        let Some(handle) = self.registry.get(name) else {
            debug!(tool = name, "unknown tool requested");
            return CallResponse::unknown_tool(self.names(), self.state());
        };

        let outcome = AssertUnwindSafe(handle.invoke(arguments))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(result)) => CallResponse::success(result, self.state()),
            Ok(Err(err)) => {
                debug!(tool = name, error = %err, "tool failed");
                CallResponse::tool_failed(err.reason(), self.state())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                debug!(tool = name, reason = %message, "tool panicked");
                CallResponse::tool_failed(message, self.state())
            }
        }
    }

    /// Entry point for raw `{name, arguments}` call bodies.
    ///
    /// Missing arguments default to `{}`; a missing or non-string name is
    /// reported as an unknown tool.
    pub async fn call(&self, call: &Value) -> CallResponse {
        let name = call.get("name").and_then(Value::as_str).unwrap_or_default();
        let arguments = match call.get("arguments") {
            Some(Value::Null) | None => json!({}),
            Some(arguments) => arguments.clone(),
        };
        self.call_tool(name, arguments).await
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "tool handler panicked".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use bridge_layout::GridLayout;
    use bridge_tools::{ToolRegistryBuilder, parse_arguments};
    use serde::Deserialize;

    fn layout() -> Arc<GridLayout> {
        Arc::new(GridLayout::new("http://localhost:3000/"))
    }

    fn echo_registry(calls: Arc<AtomicUsize>) -> ToolRegistryBuilder {
        let mut builder = ToolRegistry::builder();
        builder
            .register_tool(
                ToolDescriptor::new("echo", "Echo the arguments back").unwrap(),
                move |args: Value| {
                    let calls = Arc::clone(&calls);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, ToolError>(json!({ "seen": args }))
                    }
                },
            )
            .unwrap();
        builder
    }

    fn failing_registry() -> ToolRegistryBuilder {
        let mut builder = ToolRegistry::builder();
        builder
            .register_tool(
                ToolDescriptor::new("boom", "Always fails").unwrap(),
                |_: Value| async move { Err::<Value, _>(ToolError::execution("kaput")) },
            )
            .unwrap();
        builder
            .register_tool(
                ToolDescriptor::new("panic", "Always panics").unwrap(),
                |_: Value| async move {
                    if true {
                        panic!("handler exploded");
                    }
                    Ok::<_, ToolError>(Value::Null)
                },
            )
            .unwrap();
        builder
    }

    #[tokio::test]
    async fn echo_returns_seen_arguments() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::new(Arc::new(echo_registry(calls).build()), layout());

        let response = dispatcher
            .call(&json!({ "name": "echo", "arguments": { "x": 1 } }))
            .await;

        assert_eq!(
            response.to_value(),
            json!({
                "ok": true,
                "result": { "seen": { "x": 1 } },
                "state": { "screens": 1, "iframes": [{ "index": 0, "id": "iframe-0", "src": "" }] }
            })
        );
    }

    #[tokio::test]
    async fn unknown_tool_lists_available_without_invoking() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher =
            Dispatcher::new(Arc::new(echo_registry(Arc::clone(&calls)).build()), layout());

        for name in ["missing", "", "ECHO", "echo "] {
            let response = dispatcher.call_tool(name, json!({})).await;
            assert!(!response.ok);
            assert_eq!(response.error, Some(DispatchError::UnknownTool));
            assert_eq!(response.available.as_deref(), Some(&["echo".to_owned()][..]));
        }

        let response = dispatcher.call(&json!({ "arguments": {} })).await;
        assert_eq!(response.error, Some(DispatchError::UnknownTool));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn handler_failure_is_captured() {
        let dispatcher = Dispatcher::new(Arc::new(failing_registry().build()), layout());

        let response = dispatcher.call_tool("boom", json!({})).await;
        assert_eq!(response.error, Some(DispatchError::ToolFailed));
        assert_eq!(response.message.as_deref(), Some("kaput"));
        assert_eq!(response.state.screens, 1);

        let wire = response.to_value();
        assert_eq!(wire["error"], json!("tool_failed"));
        assert!(wire.get("result").is_none());
    }

    #[tokio::test]
    async fn handler_panic_is_captured() {
        let dispatcher = Dispatcher::new(Arc::new(failing_registry().build()), layout());

        let response = dispatcher.call_tool("panic", json!({})).await;
        assert_eq!(response.error, Some(DispatchError::ToolFailed));
        assert_eq!(response.message.as_deref(), Some("handler exploded"));
    }

    #[tokio::test]
    async fn null_result_is_kept() {
        let registry = ToolRegistry::builder()
            .with_tool(
                ToolDescriptor::new("noop", "").unwrap(),
                |_: Value| async move { Ok::<_, ToolError>(Value::Null) },
            )
            .unwrap()
            .build();
        let dispatcher = Dispatcher::new(Arc::new(registry), layout());

        let wire = dispatcher.call_tool("noop", json!({})).await.to_value();
        assert_eq!(wire["ok"], json!(true));
        assert_eq!(wire.get("result"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn arguments_default_to_empty_object() {
        #[derive(Deserialize)]
        struct Args {
            #[serde(default)]
            flag: bool,
        }

        let registry = ToolRegistry::builder()
            .with_tool(
                ToolDescriptor::new("args", "").unwrap(),
                |args: Value| async move {
                    let parsed: Args = parse_arguments(args.clone())?;
                    Ok::<_, ToolError>(json!({ "raw": args, "flag": parsed.flag }))
                },
            )
            .unwrap()
            .build();
        let dispatcher = Dispatcher::new(Arc::new(registry), layout());

        let response = dispatcher
            .call(&json!({ "name": "args", "arguments": null }))
            .await;
        assert_eq!(response.result, Some(json!({ "raw": {}, "flag": false })));
    }

    #[tokio::test]
    async fn discovery_tool_serves_list_actions() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::new(Arc::new(echo_registry(calls).build()), layout())
            .with_discovery_tool("meta.listActions")
            .unwrap();

        let actions = dispatcher.list_actions();
        let names: Vec<_> = actions.tools.iter().map(ToolDescriptor::name).collect();
        assert_eq!(names, ["echo", "meta.listActions"]);

        let response = dispatcher.call_tool("meta.listActions", json!({})).await;
        assert!(response.ok);
        let result = response.result.unwrap();
        assert_eq!(result["tools"][0]["name"], json!("echo"));
        assert_eq!(result["state"]["screens"], json!(1));
    }

    #[test]
    fn discovery_tool_name_must_be_free() {
        let calls = Arc::new(AtomicUsize::new(0));
        let err = Dispatcher::new(Arc::new(echo_registry(calls).build()), layout())
            .with_discovery_tool("echo")
            .expect_err("name collides");
        assert!(matches!(err, ToolError::DuplicateTool { .. }));
    }
}
