//! Tools every page exposes to its controller.

use std::sync::Arc;
use std::time::Duration;

use bridge_layout::{Layout, LayoutError, StateSnapshot};
use bridge_primitives::ChildIndex;
use bridge_tools::{
    ToolDescriptor, ToolError, ToolRegistryBuilder, ToolResult, ToolSchema, parse_arguments,
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::outbound::{CallOptions, ChildCaller, ChildCallError};
use crate::protocol::ToolCall;

/// Rebuilds the grid.
pub const LAYOUT_SET: &str = "layout.set";
/// Returns the state snapshot.
pub const IFRAMES_LIST: &str = "iframes.list";
/// Points one frame at a URL.
pub const IFRAME_SET_URL: &str = "iframe.setUrl";
/// Points several frames at URLs, by index.
pub const IFRAMES_SET_URLS: &str = "iframes.setUrls";
/// Scrolls forward one screen.
pub const NAV_NEXT: &str = "nav.next";
/// Scrolls back one screen.
pub const NAV_PREV: &str = "nav.prev";
/// Scrolls to a screen.
pub const NAV_GOTO: &str = "nav.goto";
/// Sends a fire-and-forget payload to a child.
pub const IFRAME_POST_MESSAGE: &str = "iframe.postMessage";
/// Calls a tool inside a child.
pub const IFRAME_CHILD_CALL: &str = "iframe.child.call";
/// Asks a child for its tool list.
pub const IFRAME_CHILD_LIST_ACTIONS: &str = "iframe.child.listActions";
/// Discovery tool served by pages in the child role.
pub const LIST_ACTIONS: &str = "meta.listActions";

/// Collaborators shared by the page tools.
#[derive(Clone)]
pub struct PageTools {
    layout: Arc<dyn Layout>,
    caller: Arc<ChildCaller>,
    allowed_counts: Vec<usize>,
}

impl PageTools {
    /// Creates the tool set over `layout`, reaching children through `caller`.
    #[must_use]
    pub fn new(layout: Arc<dyn Layout>, caller: Arc<ChildCaller>, allowed_counts: Vec<usize>) -> Self {
        Self {
            layout,
            caller,
            allowed_counts,
        }
    }

    /// Registers every page tool on `builder`, in a fixed order.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::DuplicateTool`] when `builder` already holds one of
    /// the names.
    pub fn register(&self, builder: &mut ToolRegistryBuilder) -> ToolResult<()> {
        let counts = self
            .allowed_counts
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");

        let layout = Arc::clone(&self.layout);
        builder.register_tool(
            descriptor(
                LAYOUT_SET,
                &format!("Set the number of screens (allowed: {counts})."),
                json!({
                    "type": "object",
                    "properties": { "count": { "type": "integer", "enum": self.allowed_counts } },
                    "required": ["count"],
                    "additionalProperties": false
                }),
            )?,
            move |args: Value| set_layout(Arc::clone(&layout), args),
        )?;

        let layout = Arc::clone(&self.layout);
        builder.register_tool(
            descriptor(
                IFRAMES_LIST,
                "List current screens/iframes and their URLs.",
                no_parameters(),
            )?,
            move |_: Value| list_frames(Arc::clone(&layout)),
        )?;

        let layout = Arc::clone(&self.layout);
        builder.register_tool(
            descriptor(
                IFRAME_SET_URL,
                "Set iframe URL by index (0-based). URL can be reused across multiple iframes.",
                json!({
                    "type": "object",
                    "properties": {
                        "index": { "type": "integer", "minimum": 0 },
                        "url": { "type": "string" }
                    },
                    "required": ["index", "url"],
                    "additionalProperties": false
                }),
            )?,
            move |args: Value| set_url(Arc::clone(&layout), args),
        )?;

        let layout = Arc::clone(&self.layout);
        builder.register_tool(
            descriptor(
                IFRAMES_SET_URLS,
                "Set multiple iframe URLs in one call (array mapped by index).",
                json!({
                    "type": "object",
                    "properties": { "urls": { "type": "array", "items": { "type": "string" } } },
                    "required": ["urls"],
                    "additionalProperties": false
                }),
            )?,
            move |args: Value| set_urls(Arc::clone(&layout), args),
        )?;

        let layout = Arc::clone(&self.layout);
        builder.register_tool(
            descriptor(NAV_NEXT, "Scroll to the next screen.", no_parameters())?,
            move |_: Value| {
                let layout = Arc::clone(&layout);
                async move {
                    layout.scroll_next();
                    Ok::<_, ToolError>(json!({ "ok": true }))
                }
            },
        )?;

        let layout = Arc::clone(&self.layout);
        builder.register_tool(
            descriptor(NAV_PREV, "Scroll to the previous screen.", no_parameters())?,
            move |_: Value| {
                let layout = Arc::clone(&layout);
                async move {
                    layout.scroll_prev();
                    Ok::<_, ToolError>(json!({ "ok": true }))
                }
            },
        )?;

        let layout = Arc::clone(&self.layout);
        builder.register_tool(
            descriptor(
                NAV_GOTO,
                "Scroll to a specific screen index.",
                json!({
                    "type": "object",
                    "properties": { "index": { "type": "integer", "minimum": 0 } },
                    "required": ["index"],
                    "additionalProperties": false
                }),
            )?,
            move |args: Value| goto_screen(Arc::clone(&layout), args),
        )?;

        let caller = Arc::clone(&self.caller);
        builder.register_tool(
            descriptor(
                IFRAME_POST_MESSAGE,
                "Send an arbitrary payload to a child iframe.",
                json!({
                    "type": "object",
                    "properties": {
                        "index": { "type": "integer", "minimum": 0 },
                        "payload": {},
                        "targetOrigin": { "type": "string" }
                    },
                    "required": ["index", "payload"],
                    "additionalProperties": false
                }),
            )?,
            move |args: Value| post_to_child(Arc::clone(&caller), args),
        )?;

        let caller = Arc::clone(&self.caller);
        builder.register_tool(
            descriptor(
                IFRAME_CHILD_CALL,
                "Call any tool in the child iframe (the child must serve B_CALL/B_RESPONSE).",
                json!({
                    "type": "object",
                    "properties": {
                        "index": { "type": "integer", "minimum": 0 },
                        "name": { "type": "string" },
                        "arguments": { "type": "object" },
                        "timeoutMs": { "type": "integer" },
                        "targetOrigin": { "type": "string" }
                    },
                    "required": ["index", "name"],
                    "additionalProperties": false
                }),
            )?,
            move |args: Value| call_child(Arc::clone(&caller), args),
        )?;

        let caller = Arc::clone(&self.caller);
        builder.register_tool(
            descriptor(
                IFRAME_CHILD_LIST_ACTIONS,
                "Request discovery (meta.listActions) from a child iframe.",
                json!({
                    "type": "object",
                    "properties": {
                        "index": { "type": "integer", "minimum": 0 },
                        "timeoutMs": { "type": "integer" },
                        "targetOrigin": { "type": "string" }
                    },
                    "required": ["index"],
                    "additionalProperties": false
                }),
            )?,
            move |args: Value| list_child_actions(Arc::clone(&caller), args),
        )?;

        Ok(())
    }
}

fn descriptor(name: &str, description: &str, parameters: Value) -> ToolResult<ToolDescriptor> {
    Ok(ToolDescriptor::new(name, description)?.with_parameters(ToolSchema::new(parameters)))
}

fn no_parameters() -> Value {
    json!({ "type": "object", "properties": {}, "additionalProperties": false })
}

#[allow(clippy::needless_pass_by_value)]
fn layout_failed(err: LayoutError) -> ToolError {
    ToolError::execution(err.to_string())
}

#[allow(clippy::needless_pass_by_value)]
fn child_failed(err: ChildCallError) -> ToolError {
    ToolError::execution(err.to_string())
}

/// Child index from a tool argument; negative values report the same
/// out-of-range error as indexes past the last frame.
fn child_index(layout: &dyn Layout, index: i64) -> ToolResult<ChildIndex> {
    usize::try_from(index).map(ChildIndex::new).map_err(|_| {
        layout_failed(LayoutError::unknown_child(
            index,
            layout.list_embedded_contexts().len(),
        ))
    })
}

#[derive(Deserialize)]
struct CountArgs {
    count: usize,
}

async fn set_layout(layout: Arc<dyn Layout>, args: Value) -> ToolResult<Value> {
    let CountArgs { count } = parse_arguments(args)?;
    layout.set_grid_layout(count).map_err(layout_failed)?;
    Ok(json!({ "count": count }))
}

async fn list_frames(layout: Arc<dyn Layout>) -> ToolResult<Value> {
    serde_json::to_value(StateSnapshot::capture(layout.as_ref()))
        .map_err(|err| ToolError::execution(err.to_string()))
}

#[derive(Deserialize)]
struct SetUrlArgs {
    index: i64,
    url: String,
}

async fn set_url(layout: Arc<dyn Layout>, args: Value) -> ToolResult<Value> {
    let SetUrlArgs { index, url } = parse_arguments(args)?;
    layout
        .set_child_url(child_index(layout.as_ref(), index)?, &url)
        .map_err(layout_failed)?;
    Ok(json!({ "index": index, "url": url }))
}

#[derive(Deserialize)]
struct SetUrlsArgs {
    urls: Vec<Option<String>>,
}

async fn set_urls(layout: Arc<dyn Layout>, args: Value) -> ToolResult<Value> {
    let SetUrlsArgs { urls } = parse_arguments(args)?;
    let frames = layout.list_embedded_contexts().len();

    let mut applied = Vec::new();
    for (index, url) in urls.into_iter().take(frames).enumerate() {
        let Some(url) = url.filter(|url| !url.is_empty()) else {
            continue;
        };
        layout
            .set_child_url(ChildIndex::new(index), &url)
            .map_err(layout_failed)?;
        applied.push(json!({ "index": index, "url": url }));
    }

    Ok(json!({ "appliedCount": applied.len(), "applied": applied }))
}

#[derive(Deserialize)]
struct IndexArgs {
    index: i64,
}

async fn goto_screen(layout: Arc<dyn Layout>, args: Value) -> ToolResult<Value> {
    let IndexArgs { index } = parse_arguments(args)?;
    let screen = usize::try_from(index)
        .map_err(|_| layout_failed(LayoutError::UnknownScreen { index }))?;
    layout.scroll_to_index(screen).map_err(layout_failed)?;
    Ok(json!({ "ok": true, "index": index }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostArgs {
    index: i64,
    #[serde(default)]
    payload: Value,
    target_origin: Option<String>,
}

async fn post_to_child(caller: Arc<ChildCaller>, args: Value) -> ToolResult<Value> {
    let PostArgs {
        index,
        payload,
        target_origin,
    } = parse_arguments(args)?;
    let child = child_index(caller.layout().as_ref(), index)?;
    let origin = caller
        .post_generic(child, payload, non_empty(target_origin.as_deref()))
        .map_err(child_failed)?;
    Ok(json!({ "ok": true, "index": index, "targetOrigin": origin.as_str() }))
}

/// Options shared by the child-call tools. `timeoutMs` is read leniently:
/// anything but an integral number falls back to the default.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChildOptionArgs {
    #[serde(default)]
    timeout_ms: Value,
    target_origin: Option<String>,
}

impl ChildOptionArgs {
    fn into_options(self) -> CallOptions {
        CallOptions {
            timeout: timeout_millis(&self.timeout_ms).map(Duration::from_millis),
            target_origin: self.target_origin.filter(|origin| !origin.is_empty()),
        }
    }
}

/// Integral `timeoutMs`, written as `50` or `50.0`. Negative waits clamp to
/// zero, so the call resolves on the next timer tick.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn timeout_millis(value: &Value) -> Option<u64> {
    if let Some(millis) = value.as_u64() {
        return Some(millis);
    }
    if value.as_i64().is_some() {
        return Some(0);
    }
    let millis = value
        .as_f64()
        .filter(|millis| millis.is_finite() && millis.fract().abs() < f64::EPSILON)?;
    // Saturating float-to-int cast.
    Some(millis.max(0.0) as u64)
}

#[derive(Deserialize)]
struct ChildCallArgs {
    index: i64,
    name: String,
    #[serde(default)]
    arguments: Value,
    #[serde(flatten)]
    options: ChildOptionArgs,
}

async fn call_child(caller: Arc<ChildCaller>, args: Value) -> ToolResult<Value> {
    let ChildCallArgs {
        index,
        name,
        arguments,
        options,
    } = parse_arguments(args)?;
    let arguments = if arguments.is_null() { json!({}) } else { arguments };
    let child = child_index(caller.layout().as_ref(), index)?;
    let reply = caller
        .call_child(
            child,
            &ToolCall::new(name, arguments),
            &options.into_options(),
        )
        .await
        .map_err(child_failed)?;
    Ok(reply.to_value())
}

#[derive(Deserialize)]
struct ListActionsArgs {
    index: i64,
    #[serde(flatten)]
    options: ChildOptionArgs,
}

async fn list_child_actions(caller: Arc<ChildCaller>, args: Value) -> ToolResult<Value> {
    let ListActionsArgs { index, options } = parse_arguments(args)?;
    let child = child_index(caller.layout().as_ref(), index)?;
    let reply = caller
        .call_child(
            child,
            &ToolCall::bare(LIST_ACTIONS),
            &options.into_options(),
        )
        .await
        .map_err(child_failed)?;
    Ok(reply.to_value())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    use bridge_layout::GridLayout;
    use bridge_primitives::{ChannelMessage, MessageTarget, TargetOrigin};
    use bridge_tools::ToolRegistry;

    use crate::channel::Window;
    use crate::dispatcher::{DispatchError, Dispatcher};
    use crate::protocol::{CallEnvelope, Protocol, ResponseEnvelope};

    const PAGE: &str = "http://localhost:3000";

    struct Fixture {
        layout: Arc<GridLayout>,
        page: Arc<Window>,
        caller: Arc<ChildCaller>,
        dispatcher: Dispatcher,
    }

    fn fixture() -> Fixture {
        let layout = Arc::new(GridLayout::new(format!("{PAGE}/")));
        let page = Window::new(PAGE);
        let caller = Arc::new(ChildCaller::new(
            Arc::clone(&layout) as Arc<dyn Layout>,
            Arc::clone(&page) as Arc<dyn MessageTarget>,
        ));
        let tools = PageTools::new(
            Arc::clone(&layout) as Arc<dyn Layout>,
            Arc::clone(&caller),
            layout.allowed_counts().to_vec(),
        );
        let mut builder = ToolRegistry::builder();
        tools.register(&mut builder).unwrap();
        let dispatcher = Dispatcher::new(Arc::new(builder.build()), Arc::clone(&layout) as Arc<dyn Layout>);
        Fixture {
            layout,
            page,
            caller,
            dispatcher,
        }
    }

    #[tokio::test]
    async fn registers_every_tool_in_order() {
        let fixture = fixture();
        let names: Vec<_> = fixture
            .dispatcher
            .list_tools()
            .iter()
            .map(|tool| tool.name().to_owned())
            .collect();
        assert_eq!(
            names,
            [
                LAYOUT_SET,
                IFRAMES_LIST,
                IFRAME_SET_URL,
                IFRAMES_SET_URLS,
                NAV_NEXT,
                NAV_PREV,
                NAV_GOTO,
                IFRAME_POST_MESSAGE,
                IFRAME_CHILD_CALL,
                IFRAME_CHILD_LIST_ACTIONS,
            ]
        );

        let layout_set = &fixture.dispatcher.list_tools()[0];
        assert_eq!(
            layout_set.parameters().as_value()["properties"]["count"]["enum"],
            json!([1, 2, 3, 4, 20])
        );
    }

    #[tokio::test]
    async fn layout_set_is_idempotent() {
        let fixture = fixture();
        for _ in 0..2 {
            let response = fixture
                .dispatcher
                .call_tool(LAYOUT_SET, json!({ "count": 3 }))
                .await;
            assert!(response.ok);
            assert_eq!(response.result, Some(json!({ "count": 3 })));
            assert_eq!(response.state.screens, 3);
            assert_eq!(response.state.iframes.len(), 3);
        }
    }

    #[tokio::test]
    async fn layout_set_rejects_other_counts() {
        let fixture = fixture();
        let response = fixture
            .dispatcher
            .call_tool(LAYOUT_SET, json!({ "count": 5 }))
            .await;
        assert_eq!(response.error, Some(DispatchError::ToolFailed));
        assert_eq!(
            response.message.as_deref(),
            Some("Screen count not allowed: 5. Allowed: 1, 2, 3, 4, 20")
        );
        assert_eq!(response.state.screens, 1);

        let response = fixture.dispatcher.call_tool(LAYOUT_SET, json!({})).await;
        assert_eq!(response.error, Some(DispatchError::ToolFailed));
    }

    #[tokio::test]
    async fn set_urls_maps_by_index_and_skips_blanks() {
        let fixture = fixture();
        fixture.layout.set_grid_layout(3).unwrap();

        let response = fixture
            .dispatcher
            .call_tool(
                IFRAMES_SET_URLS,
                json!({ "urls": ["https://a.example/", "", "https://c.example/", "https://d.example/"] }),
            )
            .await;

        assert_eq!(
            response.result,
            Some(json!({
                "appliedCount": 2,
                "applied": [
                    { "index": 0, "url": "https://a.example/" },
                    { "index": 2, "url": "https://c.example/" }
                ]
            }))
        );
        let srcs: Vec<_> = response.state.iframes.iter().map(|f| f.src.as_str()).collect();
        assert_eq!(srcs, ["https://a.example/", "", "https://c.example/"]);
    }

    #[tokio::test]
    async fn set_url_reports_invalid_index() {
        let fixture = fixture();
        let response = fixture
            .dispatcher
            .call_tool(IFRAME_SET_URL, json!({ "index": 4, "url": "https://a.example/" }))
            .await;
        assert_eq!(
            response.message.as_deref(),
            Some("Invalid iframe index: 4. Range: 0..0")
        );
    }

    #[tokio::test]
    async fn navigation_moves_between_screens() {
        let fixture = fixture();
        fixture.layout.set_grid_layout(4).unwrap();

        let response = fixture.dispatcher.call_tool(NAV_NEXT, json!({})).await;
        assert_eq!(response.result, Some(json!({ "ok": true })));
        assert_eq!(fixture.layout.scroll_position(), 1);

        let response = fixture
            .dispatcher
            .call_tool(NAV_GOTO, json!({ "index": 3 }))
            .await;
        assert_eq!(response.result, Some(json!({ "ok": true, "index": 3 })));

        fixture.dispatcher.call_tool(NAV_PREV, json!({})).await;
        assert_eq!(fixture.layout.scroll_position(), 2);

        let response = fixture
            .dispatcher
            .call_tool(NAV_GOTO, json!({ "index": 9 }))
            .await;
        assert_eq!(response.message.as_deref(), Some("Invalid screen index: 9"));
    }

    #[tokio::test]
    async fn post_message_wraps_payload() {
        let fixture = fixture();
        fixture
            .layout
            .set_child_url(ChildIndex::new(0), "https://child.example/app")
            .unwrap();
        let child = Window::new("https://child.example");
        fixture
            .layout
            .mount(ChildIndex::new(0), Arc::clone(&child) as Arc<dyn MessageTarget>)
            .unwrap();
        let mut inbox = child.subscribe();

        let response = fixture
            .dispatcher
            .call_tool(IFRAME_POST_MESSAGE, json!({ "index": 0, "payload": [1, 2] }))
            .await;

        assert_eq!(
            response.result,
            Some(json!({ "ok": true, "index": 0, "targetOrigin": "https://child.example" }))
        );
        assert_eq!(
            inbox.recv().await.unwrap().data(),
            &json!({ "type": "GENERIC_MESSAGE", "payload": [1, 2] })
        );
    }

    #[tokio::test]
    async fn post_message_needs_a_loaded_child() {
        let fixture = fixture();
        let response = fixture
            .dispatcher
            .call_tool(IFRAME_POST_MESSAGE, json!({ "index": 0, "payload": {} }))
            .await;
        assert_eq!(
            response.message.as_deref(),
            Some("iframe 0 has no content window")
        );
    }

    #[tokio::test]
    async fn child_call_forwards_and_waits() {
        let fixture = fixture();
        let child = Window::new(PAGE);
        fixture
            .layout
            .mount(ChildIndex::new(0), Arc::clone(&child) as Arc<dyn MessageTarget>)
            .unwrap();
        let _listener = fixture.caller.listen(fixture.page.subscribe());

        let mut inbox = child.subscribe();
        let _responder = tokio::spawn(async move {
            while let Ok(message) = inbox.recv().await {
                let Some(call) = CallEnvelope::parse(message.data(), Protocol::CHILD) else {
                    continue;
                };
                let reply = ResponseEnvelope::new(
                    Protocol::CHILD,
                    call.request_id,
                    json!({ "got": call.call }),
                );
                if let Some(source) = message.source() {
                    let _ = source
                        .post_message(ChannelMessage::new(reply.to_value()), &TargetOrigin::Wildcard);
                }
            }
        });

        let response = fixture
            .dispatcher
            .call_tool(
                IFRAME_CHILD_CALL,
                json!({ "index": 0, "name": "echo", "timeoutMs": 500 }),
            )
            .await;
        assert_eq!(
            response.result,
            Some(json!({
                "ok": true,
                "response": { "got": { "name": "echo", "arguments": {} } }
            }))
        );

        let response = fixture
            .dispatcher
            .call_tool(IFRAME_CHILD_LIST_ACTIONS, json!({ "index": 0, "timeoutMs": "soon" }))
            .await;
        assert_eq!(
            response.result,
            Some(json!({
                "ok": true,
                "response": { "got": { "name": "meta.listActions", "arguments": {} } }
            }))
        );
    }

    #[tokio::test]
    async fn child_call_to_unknown_index_fails() {
        let fixture = fixture();
        let response = fixture
            .dispatcher
            .call_tool(IFRAME_CHILD_CALL, json!({ "index": 2, "name": "x" }))
            .await;
        assert_eq!(response.error, Some(DispatchError::ToolFailed));
        assert_eq!(
            response.message.as_deref(),
            Some("Invalid iframe index: 2. Range: 0..0")
        );
    }

    #[tokio::test]
    async fn negative_indexes_report_the_range() {
        let fixture = fixture();
        fixture.layout.set_grid_layout(3).unwrap();

        for (tool, args) in [
            (IFRAME_SET_URL, json!({ "index": -1, "url": "https://a.example/" })),
            (IFRAME_POST_MESSAGE, json!({ "index": -1, "payload": {} })),
            (IFRAME_CHILD_CALL, json!({ "index": -1, "name": "x" })),
            (IFRAME_CHILD_LIST_ACTIONS, json!({ "index": -1 })),
        ] {
            let response = fixture.dispatcher.call_tool(tool, args).await;
            assert_eq!(response.error, Some(DispatchError::ToolFailed), "{tool}");
            assert_eq!(
                response.message.as_deref(),
                Some("Invalid iframe index: -1. Range: 0..2"),
                "{tool}"
            );
        }

        let response = fixture
            .dispatcher
            .call_tool(NAV_GOTO, json!({ "index": -2 }))
            .await;
        assert_eq!(response.message.as_deref(), Some("Invalid screen index: -2"));
        assert_eq!(fixture.caller.pending_count(), 0);
    }

    #[test]
    fn timeout_accepts_any_integral_number() {
        assert_eq!(timeout_millis(&json!(50)), Some(50));
        assert_eq!(timeout_millis(&json!(50.0)), Some(50));
        assert_eq!(timeout_millis(&json!(-5)), Some(0));
        assert_eq!(timeout_millis(&json!(-5.0)), Some(0));
        assert_eq!(timeout_millis(&json!(50.5)), None);
        assert_eq!(timeout_millis(&json!("50")), None);
        assert_eq!(timeout_millis(&Value::Null), None);
    }

    #[tokio::test]
    async fn float_timeout_is_honoured() {
        let fixture = fixture();
        // Loaded but silent.
        fixture
            .layout
            .mount(ChildIndex::new(0), Window::new(PAGE) as Arc<dyn MessageTarget>)
            .unwrap();
        let _listener = fixture.caller.listen(fixture.page.subscribe());

        let started = std::time::Instant::now();
        let response = fixture
            .dispatcher
            .call_tool(IFRAME_CHILD_CALL, json!({ "index": 0, "name": "x", "timeoutMs": 40.0 }))
            .await;
        let elapsed = started.elapsed();

        assert_eq!(response.result, Some(json!({ "ok": false, "error": "no-response" })));
        assert!(elapsed >= Duration::from_millis(40), "resolved early: {elapsed:?}");
        assert!(elapsed < Duration::from_millis(1000), "used the default: {elapsed:?}");
    }
}
