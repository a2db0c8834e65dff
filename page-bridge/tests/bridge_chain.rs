use std::sync::Arc;
use std::time::Duration;

use page_bridge::kernel::{Page, PageBuilder, Window};
use page_bridge::layout::{GridLayout, Layout};
use page_bridge::primitives::{ChannelMessage, ChildIndex, MessageTarget, TargetOrigin};
use page_bridge::tools::{ToolDescriptor, ToolError};
use serde_json::{Value, json};
use tokio::sync::broadcast;

const PAGE: &str = "http://localhost:3000";
const CHILD: &str = "https://child.example";
const CONTROLLER: &str = "https://controller.example";

struct Chain {
    page: Page,
    _child: Page,
    page_layout: Arc<GridLayout>,
    page_window: Arc<Window>,
    child_window: Arc<Window>,
    controller: Arc<Window>,
    inbox: broadcast::Receiver<ChannelMessage>,
}

/// Controller, a page with two screens, and a child page loaded into screen 0.
fn chain() -> Chain {
    let page_window = Window::new(PAGE);
    let page_layout = Arc::new(GridLayout::new(format!("{PAGE}/")));
    page_layout.set_grid_layout(2).unwrap();

    let child_window = Window::new(CHILD);
    let child_layout = Arc::new(GridLayout::new(format!("{CHILD}/app")));
    let mut child = PageBuilder::child(Arc::clone(&child_window), child_layout)
        .with_tool(
            ToolDescriptor::new("echo", "Echo the arguments back").unwrap(),
            |args: Value| async move { Ok::<_, ToolError>(json!({ "seen": args })) },
        )
        .unwrap()
        .build()
        .unwrap();
    child.start().unwrap();

    page_layout
        .set_child_url(ChildIndex::new(0), &format!("{CHILD}/app"))
        .unwrap();
    page_layout
        .mount(
            ChildIndex::new(0),
            Arc::clone(&child_window) as Arc<dyn MessageTarget>,
        )
        .unwrap();

    let mut page = Page::builder(Arc::clone(&page_window), Arc::clone(&page_layout) as Arc<dyn Layout>)
        .child_timeout(Duration::from_millis(500))
        .build()
        .unwrap();
    page.start().unwrap();

    let controller = Window::new(CONTROLLER);
    let inbox = controller.subscribe();
    Chain {
        page,
        _child: child,
        page_layout,
        page_window,
        child_window,
        controller,
        inbox,
    }
}

impl Chain {
    async fn ask(&mut self, request_id: &str, name: &str, arguments: Value) -> Value {
        self.page_window
            .post_message(
                ChannelMessage::from_source(
                    json!({
                        "type": "A_CALL",
                        "requestId": request_id,
                        "call": { "name": name, "arguments": arguments }
                    }),
                    Arc::clone(&self.controller) as Arc<dyn MessageTarget>,
                ),
                &TargetOrigin::Wildcard,
            )
            .unwrap();

        let reply = tokio::time::timeout(Duration::from_secs(3), self.inbox.recv())
            .await
            .expect("controller got no reply")
            .unwrap();
        assert_eq!(reply.data()["type"], "A_RESPONSE");
        assert_eq!(reply.data()["requestId"], request_id);
        reply.data()["response"].clone()
    }
}

#[tokio::test]
async fn controller_reaches_child_tool_through_page() {
    let mut chain = chain();

    let response = chain
        .ask(
            "c-1",
            "iframe.child.call",
            json!({ "index": 0, "name": "echo", "arguments": { "x": 1 } }),
        )
        .await;

    assert_eq!(response["ok"], true);
    assert_eq!(response["state"]["screens"], 2);
    assert_eq!(response["state"]["iframes"][0]["src"], "https://child.example/app");

    let child_reply = &response["result"];
    assert_eq!(child_reply["ok"], true);
    assert_eq!(
        child_reply["response"],
        json!({
            "ok": true,
            "result": { "seen": { "x": 1 } },
            "state": { "screens": 1, "iframes": [{ "index": 0, "id": "iframe-0", "src": "" }] }
        })
    );
    assert_eq!(chain.page.caller().pending_count(), 0);
}

#[tokio::test]
async fn child_discovery_lists_its_tools() {
    let mut chain = chain();

    let response = chain
        .ask("c-2", "iframe.child.listActions", json!({ "index": 0 }))
        .await;

    let names: Vec<&str> = response["result"]["response"]["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|tool| tool["name"].as_str())
        .collect();
    assert!(names.contains(&"echo"));
    assert_eq!(names.last(), Some(&"meta.listActions"));
}

#[tokio::test]
async fn child_error_is_carried_inside_ok_outcome() {
    let mut chain = chain();

    let response = chain
        .ask("c-3", "iframe.child.call", json!({ "index": 0, "name": "nope" }))
        .await;

    // The call reached the child, so the page-level outcome is ok; the
    // child's own envelope reports the unknown tool.
    assert_eq!(response["result"]["ok"], true);
    assert_eq!(response["result"]["response"]["ok"], false);
    assert_eq!(response["result"]["response"]["error"], "unknown_tool");
}

#[tokio::test]
async fn silent_child_reports_no_response() {
    let mut chain = chain();
    // Loaded but not listening. Frame 1 has no src, so the call is addressed
    // to the page's own origin.
    let silent = Window::new(PAGE);
    chain
        .page_layout
        .mount(ChildIndex::new(1), Arc::clone(&silent) as Arc<dyn MessageTarget>)
        .unwrap();

    let response = chain
        .ask(
            "c-4",
            "iframe.child.call",
            json!({ "index": 1, "name": "echo", "timeoutMs": 50 }),
        )
        .await;

    assert_eq!(response["result"], json!({ "ok": false, "error": "no-response" }));
    assert_eq!(chain.page.caller().pending_count(), 0);
}

#[tokio::test]
async fn unknown_page_tool_lists_available() {
    let mut chain = chain();

    let response = chain.ask("c-5", "teleport", json!({})).await;

    assert_eq!(response["ok"], false);
    assert_eq!(response["error"], "unknown_tool");
    assert_eq!(response["available"].as_array().map(Vec::len), Some(10));
    assert!(response.get("result").is_none());
}

#[tokio::test]
async fn child_ignores_controller_protocol() {
    let mut chain = chain();

    chain
        .child_window
        .post_message(
            ChannelMessage::from_source(
                json!({ "type": "A_CALL", "requestId": "x", "call": { "name": "echo" } }),
                Arc::clone(&chain.controller) as Arc<dyn MessageTarget>,
            ),
            &TargetOrigin::Wildcard,
        )
        .unwrap();

    let outcome = tokio::time::timeout(Duration::from_millis(100), chain.inbox.recv()).await;
    assert!(outcome.is_err(), "child answered a controller call");
}
