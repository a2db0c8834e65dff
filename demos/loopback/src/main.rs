//! In-process demo: a controller drives a page, which drives a child page
//! loaded into its first screen.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use page_bridge::config::BridgeConfig;
use page_bridge::kernel::{Page, PageBuilder, Window};
use page_bridge::layout::{GridLayout, Layout};
use page_bridge::primitives::{ChannelMessage, ChildIndex, MessageTarget, TargetOrigin};
use page_bridge::tools::{ToolDescriptor, ToolError, ToolSchema, parse_arguments};
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tracing::info;

#[derive(Debug, Parser)]
#[command(about = "Drive a page and its embedded child over in-process channels")]
struct Args {
    /// JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Origin of the child page.
    #[arg(long, default_value = "https://child.example")]
    child_origin: String,

    /// Screens to show before calling the child.
    #[arg(long, default_value_t = 2)]
    screens: usize,

    /// Extra controller call to run after the scripted ones.
    #[arg(long)]
    call: Option<String>,

    /// JSON arguments for `--call`.
    #[arg(long, default_value = "{}")]
    arguments: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = BridgeConfig::load(args.config.as_deref())?;
    page_bridge::telemetry::init_tracing(&config.log_filter)?;

    let extra = match &args.call {
        Some(name) => {
            let arguments: Value =
                serde_json::from_str(&args.arguments).context("--arguments is not JSON")?;
            Some((name.clone(), arguments))
        }
        None => None,
    };

    let mut demo = Demo::new(&config, &args.child_origin)?;

    demo.run("layout.set", json!({ "count": args.screens })).await?;
    demo.run(
        "iframes.setUrls",
        json!({ "urls": [format!("{}/app", args.child_origin)] }),
    )
    .await?;
    demo.mount_child()?;
    demo.run("iframe.child.listActions", json!({ "index": 0 })).await?;
    demo.run(
        "iframe.child.call",
        json!({ "index": 0, "name": "greet", "arguments": { "who": "page" } }),
    )
    .await?;
    demo.run("iframes.list", json!({})).await?;

    if let Some((name, arguments)) = extra {
        demo.run(&name, arguments).await?;
    }

    demo.shutdown();
    Ok(())
}

struct Demo {
    page: Page,
    child: Page,
    page_window: Arc<Window>,
    child_window: Arc<Window>,
    page_layout: Arc<GridLayout>,
    controller: Arc<Window>,
    inbox: broadcast::Receiver<ChannelMessage>,
    next_id: u64,
    reply_timeout: Duration,
}

impl Demo {
    fn new(config: &BridgeConfig, child_origin: &str) -> Result<Self> {
        let max_in_flight = NonZeroUsize::new(config.max_concurrency).unwrap_or(NonZeroUsize::MIN);

        let page_window = Window::with_capacity(&config.page_origin, config.channel_capacity);
        let page_layout = Arc::new(
            GridLayout::new(format!("{}/", config.page_origin))
                .with_allowed_counts(config.allowed_screen_counts.clone())
                .with_authorized_sites(config.authorized_sites.clone()),
        );
        let mut page = Page::builder(
            Arc::clone(&page_window),
            Arc::clone(&page_layout) as Arc<dyn Layout>,
        )
        .child_timeout(config.child_call_timeout())
        .allowed_counts(config.allowed_screen_counts.clone())
        .max_in_flight(max_in_flight)
        .build()?;

        let child_window = Window::with_capacity(child_origin, config.channel_capacity);
        let child_layout: Arc<dyn Layout> =
            Arc::new(GridLayout::new(format!("{child_origin}/app")));
        let mut child = PageBuilder::child(Arc::clone(&child_window), child_layout)
            .max_in_flight(max_in_flight)
            .with_tool(
                ToolDescriptor::new("greet", "Say hello")?.with_parameters(ToolSchema::new(json!({
                    "type": "object",
                    "properties": { "who": { "type": "string" } },
                    "additionalProperties": false
                }))),
                greet,
            )?
            .build()?;

        page.start()?;
        child.start()?;

        let controller = Window::new("https://controller.example");
        let inbox = controller.subscribe();
        Ok(Self {
            page,
            child,
            page_window,
            child_window,
            page_layout,
            controller,
            inbox,
            next_id: 0,
            reply_timeout: config.child_call_timeout() * 2,
        })
    }

    /// Loads the child page into screen 0.
    fn mount_child(&self) -> Result<()> {
        self.page_layout
            .mount(
                ChildIndex::new(0),
                Arc::clone(&self.child_window) as Arc<dyn MessageTarget>,
            )?;
        info!(origin = self.child_window.origin(), "child mounted into screen 0");
        Ok(())
    }

    async fn run(&mut self, name: &str, arguments: Value) -> Result<()> {
        self.next_id += 1;
        let request_id = format!("CTRL:{}", self.next_id);
        let envelope = json!({
            "type": "A_CALL",
            "requestId": request_id,
            "call": { "name": name, "arguments": arguments }
        });
        self.page_window.post_message(
            ChannelMessage::from_source(
                envelope,
                Arc::clone(&self.controller) as Arc<dyn MessageTarget>,
            ),
            &TargetOrigin::Wildcard,
        )?;

        loop {
            let reply = tokio::time::timeout(self.reply_timeout, self.inbox.recv())
                .await
                .with_context(|| format!("no reply to {name}"))??;
            if reply.data()["requestId"] != request_id.as_str() {
                continue;
            }
            println!("{name} -> {}", serde_json::to_string_pretty(&reply.data()["response"])?);
            return Ok(());
        }
    }

    fn shutdown(mut self) {
        self.page.stop();
        self.child.stop();
        info!(state = ?self.page.state(), "demo finished");
    }
}

async fn greet(arguments: Value) -> Result<Value, ToolError> {
    #[derive(serde::Deserialize)]
    struct GreetArgs {
        #[serde(default)]
        who: Option<String>,
    }

    let GreetArgs { who } = parse_arguments(arguments)?;
    Ok(json!({ "greeting": format!("hello, {}", who.as_deref().unwrap_or("world")) }))
}
