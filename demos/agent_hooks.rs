//! Bracket an agent run with workflow/tool hooks

use dotenv::dotenv;
use keywordsai_tracing::{ExporterConfig, HookAdapter, TraceContext};
use serde_json::json;
use std::error::Error;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let context = TraceContext::new();
    context.set_customer_identifier("customer-123");

    let hooks = HookAdapter::new(ExporterConfig::from_env()).with_context(context);

    hooks.begin_workflow("research-agent");

    hooks.on_tool_start("call-1", "web_search", Some(json!({"query": "rust telemetry"})));
    // ... the framework runs the tool ...
    hooks.on_tool_end("call-1", Some(json!({"results": 3})));

    hooks.on_task_start("step-1", "draft-answer", None);
    hooks.on_task_end("step-1", Some(json!({"tokens": 120})));

    hooks.end_workflow(Some(json!({"status": "done"})));

    // Drain queued records before the process exits
    hooks.client().shutdown().await;

    Ok(())
}
