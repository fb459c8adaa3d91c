//! Basic example: build records from your own spans and ship them

use dotenv::dotenv;
use keywordsai_tracing::{ExporterConfig, IngestClient, LogBuilder, PayloadValue, SpanSource};
use std::error::Error;

/// A minimal span describing one unit of work in your application.
struct WorkSpan {
    id: String,
    parent: Option<String>,
    name: String,
    kind: &'static str,
}

impl SpanSource for WorkSpan {
    fn span_id(&self) -> PayloadValue {
        PayloadValue::Text(self.id.clone())
    }
    fn parent_span_id(&self) -> PayloadValue {
        match &self.parent {
            Some(parent) => PayloadValue::Text(parent.clone()),
            None => PayloadValue::Null,
        }
    }
    fn name(&self) -> String {
        self.name.clone()
    }
    fn kind(&self) -> Option<String> {
        Some(self.kind.to_string())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Load environment variables (KEYWORDSAI_API_KEY, KEYWORDSAI_BASE_URL)
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = ExporterConfig::from_env();
    let builder = LogBuilder::new(config.clone());
    let client = IngestClient::new(&config);

    let root = builder.build(&WorkSpan {
        id: "run-1".into(),
        parent: None,
        name: "nightly-summarization".into(),
        kind: "workflow",
    })?;
    let step = builder.build(&WorkSpan {
        id: "run-1-step-1".into(),
        parent: Some("run-1".into()),
        name: "summarize-batch".into(),
        kind: "task",
    })?;

    println!("Root record: {}", serde_json::to_string_pretty(&root)?);

    client.enqueue(vec![root, step]);

    // Drain the queue before the process exits
    client.shutdown().await;

    Ok(())
}
