//! Intercept OpenAI-compatible API calls and log them automatically

use dotenv::dotenv;
use keywordsai_tracing::{context, ExporterConfig, OpenAITelemetryMiddleware};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use serde_json::json;
use std::error::Error;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Load environment variables
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = ExporterConfig::from_env();
    let middleware = OpenAITelemetryMiddleware::new(config);
    let ingest_client = std::sync::Arc::clone(middleware.client());

    // Any OpenAI-compatible endpoint works; the middleware watches the paths
    let http: ClientWithMiddleware = ClientBuilder::new(reqwest::Client::new())
        .with(middleware)
        .build();

    // Attribute subsequent calls (optional)
    context::set_customer_identifier("customer-123");
    context::set_session_identifier("session-456");

    let api_base =
        std::env::var("OPENAI_API_BASE").unwrap_or_else(|_| "https://api.openai.com".to_string());
    let response = http
        .post(format!("{}/v1/chat/completions", api_base))
        .bearer_auth(std::env::var("OPENAI_API_KEY")?)
        .json(&json!({
            "model": "gpt-4o-mini",
            "messages": [{"role": "user", "content": "Say hello in one word"}],
            "max_tokens": 10,
        }))
        .send()
        .await?;

    let body: serde_json::Value = response.json().await?;
    println!(
        "Response: {}",
        body["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
    );
    if let Some(usage) = body.get("usage") {
        println!(
            "Token usage - Prompt: {}, Completion: {}, Total: {}",
            usage["prompt_tokens"], usage["completion_tokens"], usage["total_tokens"]
        );
    }

    // Drain queued records before the process exits
    ingest_client.shutdown().await;

    Ok(())
}
