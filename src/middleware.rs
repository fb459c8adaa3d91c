//! OpenAI-compatible call interception
//!
//! A `reqwest-middleware` layer that watches OpenAI-style API traffic
//! (chat completions, completions, embeddings, image generations), captures
//! model, input, output, and token usage from the request/response bodies,
//! and logs each call as one generation record. The wrapped call's result is
//! returned to the caller unchanged; export runs fire-and-forget unless the
//! exporter was configured to raise on error.
//!
//! For gateway mode, where the LLM calls themselves route through the
//! platform's proxy, point the wrapped client's base URL at
//! [`crate::config::ExporterConfig::gateway_endpoint`] instead.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use http::Extensions;
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next, Result};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::builder::{LogBuilder, SpanSource};
use crate::client::IngestClient;
use crate::config::ExporterConfig;
use crate::context::TraceContext;
use crate::value::PayloadValue;

/// One intercepted HTTP call, viewed as a span.
struct HttpCall {
    span_id: Uuid,
    name: String,
    kind: Option<&'static str>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    model: Option<String>,
    input: Option<Value>,
    output: Option<Value>,
    usage: Option<Value>,
    error: Option<String>,
}

impl SpanSource for HttpCall {
    fn span_id(&self) -> PayloadValue {
        PayloadValue::from(self.span_id)
    }
    fn name(&self) -> String {
        self.name.clone()
    }
    fn kind(&self) -> Option<String> {
        self.kind.map(str::to_string)
    }
    fn start_time(&self) -> Option<DateTime<Utc>> {
        Some(self.start)
    }
    fn end_time(&self) -> Option<DateTime<Utc>> {
        Some(self.end)
    }
    fn model(&self) -> Option<String> {
        self.model.clone()
    }
    fn input(&self) -> Option<Value> {
        self.input.clone()
    }
    fn output(&self) -> Option<Value> {
        self.output.clone()
    }
    fn metrics(&self) -> Option<Value> {
        self.usage.clone()
    }
    fn error(&self) -> Option<String> {
        self.error.clone()
    }
}

/// Middleware that logs OpenAI-compatible API calls to the platform.
pub struct OpenAITelemetryMiddleware {
    builder: LogBuilder,
    client: Arc<IngestClient>,
    raise_on_error: bool,
}

impl OpenAITelemetryMiddleware {
    /// Construct inside a tokio runtime (the delivery worker is spawned).
    pub fn new(config: ExporterConfig) -> Self {
        let client = IngestClient::new(&config);
        Self::with_client(config, client)
    }

    /// Share one [`IngestClient`] across several adapters.
    pub fn with_client(config: ExporterConfig, client: Arc<IngestClient>) -> Self {
        Self {
            raise_on_error: config.raise_on_error,
            builder: LogBuilder::new(config),
            client,
        }
    }

    /// Attribute records through an explicit [`TraceContext`].
    pub fn with_context(mut self, context: TraceContext) -> Self {
        self.builder = self.builder.with_context(context);
        self
    }

    pub fn client(&self) -> &Arc<IngestClient> {
        &self.client
    }

    fn extract_operation_from_path(path: &str) -> (Option<&'static str>, &'static str) {
        if path.contains("/chat/completions") {
            (Some("llm"), "chat.completions")
        } else if path.contains("/completions") {
            (Some("completion"), "completions")
        } else if path.contains("/embeddings") {
            (Some("embedding"), "embeddings")
        } else if path.contains("/images/generations") {
            (Some("generation"), "images.generations")
        } else {
            (None, "request")
        }
    }

    /// Model from an Azure-style `/deployments/{id}/...` path segment.
    fn model_from_path(path: &str) -> Option<String> {
        let start = path.find("/deployments/")?;
        let after = &path[start + "/deployments/".len()..];
        let end = after.find('/')?;
        let deployment = &after[..end];
        (!deployment.is_empty()).then(|| deployment.to_string())
    }

    /// Per-operation input extraction from the request body.
    fn input_from_body(operation: &str, body: &Value) -> Option<Value> {
        match operation {
            "chat.completions" => body
                .get("messages")
                .map(|messages| json!({ "messages": messages })),
            "completions" => body.get("prompt").map(|prompt| json!({ "prompt": prompt })),
            "embeddings" => body.get("input").map(|input| json!({ "input": input })),
            "images.generations" => {
                let mut image_input = serde_json::Map::new();
                for key in ["prompt", "n", "size"] {
                    if let Some(value) = body.get(key) {
                        image_input.insert(key.to_string(), value.clone());
                    }
                }
                (!image_input.is_empty()).then(|| Value::Object(image_input))
            }
            _ => None,
        }
    }

    /// Per-operation output extraction from the response body.
    fn output_from_body(operation: &str, body: &Value) -> Option<Value> {
        match operation {
            "chat.completions" => body
                .get("choices")
                .and_then(|choices| choices.as_array())
                .and_then(|arr| arr.first())
                .and_then(|choice| choice.get("message"))
                .map(|message| json!({ "choices": [{ "message": message }] })),
            "completions" => body
                .get("choices")
                .and_then(|choices| choices.as_array())
                .map(|choices| {
                    let texts: Vec<_> = choices.iter().filter_map(|c| c.get("text")).collect();
                    json!({ "choices": texts })
                }),
            "embeddings" => body.get("data").and_then(|data| data.as_array()).map(|data| {
                // Full vectors are far too large to log
                json!({
                    "embeddings_count": data.len(),
                    "model": body.get("model"),
                })
            }),
            "images.generations" => body.get("data").and_then(|data| data.as_array()).map(|data| {
                let urls: Vec<_> = data.iter().filter_map(|item| item.get("url")).collect();
                let b64_images_count = data
                    .iter()
                    .filter(|item| item.get("b64_json").is_some())
                    .count();
                json!({ "urls": urls, "b64_images_count": b64_images_count })
            }),
            _ => None,
        }
    }

    /// Token usage block from the response body, shaped for the extractor.
    fn usage_from_body(body: &Value) -> Option<Value> {
        body.get("usage").cloned().filter(|usage| usage.is_object())
    }

    async fn record_call(&self, call: HttpCall) -> Result<()> {
        match self.builder.build(&call) {
            Ok(record) if self.raise_on_error => self
                .client
                .send_now(&[record])
                .await
                .map(|_| ())
                .map_err(reqwest_middleware::Error::middleware),
            Ok(record) => {
                self.client.enqueue(vec![record]);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Dropping intercepted call record");
                Ok(())
            }
        }
    }
}

#[async_trait::async_trait]
impl Middleware for OpenAITelemetryMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        let start = Utc::now();
        let path = req.url().path().to_string();
        let (kind, operation) = Self::extract_operation_from_path(&path);

        let mut model = Self::model_from_path(&path);
        let mut input = None;
        if let Some(bytes) = req.body().and_then(|body| body.as_bytes()) {
            if let Ok(body) = serde_json::from_slice::<Value>(bytes) {
                // Request-body model wins over the Azure deployment segment
                if let Some(m) = body.get("model").and_then(Value::as_str) {
                    if !m.is_empty() {
                        model = Some(m.to_string());
                    }
                }
                input = Self::input_from_body(operation, &body);
            }
        }

        let response = next.run(req, extensions).await;
        let end = Utc::now();

        let mut call = HttpCall {
            span_id: Uuid::new_v4(),
            name: format!("openai.{}", operation),
            kind,
            start,
            end,
            model,
            input,
            output: None,
            usage: None,
            error: None,
        };

        match response {
            Ok(res) => {
                let status = res.status();
                if !status.is_success() {
                    call.error = Some(format!("HTTP {}", status.as_u16()));
                    self.record_call(call).await?;
                    return Ok(res);
                }

                // The body is consumed to read output and usage, then the
                // response is rebuilt for the caller.
                match res.bytes().await {
                    Ok(bytes) => {
                        if let Ok(body) = serde_json::from_slice::<Value>(&bytes) {
                            call.output = Self::output_from_body(operation, &body);
                            call.usage = Self::usage_from_body(&body);
                        }
                        self.record_call(call).await?;

                        let rebuilt = Response::from(
                            http::Response::builder().status(status).body(bytes).unwrap(),
                        );
                        Ok(rebuilt)
                    }
                    Err(e) => {
                        call.error = Some(format!("Failed to read response body: {}", e));
                        self.record_call(call).await?;
                        Err(reqwest_middleware::Error::Reqwest(e))
                    }
                }
            }
            Err(e) => {
                call.error = Some(format!("Request failed: {}", e));
                self.record_call(call).await?;
                Err(e)
            }
        }
    }
}
