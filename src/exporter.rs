//! OpenTelemetry span exporter
//!
//! Plugs into an OTel tracer provider as a regular span exporter: every
//! finished span converts through a [`SpanSource`] adapter into a log
//! record and ships to the platform. Ids come straight from the raw OTel
//! bytes (32-char trace / 16-char span hex, no separators); a span whose
//! parent id is the invalid zero id is a root. Spans the instrumentation
//! flushes twice are dropped by the dedup cache before they reach the wire.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use opentelemetry::trace::{SpanId, Status, TraceError};
use opentelemetry::KeyValue;
use opentelemetry_sdk::export::trace::{ExportResult, SpanData, SpanExporter};
use serde_json::{json, Value as JsonValue};

use crate::attrs::{
    attr_f64, attr_str, model_from_attributes, span_type_from_attributes,
    token_usage_from_attributes, KeywordsAttributes,
};
use crate::builder::{LogBuilder, SpanSource};
use crate::client::IngestClient;
use crate::config::ExporterConfig;
use crate::context::TraceContext;
use crate::dedup::SpanDedupeCache;
use crate::record::TraceLog;
use crate::value::PayloadValue;

/// An attribute that was written as a JSON string comes back structured;
/// anything else stays a plain string value.
fn json_attr(attrs: &[KeyValue], key: &str) -> Option<JsonValue> {
    let raw = attr_str(attrs, key)?;
    Some(serde_json::from_str(&raw).unwrap_or(JsonValue::String(raw)))
}

/// Span kind tag for the log-type table: the explicit platform tag or
/// `gen_ai.operation.name` wins; otherwise a span that looks like an LLM
/// call (model attribute present) counts as one.
fn infer_kind(attrs: &[KeyValue]) -> Option<String> {
    span_type_from_attributes(attrs).or_else(|| model_from_attributes(attrs).map(|_| "llm".into()))
}

fn instant(time: std::time::SystemTime) -> Option<DateTime<Utc>> {
    let dt = DateTime::<Utc>::from(time);
    // An unfinished span reports the epoch; treat it as unavailable.
    (dt != DateTime::UNIX_EPOCH).then_some(dt)
}

/// Read-only [`SpanSource`] view over one OTel span.
struct OtelSpan<'a>(&'a SpanData);

impl SpanSource for OtelSpan<'_> {
    fn span_id(&self) -> PayloadValue {
        PayloadValue::Bytes(self.0.span_context.span_id().to_bytes().to_vec())
    }

    fn parent_span_id(&self) -> PayloadValue {
        if self.0.parent_span_id == SpanId::INVALID {
            PayloadValue::Null
        } else {
            PayloadValue::Bytes(self.0.parent_span_id.to_bytes().to_vec())
        }
    }

    fn trace_id(&self) -> PayloadValue {
        PayloadValue::Bytes(self.0.span_context.trace_id().to_bytes().to_vec())
    }

    fn name(&self) -> String {
        self.0.name.to_string()
    }

    fn kind(&self) -> Option<String> {
        infer_kind(&self.0.attributes)
    }

    fn start_time(&self) -> Option<DateTime<Utc>> {
        instant(self.0.start_time)
    }

    fn end_time(&self) -> Option<DateTime<Utc>> {
        instant(self.0.end_time)
    }

    fn model(&self) -> Option<String> {
        model_from_attributes(&self.0.attributes)
    }

    fn input(&self) -> Option<JsonValue> {
        json_attr(&self.0.attributes, KeywordsAttributes::SPAN_INPUT)
    }

    fn output(&self) -> Option<JsonValue> {
        json_attr(&self.0.attributes, KeywordsAttributes::SPAN_OUTPUT)
    }

    fn metrics(&self) -> Option<JsonValue> {
        let (prompt, completion) = token_usage_from_attributes(&self.0.attributes);
        if prompt.is_none() && completion.is_none() {
            return None;
        }
        Some(json!({
            "prompt_tokens": prompt,
            "completion_tokens": completion,
        }))
    }

    fn metadata(&self) -> Option<JsonValue> {
        json_attr(&self.0.attributes, KeywordsAttributes::METADATA)
    }

    fn cost(&self) -> Option<f64> {
        attr_f64(&self.0.attributes, KeywordsAttributes::COST)
    }

    fn error(&self) -> Option<String> {
        match &self.0.status {
            Status::Error { description } => Some(description.to_string()),
            _ => None,
        }
    }
}

/// Span exporter delivering OTel spans to the platform.
#[derive(Debug)]
pub struct TraceExporter {
    builder: LogBuilder,
    client: Arc<IngestClient>,
    dedupe: SpanDedupeCache,
}

impl TraceExporter {
    /// Construct inside a tokio runtime (the delivery worker is spawned).
    pub fn new(config: ExporterConfig) -> Self {
        let client = IngestClient::new(&config);
        Self {
            builder: LogBuilder::new(config),
            client,
            dedupe: SpanDedupeCache::default(),
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

    fn convert(&self, batch: &[SpanData]) -> Vec<TraceLog> {
        let mut records = Vec::with_capacity(batch.len());
        for span in batch {
            let trace_hex = hex::encode(span.span_context.trace_id().to_bytes());
            let span_hex = hex::encode(span.span_context.span_id().to_bytes());
            if !self.dedupe.add(Some(&trace_hex), &span_hex) {
                tracing::debug!(trace_id = %trace_hex, span_id = %span_hex, "Skipping already-exported span");
                continue;
            }
            match self.builder.build(&OtelSpan(span)) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(error = %e, span_name = %span.name, "Dropping span from batch");
                }
            }
        }
        records
    }
}

impl SpanExporter for TraceExporter {
    fn export(&mut self, batch: Vec<SpanData>) -> BoxFuture<'static, ExportResult> {
        let records = self.convert(&batch);
        if records.is_empty() {
            return Box::pin(async { Ok(()) });
        }
        let client = Arc::clone(&self.client);
        Box::pin(async move {
            client
                .send_now(&records)
                .await
                .map(|_| ())
                .map_err(|e| TraceError::Other(e.to_string().into()))
        })
    }

    fn force_flush(&mut self) -> BoxFuture<'static, ExportResult> {
        let client = Arc::clone(&self.client);
        Box::pin(async move {
            client.flush().await;
            Ok(())
        })
    }

    fn shutdown(&mut self) {
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let client = Arc::clone(&self.client);
            handle.spawn(async move { client.shutdown().await });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry_semantic_conventions::attribute::{
        GEN_AI_OPERATION_NAME, GEN_AI_REQUEST_MODEL,
    };

    #[test]
    fn test_infer_kind_prefers_explicit_tag() {
        let attrs = vec![
            KeyValue::new(KeywordsAttributes::SPAN_TYPE, "workflow"),
            KeyValue::new(GEN_AI_REQUEST_MODEL, "gpt-4o"),
        ];
        assert_eq!(infer_kind(&attrs).as_deref(), Some("workflow"));
    }

    #[test]
    fn test_infer_kind_from_operation_name() {
        let attrs = vec![KeyValue::new(GEN_AI_OPERATION_NAME, "chat")];
        assert_eq!(infer_kind(&attrs).as_deref(), Some("chat"));
    }

    #[test]
    fn test_infer_kind_from_model_presence() {
        let attrs = vec![KeyValue::new(GEN_AI_REQUEST_MODEL, "gpt-4o")];
        assert_eq!(infer_kind(&attrs).as_deref(), Some("llm"));
    }

    #[test]
    fn test_infer_kind_absent() {
        assert_eq!(infer_kind(&[]), None);
    }

    #[test]
    fn test_json_attr_parses_structured_strings() {
        let attrs = vec![KeyValue::new(
            KeywordsAttributes::SPAN_INPUT,
            r#"{"messages":[{"role":"user"}]}"#,
        )];
        let value = json_attr(&attrs, KeywordsAttributes::SPAN_INPUT).unwrap();
        assert!(value.is_object());
        assert_eq!(value["messages"][0]["role"], "user");
    }

    #[test]
    fn test_json_attr_keeps_plain_strings() {
        let attrs = vec![KeyValue::new(KeywordsAttributes::SPAN_OUTPUT, "plain text")];
        assert_eq!(
            json_attr(&attrs, KeywordsAttributes::SPAN_OUTPUT),
            Some(JsonValue::String("plain text".into()))
        );
    }

    #[test]
    fn test_instant_epoch_is_unavailable() {
        assert_eq!(instant(std::time::SystemTime::UNIX_EPOCH), None);
        assert!(instant(std::time::SystemTime::now()).is_some());
    }
}
