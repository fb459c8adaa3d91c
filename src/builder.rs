//! Log record construction
//!
//! [`SpanSource`] is the one seam between vendor-specific span shapes and
//! the record builder: each adapter implements one accessor per field the
//! record needs, and [`LogBuilder`] stays vendor-agnostic. Construction is
//! pure: no I/O, no mutation of the source span.

use chrono::{DateTime, Utc};
use serde_json::{json, Map as JsonMap, Value as JsonValue};
use thiserror::Error;

use crate::config::ExporterConfig;
use crate::context::TraceContext;
use crate::ids::format_id;
use crate::record::{LogType, TraceLog};
use crate::time::{latency_seconds, to_iso};
use crate::usage::{compute_total_request_tokens, extract_token_usage};
use crate::value::PayloadValue;

/// Read-only view of one unit of work, implemented per vendor.
///
/// Only `span_id` and `name` are mandatory; everything else defaults to
/// "not reported" so thin adapters stay thin.
pub trait SpanSource {
    fn span_id(&self) -> PayloadValue;
    fn name(&self) -> String;

    fn parent_span_id(&self) -> PayloadValue {
        PayloadValue::Null
    }
    fn trace_id(&self) -> PayloadValue {
        PayloadValue::Null
    }
    /// Vendor kind/type tag, resolved through the fixed kind table.
    fn kind(&self) -> Option<String> {
        None
    }
    fn start_time(&self) -> Option<DateTime<Utc>> {
        None
    }
    fn end_time(&self) -> Option<DateTime<Utc>> {
        None
    }
    fn model(&self) -> Option<String> {
        None
    }
    fn input(&self) -> Option<JsonValue> {
        None
    }
    fn output(&self) -> Option<JsonValue> {
        None
    }
    /// Vendor-reported counters, searched by the usage extractor.
    fn metrics(&self) -> Option<JsonValue> {
        None
    }
    /// Free-form per-span metadata map.
    fn metadata(&self) -> Option<JsonValue> {
        None
    }
    /// Vendor-reported cost in USD.
    fn cost(&self) -> Option<f64> {
        None
    }
    fn error(&self) -> Option<String> {
        None
    }
    /// Vendor-specific extras, nested under the returned key in the record
    /// metadata so they never collide with first-party fields.
    fn vendor_bag(&self) -> Option<(&'static str, JsonValue)> {
        None
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum BuildError {
    /// The span exposes no usable identifier; the record is dropped and the
    /// rest of the batch proceeds.
    #[error("span has no usable identifier")]
    MissingSpanId,
}

/// Builds wire-ready records from vendor spans plus exporter defaults.
#[derive(Debug, Clone)]
pub struct LogBuilder {
    config: ExporterConfig,
    context: TraceContext,
}

impl LogBuilder {
    /// Build against the process-wide [`TraceContext`].
    pub fn new(config: ExporterConfig) -> Self {
        Self {
            context: crate::context::GLOBAL_CONTEXT.clone(),
            config,
        }
    }

    /// Build against an explicit context (one per session or test).
    pub fn with_context(mut self, context: TraceContext) -> Self {
        self.context = context;
        self
    }

    pub fn config(&self) -> &ExporterConfig {
        &self.config
    }

    pub fn context(&self) -> &TraceContext {
        &self.context
    }

    /// Construct one record from a span.
    pub fn build(&self, source: &dyn SpanSource) -> Result<TraceLog, BuildError> {
        let span_id = format_id(&source.span_id()).ok_or(BuildError::MissingSpanId)?;
        let parent_id = format_id(&source.parent_span_id());
        let name = source.name();

        // A span with no resolvable parent is a root: it names the trace and
        // its own id doubles as the trace id. A child keeps the vendor trace
        // id, falling back to its parent so siblings still group.
        let (trace_id, trace_name) = match &parent_id {
            None => {
                let trace_name = self.context.trace_name().unwrap_or_else(|| name.clone());
                (span_id.clone(), Some(trace_name))
            }
            Some(parent) => {
                let trace_id = format_id(&source.trace_id()).unwrap_or_else(|| parent.clone());
                (trace_id, None)
            }
        };

        let start = source.start_time();
        let end = source.end_time();
        let timestamp = to_iso(&start.unwrap_or_else(Utc::now));

        let span_metadata = source.metadata();
        let usage_record = json!({
            "metrics": source.metrics().unwrap_or(JsonValue::Null),
            "metadata": span_metadata.clone().unwrap_or(JsonValue::Null),
        });
        let (prompt_tokens, completion_tokens) = extract_token_usage(&usage_record);

        let model = source.model();
        // Vendor-reported cost wins; the static table only estimates.
        let cost = source.cost().or_else(|| {
            model
                .as_deref()
                .and_then(|m| crate::pricing::estimate_cost(m, prompt_tokens, completion_tokens))
        });

        Ok(TraceLog {
            trace_unique_id: trace_id,
            span_unique_id: span_id,
            span_parent_id: parent_id,
            trace_name,
            span_name: name,
            log_type: LogType::from_kind(source.kind().as_deref()),
            start_time: start.map(|dt| to_iso(&dt)),
            timestamp,
            latency: latency_seconds(start, end),
            model,
            prompt_tokens,
            completion_tokens,
            total_request_tokens: compute_total_request_tokens(prompt_tokens, completion_tokens),
            cost,
            metadata: self.merged_metadata(span_metadata, source.vendor_bag()),
            input: source.input(),
            output: source.output(),
            error_message: source.error(),
            customer_identifier: self
                .context
                .customer_identifier()
                .or_else(|| self.config.customer_identifier.clone()),
            session_identifier: self
                .context
                .session_identifier()
                .or_else(|| self.config.session_identifier.clone()),
        })
    }

    /// Merge order, later wins: exporter-level static metadata, the span's
    /// own metadata, per-call context metadata, then the vendor bag nested
    /// under its vendor key.
    fn merged_metadata(
        &self,
        span_metadata: Option<JsonValue>,
        vendor_bag: Option<(&'static str, JsonValue)>,
    ) -> JsonValue {
        let mut merged: JsonMap<String, JsonValue> = self.config.metadata.clone();
        if let Some(JsonValue::Object(entries)) = span_metadata {
            merged.extend(entries);
        }
        merged.extend(self.context.metadata());
        if let Some((vendor_key, bag)) = vendor_bag {
            merged.insert(vendor_key.to_string(), bag);
        }
        if merged.is_empty() {
            JsonValue::Null
        } else {
            JsonValue::Object(merged)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::resolve_instant;
    use serde_json::json;

    #[derive(Default)]
    struct TestSpan {
        id: &'static str,
        parent: Option<&'static str>,
        trace: Option<&'static str>,
        name: &'static str,
        kind: Option<&'static str>,
        start: Option<f64>,
        end: Option<f64>,
        metrics: Option<JsonValue>,
        metadata: Option<JsonValue>,
        model: Option<&'static str>,
        cost: Option<f64>,
        bag: Option<(&'static str, JsonValue)>,
    }

    impl SpanSource for TestSpan {
        fn span_id(&self) -> PayloadValue {
            PayloadValue::Text(self.id.to_string())
        }
        fn name(&self) -> String {
            self.name.to_string()
        }
        fn parent_span_id(&self) -> PayloadValue {
            match self.parent {
                Some(p) => PayloadValue::Text(p.to_string()),
                None => PayloadValue::Null,
            }
        }
        fn trace_id(&self) -> PayloadValue {
            match self.trace {
                Some(t) => PayloadValue::Text(t.to_string()),
                None => PayloadValue::Null,
            }
        }
        fn kind(&self) -> Option<String> {
            self.kind.map(str::to_string)
        }
        fn start_time(&self) -> Option<DateTime<Utc>> {
            self.start.and_then(|s| resolve_instant(&PayloadValue::Float(s)))
        }
        fn end_time(&self) -> Option<DateTime<Utc>> {
            self.end.and_then(|s| resolve_instant(&PayloadValue::Float(s)))
        }
        fn model(&self) -> Option<String> {
            self.model.map(str::to_string)
        }
        fn metrics(&self) -> Option<JsonValue> {
            self.metrics.clone()
        }
        fn metadata(&self) -> Option<JsonValue> {
            self.metadata.clone()
        }
        fn cost(&self) -> Option<f64> {
            self.cost
        }
        fn vendor_bag(&self) -> Option<(&'static str, JsonValue)> {
            self.bag.clone()
        }
    }

    fn builder() -> LogBuilder {
        let config = ExporterConfig::new("sk-test").with_base_url("https://example.test/api");
        LogBuilder::new(config).with_context(TraceContext::new())
    }

    #[test]
    fn test_two_span_trace_scenario() {
        let b = builder();

        let root = b
            .build(&TestSpan {
                id: "root",
                name: "root",
                kind: Some("llm"),
                start: Some(1_700_000_000.0),
                end: Some(1_700_000_001.5),
                ..TestSpan::default()
            })
            .unwrap();
        assert_eq!(root.log_type, LogType::Generation);
        assert_eq!(root.latency, Some(1.5));
        assert_eq!(root.trace_name.as_deref(), Some("root"));
        assert_eq!(root.span_parent_id, None);
        assert_eq!(root.trace_unique_id, root.span_unique_id);

        let child = b
            .build(&TestSpan {
                id: "child",
                parent: Some("root"),
                name: "child",
                kind: Some("task"),
                start: Some(1_700_000_002.0),
                end: Some(1_700_000_004.0),
                ..TestSpan::default()
            })
            .unwrap();
        assert_eq!(child.log_type, LogType::Task);
        assert_eq!(child.latency, Some(2.0));
        assert_eq!(child.span_parent_id.as_deref(), Some(root.span_unique_id.as_str()));
        assert_eq!(child.trace_name, None);
    }

    #[test]
    fn test_child_keeps_vendor_trace_id() {
        let b = builder();
        let child = b
            .build(&TestSpan {
                id: "s2",
                parent: Some("s1"),
                trace: Some("t-99"),
                name: "child",
                ..TestSpan::default()
            })
            .unwrap();
        assert_eq!(child.trace_unique_id, "t-99");
    }

    #[test]
    fn test_child_without_trace_id_groups_under_parent() {
        let b = builder();
        let child = b
            .build(&TestSpan {
                id: "s2",
                parent: Some("s1"),
                name: "child",
                ..TestSpan::default()
            })
            .unwrap();
        assert_eq!(child.trace_unique_id, "s1");
    }

    #[test]
    fn test_missing_span_id_is_rejected() {
        struct NoId;
        impl SpanSource for NoId {
            fn span_id(&self) -> PayloadValue {
                PayloadValue::Null
            }
            fn name(&self) -> String {
                "nameless".into()
            }
        }
        assert_eq!(builder().build(&NoId), Err(BuildError::MissingSpanId));
    }

    #[test]
    fn test_missing_timing_omits_latency() {
        let b = builder();
        let record = b
            .build(&TestSpan {
                id: "s",
                name: "s",
                start: Some(1_700_000_000.0),
                ..TestSpan::default()
            })
            .unwrap();
        assert_eq!(record.latency, None);
        assert_eq!(
            record.start_time.as_deref(),
            Some("2023-11-14T22:13:20.000000Z")
        );
    }

    #[test]
    fn test_usage_flows_into_totals() {
        let b = builder();
        let record = b
            .build(&TestSpan {
                id: "s",
                name: "s",
                metrics: Some(json!({"prompt_tokens": 5})),
                ..TestSpan::default()
            })
            .unwrap();
        assert_eq!(record.prompt_tokens, Some(5));
        assert_eq!(record.completion_tokens, None);
        assert_eq!(record.total_request_tokens, Some(5));
    }

    #[test]
    fn test_vendor_cost_wins_over_estimate() {
        let b = builder();
        let record = b
            .build(&TestSpan {
                id: "s",
                name: "s",
                model: Some("gpt-4o"),
                metrics: Some(json!({"prompt_tokens": 1_000_000})),
                cost: Some(0.123),
                ..TestSpan::default()
            })
            .unwrap();
        assert_eq!(record.cost, Some(0.123));
    }

    #[test]
    fn test_cost_estimated_when_vendor_silent() {
        let b = builder();
        let record = b
            .build(&TestSpan {
                id: "s",
                name: "s",
                model: Some("gpt-4o"),
                metrics: Some(json!({"prompt_tokens": 1_000_000})),
                ..TestSpan::default()
            })
            .unwrap();
        let cost = record.cost.unwrap();
        assert!((cost - 2.50).abs() < 1e-9);
    }

    #[test]
    fn test_metadata_merge_order() {
        let config = ExporterConfig::new("sk-test")
            .with_metadata("env", json!("static"))
            .with_metadata("team", json!("ml"));
        let context = TraceContext::new();
        context.set_metadata("env", json!("per-call"));
        let b = LogBuilder::new(config).with_context(context);

        let record = b
            .build(&TestSpan {
                id: "s",
                name: "s",
                metadata: Some(json!({"team": "span-level", "step": 3})),
                bag: Some(("braintrust_tags", json!(["eval"]))),
                ..TestSpan::default()
            })
            .unwrap();

        let meta = record.metadata.as_object().unwrap();
        // Context beats span metadata beats static config
        assert_eq!(meta["env"], json!("per-call"));
        assert_eq!(meta["team"], json!("span-level"));
        assert_eq!(meta["step"], json!(3));
        // Vendor extras nest under their own key
        assert_eq!(meta["braintrust_tags"], json!(["eval"]));
    }

    #[test]
    fn test_identifiers_from_config_and_context() {
        let config = ExporterConfig::new("sk-test").with_customer_identifier("cfg-cust");
        let context = TraceContext::new();
        context.set_session_identifier("ctx-sess");
        let b = LogBuilder::new(config).with_context(context);

        let record = b
            .build(&TestSpan {
                id: "s",
                name: "s",
                ..TestSpan::default()
            })
            .unwrap();
        assert_eq!(record.customer_identifier.as_deref(), Some("cfg-cust"));
        assert_eq!(record.session_identifier.as_deref(), Some("ctx-sess"));
    }
}
