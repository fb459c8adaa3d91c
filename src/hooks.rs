//! Callback adapter for hook-based agent frameworks
//!
//! Frameworks that announce work as paired start/finish callbacks (a tool
//! begins, a tool ends) get one adapter instance per session. The adapter
//! brackets everything under a workflow root span and keeps the in-flight
//! state between a "start" and its matching "end" in pending maps keyed by
//! the framework's invocation id.
//!
//! A start whose end never fires leaves its pending entry in place for the
//! process lifetime; this is an accepted leak, bounded by the number of
//! abandoned invocations. An end without a matching start is logged at
//! debug level and ignored.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::builder::{LogBuilder, SpanSource};
use crate::client::IngestClient;
use crate::config::ExporterConfig;
use crate::context::TraceContext;
use crate::record::TraceLog;
use crate::value::PayloadValue;

/// In-flight invocation, created by a start hook and consumed by its end.
#[derive(Debug, Clone)]
struct PendingSpan {
    span_id: Uuid,
    started_at: DateTime<Utc>,
    name: String,
    input: Option<JsonValue>,
}

#[derive(Debug, Clone)]
struct RootSpan {
    span_id: Uuid,
    started_at: DateTime<Utc>,
    name: String,
}

/// One finished unit of work, viewed as a span.
struct HookSpan {
    span_id: Uuid,
    parent: Option<String>,
    trace: Option<String>,
    name: String,
    kind: &'static str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    input: Option<JsonValue>,
    output: Option<JsonValue>,
    error: Option<String>,
}

impl SpanSource for HookSpan {
    fn span_id(&self) -> PayloadValue {
        PayloadValue::from(self.span_id)
    }
    fn name(&self) -> String {
        self.name.clone()
    }
    fn parent_span_id(&self) -> PayloadValue {
        match &self.parent {
            Some(parent) => PayloadValue::Text(parent.clone()),
            None => PayloadValue::Null,
        }
    }
    fn trace_id(&self) -> PayloadValue {
        match &self.trace {
            Some(trace) => PayloadValue::Text(trace.clone()),
            None => PayloadValue::Null,
        }
    }
    fn kind(&self) -> Option<String> {
        Some(self.kind.to_string())
    }
    fn start_time(&self) -> Option<DateTime<Utc>> {
        Some(self.start)
    }
    fn end_time(&self) -> Option<DateTime<Utc>> {
        Some(self.end)
    }
    fn input(&self) -> Option<JsonValue> {
        self.input.clone()
    }
    fn output(&self) -> Option<JsonValue> {
        self.output.clone()
    }
    fn error(&self) -> Option<String> {
        self.error.clone()
    }
}

/// Session-scoped adapter for start/finish hook surfaces.
pub struct HookAdapter {
    builder: LogBuilder,
    client: Arc<IngestClient>,
    root: Mutex<Option<RootSpan>>,
    pending_tools: Mutex<HashMap<String, PendingSpan>>,
    pending_tasks: Mutex<HashMap<String, PendingSpan>>,
}

impl HookAdapter {
    /// Construct inside a tokio runtime (the delivery worker is spawned).
    pub fn new(config: ExporterConfig) -> Self {
        let client = IngestClient::new(&config);
        Self::with_client(config, client)
    }

    /// Share one [`IngestClient`] across several adapters.
    pub fn with_client(config: ExporterConfig, client: Arc<IngestClient>) -> Self {
        Self {
            builder: LogBuilder::new(config),
            client,
            root: Mutex::new(None),
            pending_tools: Mutex::new(HashMap::new()),
            pending_tasks: Mutex::new(HashMap::new()),
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

    /// Open the workflow root that subsequent tool/task spans attach to.
    /// A second call replaces a still-open root.
    pub fn begin_workflow(&self, name: impl Into<String>) {
        let mut root = self.root.lock();
        if root.is_some() {
            tracing::debug!("Replacing still-open workflow root");
        }
        *root = Some(RootSpan {
            span_id: Uuid::new_v4(),
            started_at: Utc::now(),
            name: name.into(),
        });
    }

    /// Close the workflow root and export it.
    pub fn end_workflow(&self, output: Option<JsonValue>) {
        if let Some(record) = self.finish_workflow(output) {
            self.client.enqueue(vec![record]);
        }
    }

    /// Record the start of a tool invocation.
    pub fn on_tool_start(
        &self,
        invocation_id: impl Into<String>,
        tool_name: impl Into<String>,
        input: Option<JsonValue>,
    ) {
        self.pending_tools.lock().insert(
            invocation_id.into(),
            PendingSpan {
                span_id: Uuid::new_v4(),
                started_at: Utc::now(),
                name: tool_name.into(),
                input,
            },
        );
    }

    /// Finish a tool invocation and export its span.
    pub fn on_tool_end(&self, invocation_id: &str, output: Option<JsonValue>) {
        if let Some(record) = self.finish_pending(&self.pending_tools, invocation_id, "tool", output, None)
        {
            self.client.enqueue(vec![record]);
        }
    }

    /// Finish a tool invocation that failed.
    pub fn on_tool_error(&self, invocation_id: &str, error: impl Into<String>) {
        if let Some(record) =
            self.finish_pending(&self.pending_tools, invocation_id, "tool", None, Some(error.into()))
        {
            self.client.enqueue(vec![record]);
        }
    }

    /// Record the start of a task/step.
    pub fn on_task_start(
        &self,
        invocation_id: impl Into<String>,
        task_name: impl Into<String>,
        input: Option<JsonValue>,
    ) {
        self.pending_tasks.lock().insert(
            invocation_id.into(),
            PendingSpan {
                span_id: Uuid::new_v4(),
                started_at: Utc::now(),
                name: task_name.into(),
                input,
            },
        );
    }

    /// Finish a task/step and export its span.
    pub fn on_task_end(&self, invocation_id: &str, output: Option<JsonValue>) {
        if let Some(record) = self.finish_pending(&self.pending_tasks, invocation_id, "task", output, None)
        {
            self.client.enqueue(vec![record]);
        }
    }

    fn root_id(&self) -> Option<String> {
        self.root.lock().as_ref().map(|root| root.span_id.simple().to_string())
    }

    fn finish_workflow(&self, output: Option<JsonValue>) -> Option<TraceLog> {
        let Some(root) = self.root.lock().take() else {
            tracing::debug!("Workflow end without a matching start");
            return None;
        };
        let span = HookSpan {
            span_id: root.span_id,
            parent: None,
            trace: None,
            name: root.name,
            kind: "workflow",
            start: root.started_at,
            end: Utc::now(),
            input: None,
            output,
            error: None,
        };
        self.build_checked(&span)
    }

    fn finish_pending(
        &self,
        pending: &Mutex<HashMap<String, PendingSpan>>,
        invocation_id: &str,
        kind: &'static str,
        output: Option<JsonValue>,
        error: Option<String>,
    ) -> Option<TraceLog> {
        let Some(entry) = pending.lock().remove(invocation_id) else {
            tracing::debug!(invocation_id, kind, "Finish hook without a matching start");
            return None;
        };
        let root_id = self.root_id();
        let span = HookSpan {
            span_id: entry.span_id,
            parent: root_id.clone(),
            trace: root_id,
            name: entry.name,
            kind,
            start: entry.started_at,
            end: Utc::now(),
            input: entry.input,
            output,
            error,
        };
        self.build_checked(&span)
    }

    fn build_checked(&self, span: &HookSpan) -> Option<TraceLog> {
        match self.builder.build(span) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(error = %e, "Dropping hook record");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::LogType;
    use serde_json::json;

    fn adapter() -> HookAdapter {
        let mut config = ExporterConfig::from_env();
        config.api_key = None;
        HookAdapter::new(config).with_context(TraceContext::new())
    }

    #[tokio::test]
    async fn test_workflow_bracket_produces_root() {
        let hooks = adapter();
        hooks.begin_workflow("checkout-flow");
        let record = hooks.finish_workflow(Some(json!({"ok": true}))).unwrap();

        assert_eq!(record.log_type, LogType::Workflow);
        assert_eq!(record.span_parent_id, None);
        assert_eq!(record.trace_unique_id, record.span_unique_id);
        assert_eq!(record.trace_name.as_deref(), Some("checkout-flow"));
        assert_eq!(record.output, Some(json!({"ok": true})));
        assert!(record.latency.unwrap() >= 0.0);
    }

    #[tokio::test]
    async fn test_tool_pair_attaches_to_root() {
        let hooks = adapter();
        hooks.begin_workflow("wf");
        let root_id = hooks.root_id().unwrap();

        hooks.on_tool_start("inv-1", "search", Some(json!({"q": "rust"})));
        let record = hooks
            .finish_pending(&hooks.pending_tools, "inv-1", "tool", Some(json!({"hits": 3})), None)
            .unwrap();

        assert_eq!(record.log_type, LogType::Tool);
        assert_eq!(record.span_parent_id.as_deref(), Some(root_id.as_str()));
        assert_eq!(record.trace_unique_id, root_id);
        assert_eq!(record.trace_name, None);
        assert_eq!(record.span_name, "search");
        assert_eq!(record.input, Some(json!({"q": "rust"})));
        assert_eq!(record.output, Some(json!({"hits": 3})));
        // Consumed on finish
        assert!(hooks.pending_tools.lock().is_empty());
    }

    #[tokio::test]
    async fn test_tool_without_root_is_its_own_trace() {
        let hooks = adapter();
        hooks.on_tool_start("inv-1", "search", None);
        let record = hooks
            .finish_pending(&hooks.pending_tools, "inv-1", "tool", None, None)
            .unwrap();
        assert_eq!(record.span_parent_id, None);
        assert_eq!(record.trace_unique_id, record.span_unique_id);
    }

    #[tokio::test]
    async fn test_unmatched_end_is_a_noop() {
        let hooks = adapter();
        hooks.begin_workflow("wf");
        assert!(hooks
            .finish_pending(&hooks.pending_tools, "never-started", "tool", None, None)
            .is_none());
        assert!(hooks.finish_workflow(None).is_some());
        // Second workflow end has nothing to match
        assert!(hooks.finish_workflow(None).is_none());
    }

    #[tokio::test]
    async fn test_abandoned_start_stays_pending() {
        let hooks = adapter();
        hooks.on_tool_start("inv-1", "search", None);
        hooks.on_tool_start("inv-2", "fetch", None);
        hooks.on_tool_end("inv-1", None);
        // inv-2 never finished: deliberately left in place
        assert_eq!(hooks.pending_tools.lock().len(), 1);
        assert!(hooks.pending_tools.lock().contains_key("inv-2"));
    }

    #[tokio::test]
    async fn test_task_pair_maps_to_task_type() {
        let hooks = adapter();
        hooks.begin_workflow("wf");
        hooks.on_task_start("step-1", "plan", None);
        let record = hooks
            .finish_pending(&hooks.pending_tasks, "step-1", "task", None, None)
            .unwrap();
        assert_eq!(record.log_type, LogType::Task);
    }

    #[tokio::test]
    async fn test_tool_error_carries_message() {
        let hooks = adapter();
        hooks.on_tool_start("inv-1", "search", None);
        let record = hooks
            .finish_pending(&hooks.pending_tools, "inv-1", "tool", None, Some("boom".into()))
            .unwrap();
        assert_eq!(record.error_message.as_deref(), Some("boom"));
    }
}
