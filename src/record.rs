//! The wire-ready log record
//!
//! One `TraceLog` is produced per observed span or event, handed to the
//! delivery layer, and discarded after the delivery attempt. Records are
//! never mutated once built.

use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;

/// Canonical category of a span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogType {
    Generation,
    Chat,
    Task,
    Tool,
    Agent,
    Workflow,
    Embedding,
    Score,
    Completion,
    Response,
    Transcription,
    Speech,
    Handoff,
    Guardrail,
    Unknown,
    /// Unrecognized vendor kind, passed through by name.
    Custom(String),
}

impl LogType {
    /// Map a vendor span kind/type tag onto a log type.
    ///
    /// Unrecognized non-empty tags pass through as [`LogType::Custom`];
    /// an absent or empty tag is [`LogType::Unknown`].
    pub fn from_kind(kind: Option<&str>) -> Self {
        let Some(kind) = kind else {
            return LogType::Unknown;
        };
        match kind.to_ascii_lowercase().as_str() {
            "" => LogType::Unknown,
            "llm" | "generation" | "model" => LogType::Generation,
            "chat" => LogType::Chat,
            "workflow" | "trace" | "chain" => LogType::Workflow,
            "task" | "step" | "retriever" | "reranker" => LogType::Task,
            "tool" | "function" => LogType::Tool,
            "agent" => LogType::Agent,
            "embedding" | "embed" => LogType::Embedding,
            "score" | "eval" | "evaluation" => LogType::Score,
            "completion" => LogType::Completion,
            "response" => LogType::Response,
            "transcription" => LogType::Transcription,
            "speech" => LogType::Speech,
            "handoff" => LogType::Handoff,
            "guardrail" => LogType::Guardrail,
            "unknown" => LogType::Unknown,
            other => LogType::Custom(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            LogType::Generation => "generation",
            LogType::Chat => "chat",
            LogType::Task => "task",
            LogType::Tool => "tool",
            LogType::Agent => "agent",
            LogType::Workflow => "workflow",
            LogType::Embedding => "embedding",
            LogType::Score => "score",
            LogType::Completion => "completion",
            LogType::Response => "response",
            LogType::Transcription => "transcription",
            LogType::Speech => "speech",
            LogType::Handoff => "handoff",
            LogType::Guardrail => "guardrail",
            LogType::Unknown => "unknown",
            LogType::Custom(name) => name,
        }
    }
}

impl Serialize for LogType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One normalized, wire-ready log record.
///
/// Identifier invariants: a root span has `span_parent_id == None` and
/// `trace_unique_id == span_unique_id`; every non-root span carries a parent
/// id referencing a span in the same batch or an already-delivered trace.
/// Ids are fixed-length hex for UUID-derived and OTel-native ids, decimal
/// for vendor-native integers, never with separator characters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceLog {
    pub trace_unique_id: String,
    pub span_unique_id: String,
    /// `null` on the wire marks a root span.
    pub span_parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_name: Option<String>,
    pub span_name: String,
    pub log_type: LogType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    pub timestamp: String,
    /// Seconds between span start and end; absent when either is unknown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_request_tokens: Option<i64>,
    /// Vendor-reported cost, or a static-table estimate; see
    /// [`crate::pricing::estimate_cost`] for the estimate caveats.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(skip_serializing_if = "JsonValue::is_null")]
    pub metadata: JsonValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_identifier: Option<String>,
}

impl TraceLog {
    pub fn is_root(&self) -> bool {
        self.span_parent_id.is_none()
    }
}
