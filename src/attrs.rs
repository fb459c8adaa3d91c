//! Platform span-attribute keys and OTel attribute extraction
//!
//! Instrumented code attaches `keywordsai.*` attributes to its OpenTelemetry
//! spans; the exporter reads them back, together with the `gen_ai.*`
//! semantic conventions, when converting spans into log records. Token
//! counts are looked up through primary-plus-fallback key tables because
//! every instrumentation library spells them differently.

use opentelemetry::{KeyValue, Value};
use opentelemetry_semantic_conventions::attribute::{
    GEN_AI_OPERATION_NAME, GEN_AI_REQUEST_MODEL, GEN_AI_RESPONSE_MODEL,
    GEN_AI_USAGE_INPUT_TOKENS, GEN_AI_USAGE_OUTPUT_TOKENS,
};

/// Keywords AI span attribute names.
pub struct KeywordsAttributes;

impl KeywordsAttributes {
    pub const SPAN_TYPE: &'static str = "keywordsai.span.type";
    pub const TRACE_NAME: &'static str = "keywordsai.trace.name";
    pub const CUSTOMER_ID: &'static str = "keywordsai.customer.id";
    pub const SESSION_ID: &'static str = "keywordsai.session.id";
    pub const SPAN_INPUT: &'static str = "keywordsai.span.input";
    pub const SPAN_OUTPUT: &'static str = "keywordsai.span.output";
    pub const METADATA: &'static str = "keywordsai.metadata";
    pub const COST: &'static str = "keywordsai.cost";
}

/// Builder for attaching platform attributes to an instrumented span.
#[derive(Debug, Default)]
pub struct SpanAttributesBuilder {
    attributes: Vec<KeyValue>,
}

impl SpanAttributesBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag the span kind ("llm", "task", "tool", ...).
    pub fn with_span_type(mut self, span_type: impl Into<String>) -> Self {
        self.attributes
            .push(KeyValue::new(KeywordsAttributes::SPAN_TYPE, span_type.into()));
        self
    }

    pub fn with_trace_name(mut self, name: impl Into<String>) -> Self {
        self.attributes
            .push(KeyValue::new(KeywordsAttributes::TRACE_NAME, name.into()));
        self
    }

    pub fn with_customer_identifier(mut self, id: impl Into<String>) -> Self {
        self.attributes
            .push(KeyValue::new(KeywordsAttributes::CUSTOMER_ID, id.into()));
        self
    }

    pub fn with_session_identifier(mut self, id: impl Into<String>) -> Self {
        self.attributes
            .push(KeyValue::new(KeywordsAttributes::SESSION_ID, id.into()));
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.attributes
            .push(KeyValue::new(GEN_AI_REQUEST_MODEL, model.into()));
        self
    }

    /// JSON-rendered span input.
    pub fn with_input(mut self, input: serde_json::Value) -> Self {
        self.attributes
            .push(KeyValue::new(KeywordsAttributes::SPAN_INPUT, input.to_string()));
        self
    }

    /// JSON-rendered span output.
    pub fn with_output(mut self, output: serde_json::Value) -> Self {
        self.attributes
            .push(KeyValue::new(KeywordsAttributes::SPAN_OUTPUT, output.to_string()));
        self
    }

    /// JSON-rendered metadata map.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.attributes
            .push(KeyValue::new(KeywordsAttributes::METADATA, metadata.to_string()));
        self
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.attributes
            .push(KeyValue::new(KeywordsAttributes::COST, cost));
        self
    }

    pub fn build(self) -> Vec<KeyValue> {
        self.attributes
    }
}

// ============================================================================
// ATTRIBUTE EXTRACTION
// ============================================================================

fn find<'a>(attrs: &'a [KeyValue], key: &str) -> Option<&'a Value> {
    attrs
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| &kv.value)
}

/// String value of an attribute, if present.
pub fn attr_str(attrs: &[KeyValue], key: &str) -> Option<String> {
    match find(attrs, key)? {
        Value::String(s) => Some(s.as_str().to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::I64(i) => Some(i.to_string()),
        Value::F64(f) => Some(f.to_string()),
        other => Some(format!("{other:?}")),
    }
}

/// Integer value of an attribute; stringified integers are accepted.
pub fn attr_i64(attrs: &[KeyValue], key: &str) -> Option<i64> {
    match find(attrs, key)? {
        Value::I64(i) => Some(*i),
        Value::F64(f) if f.is_finite() => Some(*f as i64),
        Value::String(s) => s.as_str().parse().ok(),
        _ => None,
    }
}

/// Float value of an attribute; stringified floats are accepted.
pub fn attr_f64(attrs: &[KeyValue], key: &str) -> Option<f64> {
    match find(attrs, key)? {
        Value::F64(f) => Some(*f),
        Value::I64(i) => Some(*i as f64),
        Value::String(s) => s.as_str().parse().ok(),
        _ => None,
    }
}

/// Token count lookup with fallback key names.
struct TokenKeys {
    primary: &'static str,
    fallbacks: &'static [&'static str],
}

impl TokenKeys {
    fn extract(&self, attrs: &[KeyValue]) -> Option<i64> {
        attr_i64(attrs, self.primary)
            .or_else(|| self.fallbacks.iter().find_map(|key| attr_i64(attrs, key)))
    }
}

const INPUT_TOKENS: TokenKeys = TokenKeys {
    primary: GEN_AI_USAGE_INPUT_TOKENS,
    fallbacks: &[
        "gen_ai.usage.prompt_tokens",
        "llm.usage.prompt_tokens",
        "llm.token_count.prompt",
    ],
};

const OUTPUT_TOKENS: TokenKeys = TokenKeys {
    primary: GEN_AI_USAGE_OUTPUT_TOKENS,
    fallbacks: &[
        "gen_ai.usage.completion_tokens",
        "llm.usage.completion_tokens",
        "llm.token_count.completion",
    ],
};

/// `(prompt_tokens, completion_tokens)` from a span's attribute list.
pub fn token_usage_from_attributes(attrs: &[KeyValue]) -> (Option<i64>, Option<i64>) {
    (INPUT_TOKENS.extract(attrs), OUTPUT_TOKENS.extract(attrs))
}

/// Model name: the response-reported model wins over the requested one.
pub fn model_from_attributes(attrs: &[KeyValue]) -> Option<String> {
    attr_str(attrs, GEN_AI_RESPONSE_MODEL).or_else(|| attr_str(attrs, GEN_AI_REQUEST_MODEL))
}

/// Span kind tag: the explicit platform tag wins over `gen_ai.operation.name`.
pub fn span_type_from_attributes(attrs: &[KeyValue]) -> Option<String> {
    attr_str(attrs, KeywordsAttributes::SPAN_TYPE)
        .or_else(|| attr_str(attrs, GEN_AI_OPERATION_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_produces_platform_keys() {
        let attrs = SpanAttributesBuilder::new()
            .with_span_type("llm")
            .with_model("gpt-4o")
            .with_input(json!({"messages": []}))
            .with_cost(0.002)
            .build();

        assert_eq!(
            attr_str(&attrs, KeywordsAttributes::SPAN_TYPE).as_deref(),
            Some("llm")
        );
        assert_eq!(attr_str(&attrs, GEN_AI_REQUEST_MODEL).as_deref(), Some("gpt-4o"));
        assert_eq!(
            attr_str(&attrs, KeywordsAttributes::SPAN_INPUT).as_deref(),
            Some(r#"{"messages":[]}"#)
        );
        assert_eq!(attr_f64(&attrs, KeywordsAttributes::COST), Some(0.002));
    }

    #[test]
    fn test_token_usage_primary_keys() {
        let attrs = vec![
            KeyValue::new(GEN_AI_USAGE_INPUT_TOKENS, 12i64),
            KeyValue::new(GEN_AI_USAGE_OUTPUT_TOKENS, 34i64),
        ];
        assert_eq!(token_usage_from_attributes(&attrs), (Some(12), Some(34)));
    }

    #[test]
    fn test_token_usage_fallback_keys() {
        let attrs = vec![
            KeyValue::new("llm.usage.prompt_tokens", 7i64),
            KeyValue::new("llm.token_count.completion", "9"),
        ];
        assert_eq!(token_usage_from_attributes(&attrs), (Some(7), Some(9)));
    }

    #[test]
    fn test_token_usage_missing_sides() {
        let attrs = vec![KeyValue::new(GEN_AI_USAGE_INPUT_TOKENS, 5i64)];
        assert_eq!(token_usage_from_attributes(&attrs), (Some(5), None));
        assert_eq!(token_usage_from_attributes(&[]), (None, None));
    }

    #[test]
    fn test_model_response_wins_over_request() {
        let attrs = vec![
            KeyValue::new(GEN_AI_REQUEST_MODEL, "gpt-4o"),
            KeyValue::new(GEN_AI_RESPONSE_MODEL, "gpt-4o-2024-08-06"),
        ];
        assert_eq!(
            model_from_attributes(&attrs).as_deref(),
            Some("gpt-4o-2024-08-06")
        );
    }

    #[test]
    fn test_span_type_platform_tag_wins() {
        let attrs = vec![
            KeyValue::new(GEN_AI_OPERATION_NAME, "chat"),
            KeyValue::new(KeywordsAttributes::SPAN_TYPE, "workflow"),
        ];
        assert_eq!(span_type_from_attributes(&attrs).as_deref(), Some("workflow"));
    }
}
