//! Trace context for per-call attribution
//!
//! Holds the customer/session identifiers, trace name, tags, and metadata
//! that adapters stamp onto the records they build. The context is an
//! explicit object owned by the caller (pass one per session or test to
//! avoid cross-instance leakage); a process-wide instance is kept for the
//! common single-tenant case.

use std::sync::{Arc, RwLock};

use serde_json::{Map as JsonMap, Value as JsonValue};

#[derive(Debug, Default)]
struct ContextInner {
    customer_identifier: Option<String>,
    session_identifier: Option<String>,
    trace_name: Option<String>,
    tags: Vec<String>,
    metadata: JsonMap<String, JsonValue>,
}

/// Thread-safe trace attribution state.
#[derive(Clone, Debug, Default)]
pub struct TraceContext {
    inner: Arc<RwLock<ContextInner>>,
}

impl TraceContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the customer identifier for subsequent records.
    pub fn set_customer_identifier(&self, id: impl Into<String>) -> &Self {
        self.inner.write().unwrap().customer_identifier = Some(id.into());
        self
    }

    /// Set the session identifier for subsequent records.
    pub fn set_session_identifier(&self, id: impl Into<String>) -> &Self {
        self.inner.write().unwrap().session_identifier = Some(id.into());
        self
    }

    /// Name the trace that root spans will carry.
    pub fn set_trace_name(&self, name: impl Into<String>) -> &Self {
        self.inner.write().unwrap().trace_name = Some(name.into());
        self
    }

    /// Add a tag, keeping the existing ones.
    pub fn add_tag(&self, tag: impl Into<String>) -> &Self {
        let tag = tag.into();
        let mut inner = self.inner.write().unwrap();
        if !inner.tags.contains(&tag) {
            inner.tags.push(tag);
        }
        drop(inner);
        self
    }

    /// Replace the tag list.
    pub fn set_tags(&self, tags: Vec<String>) -> &Self {
        self.inner.write().unwrap().tags = tags;
        self
    }

    /// Merge one metadata entry; later writes win over earlier ones.
    pub fn set_metadata(&self, key: impl Into<String>, value: JsonValue) -> &Self {
        self.inner
            .write()
            .unwrap()
            .metadata
            .insert(key.into(), value);
        self
    }

    /// Drop all attribution state.
    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap();
        *inner = ContextInner::default();
    }

    pub fn customer_identifier(&self) -> Option<String> {
        self.inner.read().unwrap().customer_identifier.clone()
    }

    pub fn session_identifier(&self) -> Option<String> {
        self.inner.read().unwrap().session_identifier.clone()
    }

    pub fn trace_name(&self) -> Option<String> {
        self.inner.read().unwrap().trace_name.clone()
    }

    pub fn tags(&self) -> Vec<String> {
        self.inner.read().unwrap().tags.clone()
    }

    /// Per-call metadata snapshot, including tags when present.
    pub fn metadata(&self) -> JsonMap<String, JsonValue> {
        let inner = self.inner.read().unwrap();
        let mut out = inner.metadata.clone();
        if !inner.tags.is_empty() {
            out.insert("tags".to_string(), JsonValue::from(inner.tags.clone()));
        }
        out
    }
}

lazy_static::lazy_static! {
    /// Process-wide context used when no explicit one is supplied.
    pub static ref GLOBAL_CONTEXT: TraceContext = TraceContext::new();
}

/// Set the customer identifier on the process-wide context.
pub fn set_customer_identifier(id: impl Into<String>) {
    GLOBAL_CONTEXT.set_customer_identifier(id);
}

/// Set the session identifier on the process-wide context.
pub fn set_session_identifier(id: impl Into<String>) {
    GLOBAL_CONTEXT.set_session_identifier(id);
}

/// Name the trace on the process-wide context.
pub fn set_trace_name(name: impl Into<String>) {
    GLOBAL_CONTEXT.set_trace_name(name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identifiers_round_trip() {
        let ctx = TraceContext::new();
        ctx.set_customer_identifier("cust-1")
            .set_session_identifier("sess-9")
            .set_trace_name("checkout");
        assert_eq!(ctx.customer_identifier().as_deref(), Some("cust-1"));
        assert_eq!(ctx.session_identifier().as_deref(), Some("sess-9"));
        assert_eq!(ctx.trace_name().as_deref(), Some("checkout"));
    }

    #[test]
    fn test_tags_deduplicate() {
        let ctx = TraceContext::new();
        ctx.add_tag("prod").add_tag("batch").add_tag("prod");
        assert_eq!(ctx.tags(), vec!["prod".to_string(), "batch".to_string()]);
    }

    #[test]
    fn test_metadata_includes_tags() {
        let ctx = TraceContext::new();
        ctx.set_metadata("env", json!("staging")).add_tag("prod");
        let meta = ctx.metadata();
        assert_eq!(meta["env"], json!("staging"));
        assert_eq!(meta["tags"], json!(["prod"]));
    }

    #[test]
    fn test_clear_resets_everything() {
        let ctx = TraceContext::new();
        ctx.set_customer_identifier("cust").add_tag("x");
        ctx.clear();
        assert_eq!(ctx.customer_identifier(), None);
        assert!(ctx.tags().is_empty());
        assert!(ctx.metadata().is_empty());
    }

    #[test]
    fn test_instances_do_not_share_state() {
        let a = TraceContext::new();
        let b = TraceContext::new();
        a.set_customer_identifier("only-a");
        assert_eq!(b.customer_identifier(), None);
    }
}
