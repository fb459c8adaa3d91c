//! Payload value normalization
//!
//! Vendor instrumentation hands the exporter arbitrarily nested payloads:
//! request/response bodies, metadata maps, tool inputs. `PayloadValue` is the
//! crate's representation of such a value, and [`normalize`] converts it into
//! a JSON-safe `serde_json::Value` that can go on the wire unchanged.
//!
//! Maps and lists are `Arc`-shared so aliased and self-referential structures
//! are expressible; normalization breaks reference cycles with a `"[CYCLE]"`
//! marker instead of recursing forever.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::Value as JsonValue;

/// Marker substituted for a container that is already on the current
/// recursion path.
pub const CYCLE_MARKER: &str = "[CYCLE]";

/// Shared map node of a payload tree.
pub type PayloadMap = Arc<RwLock<BTreeMap<String, PayloadValue>>>;

/// Shared list node of a payload tree.
pub type PayloadList = Arc<RwLock<Vec<PayloadValue>>>;

/// An arbitrary value captured from vendor instrumentation.
#[derive(Debug, Clone)]
pub enum PayloadValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
    Map(PayloadMap),
    List(PayloadList),
}

impl PayloadValue {
    /// Create an empty shared map.
    pub fn new_map() -> Self {
        PayloadValue::Map(Arc::new(RwLock::new(BTreeMap::new())))
    }

    /// Create an empty shared list.
    pub fn new_list() -> Self {
        PayloadValue::List(Arc::new(RwLock::new(Vec::new())))
    }

    /// Insert into a map value. Returns `false` for non-map values.
    pub fn insert(&self, key: impl Into<String>, value: PayloadValue) -> bool {
        match self {
            PayloadValue::Map(m) => {
                m.write().insert(key.into(), value);
                true
            }
            _ => false,
        }
    }

    /// Append to a list value. Returns `false` for non-list values.
    pub fn push(&self, value: PayloadValue) -> bool {
        match self {
            PayloadValue::List(l) => {
                l.write().push(value);
                true
            }
            _ => false,
        }
    }
}

impl From<bool> for PayloadValue {
    fn from(b: bool) -> Self {
        PayloadValue::Bool(b)
    }
}

impl From<i64> for PayloadValue {
    fn from(i: i64) -> Self {
        PayloadValue::Int(i)
    }
}

impl From<i32> for PayloadValue {
    fn from(i: i32) -> Self {
        PayloadValue::Int(i as i64)
    }
}

impl From<f64> for PayloadValue {
    fn from(f: f64) -> Self {
        PayloadValue::Float(f)
    }
}

impl From<&str> for PayloadValue {
    fn from(s: &str) -> Self {
        PayloadValue::Text(s.to_string())
    }
}

impl From<String> for PayloadValue {
    fn from(s: String) -> Self {
        PayloadValue::Text(s)
    }
}

impl From<DateTime<Utc>> for PayloadValue {
    fn from(dt: DateTime<Utc>) -> Self {
        PayloadValue::Timestamp(dt)
    }
}

impl From<uuid::Uuid> for PayloadValue {
    fn from(id: uuid::Uuid) -> Self {
        // Normalized alongside UUID strings by the identifier formatter.
        PayloadValue::Text(id.to_string())
    }
}

impl From<JsonValue> for PayloadValue {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => PayloadValue::Null,
            JsonValue::Bool(b) => PayloadValue::Bool(b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    PayloadValue::Int(i)
                } else {
                    PayloadValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            JsonValue::String(s) => PayloadValue::Text(s),
            JsonValue::Array(items) => {
                let list = PayloadValue::new_list();
                for item in items {
                    list.push(item.into());
                }
                list
            }
            JsonValue::Object(entries) => {
                let map = PayloadValue::new_map();
                for (k, v) in entries {
                    map.insert(k, v.into());
                }
                map
            }
        }
    }
}

/// Convert a payload value into a JSON-safe value.
///
/// Non-finite floats become `null`, byte strings decode as UTF-8 with
/// replacement, timestamps render as UTC ISO-8601, and containers recurse
/// with cycle detection. Never fails.
pub fn normalize(value: &PayloadValue) -> JsonValue {
    let mut path = Vec::new();
    normalize_inner(value, &mut path)
}

fn normalize_inner(value: &PayloadValue, path: &mut Vec<usize>) -> JsonValue {
    match value {
        PayloadValue::Null => JsonValue::Null,
        PayloadValue::Bool(b) => JsonValue::Bool(*b),
        PayloadValue::Int(i) => JsonValue::from(*i),
        PayloadValue::Float(f) => {
            if f.is_finite() {
                JsonValue::from(*f)
            } else {
                JsonValue::Null
            }
        }
        PayloadValue::Text(s) => JsonValue::String(s.clone()),
        PayloadValue::Bytes(b) => JsonValue::String(String::from_utf8_lossy(b).into_owned()),
        PayloadValue::Timestamp(dt) => JsonValue::String(crate::time::to_iso(dt)),
        PayloadValue::Map(m) => {
            let identity = Arc::as_ptr(m) as usize;
            if path.contains(&identity) {
                return JsonValue::String(CYCLE_MARKER.to_string());
            }
            path.push(identity);
            let entries = m.read();
            let mut out = serde_json::Map::with_capacity(entries.len());
            for (key, child) in entries.iter() {
                out.insert(key.clone(), normalize_inner(child, path));
            }
            drop(entries);
            path.pop();
            JsonValue::Object(out)
        }
        PayloadValue::List(l) => {
            let identity = Arc::as_ptr(l) as usize;
            if path.contains(&identity) {
                return JsonValue::Array(vec![JsonValue::String(CYCLE_MARKER.to_string())]);
            }
            path.push(identity);
            let items = l.read();
            let mut out = Vec::with_capacity(items.len());
            for child in items.iter() {
                out.push(normalize_inner(child, path));
            }
            drop(items);
            path.pop();
            JsonValue::Array(out)
        }
    }
}
