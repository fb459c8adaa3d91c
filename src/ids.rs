//! Identifier formatting
//!
//! Span and trace identifiers arrive as UUIDs, UUID strings, vendor-native
//! integers, or raw OTel id bytes. [`format_id`] collapses all of them into
//! one canonical string form so two representations of the same id compare
//! equal: UUIDs become 32-char lowercase hex with no separators, integers
//! stay decimal, byte ids become lowercase hex.

use uuid::Uuid;

use crate::value::PayloadValue;

/// Format an identifier value into its canonical string form.
///
/// `Null` and booleans yield `None`; a boolean is integer-like but never a
/// real id. Text that does not parse as a UUID is a vendor-native id and is
/// preserved unchanged.
pub fn format_id(value: &PayloadValue) -> Option<String> {
    match value {
        PayloadValue::Null | PayloadValue::Bool(_) => None,
        PayloadValue::Text(s) => match Uuid::parse_str(s) {
            Ok(id) => Some(id.simple().to_string()),
            Err(_) => Some(s.clone()),
        },
        PayloadValue::Int(i) => Some(i.to_string()),
        PayloadValue::Bytes(b) => Some(hex::encode(b)),
        PayloadValue::Float(f) => Some(f.to_string()),
        PayloadValue::Timestamp(dt) => Some(crate::time::to_iso(dt)),
        other => serde_json::to_string(&crate::value::normalize(other)).ok(),
    }
}
