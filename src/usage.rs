//! Token usage extraction
//!
//! Usage counters hide in several places depending on the vendor: top-level
//! `metrics`, alias key names, one level deeper under `usage` or `tokens`,
//! or the same shapes under `metadata`. The search stops at the first source
//! that yields at least one count, so a vendor that reports only prompt
//! tokens does not get its completion count backfilled from a lower-priority
//! location.

use serde_json::Value as JsonValue;

const ROOTS: [&str; 2] = ["metrics", "metadata"];
const NESTED: [&str; 2] = ["usage", "tokens"];
const ALIASES: [(&str, &str); 2] = [
    ("prompt_tokens", "completion_tokens"),
    ("input_tokens", "output_tokens"),
];

fn count_at(container: &JsonValue, key: &str) -> Option<i64> {
    let v = container.get(key)?;
    v.as_i64()
        .or_else(|| v.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
}

/// Probe one container with both alias pairs.
fn probe(container: &JsonValue) -> Option<(Option<i64>, Option<i64>)> {
    if !container.is_object() {
        return None;
    }
    for (prompt_key, completion_key) in ALIASES {
        let prompt = count_at(container, prompt_key);
        let completion = count_at(container, completion_key);
        if prompt.is_some() || completion.is_some() {
            return Some((prompt, completion));
        }
    }
    None
}

/// Extract `(prompt_tokens, completion_tokens)` from a record.
///
/// Searches `record.metrics` then `record.metadata`; within each, the direct
/// keys first, then the `usage` and `tokens` sub-objects, trying the
/// `prompt/completion` names before the `input/output` aliases.
pub fn extract_token_usage(record: &JsonValue) -> (Option<i64>, Option<i64>) {
    for root_key in ROOTS {
        let Some(root) = record.get(root_key) else {
            continue;
        };
        if let Some(found) = probe(root) {
            return found;
        }
        for nested_key in NESTED {
            if let Some(found) = root.get(nested_key).and_then(probe) {
                return found;
            }
        }
    }
    (None, None)
}

/// Total token count from its two sides.
///
/// `None` only when both sides are missing ("no usage data at all"); a
/// single missing side counts as zero ("usage was partially reported").
pub fn compute_total_request_tokens(
    prompt_tokens: Option<i64>,
    completion_tokens: Option<i64>,
) -> Option<i64> {
    if prompt_tokens.is_none() && completion_tokens.is_none() {
        return None;
    }
    Some(prompt_tokens.unwrap_or(0) + completion_tokens.unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_direct_metrics_keys() {
        let record = json!({"metrics": {"prompt_tokens": 5}});
        assert_eq!(extract_token_usage(&record), (Some(5), None));

        let record = json!({"metrics": {"prompt_tokens": 5, "completion_tokens": 7}});
        assert_eq!(extract_token_usage(&record), (Some(5), Some(7)));
    }

    #[test]
    fn test_alias_keys() {
        let record = json!({"metrics": {"input_tokens": 3, "output_tokens": 4}});
        assert_eq!(extract_token_usage(&record), (Some(3), Some(4)));
    }

    #[test]
    fn test_primary_names_win_over_aliases() {
        let record = json!({"metrics": {
            "prompt_tokens": 1,
            "input_tokens": 99,
            "output_tokens": 98,
        }});
        // First alias pair already yielded a value, so the search stops there.
        assert_eq!(extract_token_usage(&record), (Some(1), None));
    }

    #[test]
    fn test_nested_usage_container() {
        let record = json!({"metrics": {"usage": {"prompt_tokens": 11, "completion_tokens": 12}}});
        assert_eq!(extract_token_usage(&record), (Some(11), Some(12)));
    }

    #[test]
    fn test_nested_tokens_container_with_aliases() {
        let record = json!({"metrics": {"tokens": {"input_tokens": 8}}});
        assert_eq!(extract_token_usage(&record), (Some(8), None));
    }

    #[test]
    fn test_metadata_fallback() {
        let record = json!({"metadata": {"usage": {"prompt_tokens": 2, "completion_tokens": 3}}});
        assert_eq!(extract_token_usage(&record), (Some(2), Some(3)));
    }

    #[test]
    fn test_metrics_beat_metadata() {
        let record = json!({
            "metrics": {"prompt_tokens": 1},
            "metadata": {"prompt_tokens": 100, "completion_tokens": 100},
        });
        assert_eq!(extract_token_usage(&record), (Some(1), None));
    }

    #[test]
    fn test_no_usage_anywhere() {
        assert_eq!(extract_token_usage(&json!({})), (None, None));
        assert_eq!(
            extract_token_usage(&json!({"metrics": {"latency": 1.0}})),
            (None, None)
        );
    }

    #[test]
    fn test_float_counts_accepted() {
        let record = json!({"metrics": {"prompt_tokens": 5.0}});
        assert_eq!(extract_token_usage(&record), (Some(5), None));
    }

    #[test]
    fn test_total_asymmetry() {
        assert_eq!(compute_total_request_tokens(Some(5), None), Some(5));
        assert_eq!(compute_total_request_tokens(None, Some(4)), Some(4));
        assert_eq!(compute_total_request_tokens(Some(5), Some(4)), Some(9));
        assert_eq!(compute_total_request_tokens(None, None), None);
    }
}
