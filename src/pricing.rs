//! Static model pricing fallback
//!
//! When a vendor does not report cost, the builder can estimate it from a
//! compile-time table of per-million-token USD prices. The estimate is a
//! best-effort approximation for dashboards, never authoritative billing:
//! prices drift, and the table carries no staleness information. Callers who
//! need real cost must take the vendor-reported value.

/// `(model key, input USD per 1M tokens, output USD per 1M tokens)`
///
/// Keys are lowercase. Dated releases resolve through the family prefix.
const PRICES_PER_MILLION: &[(&str, f64, f64)] = &[
    ("gpt-4o", 2.50, 10.00),
    ("gpt-4o-mini", 0.15, 0.60),
    ("gpt-4.1", 2.00, 8.00),
    ("gpt-4.1-mini", 0.40, 1.60),
    ("gpt-4-turbo", 10.00, 30.00),
    ("gpt-3.5-turbo", 0.50, 1.50),
    ("o3", 2.00, 8.00),
    ("o4-mini", 1.10, 4.40),
    ("claude-3-5-haiku", 0.80, 4.00),
    ("claude-3-5-sonnet", 3.00, 15.00),
    ("claude-3-7-sonnet", 3.00, 15.00),
    ("claude-sonnet-4", 3.00, 15.00),
    ("claude-opus-4", 15.00, 75.00),
    ("gemini-2.0-flash", 0.10, 0.40),
    ("gemini-2.5-pro", 1.25, 10.00),
    ("mistral-large", 2.00, 6.00),
    ("llama-3.1-70b", 0.72, 0.72),
    ("llama-3.1-8b", 0.18, 0.18),
];

/// Look up per-million prices for a model.
///
/// Exact key match first; otherwise the longest table key that prefixes the
/// model name wins, so `gpt-4o-2024-08-06` resolves to the `gpt-4o` family
/// while `gpt-4o-mini-2024-07-18` still prefers `gpt-4o-mini`.
fn lookup(model: &str) -> Option<(f64, f64)> {
    let needle = model.trim().to_ascii_lowercase();
    // Provider-prefixed names ("openai/gpt-4o", "azure/gpt-4o") drop the prefix.
    let needle = needle.rsplit('/').next().unwrap_or(&needle);

    if let Some((_, input, output)) = PRICES_PER_MILLION.iter().find(|(k, _, _)| *k == needle) {
        return Some((*input, *output));
    }
    PRICES_PER_MILLION
        .iter()
        .filter(|(k, _, _)| needle.starts_with(k))
        .max_by_key(|(k, _, _)| k.len())
        .map(|(_, input, output)| (*input, *output))
}

/// Estimate the USD cost of a call from token counts.
///
/// Returns `None` for unknown models or when neither count is available.
/// The result is an estimate from a static price table; it must not be
/// presented as authoritative billing.
pub fn estimate_cost(
    model: &str,
    prompt_tokens: Option<i64>,
    completion_tokens: Option<i64>,
) -> Option<f64> {
    if prompt_tokens.is_none() && completion_tokens.is_none() {
        return None;
    }
    let (input_per_million, output_per_million) = lookup(model)?;
    let prompt = prompt_tokens.unwrap_or(0).max(0) as f64;
    let completion = completion_tokens.unwrap_or(0).max(0) as f64;
    Some((prompt * input_per_million + completion * output_per_million) / 1_000_000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        let cost = estimate_cost("gpt-4o", Some(1_000_000), Some(1_000_000)).unwrap();
        assert!((cost - 12.50).abs() < 1e-9);
    }

    #[test]
    fn test_family_prefix_match() {
        let dated = estimate_cost("gpt-4o-2024-08-06", Some(1_000_000), None).unwrap();
        assert!((dated - 2.50).abs() < 1e-9);

        // Longest prefix wins: the mini family, not the gpt-4o family.
        let mini = estimate_cost("gpt-4o-mini-2024-07-18", Some(1_000_000), None).unwrap();
        assert!((mini - 0.15).abs() < 1e-9);
    }

    #[test]
    fn test_provider_prefix_stripped() {
        let cost = estimate_cost("azure/gpt-4o", Some(2_000_000), None).unwrap();
        assert!((cost - 5.00).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_model_is_none() {
        assert_eq!(estimate_cost("house-model-v2", Some(100), Some(100)), None);
    }

    #[test]
    fn test_no_usage_is_none() {
        assert_eq!(estimate_cost("gpt-4o", None, None), None);
    }

    #[test]
    fn test_partial_usage_estimates() {
        let cost = estimate_cost("gpt-4o", None, Some(1_000_000)).unwrap();
        assert!((cost - 10.00).abs() < 1e-9);
    }
}
