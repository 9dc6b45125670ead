//! Model pricing tables and cost calculation.

use tide_core::usage::TokenUsage;

/// Per-million-token prices in USD.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PricingTier {
    /// Price per million prompt tokens.
    pub input_per_million: f64,
    /// Price per million completion tokens.
    pub output_per_million: f64,
    /// Multiplier applied to cached prompt tokens.
    pub cache_read_multiplier: f64,
}

const fn tier(input: f64, output: f64, cache_read_multiplier: f64) -> PricingTier {
    PricingTier {
        input_per_million: input,
        output_per_million: output,
        cache_read_multiplier,
    }
}

/// Prefix table, longest prefixes first so `gpt-4.1-mini` wins over `gpt-4.1`.
const PRICING: &[(&str, PricingTier)] = &[
    ("gpt-4.1-nano", tier(0.10, 0.40, 0.25)),
    ("gpt-4.1-mini", tier(0.40, 1.60, 0.25)),
    ("gpt-4.1", tier(2.00, 8.00, 0.25)),
    ("gpt-4o-mini", tier(0.15, 0.60, 0.5)),
    ("gpt-4o", tier(2.50, 10.00, 0.5)),
    ("o4-mini", tier(1.10, 4.40, 0.25)),
    ("o3", tier(2.00, 8.00, 0.25)),
    ("claude-opus-4", tier(15.00, 75.00, 0.1)),
    ("claude-sonnet-4", tier(3.00, 15.00, 0.1)),
    ("claude-3-5-haiku", tier(0.80, 4.00, 0.1)),
    ("gemini-2.5-pro", tier(1.25, 10.00, 0.25)),
    ("gemini-2.5-flash", tier(0.30, 2.50, 0.25)),
];

/// Look up the pricing tier for a model identifier.
///
/// Provider prefixes such as `openai/` are ignored. Unknown models are free,
/// so local and self-hosted endpoints report zero cost.
pub fn get_pricing_tier(model: &str) -> Option<PricingTier> {
    let m = model.to_lowercase();
    let m = m.rsplit('/').next().unwrap_or(&m);
    PRICING
        .iter()
        .find(|(prefix, _)| m.starts_with(prefix))
        .map(|(_, tier)| *tier)
}

/// Cost in USD of one call's usage. Missing usage fields count as zero.
#[allow(clippy::cast_precision_loss)] // Token counts never approach 2^52
pub fn calculate_cost(model: &str, usage: &TokenUsage) -> f64 {
    let Some(tier) = get_pricing_tier(model) else {
        return 0.0;
    };
    let input = usage.prompt_tokens.unwrap_or(0);
    let output = usage.completion_tokens.unwrap_or(0);
    let cached = usage.cache_read_tokens.unwrap_or(0).min(input);

    let base_input = (input - cached) as f64 / 1_000_000.0 * tier.input_per_million;
    let cached_input =
        cached as f64 / 1_000_000.0 * tier.input_per_million * tier.cache_read_multiplier;
    let output_cost = output as f64 / 1_000_000.0 * tier.output_per_million;

    base_input + cached_input + output_cost
}

/// Format a cost value for display.
///
/// Uses 3 decimal places for values under $0.01, 2 otherwise.
pub fn format_cost(cost: f64) -> String {
    if cost < 0.01 {
        format!("${cost:.3}")
    } else {
        format!("${cost:.2}")
    }
}
