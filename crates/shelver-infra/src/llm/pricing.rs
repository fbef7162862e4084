//! Cost computation for LLM usage.
//!
//! Prices are configuration (USD per million tokens); estimates are clearly
//! labeled as approximate when formatted (`~$0.12`).

/// Compute cost in USD given token counts and per-million rates.
pub fn compute_cost(
    prompt_tokens: u64,
    completion_tokens: u64,
    input_cost_per_million: f64,
    output_cost_per_million: f64,
) -> f64 {
    let input_cost = (prompt_tokens as f64 / 1_000_000.0) * input_cost_per_million;
    let output_cost = (completion_tokens as f64 / 1_000_000.0) * output_cost_per_million;
    input_cost + output_cost
}

/// Format a cost estimate as a human-readable string.
///
/// Always prefixed with `~` to indicate the value is an estimate.
/// - Costs below $0.01 use 3 decimal places: `~$0.001`
/// - Costs $0.01 and above use 2 decimal places: `~$0.12`
pub fn format_cost(cost: f64) -> String {
    if cost < 0.01 {
        format!("~${cost:.3}")
    } else {
        format!("~${cost:.2}")
    }
}
