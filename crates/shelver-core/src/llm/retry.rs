//! Retry with exponential backoff and jitter.
//!
//! Only transient failures are retried; permanent and malformed responses
//! surface immediately. Jitter is derived from the clock's sub-second nanos
//! rather than a PRNG -- it only needs to decorrelate concurrent retries.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use shelver_types::llm::{Completion, CompletionRequest, LlmError};
use tracing::warn;

use super::client::CompletionClient;

/// Base delay for the first retry.
const BASE_DELAY_MS: u64 = 250;

/// Ceiling on the exponential component.
const MAX_DELAY_MS: u64 = 5_000;

/// Jitter added on top, in [0, 250) ms.
const JITTER_RANGE_MS: u64 = 250;

/// Delay before retry number `attempt` (1-based).
pub fn backoff_delay(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(5);
    let base = BASE_DELAY_MS
        .saturating_mul(2u64.saturating_pow(exponent))
        .min(MAX_DELAY_MS);
    let jitter_seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0);
    Duration::from_millis(base + jitter_seed % JITTER_RANGE_MS)
}

/// Call `complete` up to `max_attempts` times, backing off between transient
/// failures.
pub async fn complete_with_retry<C: CompletionClient>(
    client: &C,
    request: &CompletionRequest,
    max_attempts: u32,
) -> Result<Completion, LlmError> {
    let attempts = max_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        match client.complete(request).await {
            Ok(completion) => return Ok(completion),
            Err(err) if err.is_transient() && attempt < attempts => {
                let delay = backoff_delay(attempt);
                warn!(
                    attempt,
                    max_attempts = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient LLM failure, backing off"
                );
                tokio::time::sleep(delay).await;
                last_error = Some(err);
            }
            Err(err) => return Err(err),
        }
    }

    Err(last_error.unwrap_or_else(|| LlmError::Transient("retry budget exhausted".to_string())))
}
