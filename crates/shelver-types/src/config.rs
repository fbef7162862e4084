//! Service configuration.
//!
//! `ShelverConfig` is the top-level `config.toml`. Every field has a serde
//! default so a missing or partial file still yields a runnable config;
//! the infra loader layers `SHELVER_*` environment overrides on top.

use serde::{Deserialize, Serialize};

/// Top-level configuration for the Shelver service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShelverConfig {
    /// Upper bound on input+output tokens per LLM call.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u64,

    /// Fraction of `max_tokens` reserved for the prompt.
    #[serde(default = "default_token_budget_percentage")]
    pub token_budget_percentage: f64,

    /// Model identifier passed to the LLM provider.
    #[serde(default = "default_model_name")]
    pub model_name: String,

    /// Base URL of the OpenAI-compatible chat-completions endpoint.
    #[serde(default = "default_llm_base_url")]
    pub llm_base_url: String,

    /// API key for the LLM provider. Usually supplied via `SHELVER_LLM_API_KEY`.
    #[serde(default)]
    pub llm_api_key: String,

    /// USD per million prompt tokens. The default is a deliberately
    /// pessimistic placeholder; set the real rate for your model so cost
    /// estimates are accurate rather than merely safe.
    #[serde(default = "default_input_cost")]
    pub input_cost_per_million: f64,

    /// USD per million completion tokens. Same pessimistic default as
    /// `input_cost_per_million`.
    #[serde(default = "default_output_cost")]
    pub output_cost_per_million: f64,

    /// Attempts per LLM call before giving up on transient failures.
    #[serde(default = "default_llm_retry_attempts")]
    pub llm_retry_attempts: u32,

    /// Sampling temperature for organize calls.
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Completion-token ceiling per LLM call.
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Directories with fewer files than this are not worth organizing.
    #[serde(default = "default_min_files_to_organize")]
    pub min_files_to_organize: usize,

    /// Per-item processing retries within a batch.
    #[serde(default = "default_max_retries_per_item")]
    pub max_retries_per_item: u32,

    /// Callback delivery retries before the batch is force-completed.
    #[serde(default = "default_max_callback_retries")]
    pub max_callback_retries: u32,

    /// Scheduler re-entry delay in milliseconds.
    #[serde(default = "default_alarm_interval_ms")]
    pub alarm_interval_ms: u64,

    /// Base URL of the entity store.
    #[serde(default = "default_store_base_url")]
    pub store_base_url: String,

    /// Base URL of the upstream orchestrator receiving callbacks.
    #[serde(default = "default_orchestrator_base_url")]
    pub orchestrator_base_url: String,

    /// SQLite database path for batch state.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Listen address for the HTTP surface.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Per-request timeout for outbound HTTP (LLM, store, callback), seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_max_tokens() -> u64 {
    128_000
}

fn default_token_budget_percentage() -> f64 {
    0.7
}

fn default_model_name() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

// Conservative fallback pricing: at or above the priciest realistic
// provider rate, so an unconfigured deployment over-reports cost rather
// than silently under-reporting it.
fn default_input_cost() -> f64 {
    5.0
}

fn default_output_cost() -> f64 {
    15.0
}

fn default_llm_retry_attempts() -> u32 {
    3
}

fn default_temperature() -> f64 {
    0.3
}

fn default_max_output_tokens() -> u32 {
    8_192
}

fn default_min_files_to_organize() -> usize {
    3
}

fn default_max_retries_per_item() -> u32 {
    3
}

fn default_max_callback_retries() -> u32 {
    3
}

fn default_alarm_interval_ms() -> u64 {
    100
}

fn default_store_base_url() -> String {
    "http://localhost:7070".to_string()
}

fn default_orchestrator_base_url() -> String {
    "http://localhost:7071".to_string()
}

fn default_database_path() -> String {
    "shelver.db".to_string()
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for ShelverConfig {
    fn default() -> Self {
        ShelverConfig {
            max_tokens: default_max_tokens(),
            token_budget_percentage: default_token_budget_percentage(),
            model_name: default_model_name(),
            llm_base_url: default_llm_base_url(),
            llm_api_key: String::new(),
            input_cost_per_million: default_input_cost(),
            output_cost_per_million: default_output_cost(),
            llm_retry_attempts: default_llm_retry_attempts(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            min_files_to_organize: default_min_files_to_organize(),
            max_retries_per_item: default_max_retries_per_item(),
            max_callback_retries: default_max_callback_retries(),
            alarm_interval_ms: default_alarm_interval_ms(),
            store_base_url: default_store_base_url(),
            orchestrator_base_url: default_orchestrator_base_url(),
            database_path: default_database_path(),
            bind_addr: default_bind_addr(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}
