//! OpenAI-compatible chat-completions client.
//!
//! A direct reqwest client rather than a provider SDK: the organize path
//! needs exactly one non-streaming call shape, a `json_schema` response
//! format, and precise status-code mapping onto the transient/permanent/
//! malformed error taxonomy.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use shelver_core::llm::CompletionClient;
use shelver_types::config::ShelverConfig;
use shelver_types::llm::{Completion, CompletionRequest, LlmError};
use std::time::Duration;
use tracing::debug;

use super::pricing::{compute_cost, format_cost};

/// Client for any OpenAI-compatible chat-completions endpoint.
///
/// Does not derive Debug: the API key lives inside and must not leak into
/// logs through accidental formatting.
pub struct OpenAiCompatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    input_cost_per_million: f64,
    output_cost_per_million: f64,
}

impl OpenAiCompatClient {
    /// Build a client from service configuration.
    pub fn from_config(config: &ShelverConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent("shelver/0.1")
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url: config.llm_base_url.trim_end_matches('/').to_string(),
            api_key: config.llm_api_key.clone(),
            model: config.model_name.clone(),
            input_cost_per_million: config.input_cost_per_million,
            output_cost_per_million: config.output_cost_per_million,
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct JsonSchemaFormat<'a> {
    name: &'a str,
    schema: &'a serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    format_type: &'static str,
    json_schema: JsonSchemaFormat<'a>,
}

#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f64,
    response_format: ResponseFormat<'a>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

/// Default sampling temperature when the request leaves it unset.
const DEFAULT_TEMPERATURE: f64 = 0.3;

impl CompletionClient for OpenAiCompatClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        let body = ChatCompletionBody {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            response_format: ResponseFormat {
                format_type: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: &request.schema_name,
                    schema: &request.schema,
                },
            },
        };

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Transient(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &detail));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Malformed(format!("unparseable response body: {e}")))?;

        let Some(choice) = parsed.choices.into_iter().next() else {
            return Err(LlmError::Malformed("response contained no choices".to_string()));
        };
        let content = choice.message.content.unwrap_or_default();

        let usage = parsed.usage.unwrap_or_default();
        let cost = compute_cost(
            usage.prompt_tokens,
            usage.completion_tokens,
            self.input_cost_per_million,
            self.output_cost_per_million,
        );
        debug!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            cost = %format_cost(cost),
            "completion received"
        );

        Ok(Completion {
            content,
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
            cost,
            model: parsed.model.unwrap_or_else(|| self.model.clone()),
        })
    }
}

/// Map a non-2xx status onto the retry taxonomy: 429 and 5xx are worth
/// retrying, any other 4xx is the caller's fault.
fn classify_status(status: StatusCode, detail: &str) -> LlmError {
    let summary = format!("{}: {}", status.as_u16(), truncate_detail(detail));
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        LlmError::Transient(summary)
    } else if status.is_client_error() {
        LlmError::Permanent(summary)
    } else {
        LlmError::Transient(summary)
    }
}

fn truncate_detail(detail: &str) -> &str {
    let end = detail
        .char_indices()
        .nth(200)
        .map(|(i, _)| i)
        .unwrap_or(detail.len());
    &detail[..end]
}
