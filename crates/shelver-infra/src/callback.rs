//! Callback delivery to the upstream orchestrator.

use shelver_core::batch::CallbackSender;
use shelver_types::batch::CallbackPayload;
use shelver_types::config::ShelverConfig;
use shelver_types::error::CallbackError;
use std::time::Duration;
use tracing::debug;

/// POSTs the aggregated batch callback to
/// `{orchestrator}/callback/organizer/{batch_id}`.
#[derive(Clone)]
pub struct HttpCallbackSender {
    http: reqwest::Client,
    base_url: String,
}

impl HttpCallbackSender {
    pub fn from_config(config: &ShelverConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent("shelver/0.1")
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: config.orchestrator_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl CallbackSender for HttpCallbackSender {
    async fn send(&self, payload: &CallbackPayload) -> Result<(), CallbackError> {
        let url = format!("{}/callback/organizer/{}", self.base_url, payload.batch_id);
        debug!(url = %url, chunk_id = %payload.chunk_id, "delivering callback");

        let response = self
            .http
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| CallbackError::Delivery(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(CallbackError::Status(status.as_u16()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let sender = HttpCallbackSender::new("http://orchestrator:7071/");
        assert_eq!(sender.base_url, "http://orchestrator:7071");
    }
}
