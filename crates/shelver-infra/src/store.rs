//! Entity store REST client.
//!
//! Speaks the store's five endpoints: manifest read, blob read, multipart
//! upload, entity creation, and CAS-guarded version append. A 409 from the
//! versions endpoint is the CAS conflict the publisher retries on.

use reqwest::StatusCode;
use serde::Deserialize;
use shelver_core::store::EntityStore;
use shelver_types::config::ShelverConfig;
use shelver_types::entity::{AppendVersionRequest, CreateEntityRequest, Entity};
use shelver_types::error::StoreError;
use std::time::Duration;

/// reqwest-backed implementation of [`EntityStore`].
#[derive(Clone)]
pub struct HttpEntityStore {
    http: reqwest::Client,
    base_url: String,
}

/// One row of the upload response array.
#[derive(Debug, Deserialize)]
struct UploadReceipt {
    cid: String,
}

impl HttpEntityStore {
    pub fn from_config(config: &ShelverConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent("shelver/0.1")
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: config.store_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

/// Map a store response status onto [`StoreError`].
async fn check_status(
    response: reqwest::Response,
    what: &str,
) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let detail = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::NOT_FOUND => StoreError::NotFound(what.to_string()),
        StatusCode::CONFLICT => StoreError::CasConflict(what.to_string()),
        StatusCode::TOO_MANY_REQUESTS => {
            StoreError::Transient(format!("{what}: rate limited: {detail}"))
        }
        s if s.is_server_error() => StoreError::Transient(format!("{what}: {s}: {detail}")),
        s => StoreError::Permanent(format!("{what}: {s}: {detail}")),
    })
}

fn network(what: &str, err: reqwest::Error) -> StoreError {
    StoreError::Transient(format!("{what}: {err}"))
}

impl EntityStore for HttpEntityStore {
    async fn get_entity(&self, id: &str) -> Result<Entity, StoreError> {
        let url = self.url(&format!("/entities/{id}"));
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| network(id, e))?;
        check_status(response, id)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Permanent(format!("{id}: invalid entity body: {e}")))
    }

    async fn cat(&self, cid: &str) -> Result<Vec<u8>, StoreError> {
        let url = self.url(&format!("/cat/{cid}"));
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| network(cid, e))?;
        let bytes = check_status(response, cid)
            .await?
            .bytes()
            .await
            .map_err(|e| network(cid, e))?;
        Ok(bytes.to_vec())
    }

    async fn upload(&self, filename: &str, bytes: Vec<u8>) -> Result<String, StoreError> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        let url = self.url("/upload");
        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| network(filename, e))?;
        let receipts: Vec<UploadReceipt> = check_status(response, filename)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Permanent(format!("{filename}: invalid upload body: {e}")))?;

        receipts
            .into_iter()
            .next()
            .map(|r| r.cid)
            .ok_or_else(|| StoreError::Permanent(format!("{filename}: upload returned no cid")))
    }

    async fn create_entity(&self, request: &CreateEntityRequest) -> Result<Entity, StoreError> {
        let url = self.url("/entities");
        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| network("create entity", e))?;
        check_status(response, "create entity")
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Permanent(format!("create entity: invalid body: {e}")))
    }

    async fn append_version(
        &self,
        id: &str,
        request: &AppendVersionRequest,
    ) -> Result<Entity, StoreError> {
        let url = self.url(&format!("/entities/{id}/versions"));
        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| network(id, e))?;
        check_status(response, id)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Permanent(format!("{id}: invalid version body: {e}")))
    }
}
