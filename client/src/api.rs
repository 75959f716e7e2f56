//! HTTP client for the cloud record service.
//!
//! [`RecordApi`] is the seam the sync engine dispatches through; tests
//! inject a scripted implementation, production code uses
//! [`HttpRecordApi`] over reqwest.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use roadbook_core::{classify_status, FailureKind, RecordPayload, RecordSlot, RecordType, Timestamp};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// A failed API call, split into the two classes the sync engine cares
/// about: the request never reached the server, or the server answered
/// with a non-success status.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),

    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },
}

impl ApiError {
    /// Whether this failure is worth retrying.
    pub fn kind(&self) -> FailureKind {
        match self {
            ApiError::Network(_) => FailureKind::Transient,
            ApiError::Status { status, .. } => classify_status(*status),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Network(err.to_string())
    }
}

/// The cloud record service operations the sync engine dispatches to.
#[async_trait]
pub trait RecordApi: Send + Sync {
    /// `POST /api/{collection}` — create a record.
    async fn create(
        &self,
        record_type: RecordType,
        payload: &serde_json::Value,
    ) -> Result<RecordPayload, ApiError>;

    /// `PUT /api/{collection}/{id}` — update a record.
    async fn update(
        &self,
        record_type: RecordType,
        id: &str,
        payload: &serde_json::Value,
    ) -> Result<RecordPayload, ApiError>;

    /// `DELETE /api/{collection}/{id}` — soft-delete a record.
    async fn delete(&self, record_type: RecordType, id: &str) -> Result<(), ApiError>;

    /// `POST /api/trash/{id}?type={recordType}` — restore from trash.
    async fn restore(&self, record_type: RecordType, id: &str) -> Result<RecordPayload, ApiError>;

    /// `DELETE /api/trash/{id}?type={recordType}` — purge from trash.
    async fn permanent_delete(&self, record_type: RecordType, id: &str) -> Result<(), ApiError>;

    /// `GET /api/{collection}[?since=]` — full or delta listing. Delta
    /// listings include tombstones so deletions propagate.
    async fn list_since(
        &self,
        record_type: RecordType,
        since: Option<Timestamp>,
    ) -> Result<Vec<RecordSlot>, ApiError>;
}

/// reqwest-backed [`RecordApi`].
pub struct HttpRecordApi {
    client: Client,
    base_url: String,
    /// Bearer token presented on every request, when set
    token: Arc<RwLock<Option<String>>>,
}

impl HttpRecordApi {
    /// Build a client against `base_url` (no trailing slash).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            base_url: base_url.into(),
            token: Arc::new(RwLock::new(None)),
        }
    }

    /// Set the bearer token used for subsequent requests.
    pub async fn set_token(&self, token: impl Into<String>) {
        *self.token.write().await = Some(token.into());
    }

    /// Drop the bearer token.
    pub async fn clear_token(&self) {
        *self.token.write().await = None;
    }

    fn collection_url(&self, record_type: RecordType) -> String {
        format!("{}/api/{}", self.base_url, record_type.as_str())
    }

    fn trash_url(&self, record_type: RecordType, id: &str) -> String {
        format!(
            "{}/api/trash/{}?type={}",
            self.base_url,
            id,
            record_type.as_str()
        )
    }

    async fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.token.read().await.clone() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl RecordApi for HttpRecordApi {
    async fn create(
        &self,
        record_type: RecordType,
        payload: &serde_json::Value,
    ) -> Result<RecordPayload, ApiError> {
        let request = self.client.post(self.collection_url(record_type)).json(payload);
        let response = self.authorize(request).await.send().await?;
        parse_json(response).await
    }

    async fn update(
        &self,
        record_type: RecordType,
        id: &str,
        payload: &serde_json::Value,
    ) -> Result<RecordPayload, ApiError> {
        let url = format!("{}/{}", self.collection_url(record_type), id);
        let request = self.client.put(url).json(payload);
        let response = self.authorize(request).await.send().await?;
        parse_json(response).await
    }

    async fn delete(&self, record_type: RecordType, id: &str) -> Result<(), ApiError> {
        let url = format!("{}/{}", self.collection_url(record_type), id);
        let response = self.authorize(self.client.delete(url)).await.send().await?;
        expect_success(response).await
    }

    async fn restore(&self, record_type: RecordType, id: &str) -> Result<RecordPayload, ApiError> {
        let request = self.client.post(self.trash_url(record_type, id));
        let response = self.authorize(request).await.send().await?;
        parse_json(response).await
    }

    async fn permanent_delete(&self, record_type: RecordType, id: &str) -> Result<(), ApiError> {
        let request = self.client.delete(self.trash_url(record_type, id));
        let response = self.authorize(request).await.send().await?;
        expect_success(response).await
    }

    async fn list_since(
        &self,
        record_type: RecordType,
        since: Option<Timestamp>,
    ) -> Result<Vec<RecordSlot>, ApiError> {
        let mut request = self.client.get(self.collection_url(record_type));
        if let Some(since) = since {
            request = request.query(&[("since", since.to_string())]);
        }
        let response = self.authorize(request).await.send().await?;
        parse_json(response).await
    }
}

/// Turn a non-success response into [`ApiError::Status`], extracting the
/// server's error message from its JSON body when present.
async fn error_from_response(response: Response) -> ApiError {
    let status = response.status().as_u16();
    let message = match response.text().await {
        Ok(body) => serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|value| value["error"].as_str().map(str::to_string))
            .unwrap_or(body),
        Err(err) => err.to_string(),
    };
    ApiError::Status { status, message }
}

async fn parse_json<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }
    response.json().await.map_err(ApiError::from)
}

async fn expect_success(response: Response) -> Result<(), ApiError> {
    if response.status() == StatusCode::NO_CONTENT || response.status().is_success() {
        Ok(())
    } else {
        Err(error_from_response(response).await)
    }
}
