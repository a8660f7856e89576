use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::{
    body::Bytes,
    http::{HeaderMap, Method, StatusCode},
};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

/// ApiError
///
/// Transport-level failures of calls to the remote roster API. They are surfaced
/// to the caller, never retried.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request timed out after {} ms", .0.as_millis())]
    Timeout(Duration),

    #[error("could not reach upstream: {0}")]
    Connect(String),

    #[error("upstream answered {status}")]
    Status { status: StatusCode },

    #[error("could not decode upstream response: {0}")]
    Decode(String),

    #[error("invalid upstream URL: {0}")]
    InvalidUrl(String),

    #[error("upstream request failed: {0}")]
    Request(String),
}

/// ForwardRequest
///
/// A request handed to an `Upstream`, already rewritten for the target.
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub method: Method,
    /// Path and query relative to the upstream base URL (e.g. `/students?x=1`).
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// ForwardResponse
#[derive(Debug, Clone)]
pub struct ForwardResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

// 1. Upstream Contract
/// Upstream
///
/// Anything able to carry a proxied request to the remote API. The dev proxy only
/// depends on this trait, so tests swap in `MockUpstream`.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn forward(&self, request: ForwardRequest) -> Result<ForwardResponse, ApiError>;
}

/// UpstreamState
///
/// The shared handle used across the application state.
pub type UpstreamState = Arc<dyn Upstream>;

// 2. The Real Implementation
/// ApiClient
///
/// A reqwest client bound to one base URL, with one timeout for every request.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ApiClient {
    /// new
    ///
    /// Fails only when the TLS backend cannot be initialised or the base URL is
    /// not an absolute http(s) URL.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let parsed =
            reqwest::Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(format!("{base_url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Joins `path` (with or without a leading slash) onto the base URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let request = self.client.get(self.url(path));
        self.send_json(request).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.client.post(self.url(path)).json(body);
        self.send_json(request).await
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.client.put(self.url(path)).json(body);
        self.send_json(request).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let response = self
            .client
            .delete(self.url(path))
            .send()
            .await
            .map_err(|e| self.map_error(e))?;
        check_status(response.status())
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = request.send().await.map_err(|e| self.map_error(e))?;
        check_status(response.status())?;
        response
            .json::<T>()
            .await
            .map_err(|e| match self.map_error(e) {
                ApiError::Request(message) => ApiError::Decode(message),
                other => other,
            })
    }

    fn map_error(&self, error: reqwest::Error) -> ApiError {
        if error.is_timeout() {
            ApiError::Timeout(self.timeout)
        } else if error.is_connect() {
            ApiError::Connect(error.to_string())
        } else if error.is_decode() {
            ApiError::Decode(error.to_string())
        } else {
            ApiError::Request(error.to_string())
        }
    }
}

fn check_status(status: StatusCode) -> Result<(), ApiError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(ApiError::Status { status })
    }
}

#[async_trait]
impl Upstream for ApiClient {
    /// forward
    ///
    /// Sends the request as-is and hands back whatever the upstream answered,
    /// error statuses included. Only transport failures become `ApiError`.
    async fn forward(&self, request: ForwardRequest) -> Result<ForwardResponse, ApiError> {
        let response = self
            .client
            .request(request.method, self.url(&request.path_and_query))
            .headers(request.headers)
            .body(request.body)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| self.map_error(e))?;

        Ok(ForwardResponse {
            status,
            headers,
            body,
        })
    }
}

// 3. The Mock Implementation (For Tests)
/// MockUpstream
///
/// Answers every request with a canned response, or fails with a timeout when
/// built with `new_timing_out`. Records the last request it saw.
#[derive(Default)]
pub struct MockUpstream {
    pub should_time_out: bool,
    pub status: Option<StatusCode>,
    last_request: std::sync::Mutex<Option<ForwardRequest>>,
}

impl MockUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_timing_out() -> Self {
        Self {
            should_time_out: true,
            ..Self::default()
        }
    }

    pub fn with_status(status: StatusCode) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn last_request(&self) -> Option<ForwardRequest> {
        self.last_request
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Upstream for MockUpstream {
    async fn forward(&self, request: ForwardRequest) -> Result<ForwardResponse, ApiError> {
        let path = request.path_and_query.clone();
        *self
            .last_request
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(request);

        if self.should_time_out {
            return Err(ApiError::Timeout(Duration::from_millis(
                crate::config::DEFAULT_API_TIMEOUT_MS,
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderValue::from_static("application/json"),
        );
        Ok(ForwardResponse {
            status: self.status.unwrap_or(StatusCode::OK),
            headers,
            body: Bytes::from(format!("{{\"path\":\"{path}\"}}")),
        })
    }
}
