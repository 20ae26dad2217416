use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Instant;

use protocol::Envelope;
use reqwest::header::ACCEPT;
use reqwest::multipart::Form;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::HttpSettings;
use crate::error::ApiError;

use super::http_utils::join_base_path;

static HTTP_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// JSON/HTTP client for the CRM backend.
///
/// Every request carries the current bearer token. Responses are normalised
/// by [`check_response`] so callers see one error type for transport
/// failures, `ok: false` bodies and non-2xx statuses alike.
pub(crate) struct ApiClient {
    base_url: String,
    http: Client,
    token: RwLock<Option<String>>,
}

impl ApiClient {
    pub(crate) fn new(base_url: &str, settings: &HttpSettings) -> Result<Self, ApiError> {
        let http = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            token: RwLock::new(None),
        })
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    pub(crate) fn set_token(&self, token: Option<String>) {
        if let Ok(mut guard) = self.token.write() {
            *guard = token.filter(|value| !value.trim().is_empty());
        }
    }

    pub(crate) fn token(&self) -> Option<String> {
        self.token.read().ok().and_then(|guard| guard.clone())
    }

    pub(crate) fn url(&self, path: &str) -> Result<String, ApiError> {
        join_base_path(&self.base_url, path).map_err(ApiError::Precondition)
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request(Method::GET, path, None::<&Value>).await
    }

    pub(crate) async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::POST, path, Some(body)).await
    }

    pub(crate) async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::PUT, path, Some(body)).await
    }

    pub(crate) async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request(Method::DELETE, path, None::<&Value>).await
    }

    pub(crate) async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: Form,
    ) -> Result<T, ApiError> {
        let url = self.url(path)?;
        let request = self.http.post(&url).multipart(form);
        let value = self.execute(Method::POST, path, request).await?;
        decode_payload(value)
    }

    async fn request<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path)?;
        let mut request = self.http.request(method.clone(), &url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let value = self.execute(method, path, request).await?;
        decode_payload(value)
    }

    pub(crate) async fn execute(
        &self,
        method: Method,
        path: &str,
        request: RequestBuilder,
    ) -> Result<Value, ApiError> {
        let request_id = HTTP_REQUEST_ID.fetch_add(1, Ordering::Relaxed);
        let mut request = request.header(ACCEPT, "application/json");
        if let Some(token) = self.token() {
            request = request.bearer_auth(token);
        }
        let started = Instant::now();
        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(
                    event = "http.transport_error",
                    request_id = request_id,
                    method = %method,
                    path = %path,
                    timeout = err.is_timeout(),
                    connect = err.is_connect(),
                    error = %err,
                    "api request failed"
                );
                return Err(ApiError::Transport(err));
            }
        };
        let status = response.status();
        let body = response.text().await?;
        info!(
            event = "http.response",
            request_id = request_id,
            method = %method,
            path = %path,
            status = status.as_u16(),
            body_len = body.len(),
            latency_ms = started.elapsed().as_millis() as u64,
            "api request"
        );
        check_response(status, &body)
    }
}

/// Maps a raw HTTP response onto the API's error model.
///
/// 401 always becomes `Unauthorized`. A non-2xx status or `ok: false` becomes
/// `Server` with the body's `error` text, or `Request failed: <status>`.
pub(crate) fn check_response(status: StatusCode, body: &str) -> Result<Value, ApiError> {
    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized);
    }
    let value = if body.trim().is_empty() {
        Value::Object(serde_json::Map::new())
    } else {
        match serde_json::from_str::<Value>(body) {
            Ok(value) => value,
            Err(_) if !status.is_success() => {
                return Err(ApiError::Server {
                    status: status.as_u16(),
                    message: format!("Request failed: {}", status.as_u16()),
                })
            }
            Err(err) => return Err(ApiError::Decode(err)),
        }
    };
    let envelope = Envelope::deserialize(&value).unwrap_or_default();
    if !status.is_success() || envelope.is_failure() {
        let message = envelope
            .error_message()
            .map(str::to_string)
            .unwrap_or_else(|| format!("Request failed: {}", status.as_u16()));
        return Err(ApiError::Server {
            status: status.as_u16(),
            message,
        });
    }
    Ok(value)
}

pub(crate) fn decode_payload<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    Ok(serde_json::from_value(value)?)
}
