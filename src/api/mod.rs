use crate::config::ApiConfig;
use crate::error::{ClientError, Result};
use crate::jwt::is_token_expired;
use crate::services::refresh::RefreshCoordinator;
use crate::storage::SessionStore;
use backon::{ExponentialBuilder, Retryable};
use serde::de::DeserializeOwned;
use std::time::Duration;

pub mod dto;
pub mod request;

pub use request::{ApiRequest, AuthMode};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Builds the shared HTTP client used by every API call.
///
/// # Errors
/// Returns an error if the TLS backend cannot be initialized.
pub fn build_http_client(config: &ApiConfig) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(config.request_timeout())
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Joins an API path onto the configured base URL.
#[must_use]
pub fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Authenticated request pipeline.
///
/// Attaches the current access token, retries transient failures with
/// exponential backoff and answers a 401 with a single-flight token refresh
/// followed by exactly one retry of the original request.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    store: SessionStore,
    refresher: RefreshCoordinator,
    retry: ExponentialBuilder,
    expiry_buffer: Duration,
}

impl ApiClient {
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        config: &ApiConfig,
        store: SessionStore,
        refresher: RefreshCoordinator,
        expiry_buffer: Duration,
    ) -> Self {
        let retry = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(config.min_backoff_ms))
            .with_max_delay(Duration::from_millis(config.max_backoff_ms))
            .with_max_times(config.max_retries);

        Self { http, base_url: config.base_url.clone(), store, refresher, retry, expiry_buffer }
    }

    #[must_use]
    pub const fn store(&self) -> &SessionStore {
        &self.store
    }

    #[must_use]
    pub const fn refresher(&self) -> &RefreshCoordinator {
        &self.refresher
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(ApiRequest::get(path)).await
    }

    #[tracing::instrument(
        name = "api_request",
        skip(self, request),
        fields(http.method = %request.method, http.path = %request.path),
        err(level = "debug")
    )]
    pub async fn send<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let token = match request.auth {
            AuthMode::Public => None,
            AuthMode::Bearer | AuthMode::BearerNoRefresh => Some(self.usable_access_token(request.auth).await?),
        };

        match self.execute_with_retry(&request, token.as_deref()).await {
            Err(ClientError::Unauthorized) if request.auth == AuthMode::Bearer => {
                let stale = token.unwrap_or_default();
                tracing::debug!("Access token rejected, refreshing");
                let fresh = self.refresher.refresh(&stale).await?;
                self.execute_with_retry(&request, Some(&fresh)).await
            }
            result => result,
        }
    }

    /// The stored access token, rotated first if it is already inside the expiry buffer.
    async fn usable_access_token(&self, auth: AuthMode) -> Result<String> {
        let token = self.store.access_token().ok_or(ClientError::NotAuthenticated)?;
        if auth == AuthMode::Bearer && is_token_expired(&token, self.expiry_buffer) {
            tracing::debug!("Access token expired or about to, refreshing before request");
            return self.refresher.refresh(&token).await;
        }
        Ok(token)
    }

    async fn execute_with_retry<T: DeserializeOwned>(&self, request: &ApiRequest, token: Option<&str>) -> Result<T> {
        (|| async { self.execute(request, token).await })
            .retry(&self.retry)
            .when(ClientError::is_retryable)
            .notify(|e, delay| {
                tracing::debug!(error = %e, delay = ?delay, "Retrying request");
            })
            .await
    }

    async fn execute<T: DeserializeOwned>(&self, request: &ApiRequest, token: Option<&str>) -> Result<T> {
        let mut builder = self
            .http
            .request(request.method.clone(), endpoint(&self.base_url, &request.path))
            .header(REQUEST_ID_HEADER, uuid::Uuid::new_v4().to_string());

        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::from_response(status, &body));
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(serde_json::from_slice(b"null")?);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}
