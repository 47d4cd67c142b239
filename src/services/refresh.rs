use crate::api::dto::auth::{RefreshRequest, RefreshResponseDto};
use crate::api::endpoint;
use crate::domain::session::TokenPair;
use crate::error::{ClientError, Result};
use crate::services::realtime::{RealtimeAuth, reauthenticate, sign_out};
use crate::storage::SessionStore;
use opentelemetry::{global, metrics::Counter};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

pub const REFRESH_PATH: &str = "/api/auth/refresh";

#[derive(Clone, Debug)]
struct Metrics {
    refresh_total: Counter<u64>,
    refresh_failed_total: Counter<u64>,
    refresh_coalesced_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("console-session");
        Self {
            refresh_total: meter
                .u64_counter("session_refresh_total")
                .with_description("Total number of successful token rotations")
                .build(),
            refresh_failed_total: meter
                .u64_counter("session_refresh_failed_total")
                .with_description("Total number of failed refresh exchanges")
                .build(),
            refresh_coalesced_total: meter
                .u64_counter("session_refresh_coalesced_total")
                .with_description("Refresh requests served by an exchange another caller performed")
                .build(),
        }
    }
}

/// Outcome of the last exchange that failed without ending the session.
#[derive(Debug)]
struct FailedExchange {
    attempt: u64,
    stale_access_token: String,
    error: Arc<ClientError>,
}

#[derive(Debug, Default)]
struct RefreshState {
    last_failure: Option<FailedExchange>,
}

/// Exchanges refresh tokens, at most one exchange at a time.
///
/// Callers pass the access token that was rejected. Whoever gets the gate first
/// performs the exchange. Everyone queued behind it shares its outcome: after a
/// rotation they find the store holding a different access token and reuse it,
/// after a failed exchange they receive the same error. Neither touches the
/// network again.
///
/// The exchange goes through a bare HTTP call rather than the `ApiClient`
/// pipeline, so a 401 from the refresh endpoint can never recurse into
/// another refresh.
#[derive(Debug, Clone)]
pub struct RefreshCoordinator {
    http: reqwest::Client,
    refresh_url: String,
    store: SessionStore,
    realtime: Arc<dyn RealtimeAuth>,
    gate: Arc<Mutex<RefreshState>>,
    attempts: Arc<AtomicU64>,
    metrics: Metrics,
}

impl RefreshCoordinator {
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: &str, store: SessionStore, realtime: Arc<dyn RealtimeAuth>) -> Self {
        Self {
            http,
            refresh_url: endpoint(base_url, REFRESH_PATH),
            store,
            realtime,
            gate: Arc::new(Mutex::new(RefreshState::default())),
            attempts: Arc::new(AtomicU64::new(0)),
            metrics: Metrics::new(),
        }
    }

    /// Returns an access token newer than `stale_access_token`, rotating the
    /// session if nobody has done so yet.
    ///
    /// # Errors
    /// Returns `ClientError::SessionExpired` when there is no session, the
    /// backend rejects the refresh token (the session is cleared in that case),
    /// or the session was replaced by another sign-in during the exchange.
    /// Other failures are returned as `ClientError::RefreshFailed` and leave
    /// the session intact.
    #[tracing::instrument(skip_all, err(level = "warn"))]
    pub async fn refresh(&self, stale_access_token: &str) -> Result<String> {
        let attempts_seen = self.attempts.load(Ordering::Acquire);
        let mut state = self.gate.lock().await;

        let Some(current) = self.store.tokens() else {
            return Err(ClientError::SessionExpired);
        };

        if current.access_token != stale_access_token {
            tracing::debug!("Session already rotated by a concurrent refresh");
            self.metrics.refresh_coalesced_total.add(1, &[]);
            return Ok(current.access_token);
        }

        if let Some(failure) = &state.last_failure {
            if failure.attempt > attempts_seen && failure.stale_access_token == stale_access_token {
                tracing::debug!("Sharing the failure of the exchange this call waited on");
                self.metrics.refresh_coalesced_total.add(1, &[]);
                return Err(ClientError::RefreshFailed(Arc::clone(&failure.error)));
            }
        }

        let outcome = self.exchange(&current.refresh_token).await;
        let attempt = self.attempts.fetch_add(1, Ordering::AcqRel) + 1;
        state.last_failure = None;

        match outcome {
            Ok(tokens) => {
                if !self.store.replace_tokens(&current.refresh_token, tokens.clone()) {
                    tracing::info!("Session changed while refreshing, discarding new tokens");
                    return Err(ClientError::SessionExpired);
                }
                reauthenticate(self.realtime.as_ref(), &tokens).await;
                tracing::info!("Tokens rotated successfully");
                self.metrics.refresh_total.add(1, &[]);
                Ok(tokens.access_token)
            }
            Err(e @ (ClientError::Unauthorized | ClientError::Forbidden | ClientError::Validation { .. })) => {
                self.metrics.refresh_failed_total.add(1, &[]);
                if self.store.logout_if_current(&current.refresh_token) {
                    tracing::warn!(error = %e, "Refresh token rejected, ending session");
                    sign_out(self.realtime.as_ref()).await;
                } else {
                    tracing::info!(error = %e, "Refresh token rejected for a session that already changed");
                }
                Err(ClientError::SessionExpired)
            }
            Err(e) => {
                self.metrics.refresh_failed_total.add(1, &[]);
                let error = Arc::new(e);
                state.last_failure = Some(FailedExchange {
                    attempt,
                    stale_access_token: stale_access_token.to_string(),
                    error: Arc::clone(&error),
                });
                Err(ClientError::RefreshFailed(error))
            }
        }
    }

    /// Performs one refresh exchange without touching the session store.
    ///
    /// # Errors
    /// Returns the mapped backend error or a transport error.
    pub async fn exchange(&self, refresh_token: &str) -> Result<TokenPair> {
        let response = self
            .http
            .post(&self.refresh_url)
            .header(crate::api::REQUEST_ID_HEADER, uuid::Uuid::new_v4().to_string())
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::from_response(status, &body));
        }

        let dto: RefreshResponseDto = serde_json::from_slice(&response.bytes().await?)?;
        Ok(dto.into())
    }
}
