use crate::api::dto::auth::{
    AuthResponseDto, ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, LogoutRequest, OAuthProvider,
    OAuthRequest, RegisterRequest, ResetPasswordRequest, UserDto,
};
use crate::api::{ApiClient, ApiRequest};
use crate::domain::session::{AuthResponse, TokenPair};
use crate::domain::user::User;
use crate::error::Result;
use crate::services::agent_service::AgentService;
use crate::services::realtime::{RealtimeAuth, reauthenticate, sign_out};
use crate::storage::SessionStore;
use opentelemetry::{KeyValue, global, metrics::Counter};
use serde::de::IgnoredAny;
use std::sync::Arc;

pub const LOGIN_PATH: &str = "/api/auth/login";
pub const OAUTH_PATH: &str = "/api/auth/oauth";
pub const REGISTER_PATH: &str = "/api/auth/register";
pub const LOGOUT_PATH: &str = "/api/auth/logout";
pub const FORGOT_PASSWORD_PATH: &str = "/api/auth/forgot-password";
pub const RESET_PASSWORD_PATH: &str = "/api/auth/reset-password";
pub const CHANGE_PASSWORD_PATH: &str = "/api/auth/change-password";
pub const ME_PATH: &str = "/api/auth/me";

#[derive(Clone, Debug)]
struct Metrics {
    login_total: Counter<u64>,
    register_total: Counter<u64>,
    logout_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("console-session");
        Self {
            login_total: meter
                .u64_counter("auth_login_total")
                .with_description("Total number of successful sign-ins")
                .build(),
            register_total: meter
                .u64_counter("auth_register_total")
                .with_description("Total number of successful registrations")
                .build(),
            logout_total: meter
                .u64_counter("auth_logout_total")
                .with_description("Total number of logouts")
                .build(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegisterParams {
    pub name: String,
    pub email: String,
    pub password: String,
    pub organization_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AuthService {
    api: ApiClient,
    store: SessionStore,
    agents: AgentService,
    realtime: Arc<dyn RealtimeAuth>,
    metrics: Metrics,
}

impl AuthService {
    #[must_use]
    pub fn new(api: ApiClient, agents: AgentService, realtime: Arc<dyn RealtimeAuth>) -> Self {
        let store = api.store().clone();
        Self { api, store, agents, realtime, metrics: Metrics::new() }
    }

    #[must_use]
    pub const fn store(&self) -> &SessionStore {
        &self.store
    }

    #[tracing::instrument(skip(self, email, password), fields(user.id = tracing::field::Empty), err(level = "warn"))]
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse> {
        let request = ApiRequest::post(LOGIN_PATH).public().json(&LoginRequest { email, password })?;
        let response = self.authenticate(request).await?;
        self.metrics.login_total.add(1, &[KeyValue::new("method", "password")]);
        Ok(response)
    }

    #[tracing::instrument(skip(self, id_token), fields(user.id = tracing::field::Empty), err(level = "warn"))]
    pub async fn login_with_google(&self, id_token: &str) -> Result<AuthResponse> {
        let request = ApiRequest::post(OAUTH_PATH)
            .public()
            .json(&OAuthRequest { provider: OAuthProvider::Google, id_token, name: None })?;
        let response = self.authenticate(request).await?;
        self.metrics.login_total.add(1, &[KeyValue::new("method", "google")]);
        Ok(response)
    }

    /// Apple only reveals the user's name on the very first sign-in, so it is
    /// forwarded when the caller has it.
    #[tracing::instrument(skip(self, id_token, name), fields(user.id = tracing::field::Empty), err(level = "warn"))]
    pub async fn login_with_apple(&self, id_token: &str, name: Option<&str>) -> Result<AuthResponse> {
        let request = ApiRequest::post(OAUTH_PATH)
            .public()
            .json(&OAuthRequest { provider: OAuthProvider::Apple, id_token, name })?;
        let response = self.authenticate(request).await?;
        self.metrics.login_total.add(1, &[KeyValue::new("method", "apple")]);
        Ok(response)
    }

    #[tracing::instrument(skip(self, params), fields(user.id = tracing::field::Empty), err(level = "warn"))]
    pub async fn register(&self, params: &RegisterParams) -> Result<AuthResponse> {
        let request = ApiRequest::post(REGISTER_PATH).public().json(&RegisterRequest {
            name: &params.name,
            email: &params.email,
            password: &params.password,
            organization_name: params.organization_name.as_deref(),
        })?;
        let response = self.authenticate(request).await?;
        tracing::info!("User registered successfully");
        self.metrics.register_total.add(1, &[]);
        Ok(response)
    }

    /// Ends the session. The local session is cleared no matter how the
    /// backend call goes; server-side invalidation is best effort.
    #[tracing::instrument(skip(self))]
    pub async fn logout(&self) {
        if let Some(refresh_token) = self.store.refresh_token() {
            let result = async {
                let request =
                    ApiRequest::post(LOGOUT_PATH).without_refresh().json(&LogoutRequest { refresh_token: &refresh_token })?;
                self.api.send::<IgnoredAny>(request).await
            }
            .await;
            if let Err(e) = result {
                tracing::warn!(error = %e, "Backend logout failed, clearing local session anyway");
            }
        }

        self.store.logout();
        self.agents.invalidate().await;
        sign_out(self.realtime.as_ref()).await;
        self.metrics.logout_total.add(1, &[]);
        tracing::info!("Logged out");
    }

    /// Exchanges `refresh_token` for a new pair without touching the session.
    ///
    /// # Errors
    /// Returns the backend or transport error of the exchange.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair> {
        self.api.refresher().exchange(refresh_token).await
    }

    /// Rotates the stored session ahead of time, sharing the single-flight
    /// gate with 401-triggered refreshes.
    ///
    /// # Errors
    /// Returns `ClientError::NotAuthenticated` without a session, otherwise as
    /// [`crate::services::refresh::RefreshCoordinator::refresh`].
    pub async fn refresh_session(&self) -> Result<String> {
        let stale = self.store.access_token().ok_or(crate::error::ClientError::NotAuthenticated)?;
        self.api.refresher().refresh(&stale).await
    }

    #[tracing::instrument(skip(self, email), err(level = "warn"))]
    pub async fn forgot_password(&self, email: &str) -> Result<()> {
        let request = ApiRequest::post(FORGOT_PASSWORD_PATH).public().json(&ForgotPasswordRequest { email })?;
        self.api.send::<IgnoredAny>(request).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, token, new_password), err(level = "warn"))]
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<()> {
        let request = ApiRequest::post(RESET_PASSWORD_PATH).public().json(&ResetPasswordRequest { token, new_password })?;
        self.api.send::<IgnoredAny>(request).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, current_password, new_password), err(level = "warn"))]
    pub async fn change_password(&self, current_password: &str, new_password: &str) -> Result<()> {
        let request =
            ApiRequest::post(CHANGE_PASSWORD_PATH).json(&ChangePasswordRequest { current_password, new_password })?;
        self.api.send::<IgnoredAny>(request).await?;
        Ok(())
    }

    /// Fetches the signed-in user's profile and stores it.
    ///
    /// # Errors
    /// Returns the API error of the profile request.
    #[tracing::instrument(skip(self), err(level = "warn"))]
    pub async fn current_user(&self) -> Result<User> {
        let dto: UserDto = self.api.send(ApiRequest::get(ME_PATH)).await?;
        let user = User::from(dto);
        self.store.set_user(user.clone());
        Ok(user)
    }

    async fn authenticate(&self, request: ApiRequest) -> Result<AuthResponse> {
        let dto: AuthResponseDto = self.api.send(request).await?;
        let response = AuthResponse::from(dto);

        self.store.set_auth(response.user.clone(), response.tokens.clone());
        tracing::Span::current().record("user.id", tracing::field::display(&response.user.id));
        reauthenticate(self.realtime.as_ref(), &response.tokens).await;

        // Signing in succeeded at this point; the agent list is a convenience
        // that screens re-fetch on demand.
        if let Err(e) = self.agents.refresh_manageable_agents().await {
            tracing::warn!(error = %e, "Failed to load manageable agents after sign-in");
        }

        Ok(response)
    }
}
