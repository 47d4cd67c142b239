use crate::api::{ApiClient, build_http_client};
use crate::config::Config;
use crate::error::Result;
use crate::jwt::{is_token_expired, is_token_expiring_soon};
use crate::services::agent_service::AgentService;
use crate::services::auth_service::AuthService;
use crate::services::realtime::{NoopRealtime, RealtimeAuth, RealtimeClient};
use crate::services::refresh::RefreshCoordinator;
use crate::storage::{FileStore, KeyValueStore, LocalePreference, SessionStore};
use std::sync::Arc;

/// Lifetime state of the stored access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Missing,
    Valid,
    ExpiringSoon,
    Expired,
}

/// Fully wired client: session store, request pipeline and services sharing one
/// refresh coordinator.
#[derive(Debug, Clone)]
pub struct ConsoleClient {
    config: Config,
    store: SessionStore,
    api: ApiClient,
    auth: AuthService,
    agents: AgentService,
    locale: LocalePreference,
    realtime: Option<RealtimeClient>,
}

impl ConsoleClient {
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub const fn session(&self) -> &SessionStore {
        &self.store
    }

    #[must_use]
    pub const fn api(&self) -> &ApiClient {
        &self.api
    }

    #[must_use]
    pub const fn auth(&self) -> &AuthService {
        &self.auth
    }

    #[must_use]
    pub const fn agents(&self) -> &AgentService {
        &self.agents
    }

    #[must_use]
    pub const fn locale(&self) -> &LocalePreference {
        &self.locale
    }

    /// The realtime socket, when one is configured and connected.
    #[must_use]
    pub const fn realtime(&self) -> Option<&RealtimeClient> {
        self.realtime.as_ref()
    }

    #[must_use]
    pub fn token_state(&self) -> TokenState {
        let Some(token) = self.store.access_token() else {
            return TokenState::Missing;
        };
        if is_token_expired(&token, self.config.session.expiry_buffer()) {
            TokenState::Expired
        } else if is_token_expiring_soon(&token, self.config.session.expiring_soon_window()) {
            TokenState::ExpiringSoon
        } else {
            TokenState::Valid
        }
    }

    /// Rotates the session if its access token is expired or expiring soon.
    /// Returns whether a refresh happened.
    ///
    /// # Errors
    /// Returns the refresh error; see [`RefreshCoordinator::refresh`].
    pub async fn ensure_fresh_session(&self) -> Result<bool> {
        match self.token_state() {
            TokenState::Missing | TokenState::Valid => Ok(false),
            TokenState::ExpiringSoon | TokenState::Expired => {
                self.auth.refresh_session().await?;
                Ok(true)
            }
        }
    }
}

#[derive(Debug)]
pub struct ClientBuilder {
    config: Config,
    storage: Option<Arc<dyn KeyValueStore>>,
    realtime: Option<Arc<dyn RealtimeAuth>>,
    http: Option<reqwest::Client>,
}

impl ClientBuilder {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config, storage: None, realtime: None, http: None }
    }

    /// Replaces the default file-backed storage under `session.state_dir`.
    #[must_use]
    pub fn with_storage(mut self, storage: Arc<dyn KeyValueStore>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Uses `realtime` for re-authentication instead of connecting the
    /// configured realtime socket.
    #[must_use]
    pub fn with_realtime(mut self, realtime: Arc<dyn RealtimeAuth>) -> Self {
        self.realtime = Some(realtime);
        self
    }

    #[must_use]
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    /// Wires every component.
    ///
    /// A realtime socket that fails to connect is logged and replaced by a
    /// no-op; the client works without live updates.
    ///
    /// # Errors
    /// Returns an error if the state directory or the HTTP client cannot be set up.
    pub async fn build(self) -> anyhow::Result<ConsoleClient> {
        let storage = match self.storage {
            Some(storage) => storage,
            None => Arc::new(FileStore::open(&self.config.session.state_dir)?),
        };
        let store = SessionStore::init(Arc::clone(&storage));
        let http = match self.http {
            Some(http) => http,
            None => build_http_client(&self.config.api)?,
        };

        let realtime_client = match (&self.realtime, &self.config.realtime.url) {
            (None, Some(_)) => match RealtimeClient::connect(&self.config.realtime, store.access_token()).await {
                Ok(client) => Some(client),
                Err(e) => {
                    tracing::warn!(error = %e, "Realtime unavailable, continuing without live updates");
                    None
                }
            },
            _ => None,
        };
        let realtime: Arc<dyn RealtimeAuth> = match (self.realtime, &realtime_client) {
            (Some(realtime), _) => realtime,
            (None, Some(client)) => Arc::new(client.clone()),
            (None, None) => Arc::new(NoopRealtime),
        };

        let refresher = RefreshCoordinator::new(http.clone(), &self.config.api.base_url, store.clone(), Arc::clone(&realtime));
        let api = ApiClient::new(http, &self.config.api, store.clone(), refresher, self.config.session.expiry_buffer());
        let agents = AgentService::new(api.clone(), self.config.session.agents_ttl());
        let auth = AuthService::new(api.clone(), agents.clone(), realtime);

        Ok(ConsoleClient {
            config: self.config,
            store,
            api,
            auth,
            agents,
            locale: LocalePreference::new(storage),
            realtime: realtime_client,
        })
    }
}
