use crate::api::dto::agent::ManageableAgentsResponse;
use crate::api::{ApiClient, ApiRequest};
use crate::domain::agent::AgentSummary;
use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

pub const MANAGEABLE_AGENTS_PATH: &str = "/api/agents/manageable";

#[derive(Debug)]
struct CachedAgents {
    agents: Vec<AgentSummary>,
    fetched_at: Instant,
}

/// The agents the signed-in user may configure, cached for a fixed TTL.
#[derive(Debug, Clone)]
pub struct AgentService {
    api: ApiClient,
    ttl: Duration,
    cache: Arc<RwLock<Option<CachedAgents>>>,
}

impl AgentService {
    #[must_use]
    pub fn new(api: ApiClient, ttl: Duration) -> Self {
        Self { api, ttl, cache: Arc::new(RwLock::new(None)) }
    }

    /// Cached list if still fresh, otherwise a new fetch.
    ///
    /// # Errors
    /// Returns the API error when a fetch is needed and fails.
    pub async fn manageable_agents(&self) -> Result<Vec<AgentSummary>> {
        if let Some(cached) = self.cache.read().await.as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                return Ok(cached.agents.clone());
            }
        }
        self.refresh_manageable_agents().await
    }

    /// Fetches the list from the backend and replaces the cache.
    ///
    /// # Errors
    /// Returns the API error; the previous cache entry is left in place.
    #[tracing::instrument(skip(self), err(level = "warn"))]
    pub async fn refresh_manageable_agents(&self) -> Result<Vec<AgentSummary>> {
        let response: ManageableAgentsResponse = self.api.send(ApiRequest::get(MANAGEABLE_AGENTS_PATH)).await?;
        let agents: Vec<AgentSummary> = response.agents.into_iter().map(AgentSummary::from).collect();

        tracing::debug!(count = agents.len(), "Fetched manageable agents");
        *self.cache.write().await = Some(CachedAgents { agents: agents.clone(), fetched_at: Instant::now() });
        Ok(agents)
    }

    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }

    pub async fn cached(&self) -> Option<Vec<AgentSummary>> {
        self.cache.read().await.as_ref().map(|c| c.agents.clone())
    }
}
