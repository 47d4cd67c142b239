use async_trait::async_trait;
use console_session::config::Config;
use console_session::domain::session::TokenPair;
use console_session::domain::user::{Role, User};
use console_session::services::realtime::RealtimeAuth;
use console_session::storage::{KeyValueStore, MemoryStore};
use console_session::{ClientBuilder, ConsoleClient};
use jsonwebtoken::{EncodingKey, Header};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::{SystemTime, UNIX_EPOCH};

static INIT: Once = Once::new();

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into())
            .add_directive("console_session=debug".parse().unwrap())
            .add_directive("hyper=warn".parse().unwrap())
            .add_directive("reqwest=warn".parse().unwrap())
            .add_directive("tungstenite=warn".parse().unwrap());

        tracing_subscriber::fmt().with_env_filter(filter).init();
    });
}

#[derive(Serialize)]
struct Claims<'a> {
    exp: i64,
    iat: i64,
    nameid: &'a str,
    email: &'a str,
    role: &'a str,
}

fn now_secs() -> i64 {
    i64::try_from(SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()).unwrap()
}

/// Signs a token whose `exp` lies `secs` from now (negative for already expired).
#[allow(dead_code)]
pub fn token_expiring_in(secs: i64, subject: &str) -> String {
    let now = now_secs();
    let claims = Claims { exp: now + secs, iat: now, nameid: subject, email: "ana@example.com", role: "Owner" };
    jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(b"test_secret")).unwrap()
}

/// A token that stays valid for the whole test.
#[allow(dead_code)]
pub fn fresh_token(subject: &str) -> String {
    token_expiring_in(3600, subject)
}

#[allow(dead_code)]
pub fn test_user() -> User {
    User {
        id: "42".to_string(),
        email: "ana@example.com".to_string(),
        name: "Ana".to_string(),
        role: Role::Owner,
        avatar_url: None,
    }
}

/// Backend auth response body for `access_token`/`refresh_token`.
#[allow(dead_code)]
pub fn auth_body(access_token: &str, refresh_token: &str) -> Value {
    json!({
        "access_token": access_token,
        "refresh_token": refresh_token,
        "expires_in": 3600,
        "user": {"id": "42", "email": "ana@example.com", "name": "Ana", "role": "Owner", "avatar_url": null}
    })
}

/// Records what the client asks of the realtime channel.
#[derive(Debug, Default)]
pub struct RecordingRealtime {
    pub sessions: Mutex<Vec<TokenPair>>,
    pub cleared: AtomicUsize,
}

#[allow(dead_code)]
impl RecordingRealtime {
    pub fn access_tokens(&self) -> Vec<String> {
        self.sessions.lock().unwrap().iter().map(|t| t.access_token.clone()).collect()
    }

    pub fn cleared_count(&self) -> usize {
        self.cleared.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RealtimeAuth for RecordingRealtime {
    async fn set_session(&self, tokens: &TokenPair) -> console_session::Result<()> {
        self.sessions.lock().unwrap().push(tokens.clone());
        Ok(())
    }

    async fn clear_session(&self) -> console_session::Result<()> {
        self.cleared.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Config pointing at `base_url` with retries disabled.
#[allow(dead_code)]
pub fn test_config(base_url: &str) -> Config {
    let mut config = Config::default();
    config.api.base_url = base_url.to_string();
    config.api.max_retries = 0;
    config.api.min_backoff_ms = 1;
    config.api.max_backoff_ms = 5;
    config.api.request_timeout_secs = 5;
    config
}

#[allow(dead_code)]
pub struct TestClient {
    pub client: ConsoleClient,
    pub storage: Arc<MemoryStore>,
    pub realtime: Arc<RecordingRealtime>,
}

#[allow(dead_code)]
pub async fn test_client_with_config(config: Config) -> TestClient {
    setup_tracing();
    let storage = Arc::new(MemoryStore::new());
    let realtime = Arc::new(RecordingRealtime::default());

    let client = ClientBuilder::new(config)
        .with_storage(Arc::clone(&storage) as Arc<dyn KeyValueStore>)
        .with_realtime(Arc::clone(&realtime) as Arc<dyn RealtimeAuth>)
        .build()
        .await
        .unwrap();

    TestClient { client, storage, realtime }
}

#[allow(dead_code)]
pub async fn test_client(base_url: &str) -> TestClient {
    test_client_with_config(test_config(base_url)).await
}
