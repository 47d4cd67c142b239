use crate::domain::session::{Session, TokenPair};
use crate::domain::user::User;
use crate::storage::{KeyValueStore, SESSION_KEY};
use std::sync::Arc;
use tokio::sync::watch;

/// Single source of truth for the authenticated session.
///
/// The whole [`Session`] value lives in a watch channel, so every mutation is
/// an atomic replacement and observers always see a consistent token pair.
/// Persistence failures are logged and never surface to callers.
#[derive(Debug, Clone)]
pub struct SessionStore {
    state: Arc<watch::Sender<Session>>,
    storage: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    /// Creates a store seeded from whatever session `storage` holds.
    #[must_use]
    pub fn init(storage: Arc<dyn KeyValueStore>) -> Self {
        let session = Self::load(storage.as_ref());
        if session.is_authenticated() {
            tracing::debug!("Restored persisted session");
        }
        Self { state: Arc::new(watch::Sender::new(session)), storage }
    }

    fn load(storage: &dyn KeyValueStore) -> Session {
        match storage.get(SESSION_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Session>(&raw) {
                Ok(session) => session,
                Err(e) => {
                    tracing::warn!(error = %e, "Ignoring unreadable persisted session");
                    Session::default()
                }
            },
            Ok(None) => Session::default(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read persisted session");
                Session::default()
            }
        }
    }

    /// Replaces the whole session.
    pub fn set_auth(&self, user: User, tokens: TokenPair) {
        let session = Session { user: Some(user), tokens: Some(tokens) };
        self.state.send_replace(session);
        self.persist();
    }

    /// Updates the user profile, leaving the tokens untouched.
    pub fn set_user(&self, user: User) {
        self.state.send_modify(|session| session.user = Some(user));
        self.persist();
    }

    /// Swaps in a rotated token pair, but only while the session still holds
    /// `exchanged_refresh_token`.
    ///
    /// Returns `false` without changing anything when the session ended or was
    /// replaced by another sign-in while the exchange was in flight.
    pub fn replace_tokens(&self, exchanged_refresh_token: &str, tokens: TokenPair) -> bool {
        let replaced = self.state.send_if_modified(|session| {
            if session.refresh_token() != Some(exchanged_refresh_token) {
                return false;
            }
            session.tokens = Some(tokens);
            true
        });
        if replaced {
            self.persist();
        }
        replaced
    }

    /// Clears every session field and the persisted copy.
    pub fn logout(&self) {
        self.state.send_replace(Session::default());
        self.remove_persisted();
    }

    /// Logs out only if the session still holds `refresh_token`. Returns
    /// whether the session was cleared.
    pub fn logout_if_current(&self, refresh_token: &str) -> bool {
        let cleared = self.state.send_if_modified(|session| {
            if session.refresh_token() != Some(refresh_token) {
                return false;
            }
            *session = Session::default();
            true
        });
        if cleared {
            self.remove_persisted();
        }
        cleared
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    #[must_use]
    pub fn tokens(&self) -> Option<TokenPair> {
        self.state.borrow().tokens.clone()
    }

    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.state.borrow().access_token().map(str::to_string)
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<String> {
        self.state.borrow().refresh_token().map(str::to_string)
    }

    /// Observes every session change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    fn remove_persisted(&self) {
        if let Err(e) = self.storage.remove(SESSION_KEY) {
            tracing::warn!(error = %e, "Failed to remove persisted session");
        }
    }

    fn persist(&self) {
        let session = self.snapshot();
        let raw = match serde_json::to_string(&session) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize session");
                return;
            }
        };
        if let Err(e) = self.storage.set(SESSION_KEY, &raw) {
            tracing::warn!(error = %e, "Failed to persist session");
        }
    }
}
