use crate::locale::{detect_locale_from_env, normalize_locale};
use crate::storage::{KeyValueStore, LOCALE_KEY};
use std::sync::Arc;

/// The user's last chosen locale, kept apart from the session so it survives logout.
#[derive(Debug, Clone)]
pub struct LocalePreference {
    storage: Arc<dyn KeyValueStore>,
}

impl LocalePreference {
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    /// The stored locale, or the one detected from the environment.
    #[must_use]
    pub fn current(&self) -> String {
        self.stored().unwrap_or_else(detect_locale_from_env)
    }

    #[must_use]
    pub fn stored(&self) -> Option<String> {
        match self.storage.get(LOCALE_KEY) {
            Ok(value) => value.as_deref().and_then(normalize_locale),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read locale preference");
                None
            }
        }
    }

    /// Stores `locale` after normalizing it. Returns the stored code, or `None`
    /// if `locale` is not a recognizable locale.
    pub fn set(&self, locale: &str) -> Option<String> {
        let normalized = normalize_locale(locale)?;
        if let Err(e) = self.storage.set(LOCALE_KEY, &normalized) {
            tracing::warn!(error = %e, "Failed to persist locale preference");
        }
        Some(normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, SESSION_KEY, SessionStore};

    #[test]
    fn test_set_normalizes_and_survives_logout() {
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let locale = LocalePreference::new(Arc::clone(&storage));
        assert_eq!(locale.set("es_MX.UTF-8").as_deref(), Some("es-MX"));

        SessionStore::init(Arc::clone(&storage)).logout();

        assert_eq!(locale.stored().as_deref(), Some("es-MX"));
        assert_eq!(storage.get(SESSION_KEY).unwrap(), None);
    }

    #[test]
    fn test_invalid_locale_is_rejected() {
        let locale = LocalePreference::new(Arc::new(MemoryStore::new()));
        assert_eq!(locale.set("C"), None);
        assert_eq!(locale.stored(), None);
    }
}
