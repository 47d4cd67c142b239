use thiserror::Error;

pub mod file_store;
pub mod locale_preference;
pub mod memory_store;
pub mod session_store;

pub use file_store::FileStore;
pub use locale_preference::LocalePreference;
pub use memory_store::MemoryStore;
pub use session_store::SessionStore;

/// Key under which the serialized session is persisted.
pub const SESSION_KEY: &str = "auth-session";

/// Key under which the last used locale code is persisted.
pub const LOCALE_KEY: &str = "locale";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Corrupt state: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// String key/value persistence for client state that must survive restarts.
pub trait KeyValueStore: Send + Sync + std::fmt::Debug {
    /// Reads the value stored under `key`.
    ///
    /// # Errors
    /// Returns an error if the backing medium cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    /// Returns an error if the backing medium cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    /// Returns an error if the backing medium cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}
