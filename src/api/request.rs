use crate::error::Result;
use reqwest::Method;
use serde::Serialize;

/// How a request is authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// No bearer token, a 401 is returned to the caller as is.
    Public,
    /// Bearer token; a 401 triggers one token refresh and one retry.
    Bearer,
    /// Bearer token, but a 401 is never answered with a refresh.
    BearerNoRefresh,
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) body: Option<serde_json::Value>,
    pub(crate) auth: AuthMode,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), body: None, auth: AuthMode::Bearer }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attaches a JSON body. The body is serialized once and reused on retries.
    ///
    /// # Errors
    /// Returns `ClientError::Decode` if `body` cannot be serialized.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    #[must_use]
    pub fn public(mut self) -> Self {
        self.auth = AuthMode::Public;
        self
    }

    #[must_use]
    pub fn without_refresh(mut self) -> Self {
        self.auth = AuthMode::BearerNoRefresh;
        self
    }

    #[must_use]
    pub const fn auth(&self) -> AuthMode {
        self.auth
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}
