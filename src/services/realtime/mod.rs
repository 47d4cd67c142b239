pub mod client;
pub mod frame;

pub use client::{RealtimeClient, RealtimeEvent};

use crate::domain::session::TokenPair;
use crate::error::Result;
use async_trait::async_trait;

/// The authentication seam of the live-update channel.
#[async_trait]
pub trait RealtimeAuth: Send + Sync + std::fmt::Debug {
    /// Makes already open channels use `tokens` from now on.
    ///
    /// # Errors
    /// Returns an error if the new credentials could not be delivered.
    async fn set_session(&self, tokens: &TokenPair) -> Result<()>;

    /// Drops the credentials of a signed-out user.
    ///
    /// # Errors
    /// Returns an error if the channel could not be told.
    async fn clear_session(&self) -> Result<()> {
        Ok(())
    }
}

/// Used when no realtime endpoint is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRealtime;

#[async_trait]
impl RealtimeAuth for NoopRealtime {
    async fn set_session(&self, _tokens: &TokenPair) -> Result<()> {
        Ok(())
    }
}

/// Pushes rotated tokens into the realtime channel.
///
/// Live updates may lag when this fails, but the rest of the client keeps
/// working, so the failure is only logged.
pub async fn reauthenticate(realtime: &dyn RealtimeAuth, tokens: &TokenPair) {
    if let Err(e) = realtime.set_session(tokens).await {
        tracing::warn!(error = %e, "Failed to re-authenticate realtime channel");
    }
}

/// Counterpart of [`reauthenticate`] for logout.
pub async fn sign_out(realtime: &dyn RealtimeAuth) {
    if let Err(e) = realtime.clear_session().await {
        tracing::warn!(error = %e, "Failed to clear realtime session");
    }
}
