//! Where the local player's identity comes from.
//!
//! duelkit does not sign anyone in. The host application already knows who
//! the user is (an auth SDK, a profile store, a command-line flag) and
//! exposes that through the [`IdentityProvider`] trait. The engine asks for
//! it once per `start_duel`.

use std::future::Future;

use crate::{DuelUser, EngineError};

/// Identity data as supplied by the host application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

impl From<Identity> for DuelUser {
    fn from(identity: Identity) -> Self {
        Self {
            id: identity.id,
            display_name: identity.display_name,
            avatar_url: identity.avatar_url,
        }
    }
}

/// Supplies the local player's identity.
///
/// # Example
///
/// ```rust
/// use duelkit_engine::{EngineError, Identity, IdentityProvider};
///
/// /// Reads the player from environment variables.
/// struct EnvIdentity;
///
/// impl IdentityProvider for EnvIdentity {
///     async fn identity(&self) -> Result<Identity, EngineError> {
///         let id = std::env::var("PLAYER_ID")
///             .map_err(|_| EngineError::Identity("PLAYER_ID not set".into()))?;
///         Ok(Identity {
///             display_name: id.clone(),
///             id,
///             avatar_url: None,
///         })
///     }
/// }
/// ```
pub trait IdentityProvider: Send + Sync {
    /// Returns the identity to queue as.
    ///
    /// # Errors
    /// [`EngineError::Identity`] when no usable identity is available
    /// (signed out, profile not loaded).
    fn identity(&self) -> impl Future<Output = Result<Identity, EngineError>> + Send;
}

/// An [`IdentityProvider`] that always returns the same identity.
#[derive(Debug, Clone)]
pub struct StaticIdentity(Identity);

impl StaticIdentity {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self(Identity {
            id: id.into(),
            display_name: display_name.into(),
            avatar_url: None,
        })
    }

    #[must_use]
    pub fn with_avatar(mut self, url: impl Into<String>) -> Self {
        self.0.avatar_url = Some(url.into());
        self
    }
}

impl IdentityProvider for StaticIdentity {
    async fn identity(&self) -> Result<Identity, EngineError> {
        if self.0.id.trim().is_empty() {
            return Err(EngineError::Identity("player id is empty".into()));
        }
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_identity_resolves() {
        let provider = StaticIdentity::new("p1", "Ada").with_avatar("https://cdn/ada.png");
        let identity = provider.identity().await.unwrap();
        assert_eq!(identity.id, "p1");

        let user = DuelUser::from(identity);
        assert_eq!(user.display_name, "Ada");
        assert_eq!(user.avatar_url.as_deref(), Some("https://cdn/ada.png"));
    }

    #[tokio::test]
    async fn test_blank_id_is_rejected() {
        let provider = StaticIdentity::new("  ", "Nobody");
        assert!(matches!(
            provider.identity().await,
            Err(EngineError::Identity(_))
        ));
    }
}
