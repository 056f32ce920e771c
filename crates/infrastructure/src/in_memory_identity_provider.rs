use async_trait::async_trait;
use allowgate_application::IdentityProvider;
use allowgate_core::{AppError, AppResult, Identity};
use tokio::sync::RwLock;
use tracing::info;

/// Offline identity provider handing out one random identity per sign-in
/// session.
///
/// Repeated sign-ins return the same identity until [`IdentityProvider::sign_out`].
#[derive(Debug, Default)]
pub struct InMemoryIdentityProvider {
    current: RwLock<Option<Identity>>,
    fixed: Option<Identity>,
}

impl InMemoryIdentityProvider {
    /// Creates a provider generating identities on sign-in.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a provider that always signs in as `identity`.
    #[must_use]
    pub fn with_identity(identity: Identity) -> Self {
        Self {
            current: RwLock::new(None),
            fixed: Some(identity),
        }
    }

    fn next_identity(&self) -> AppResult<Identity> {
        match &self.fixed {
            Some(identity) => Ok(identity.clone()),
            None => Identity::new(uuid::Uuid::new_v4().simple().to_string()).map_err(|error| {
                AppError::Authentication(format!("generated identity is invalid: {error}"))
            }),
        }
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn sign_in_anonymously(&self) -> AppResult<Identity> {
        let mut current = self.current.write().await;
        if let Some(identity) = current.as_ref() {
            return Ok(identity.clone());
        }

        let identity = self.next_identity()?;
        info!(identity = %identity, "signed in anonymously (in-memory)");
        *current = Some(identity.clone());
        Ok(identity)
    }

    async fn sign_out(&self) -> AppResult<()> {
        if let Some(identity) = self.current.write().await.take() {
            info!(identity = %identity, "signed out (in-memory)");
        }
        Ok(())
    }
}
