use async_trait::async_trait;
use allowgate_application::IdentityProvider;
use allowgate_core::{AppResult, Identity};

use crate::FirebaseSession;

/// Identity provider backed by Firebase anonymous auth.
#[derive(Debug, Clone)]
pub struct FirebaseIdentityProvider {
    session: FirebaseSession,
}

impl FirebaseIdentityProvider {
    /// Creates a provider signing into `session`.
    #[must_use]
    pub fn new(session: FirebaseSession) -> Self {
        Self { session }
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentityProvider {
    async fn sign_in_anonymously(&self) -> AppResult<Identity> {
        self.session.sign_in_anonymously().await
    }

    async fn sign_out(&self) -> AppResult<()> {
        self.session.sign_out().await;
        Ok(())
    }
}
