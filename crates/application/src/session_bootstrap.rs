use std::sync::Arc;

use tracing::{error, info};

use allowgate_core::{AppError, AppResult, Identity};

use crate::{IdentityProvider, SessionEvent, SessionEventSender};

/// Bridges the identity provider's auth-state transitions onto the session bus.
#[derive(Clone)]
pub struct SessionBootstrap {
    provider: Arc<dyn IdentityProvider>,
    events: SessionEventSender,
}

impl SessionBootstrap {
    /// Creates a bootstrap posting to `events`.
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>, events: SessionEventSender) -> Self {
        Self { provider, events }
    }

    /// Signs in anonymously and posts exactly one auth-state event.
    pub async fn sign_in(&self) -> AppResult<Identity> {
        match self.provider.sign_in_anonymously().await {
            Ok(identity) => {
                info!(identity = %identity, "anonymous sign-in completed");
                self.events
                    .send(SessionEvent::IdentityEstablished(identity.clone()));
                Ok(identity)
            }
            Err(sign_in_error) => {
                let error = match sign_in_error {
                    AppError::Authentication(_) | AppError::Configuration(_) => sign_in_error,
                    other => AppError::Authentication(other.message().to_owned()),
                };
                error!(error = %error, "anonymous sign-in failed");
                self.events
                    .send(SessionEvent::AuthenticationFailed(error.message().to_owned()));
                Err(error)
            }
        }
    }

    /// Signs out and posts the transition.
    pub async fn sign_out(&self) -> AppResult<()> {
        self.provider.sign_out().await?;
        self.events.send(SessionEvent::SignedOut);
        Ok(())
    }
}
