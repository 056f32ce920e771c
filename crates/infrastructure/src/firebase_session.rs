//! Anonymous Firebase Auth session shared by the REST adapters.

use std::sync::Arc;
use std::time::Duration;

use allowgate_core::{AppError, AppResult, Identity};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::FirebaseConfig;
use crate::firebase_rest::{endpoint, response_error};

/// ID tokens are refreshed this long before the backend expiry.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignUpRequest {
    return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignUpResponse {
    local_id: String,
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    grant_type: &'static str,
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

#[derive(Debug, Clone)]
struct SignedInUser {
    identity: Identity,
    id_token: String,
    refresh_token: String,
    expires_at: Instant,
}

/// Signed-in state plus the HTTP client used by every Firebase adapter.
///
/// Cloning shares the same session, so the Firestore store always sends the
/// token of the identity the provider signed in.
#[derive(Debug, Clone)]
pub struct FirebaseSession {
    http_client: reqwest::Client,
    config: Arc<FirebaseConfig>,
    user: Arc<Mutex<Option<SignedInUser>>>,
}

impl FirebaseSession {
    /// Creates a signed-out session for a validated configuration bundle.
    pub fn new(http_client: reqwest::Client, config: FirebaseConfig) -> AppResult<Self> {
        config.validate()?;

        Ok(Self {
            http_client,
            config: Arc::new(config),
            user: Arc::new(Mutex::new(None)),
        })
    }

    /// Returns the configuration bundle.
    #[must_use]
    pub fn config(&self) -> &FirebaseConfig {
        &self.config
    }

    pub(crate) fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }

    /// Signs up an anonymous user unless one is already signed in.
    pub async fn sign_in_anonymously(&self) -> AppResult<Identity> {
        let mut user = self.user.lock().await;
        if let Some(current) = user.as_ref() {
            return Ok(current.identity.clone());
        }

        let url = endpoint(
            &self.config.identity_toolkit_url,
            &["v1", "accounts:signUp"],
            Some(&self.config.api_key),
        )?;
        let response = self
            .http_client
            .post(url)
            .json(&SignUpRequest {
                return_secure_token: true,
            })
            .send()
            .await
            .map_err(|error| {
                AppError::Authentication(format!("anonymous sign-in request failed: {error}"))
            })?;

        if !response.status().is_success() {
            return Err(AppError::Authentication(format!(
                "anonymous sign-in rejected: {}",
                response_error(response).await
            )));
        }

        let payload: SignUpResponse = response.json().await.map_err(|error| {
            AppError::Authentication(format!("anonymous sign-in response is malformed: {error}"))
        })?;
        let identity = Identity::new(payload.local_id).map_err(|error| {
            AppError::Authentication(format!("backend returned an invalid user id: {error}"))
        })?;

        info!(identity = %identity, "signed in anonymously");
        *user = Some(SignedInUser {
            identity: identity.clone(),
            id_token: payload.id_token,
            refresh_token: payload.refresh_token,
            expires_at: expiry(&payload.expires_in),
        });

        Ok(identity)
    }

    /// Drops the local credentials. Anonymous accounts have no server-side sign-out.
    pub async fn sign_out(&self) {
        if let Some(user) = self.user.lock().await.take() {
            info!(identity = %user.identity, "signed out");
        }
    }

    /// Returns a valid ID token, refreshing it when it is about to expire.
    pub async fn bearer_token(&self) -> AppResult<String> {
        let mut guard = self.user.lock().await;
        let Some(user) = guard.as_mut() else {
            return Err(AppError::Authentication(
                "no signed-in user for backend request".to_owned(),
            ));
        };

        if Instant::now() + TOKEN_REFRESH_MARGIN < user.expires_at {
            return Ok(user.id_token.clone());
        }

        debug!(identity = %user.identity, "refreshing ID token");
        let url = endpoint(
            &self.config.secure_token_url,
            &["v1", "token"],
            Some(&self.config.api_key),
        )?;
        let response = self
            .http_client
            .post(url)
            .json(&RefreshRequest {
                grant_type: "refresh_token",
                refresh_token: &user.refresh_token,
            })
            .send()
            .await
            .map_err(|error| {
                AppError::Authentication(format!("token refresh request failed: {error}"))
            })?;

        if !response.status().is_success() {
            return Err(AppError::Authentication(format!(
                "token refresh rejected: {}",
                response_error(response).await
            )));
        }

        let payload: RefreshResponse = response.json().await.map_err(|error| {
            AppError::Authentication(format!("token refresh response is malformed: {error}"))
        })?;
        user.id_token = payload.id_token;
        user.refresh_token = payload.refresh_token;
        user.expires_at = expiry(&payload.expires_in);

        Ok(user.id_token.clone())
    }
}

/// Parses the `expiresIn` seconds string. Unparseable values expire immediately.
fn expiry(expires_in: &str) -> Instant {
    let seconds = expires_in.trim().parse::<u64>().unwrap_or(0);
    Instant::now() + Duration::from_secs(seconds)
}
