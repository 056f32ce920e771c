//! Firebase backend configuration bundle.

use allowgate_core::{AppError, AppResult};
use url::Url;

/// Default Identity Toolkit endpoint.
pub const DEFAULT_IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/";

/// Default Secure Token endpoint used for ID token refresh.
pub const DEFAULT_SECURE_TOKEN_URL: &str = "https://securetoken.googleapis.com/";

/// Default Firestore REST endpoint.
pub const DEFAULT_FIRESTORE_URL: &str = "https://firestore.googleapis.com/";

const PLACEHOLDER_PREFIX: &str = "YOUR_";

/// Web app configuration bundle plus the REST endpoints derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirebaseConfig {
    /// Browser API key.
    pub api_key: String,
    /// Auth domain.
    pub auth_domain: String,
    /// Project id, used in Firestore document names.
    pub project_id: String,
    /// Storage bucket.
    pub storage_bucket: String,
    /// Messaging sender id.
    pub messaging_sender_id: String,
    /// Firebase app id.
    pub app_id: String,
    /// Identity Toolkit base URL.
    pub identity_toolkit_url: Url,
    /// Secure Token base URL.
    pub secure_token_url: Url,
    /// Firestore base URL.
    pub firestore_url: Url,
}

impl FirebaseConfig {
    /// Creates a bundle with the public Google endpoints.
    pub fn new(
        api_key: impl Into<String>,
        auth_domain: impl Into<String>,
        project_id: impl Into<String>,
        storage_bucket: impl Into<String>,
        messaging_sender_id: impl Into<String>,
        app_id: impl Into<String>,
    ) -> AppResult<Self> {
        Ok(Self {
            api_key: api_key.into(),
            auth_domain: auth_domain.into(),
            project_id: project_id.into(),
            storage_bucket: storage_bucket.into(),
            messaging_sender_id: messaging_sender_id.into(),
            app_id: app_id.into(),
            identity_toolkit_url: parse_base_url(DEFAULT_IDENTITY_TOOLKIT_URL)?,
            secure_token_url: parse_base_url(DEFAULT_SECURE_TOKEN_URL)?,
            firestore_url: parse_base_url(DEFAULT_FIRESTORE_URL)?,
        })
    }

    /// Replaces the REST endpoints, e.g. with local emulator addresses.
    pub fn with_endpoints(
        mut self,
        identity_toolkit_url: &str,
        secure_token_url: &str,
        firestore_url: &str,
    ) -> AppResult<Self> {
        self.identity_toolkit_url = parse_base_url(identity_toolkit_url)?;
        self.secure_token_url = parse_base_url(secure_token_url)?;
        self.firestore_url = parse_base_url(firestore_url)?;
        Ok(self)
    }

    /// Presence check over the bundle. Values are not verified against the backend.
    pub fn validate(&self) -> AppResult<()> {
        let fields = [
            ("apiKey", self.api_key.as_str()),
            ("authDomain", self.auth_domain.as_str()),
            ("projectId", self.project_id.as_str()),
            ("storageBucket", self.storage_bucket.as_str()),
            ("messagingSenderId", self.messaging_sender_id.as_str()),
            ("appId", self.app_id.as_str()),
        ];

        let missing: Vec<&str> = fields
            .iter()
            .filter(|(_, value)| {
                let value = value.trim();
                value.is_empty() || value.starts_with(PLACEHOLDER_PREFIX)
            })
            .map(|(name, _)| *name)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::Configuration(format!(
                "Firebase configuration is missing or uses placeholder values for: {}",
                missing.join(", ")
            )))
        }
    }
}

fn parse_base_url(value: &str) -> AppResult<Url> {
    Url::parse(value).map_err(|error| {
        AppError::Configuration(format!("invalid Firebase endpoint '{value}': {error}"))
    })
}
