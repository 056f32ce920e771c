use std::env;
use std::str::FromStr;
use std::time::Duration;

use allowgate_application::ResubscribePolicy;
use allowgate_core::{AppError, AppResult};
use allowgate_domain::SubView;
use allowgate_infrastructure::FirebaseConfig;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    Memory,
    Firebase(Box<FirebaseConfig>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub backend: BackendConfig,
    pub app_id: String,
    pub poll_interval_ms: u64,
    pub resubscribe_max_attempts: u32,
    pub resubscribe_backoff_ms: u64,
    pub allow_self_grant: bool,
    pub default_view: SubView,
}

impl ClientConfig {
    pub fn load() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let backend = match lookup("ALLOWGATE_BACKEND")
            .unwrap_or_else(|| "firebase".to_owned())
            .as_str()
        {
            "memory" => BackendConfig::Memory,
            "firebase" => {
                let value = |name: &str| lookup(name).unwrap_or_default();
                let mut firebase = FirebaseConfig::new(
                    value("FIREBASE_API_KEY"),
                    value("FIREBASE_AUTH_DOMAIN"),
                    value("FIREBASE_PROJECT_ID"),
                    value("FIREBASE_STORAGE_BUCKET"),
                    value("FIREBASE_MESSAGING_SENDER_ID"),
                    value("FIREBASE_APP_ID"),
                )?;
                match (
                    lookup("FIREBASE_AUTH_EMULATOR_HOST"),
                    lookup("FIRESTORE_EMULATOR_HOST"),
                ) {
                    (Some(auth_host), Some(firestore_host)) => {
                        firebase = firebase.with_endpoints(
                            &format!("http://{auth_host}/identitytoolkit.googleapis.com/"),
                            &format!("http://{auth_host}/securetoken.googleapis.com/"),
                            &format!("http://{firestore_host}/"),
                        )?;
                    }
                    (None, None) => {}
                    _ => {
                        return Err(AppError::Configuration(
                            "FIREBASE_AUTH_EMULATOR_HOST and FIRESTORE_EMULATOR_HOST must be set together"
                                .to_owned(),
                        ));
                    }
                }
                firebase.validate()?;
                BackendConfig::Firebase(Box::new(firebase))
            }
            other => {
                return Err(AppError::Configuration(format!(
                    "ALLOWGATE_BACKEND must be either 'firebase' or 'memory', got '{other}'"
                )));
            }
        };

        let app_id = lookup("ALLOWGATE_APP_ID").unwrap_or_else(|| "CoCreateMusic".to_owned());
        let poll_interval_ms = parse_or(&lookup, "ALLOWGATE_POLL_INTERVAL_MS", 2_000)?;
        let resubscribe_max_attempts = parse_or(&lookup, "ALLOWGATE_RESUBSCRIBE_MAX_ATTEMPTS", 5)?;
        let resubscribe_backoff_ms = parse_or(&lookup, "ALLOWGATE_RESUBSCRIBE_BACKOFF_MS", 1_000)?;
        let allow_self_grant = lookup("ALLOWGATE_ALLOW_SELF_GRANT")
            .unwrap_or_else(|| "true".to_owned())
            .eq_ignore_ascii_case("true");
        let default_view = lookup("ALLOWGATE_DEFAULT_VIEW")
            .map(|value| SubView::from_str(value.trim()))
            .transpose()
            .map_err(|error| {
                AppError::Configuration(format!("invalid ALLOWGATE_DEFAULT_VIEW: {}", error.message()))
            })?
            .unwrap_or_default();

        Ok(Self {
            backend,
            app_id,
            poll_interval_ms,
            resubscribe_max_attempts,
            resubscribe_backoff_ms,
            allow_self_grant,
            default_view,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn resubscribe_policy(&self) -> ResubscribePolicy {
        ResubscribePolicy::new(
            self.resubscribe_max_attempts,
            Duration::from_millis(self.resubscribe_backoff_ms),
        )
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(value) => value.trim().parse::<T>().map_err(|error| {
            AppError::Configuration(format!("invalid {name} value '{value}': {error}"))
        }),
        None => Ok(default),
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
