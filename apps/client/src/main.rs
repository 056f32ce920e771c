//! Allowgate terminal client composition root.

#![forbid(unsafe_code)]

mod client_config;
mod terminal;

use std::sync::Arc;
use std::time::Duration;

use allowgate_application::{
    AccessSynchronizer, AdminMutationService, AllowListStore, IdentityProvider, SessionBootstrap,
    SessionControls, session_event_channel,
};
use allowgate_core::{AppError, AppResult};
use allowgate_domain::AllowListPath;
use allowgate_infrastructure::{
    ConsoleViewRenderer, FirebaseIdentityProvider, FirebaseSession, FirestoreAllowListStore,
    InMemoryAllowListStore, InMemoryIdentityProvider,
};
use tracing::{error, info, warn};

use crate::client_config::{BackendConfig, ClientConfig, init_tracing};
use crate::terminal::{TerminalConsole, run_operator_loop};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ClientConfig::load()?;
    let path = AllowListPath::new(config.app_id.as_str())?;
    let (store, identity_provider) = build_backend(&config)?;
    let console = Arc::new(TerminalConsole::new());

    info!(
        app_id = path.app_id(),
        collection = %path.collection_path(),
        allow_self_grant = config.allow_self_grant,
        default_view = config.default_view.as_str(),
        "allowgate-client started"
    );

    let (events, receiver) = session_event_channel();
    let synchronizer = AccessSynchronizer::new(
        store.clone(),
        Arc::new(ConsoleViewRenderer::new()),
        path.clone(),
        &events,
        config.resubscribe_policy(),
        config.default_view,
    );
    let controls = SessionControls::new(
        AdminMutationService::new(store, console.clone(), path),
        synchronizer.subscribe_view(),
        events.clone(),
        config.allow_self_grant,
    );
    let dispatch = tokio::spawn(synchronizer.run(receiver));

    let bootstrap = SessionBootstrap::new(identity_provider, events);
    let session_result = match bootstrap.sign_in().await {
        Ok(_) => run_operator_loop(&controls, &console).await,
        Err(sign_in_error) => Err(sign_in_error),
    };

    if let Err(sign_out_error) = bootstrap.sign_out().await {
        error!(error = %sign_out_error, "sign-out failed");
    }
    controls.shutdown();
    dispatch
        .await
        .map_err(|error| AppError::Internal(format!("session dispatch loop failed: {error}")))?;

    match &session_result {
        Ok(()) => info!("allowgate-client stopped"),
        Err(session_error) if session_error.is_fatal() => {
            error!(error = %session_error, "allowgate-client aborted");
        }
        Err(session_error) => warn!(error = %session_error, "allowgate-client stopped with error"),
    }
    session_result
}

fn build_backend(
    config: &ClientConfig,
) -> AppResult<(Arc<dyn AllowListStore>, Arc<dyn IdentityProvider>)> {
    match &config.backend {
        BackendConfig::Memory => {
            info!("using in-memory backend; allow-list is not persisted");
            Ok((
                Arc::new(InMemoryAllowListStore::new()),
                Arc::new(InMemoryIdentityProvider::new()),
            ))
        }
        BackendConfig::Firebase(firebase) => {
            let http_client = reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .map_err(|error| {
                    AppError::Internal(format!("failed to build HTTP client: {error}"))
                })?;
            let session = FirebaseSession::new(http_client, firebase.as_ref().clone())?;

            info!(project_id = %firebase.project_id, "using Firebase backend");
            Ok((
                Arc::new(FirestoreAllowListStore::new(
                    session.clone(),
                    config.poll_interval(),
                )),
                Arc::new(FirebaseIdentityProvider::new(session)),
            ))
        }
    }
}
