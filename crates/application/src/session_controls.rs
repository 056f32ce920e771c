//! UI-facing operations: the whole externally invokable surface.

use std::str::FromStr;

use tokio::sync::watch;
use tracing::{error, warn};

use allowgate_core::{AppError, AppResult};
use allowgate_domain::SubView;

use crate::{
    AdminMutationService, AdminStatus, RemovalOutcome, SessionEvent, SessionEventSender,
    SessionView,
};


const NOT_ALLOWED_TO_MANAGE: &str = "Only allowed users can manage the allow-list.";

/// Operator commands routed to the mutation service and the dispatch loop.
///
/// Reads the published [`SessionView`]; never writes session state itself.
#[derive(Clone)]
pub struct SessionControls {
    mutations: AdminMutationService,
    view: watch::Receiver<SessionView>,
    events: SessionEventSender,
    allow_self_grant: bool,
}

impl SessionControls {
    /// Creates the controls for one session.
    #[must_use]
    pub fn new(
        mutations: AdminMutationService,
        view: watch::Receiver<SessionView>,
        events: SessionEventSender,
        allow_self_grant: bool,
    ) -> Self {
        Self {
            mutations,
            view,
            events,
            allow_self_grant,
        }
    }

    /// Returns the latest published session view.
    #[must_use]
    pub fn current(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// Switches the granted sub-view.
    pub fn change_view(&self, view_id: &str) -> AppResult<SubView> {
        let sub_view = SubView::from_str(view_id)?;
        self.post(SessionEvent::ViewSelected(sub_view))?;
        Ok(sub_view)
    }

    /// Grants the identity typed by an allowed operator.
    pub async fn add_entry(&self, raw_input: &str) -> AdminStatus {
        let session = self.current();
        let granted_by = match (&session.identity, session.decision.is_granted()) {
            (Some(identity), true) => identity.clone(),
            _ => {
                return AdminStatus::add_failed(&AppError::Forbidden(
                    NOT_ALLOWED_TO_MANAGE.to_owned(),
                ));
            }
        };

        let identity = raw_input.trim();
        match self.mutations.add_entry(identity, &granted_by).await {
            Ok(entry) => AdminStatus::entry_added(entry.identity()),
            Err(add_error) => AdminStatus::add_failed(&add_error),
        }
    }

    /// Revokes an identity after operator confirmation.
    pub async fn remove_entry(&self, identity: &str) -> AppResult<RemovalOutcome> {
        if !self.current().decision.is_granted() {
            return Err(AppError::Forbidden(NOT_ALLOWED_TO_MANAGE.to_owned()));
        }

        self.mutations.remove_entry(identity.trim()).await
    }

    /// Writes the caller's own identity into the allow-list.
    ///
    /// Any caller reaching this path can grant itself access unless backend
    /// rules restrict allow-list writes.
    pub async fn grant_self_access(&self) -> AdminStatus {
        let Some(identity) = self.current().identity else {
            error!("cannot grant access yet; identity not loaded");
            return AdminStatus::add_failed(&AppError::Authentication(
                "Cannot grant access yet. User ID not loaded.".to_owned(),
            ));
        };

        if !self.allow_self_grant {
            warn!(identity = %identity, "self-grant refused by configuration");
            return AdminStatus::add_failed(&AppError::Forbidden(
                "Self-grant is disabled for this deployment.".to_owned(),
            ));
        }

        warn!(
            identity = %identity,
            "self-grant requested; backend rules must restrict allow-list writes"
        );
        match self.mutations.add_entry(identity.as_str(), &identity).await {
            Ok(entry) => AdminStatus::entry_added(entry.identity()),
            Err(add_error) => AdminStatus::add_failed(&add_error),
        }
    }

    /// Ends the session dispatch loop.
    pub fn shutdown(&self) {
        let _ = self.events.send(SessionEvent::Shutdown);
    }

    fn post(&self, event: SessionEvent) -> AppResult<()> {
        if self.events.send(event) {
            Ok(())
        } else {
            Err(AppError::Internal(
                "session dispatch loop is not running".to_owned(),
            ))
        }
    }
}
