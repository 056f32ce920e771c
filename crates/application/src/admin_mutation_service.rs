use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use allowgate_core::{AppError, AppResult, Identity};
use allowgate_domain::{AllowListEntry, AllowListPath};

use crate::{AllowListStore, OperatorConfirmation};


/// Result of a confirmed or declined removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalOutcome {
    /// The delete was issued.
    Removed,
    /// The operator declined; nothing was written.
    Declined,
}

/// Command layer for allow-list writes. Holds no session state; results show
/// up through the live listener, never through a local update.
#[derive(Clone)]
pub struct AdminMutationService {
    store: Arc<dyn AllowListStore>,
    confirmation: Arc<dyn OperatorConfirmation>,
    path: AllowListPath,
}

impl AdminMutationService {
    /// Creates a mutation service writing to the collection at `path`.
    #[must_use]
    pub fn new(
        store: Arc<dyn AllowListStore>,
        confirmation: Arc<dyn OperatorConfirmation>,
        path: AllowListPath,
    ) -> Self {
        Self {
            store,
            confirmation,
            path,
        }
    }

    /// Grants `identity`, recording `granted_by` as the grantor.
    ///
    /// Re-adding an existing identity refreshes its audit fields.
    pub async fn add_entry(
        &self,
        identity: &str,
        granted_by: &Identity,
    ) -> AppResult<AllowListEntry> {
        let entry = AllowListEntry::grant(identity, granted_by, Utc::now())?;

        if let Err(error) = self.store.upsert_entry(&self.path, entry.clone()).await {
            let error = into_write_error(error);
            warn!(
                identity = %entry.identity(),
                granted_by = %granted_by,
                error = %error,
                "failed to add allow-list entry"
            );
            return Err(error);
        }

        info!(
            identity = %entry.identity(),
            granted_by = %granted_by,
            "allow-list entry added"
        );
        Ok(entry)
    }

    /// Revokes `identity` after the operator confirms.
    pub async fn remove_entry(&self, identity: &str) -> AppResult<RemovalOutcome> {
        let identity = Identity::new(identity)?;
        let prompt = format!(
            "Are you sure you want to remove user {identity} from the allowed list?"
        );

        if !self.confirmation.confirm(&prompt).await {
            info!(identity = %identity, "allow-list removal declined");
            return Ok(RemovalOutcome::Declined);
        }

        if let Err(error) = self.store.delete_entry(&self.path, &identity).await {
            let error = into_write_error(error);
            warn!(identity = %identity, error = %error, "failed to remove allow-list entry");
            return Err(error);
        }

        info!(identity = %identity, "allow-list entry removed");
        Ok(RemovalOutcome::Removed)
    }
}

fn into_write_error(error: AppError) -> AppError {
    match error {
        AppError::Write(_) => error,
        other => AppError::Write(other.message().to_owned()),
    }
}
