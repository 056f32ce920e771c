//! Ports to the collaborators the session depends on.

use async_trait::async_trait;

use allowgate_core::{AppResult, Identity};
use allowgate_domain::{AllowListEntry, AllowListPath, AllowListSnapshot, SubView};

use crate::SnapshotSink;

/// Identity provider port for anonymous sign-in.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Signs in anonymously and returns the stable identity for this session.
    async fn sign_in_anonymously(&self) -> AppResult<Identity>;

    /// Ends the provider-side session.
    async fn sign_out(&self) -> AppResult<()>;
}

/// Remote document store port holding the allow-list collection.
#[async_trait]
pub trait AllowListStore: Send + Sync {
    /// Opens a live listener on the collection.
    ///
    /// Implementations deliver the complete current contents through `sink`
    /// once the listener is established and again after every change. The
    /// listener stays open until the returned handle is cancelled or dropped.
    async fn subscribe(
        &self,
        path: &AllowListPath,
        sink: SnapshotSink,
    ) -> AppResult<SubscriptionHandle>;

    /// Creates or overwrites the document keyed by the entry identity.
    async fn upsert_entry(&self, path: &AllowListPath, entry: AllowListEntry) -> AppResult<()>;

    /// Deletes the document keyed by `identity`. Missing documents are not an error.
    async fn delete_entry(&self, path: &AllowListPath, identity: &Identity) -> AppResult<()>;
}

/// View controller port. Pure presentation, no access logic.
pub trait ViewRenderer: Send + Sync {
    /// Shows the loading state.
    fn render_pending(&self);

    /// Shows the application with the selected sub-view and the allow-list
    /// for the admin panel.
    fn render_granted(&self, sub_view: SubView, allow_list: &AllowListSnapshot);

    /// Shows the denial screen with the caller's own identity.
    fn render_denied(&self, identity: &Identity);
}

/// Operator prompt for irreversible actions.
#[async_trait]
pub trait OperatorConfirmation: Send + Sync {
    /// Returns whether the operator accepted `prompt`.
    async fn confirm(&self, prompt: &str) -> bool;
}

/// Cancels a live listener when cancelled or dropped.
pub struct SubscriptionHandle {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl SubscriptionHandle {
    /// Creates a handle that runs `cancel` exactly once.
    #[must_use]
    pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Creates a handle with nothing to release.
    #[must_use]
    pub fn detached() -> Self {
        Self { cancel: None }
    }

    /// Stops the listener.
    pub fn cancel(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SubscriptionHandle")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
