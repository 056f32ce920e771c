//! Access synchronizer: local allow-list mirror and view selection.
//!
//! The synchronizer is the single writer of the session context. Every input
//! (sign-in, listener deliveries, listener failures, sub-view changes) arrives
//! as a [`SessionEvent`] on one channel and is handled in arrival order.

mod resubscribe;

#[cfg(test)]
mod tests;

use std::ops::ControlFlow;
use std::sync::Arc;

use allowgate_core::Identity;
use allowgate_domain::{AccessDecision, AllowListPath, AllowListSnapshot, SubView};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::{
    AllowListStore, SessionEvent, SessionEventReceiver, SessionEventSender, SnapshotSink,
    SubscriptionHandle, SubscriptionId, ViewRenderer, WeakSessionEventSender,
};

pub use resubscribe::ResubscribePolicy;

/// Read-only projection of the session published after every transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    /// Caller identity once signed in.
    pub identity: Option<Identity>,
    /// Current top-level state.
    pub decision: AccessDecision,
    /// Latest delivered allow-list.
    pub allow_list: AllowListSnapshot,
    /// Set while the listener is down and the mirror may be outdated.
    pub stale: bool,
}

impl Default for SessionView {
    fn default() -> Self {
        Self {
            identity: None,
            decision: AccessDecision::Pending,
            allow_list: AllowListSnapshot::empty(),
            stale: false,
        }
    }
}

struct ActiveSubscription {
    id: SubscriptionId,
    handle: SubscriptionHandle,
}

struct SessionContext {
    identity: Option<Identity>,
    snapshot: Option<AllowListSnapshot>,
    sub_view: SubView,
    subscription: Option<ActiveSubscription>,
    consecutive_failures: u32,
    stale: bool,
}

impl SessionContext {
    fn new(sub_view: SubView) -> Self {
        Self {
            identity: None,
            snapshot: None,
            sub_view,
            subscription: None,
            consecutive_failures: 0,
            stale: false,
        }
    }

    fn is_current(&self, subscription_id: SubscriptionId) -> bool {
        self.subscription
            .as_ref()
            .is_some_and(|active| active.id == subscription_id)
    }

    fn decision(&self) -> AccessDecision {
        AccessDecision::evaluate(
            self.identity.as_ref(),
            self.snapshot.as_ref(),
            self.sub_view,
        )
    }
}

/// Keeps the "is this caller allowed" fact current and drives the view.
pub struct AccessSynchronizer {
    store: Arc<dyn AllowListStore>,
    renderer: Arc<dyn ViewRenderer>,
    path: AllowListPath,
    events: WeakSessionEventSender,
    resubscribe: ResubscribePolicy,
    context: SessionContext,
    view_sender: watch::Sender<SessionView>,
    next_subscription_id: SubscriptionId,
}

impl AccessSynchronizer {
    /// Creates a synchronizer for the collection at `path`.
    ///
    /// `events` must be the sending half of the channel later passed to
    /// [`Self::run`]; listeners and resubscribe timers post through it. The
    /// synchronizer keeps only a weak handle, so the loop ends once the
    /// caller's senders are all dropped.
    #[must_use]
    pub fn new(
        store: Arc<dyn AllowListStore>,
        renderer: Arc<dyn ViewRenderer>,
        path: AllowListPath,
        events: &SessionEventSender,
        resubscribe: ResubscribePolicy,
        default_view: SubView,
    ) -> Self {
        let (view_sender, _) = watch::channel(SessionView::default());

        Self {
            store,
            renderer,
            path,
            events: events.downgrade(),
            resubscribe,
            context: SessionContext::new(default_view),
            view_sender,
            next_subscription_id: 1,
        }
    }

    /// Returns a receiver for the published session view.
    #[must_use]
    pub fn subscribe_view(&self) -> watch::Receiver<SessionView> {
        self.view_sender.subscribe()
    }

    /// Returns the decision for the current context.
    #[must_use]
    pub fn decision(&self) -> AccessDecision {
        self.context.decision()
    }

    /// Returns whether a listener is open.
    #[must_use]
    pub fn has_subscription(&self) -> bool {
        self.context.subscription.is_some()
    }

    /// Runs the dispatch loop until [`SessionEvent::Shutdown`] arrives or every
    /// owning sender is dropped.
    pub async fn run(mut self, mut receiver: SessionEventReceiver) {
        self.render();

        while let Some(event) = receiver.recv().await {
            if self.handle_event(event).await.is_break() {
                break;
            }
        }

        self.close_subscription();
        info!("session dispatch loop stopped");
    }

    /// Applies one event to the session context.
    pub async fn handle_event(&mut self, event: SessionEvent) -> ControlFlow<()> {
        match event {
            SessionEvent::IdentityEstablished(identity) => {
                self.on_identity_established(identity).await;
            }
            SessionEvent::AuthenticationFailed(message) => {
                error!(error = %message, "authentication failed; session stays pending");
            }
            SessionEvent::SignedOut => self.on_signed_out(),
            SessionEvent::SnapshotReceived {
                subscription_id,
                snapshot,
            } => self.on_snapshot_received(subscription_id, snapshot),
            SessionEvent::SubscriptionFailed {
                subscription_id,
                message,
            } => self.on_subscription_failed(subscription_id, message),
            SessionEvent::ResubscribeDue => self.on_resubscribe_due().await,
            SessionEvent::ViewSelected(sub_view) => self.on_view_selected(sub_view),
            SessionEvent::Shutdown => {
                self.close_subscription();
                return ControlFlow::Break(());
            }
        }

        ControlFlow::Continue(())
    }

    /// Renders the current decision and publishes the session view.
    pub fn render(&self) {
        let decision = self.context.decision();
        match &decision {
            AccessDecision::Pending => self.renderer.render_pending(),
            AccessDecision::Granted { sub_view } => {
                let empty = AllowListSnapshot::empty();
                let allow_list = self.context.snapshot.as_ref().unwrap_or(&empty);
                self.renderer.render_granted(*sub_view, allow_list);
            }
            AccessDecision::Denied { identity } => self.renderer.render_denied(identity),
        }

        debug!(decision = decision.label(), "view rendered");
        self.publish(decision);
    }

    async fn on_identity_established(&mut self, identity: Identity) {
        match &self.context.identity {
            Some(current) if current == &identity => {
                debug!(identity = %identity, "identity already established");
                return;
            }
            Some(current) => {
                warn!(
                    current = %current,
                    received = %identity,
                    "ignoring second identity for an active session"
                );
                return;
            }
            None => {}
        }

        info!(identity = %identity, "identity established");
        self.context.identity = Some(identity);
        self.open_subscription().await;
        self.publish(self.context.decision());
    }

    fn on_signed_out(&mut self) {
        info!("signed out; clearing session");
        self.close_subscription();
        self.context.identity = None;
        self.context.snapshot = None;
        self.context.consecutive_failures = 0;
        self.context.stale = false;
        self.render();
    }

    fn on_snapshot_received(&mut self, subscription_id: SubscriptionId, snapshot: AllowListSnapshot) {
        if !self.context.is_current(subscription_id) {
            debug!(subscription_id, "dropping delivery from a closed listener");
            return;
        }

        debug!(
            subscription_id,
            allowed_count = snapshot.len(),
            "allow-list snapshot received"
        );
        self.context.snapshot = Some(snapshot);
        self.context.consecutive_failures = 0;
        self.context.stale = false;
        self.render();
    }

    fn on_subscription_failed(&mut self, subscription_id: SubscriptionId, message: String) {
        if !self.context.is_current(subscription_id) {
            debug!(subscription_id, "dropping failure from a closed listener");
            return;
        }

        error!(subscription_id, error = %message, "allow-list listener failed");
        self.close_subscription();
        self.context.stale = true;
        self.schedule_resubscribe();
        self.publish(self.context.decision());
    }

    async fn on_resubscribe_due(&mut self) {
        if self.context.identity.is_none() || self.context.subscription.is_some() {
            debug!("resubscribe no longer needed");
            return;
        }

        info!(
            attempt = self.context.consecutive_failures,
            "reopening allow-list listener"
        );
        self.open_subscription().await;
    }

    fn on_view_selected(&mut self, sub_view: SubView) {
        self.context.sub_view = sub_view;
        if self.context.decision().is_granted() {
            self.render();
        } else {
            debug!(view = sub_view.as_str(), "sub-view stored until access is granted");
        }
    }

    async fn open_subscription(&mut self) {
        if self.context.subscription.is_some() {
            return;
        }

        let subscription_id = self.next_subscription_id;
        self.next_subscription_id = self.next_subscription_id.saturating_add(1);
        let sink = SnapshotSink::new(subscription_id, self.events.clone());

        match self.store.subscribe(&self.path, sink).await {
            Ok(handle) => {
                info!(
                    subscription_id,
                    collection = %self.path.collection_path(),
                    "allow-list listener opened"
                );
                self.context.subscription = Some(ActiveSubscription {
                    id: subscription_id,
                    handle,
                });
            }
            Err(subscribe_error) => {
                error!(
                    subscription_id,
                    error = %subscribe_error,
                    "failed to open allow-list listener"
                );
                self.context.stale = self.context.snapshot.is_some();
                self.schedule_resubscribe();
            }
        }
    }

    fn close_subscription(&mut self) {
        if let Some(active) = self.context.subscription.take() {
            debug!(subscription_id = active.id, "closing allow-list listener");
            active.handle.cancel();
        }
    }

    fn schedule_resubscribe(&mut self) {
        let attempt = self.context.consecutive_failures.saturating_add(1);
        let Some(delay) = self.resubscribe.delay_for(attempt) else {
            error!(
                failures = self.context.consecutive_failures,
                "resubscribe attempts exhausted; allow-list mirror stays stale"
            );
            return;
        };

        self.context.consecutive_failures = attempt;
        warn!(
            attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "scheduling allow-list resubscribe"
        );

        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            events.send(SessionEvent::ResubscribeDue);
        });
    }

    fn publish(&self, decision: AccessDecision) {
        self.view_sender.send_replace(SessionView {
            identity: self.context.identity.clone(),
            decision,
            allow_list: self.context.snapshot.clone().unwrap_or_default(),
            stale: self.context.stale,
        });
    }
}
