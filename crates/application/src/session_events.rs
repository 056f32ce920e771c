//! Typed events feeding the single session dispatch loop.

use allowgate_core::Identity;
use allowgate_domain::{AllowListSnapshot, SubView};
use tokio::sync::mpsc;

/// Identifier of one listener opened by the synchronizer.
pub type SubscriptionId = u64;

/// Events consumed by [`crate::AccessSynchronizer::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The identity provider signed the caller in.
    IdentityEstablished(Identity),
    /// The identity provider could not sign the caller in.
    AuthenticationFailed(String),
    /// The identity provider ended the session.
    SignedOut,
    /// A listener delivered the full allow-list.
    SnapshotReceived {
        /// Listener that produced the delivery.
        subscription_id: SubscriptionId,
        /// Complete contents, replacing the previous mirror.
        snapshot: AllowListSnapshot,
    },
    /// A listener stopped with an error.
    SubscriptionFailed {
        /// Listener that failed.
        subscription_id: SubscriptionId,
        /// Backend error message.
        message: String,
    },
    /// A scheduled resubscribe attempt is due.
    ResubscribeDue,
    /// The operator picked a sub-view.
    ViewSelected(SubView),
    /// Session teardown.
    Shutdown,
}

/// Receiving half of the session event bus.
pub type SessionEventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

/// Sending half of the session event bus.
#[derive(Debug, Clone)]
pub struct SessionEventSender {
    sender: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionEventSender {
    /// Posts an event. Returns `false` once the dispatch loop is gone.
    pub fn send(&self, event: SessionEvent) -> bool {
        self.sender.send(event).is_ok()
    }

    /// Returns whether the dispatch loop stopped receiving.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Returns a handle that posts events without keeping the dispatch loop alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakSessionEventSender {
        WeakSessionEventSender {
            sender: self.sender.downgrade(),
        }
    }
}

/// Non-owning sending half of the session event bus.
///
/// Listeners and timers post through this handle so that the loop stops once
/// every [`SessionEventSender`] is gone.
#[derive(Debug, Clone)]
pub struct WeakSessionEventSender {
    sender: mpsc::WeakUnboundedSender<SessionEvent>,
}

impl WeakSessionEventSender {
    /// Posts an event. Returns `false` once the bus has no owner or no loop.
    pub fn send(&self, event: SessionEvent) -> bool {
        self.sender
            .upgrade()
            .is_some_and(|sender| sender.send(event).is_ok())
    }

    /// Returns whether events can no longer reach the dispatch loop.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender
            .upgrade()
            .is_none_or(|sender| sender.is_closed())
    }
}

/// Creates the session event bus.
#[must_use]
pub fn session_event_channel() -> (SessionEventSender, SessionEventReceiver) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (SessionEventSender { sender }, receiver)
}

/// Delivery endpoint handed to an [`crate::AllowListStore`] listener.
#[derive(Debug, Clone)]
pub struct SnapshotSink {
    subscription_id: SubscriptionId,
    events: WeakSessionEventSender,
}

impl SnapshotSink {
    /// Creates a sink tagging deliveries with `subscription_id`.
    #[must_use]
    pub fn new(subscription_id: SubscriptionId, events: WeakSessionEventSender) -> Self {
        Self {
            subscription_id,
            events,
        }
    }

    /// Returns the listener id.
    #[must_use]
    pub fn subscription_id(&self) -> SubscriptionId {
        self.subscription_id
    }

    /// Delivers the full allow-list. Returns `false` once nobody listens.
    pub fn deliver(&self, snapshot: AllowListSnapshot) -> bool {
        self.events.send(SessionEvent::SnapshotReceived {
            subscription_id: self.subscription_id,
            snapshot,
        })
    }

    /// Reports that the listener stopped.
    pub fn fail(&self, message: impl Into<String>) -> bool {
        self.events.send(SessionEvent::SubscriptionFailed {
            subscription_id: self.subscription_id,
            message: message.into(),
        })
    }

    /// Returns whether the dispatch loop stopped receiving.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use allowgate_domain::AllowListSnapshot;

    use super::{SessionEvent, SnapshotSink, session_event_channel};

    #[test]
    fn sink_tags_deliveries_with_subscription_id() {
        let (events, mut receiver) = session_event_channel();
        let sink = SnapshotSink::new(7, events.downgrade());

        assert!(sink.deliver(AllowListSnapshot::empty()));
        assert!(sink.fail("listener dropped"));

        assert_eq!(
            receiver.try_recv().ok(),
            Some(SessionEvent::SnapshotReceived {
                subscription_id: 7,
                snapshot: AllowListSnapshot::empty(),
            })
        );
        assert_eq!(
            receiver.try_recv().ok(),
            Some(SessionEvent::SubscriptionFailed {
                subscription_id: 7,
                message: "listener dropped".to_owned(),
            })
        );
    }

    #[test]
    fn sink_reports_closed_loop() {
        let (events, receiver) = session_event_channel();
        let sink = SnapshotSink::new(1, events.downgrade());
        drop(receiver);

        assert!(sink.is_closed());
        assert!(!sink.deliver(AllowListSnapshot::empty()));
    }

    #[test]
    fn sink_closes_with_the_last_owning_sender() {
        let (events, mut receiver) = session_event_channel();
        let sink = SnapshotSink::new(3, events.downgrade());
        drop(events);

        assert!(sink.is_closed());
        assert!(!sink.deliver(AllowListSnapshot::empty()));
        assert_eq!(receiver.try_recv().ok(), None);
    }
}
