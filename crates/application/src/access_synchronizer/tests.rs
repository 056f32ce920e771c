use std::sync::Arc;
use std::time::Duration;

use allowgate_domain::{AccessDecision, AllowListEntry, AllowListSnapshot, SubView};

use crate::test_support::{FakeAllowListStore, RecordingRenderer, RenderedView, identity, path};
use crate::{
    AllowListStore, ResubscribePolicy, SessionEvent, SessionEventReceiver, SessionEventSender,
    session_event_channel,
};

use super::AccessSynchronizer;

struct Harness {
    synchronizer: AccessSynchronizer,
    _events: SessionEventSender,
    receiver: SessionEventReceiver,
    store: Arc<FakeAllowListStore>,
    renderer: Arc<RecordingRenderer>,
}

impl Harness {
    fn new(store: FakeAllowListStore, policy: ResubscribePolicy) -> Self {
        let store = Arc::new(store);
        let renderer = Arc::new(RecordingRenderer::default());
        let (events, receiver) = session_event_channel();
        let synchronizer = AccessSynchronizer::new(
            store.clone(),
            renderer.clone(),
            path(),
            &events,
            policy,
            SubView::Piano,
        );

        Self {
            synchronizer,
            _events: events,
            receiver,
            store,
            renderer,
        }
    }

    async fn sign_in(&mut self, value: &str) {
        let _ = self
            .synchronizer
            .handle_event(SessionEvent::IdentityEstablished(identity(value)))
            .await;
        self.pump().await;
    }

    /// Handles every event already queued on the bus.
    async fn pump(&mut self) {
        while let Ok(event) = self.receiver.try_recv() {
            let _ = self.synchronizer.handle_event(event).await;
        }
    }

    /// Waits for the next event, for timer-driven follow-ups.
    async fn next_event(&mut self) -> Option<SessionEvent> {
        tokio::time::timeout(Duration::from_millis(500), self.receiver.recv())
            .await
            .ok()
            .flatten()
    }
}

fn granted(sub_view: SubView, keys: &[&str]) -> RenderedView {
    RenderedView::Granted(sub_view, keys.iter().map(|key| (*key).to_owned()).collect())
}

#[tokio::test]
async fn renders_pending_before_identity() {
    let harness = Harness::new(FakeAllowListStore::default(), ResubscribePolicy::disabled());

    harness.synchronizer.render();

    assert_eq!(harness.renderer.views(), vec![RenderedView::Pending]);
    assert_eq!(harness.synchronizer.decision(), AccessDecision::Pending);
    assert_eq!(harness.store.subscribe_calls(), 0);
}

#[tokio::test]
async fn empty_allow_list_denies_with_own_identity() {
    let mut harness = Harness::new(FakeAllowListStore::default(), ResubscribePolicy::disabled());

    harness.sign_in("abc123xyz0").await;

    assert_eq!(
        harness.renderer.views(),
        vec![RenderedView::Denied("abc123xyz0".to_owned())]
    );
}

#[tokio::test]
async fn sequential_snapshots_rerender_once_each() {
    let mut harness = Harness::new(
        FakeAllowListStore::with_identities(&["u1"]),
        ResubscribePolicy::disabled(),
    );

    harness.sign_in("u2").await;
    assert!(!harness.synchronizer.decision().is_granted());

    let added = harness
        .store
        .upsert_entry(&path(), AllowListEntry::observed(identity("u2"), None, None))
        .await;
    assert!(added.is_ok());
    harness.pump().await;

    assert!(harness.synchronizer.decision().is_granted());
    assert_eq!(
        harness.renderer.views(),
        vec![
            RenderedView::Denied("u2".to_owned()),
            granted(SubView::Piano, &["u1", "u2"]),
        ]
    );
}

#[tokio::test]
async fn unchanged_snapshot_still_rerenders() {
    let mut harness = Harness::new(
        FakeAllowListStore::with_identities(&["u1"]),
        ResubscribePolicy::disabled(),
    );
    harness.sign_in("u1").await;

    for sink in harness.store.open_sinks() {
        sink.deliver(AllowListSnapshot::from_identities([identity("u1")]));
    }
    harness.pump().await;

    assert_eq!(
        harness.renderer.views(),
        vec![granted(SubView::Piano, &["u1"]), granted(SubView::Piano, &["u1"])]
    );
}

#[tokio::test]
async fn repeated_identity_opens_one_listener() {
    let mut harness = Harness::new(FakeAllowListStore::default(), ResubscribePolicy::disabled());

    harness.sign_in("abc123xyz0").await;
    harness.sign_in("abc123xyz0").await;

    assert_eq!(harness.store.subscribe_calls(), 1);
    assert_eq!(harness.renderer.views().len(), 1);
}

#[tokio::test]
async fn second_identity_is_ignored_for_active_session() {
    let mut harness = Harness::new(FakeAllowListStore::default(), ResubscribePolicy::disabled());

    harness.sign_in("abc123xyz0").await;
    harness.sign_in("zzz999yyy8").await;

    assert_eq!(harness.store.subscribe_calls(), 1);
    assert_eq!(
        harness.synchronizer.decision(),
        AccessDecision::Denied {
            identity: identity("abc123xyz0")
        }
    );
}

#[tokio::test]
async fn selected_sub_view_survives_new_snapshots() {
    let mut harness = Harness::new(
        FakeAllowListStore::with_identities(&["u1"]),
        ResubscribePolicy::disabled(),
    );
    harness.sign_in("u1").await;

    let _ = harness
        .synchronizer
        .handle_event(SessionEvent::ViewSelected(SubView::Admin))
        .await;
    let added = harness
        .store
        .upsert_entry(&path(), AllowListEntry::observed(identity("u3"), None, None))
        .await;
    assert!(added.is_ok());
    harness.pump().await;

    assert_eq!(
        harness.renderer.views(),
        vec![
            granted(SubView::Piano, &["u1"]),
            granted(SubView::Admin, &["u1"]),
            granted(SubView::Admin, &["u1", "u3"]),
        ]
    );
}

#[tokio::test]
async fn sub_view_chosen_while_denied_applies_on_grant() {
    let mut harness = Harness::new(FakeAllowListStore::default(), ResubscribePolicy::disabled());
    harness.sign_in("u1").await;

    let _ = harness
        .synchronizer
        .handle_event(SessionEvent::ViewSelected(SubView::Admin))
        .await;
    assert_eq!(harness.renderer.views().len(), 1);

    let added = harness
        .store
        .upsert_entry(&path(), AllowListEntry::observed(identity("u1"), None, None))
        .await;
    assert!(added.is_ok());
    harness.pump().await;

    assert_eq!(
        harness.renderer.last(),
        Some(granted(SubView::Admin, &["u1"]))
    );
}

#[tokio::test]
async fn sign_out_cancels_listener_and_returns_to_pending() {
    let mut harness = Harness::new(
        FakeAllowListStore::with_identities(&["u1"]),
        ResubscribePolicy::disabled(),
    );
    harness.sign_in("u1").await;
    let old_sinks = harness.store.open_sinks();

    let _ = harness
        .synchronizer
        .handle_event(SessionEvent::SignedOut)
        .await;

    assert_eq!(harness.store.cancelled(), 1);
    assert!(!harness.synchronizer.has_subscription());
    assert_eq!(harness.renderer.last(), Some(RenderedView::Pending));

    for sink in old_sinks {
        sink.deliver(AllowListSnapshot::from_identities([identity("u1")]));
    }
    harness.pump().await;
    assert_eq!(harness.renderer.last(), Some(RenderedView::Pending));
}

#[tokio::test]
async fn failed_listener_is_reopened_after_backoff() {
    let mut harness = Harness::new(
        FakeAllowListStore::with_identities(&["u1"]),
        ResubscribePolicy::new(2, Duration::ZERO),
    );
    harness.sign_in("u1").await;
    let view = harness.synchronizer.subscribe_view();

    harness.store.drop_listeners("connection reset");
    harness.pump().await;

    assert!(!harness.synchronizer.has_subscription());
    assert!(view.borrow().stale);
    assert!(view.borrow().decision.is_granted());

    let due = harness.next_event().await;
    assert_eq!(due, Some(SessionEvent::ResubscribeDue));
    if let Some(event) = due {
        let _ = harness.synchronizer.handle_event(event).await;
    }
    harness.pump().await;

    assert_eq!(harness.store.subscribe_calls(), 2);
    assert!(harness.synchronizer.has_subscription());
    assert!(!view.borrow().stale);
}

#[tokio::test]
async fn resubscribe_stops_after_max_attempts() {
    let store = FakeAllowListStore::default();
    store.fail_next_subscribes(10);
    let mut harness = Harness::new(store, ResubscribePolicy::new(2, Duration::ZERO));

    harness.sign_in("u1").await;
    for _ in 0..2 {
        let due = harness.next_event().await;
        assert_eq!(due, Some(SessionEvent::ResubscribeDue));
        if let Some(event) = due {
            let _ = harness.synchronizer.handle_event(event).await;
        }
    }

    assert_eq!(harness.store.subscribe_calls(), 3);
    assert_eq!(harness.next_event().await, None);
    assert_eq!(harness.synchronizer.decision(), AccessDecision::Pending);
}

#[tokio::test]
async fn disabled_policy_leaves_mirror_stale() {
    let mut harness = Harness::new(
        FakeAllowListStore::with_identities(&["u1"]),
        ResubscribePolicy::disabled(),
    );
    harness.sign_in("u1").await;
    let view = harness.synchronizer.subscribe_view();

    harness.store.drop_listeners("connection reset");
    harness.pump().await;

    assert_eq!(harness.next_event().await, None);
    assert!(view.borrow().stale);
    assert_eq!(harness.store.subscribe_calls(), 1);
}

#[tokio::test]
async fn shutdown_stops_loop_and_cancels_listener() {
    let mut harness = Harness::new(FakeAllowListStore::default(), ResubscribePolicy::disabled());
    harness.sign_in("u1").await;

    let flow = harness
        .synchronizer
        .handle_event(SessionEvent::Shutdown)
        .await;

    assert!(flow.is_break());
    assert_eq!(harness.store.cancelled(), 1);
}

#[tokio::test]
async fn run_loop_processes_events_in_order() {
    let store = Arc::new(FakeAllowListStore::default());
    let renderer = Arc::new(RecordingRenderer::default());
    let (events, receiver) = session_event_channel();
    let synchronizer = AccessSynchronizer::new(
        store.clone(),
        renderer.clone(),
        path(),
        &events,
        ResubscribePolicy::disabled(),
        SubView::Piano,
    );
    let mut view = synchronizer.subscribe_view();
    let task = tokio::spawn(synchronizer.run(receiver));

    assert!(events.send(SessionEvent::IdentityEstablished(identity("abc123xyz0"))));
    let denied = tokio::time::timeout(
        Duration::from_secs(1),
        view.wait_for(|view| matches!(view.decision, AccessDecision::Denied { .. })),
    )
    .await
    .map(|result| result.is_ok());
    assert_eq!(denied.ok(), Some(true));

    assert!(events.send(SessionEvent::Shutdown));
    assert!(task.await.is_ok());
    assert_eq!(
        renderer.views(),
        vec![
            RenderedView::Pending,
            RenderedView::Denied("abc123xyz0".to_owned()),
        ]
    );
    assert_eq!(store.cancelled(), 1);
}

#[tokio::test]
async fn run_loop_ends_when_every_sender_is_dropped() {
    let store = Arc::new(FakeAllowListStore::with_identities(&["abc123xyz0"]));
    let renderer = Arc::new(RecordingRenderer::default());
    let (events, receiver) = session_event_channel();
    let synchronizer = AccessSynchronizer::new(
        store.clone(),
        renderer.clone(),
        path(),
        &events,
        ResubscribePolicy::new(3, Duration::from_millis(10)),
        SubView::Piano,
    );
    let mut view = synchronizer.subscribe_view();
    let task = tokio::spawn(synchronizer.run(receiver));

    assert!(events.send(SessionEvent::IdentityEstablished(identity("abc123xyz0"))));
    let granted = tokio::time::timeout(
        Duration::from_secs(1),
        view.wait_for(|view| view.decision.is_granted()),
    )
    .await
    .map(|result| result.is_ok());
    assert_eq!(granted.ok(), Some(true));

    drop(events);
    let finished = tokio::time::timeout(Duration::from_secs(1), task).await;

    assert!(matches!(finished, Ok(Ok(()))));
    assert_eq!(store.cancelled(), 1);
    assert!(store.open_sinks().is_empty());
}

#[tokio::test]
async fn pending_resubscribe_does_not_keep_the_loop_alive() {
    let store = FakeAllowListStore::default();
    store.fail_next_subscribes(1);
    let store = Arc::new(store);
    let (events, receiver) = session_event_channel();
    let synchronizer = AccessSynchronizer::new(
        store.clone(),
        Arc::new(RecordingRenderer::default()),
        path(),
        &events,
        ResubscribePolicy::new(3, Duration::from_millis(200)),
        SubView::Piano,
    );
    let task = tokio::spawn(synchronizer.run(receiver));

    assert!(events.send(SessionEvent::IdentityEstablished(identity("abc123xyz0"))));
    drop(events);
    let finished = tokio::time::timeout(Duration::from_secs(1), task).await;

    assert!(matches!(finished, Ok(Ok(()))));
    assert_eq!(store.subscribe_calls(), 1);
}
