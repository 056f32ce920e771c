use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use allowgate_core::{AppError, AppResult, Identity};
use allowgate_domain::{AllowListEntry, AllowListPath, AllowListSnapshot, SubView};

use crate::{AllowListStore, OperatorConfirmation, SnapshotSink, SubscriptionHandle, ViewRenderer};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn identity(value: &str) -> Identity {
    Identity::new(value).unwrap_or_else(|_| unreachable!())
}

pub(crate) fn path() -> AllowListPath {
    AllowListPath::new("CoCreateMusic").unwrap_or_else(|_| unreachable!())
}

/// Store fake that echoes every effective write to its open listeners.
#[derive(Default)]
pub(crate) struct FakeAllowListStore {
    entries: Mutex<Vec<AllowListEntry>>,
    sinks: Arc<Mutex<Vec<SnapshotSink>>>,
    subscribe_failures_remaining: Mutex<u32>,
    write_error: Mutex<Option<String>>,
    subscribe_calls: AtomicUsize,
    cancelled: Arc<AtomicUsize>,
}

impl FakeAllowListStore {
    pub(crate) fn with_identities(values: &[&str]) -> Self {
        let store = Self::default();
        *lock(&store.entries) = values
            .iter()
            .map(|value| AllowListEntry::observed(identity(value), None, None))
            .collect();
        store
    }

    pub(crate) fn fail_next_subscribes(&self, count: u32) {
        *lock(&self.subscribe_failures_remaining) = count;
    }

    pub(crate) fn fail_writes(&self, message: &str) {
        *lock(&self.write_error) = Some(message.to_owned());
    }

    pub(crate) fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub(crate) fn open_sinks(&self) -> Vec<SnapshotSink> {
        lock(&self.sinks).clone()
    }

    pub(crate) fn keys(&self) -> Vec<String> {
        lock(&self.entries)
            .iter()
            .map(|entry| entry.identity().as_str().to_owned())
            .collect()
    }

    pub(crate) fn entry(&self, key: &str) -> Option<AllowListEntry> {
        lock(&self.entries)
            .iter()
            .find(|entry| entry.identity().as_str() == key)
            .cloned()
    }

    /// Drops every listener with an error, like a lost backend connection.
    pub(crate) fn drop_listeners(&self, message: &str) {
        let sinks: Vec<SnapshotSink> = lock(&self.sinks).drain(..).collect();
        for sink in sinks {
            sink.fail(message);
        }
    }

    fn snapshot(&self) -> AllowListSnapshot {
        AllowListSnapshot::from_entries(lock(&self.entries).clone())
    }

    fn broadcast(&self) {
        let snapshot = self.snapshot();
        for sink in lock(&self.sinks).iter() {
            sink.deliver(snapshot.clone());
        }
    }

    fn check_write(&self) -> AppResult<()> {
        match lock(&self.write_error).clone() {
            Some(message) => Err(AppError::Write(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AllowListStore for FakeAllowListStore {
    async fn subscribe(
        &self,
        _path: &AllowListPath,
        sink: SnapshotSink,
    ) -> AppResult<SubscriptionHandle> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        {
            let mut remaining = lock(&self.subscribe_failures_remaining);
            if *remaining > 0 {
                *remaining -= 1;
                return Err(AppError::Subscription("listener refused".to_owned()));
            }
        }

        let subscription_id = sink.subscription_id();
        sink.deliver(self.snapshot());
        lock(&self.sinks).push(sink);

        let sinks = Arc::clone(&self.sinks);
        let cancelled = Arc::clone(&self.cancelled);
        Ok(SubscriptionHandle::new(move || {
            lock(&sinks).retain(|sink| sink.subscription_id() != subscription_id);
            cancelled.fetch_add(1, Ordering::SeqCst);
        }))
    }

    async fn upsert_entry(&self, _path: &AllowListPath, entry: AllowListEntry) -> AppResult<()> {
        self.check_write()?;
        {
            let mut entries = lock(&self.entries);
            match entries
                .iter_mut()
                .find(|existing| existing.identity() == entry.identity())
            {
                Some(existing) => *existing = entry,
                None => entries.push(entry),
            }
        }

        self.broadcast();
        Ok(())
    }

    async fn delete_entry(&self, _path: &AllowListPath, identity: &Identity) -> AppResult<()> {
        self.check_write()?;
        let removed = {
            let mut entries = lock(&self.entries);
            let before = entries.len();
            entries.retain(|entry| entry.identity() != identity);
            entries.len() != before
        };

        if removed {
            self.broadcast();
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RenderedView {
    Pending,
    Granted(SubView, Vec<String>),
    Denied(String),
}

#[derive(Default)]
pub(crate) struct RecordingRenderer {
    views: Mutex<Vec<RenderedView>>,
}

impl RecordingRenderer {
    pub(crate) fn views(&self) -> Vec<RenderedView> {
        lock(&self.views).clone()
    }

    pub(crate) fn last(&self) -> Option<RenderedView> {
        lock(&self.views).last().cloned()
    }
}

impl ViewRenderer for RecordingRenderer {
    fn render_pending(&self) {
        lock(&self.views).push(RenderedView::Pending);
    }

    fn render_granted(&self, sub_view: SubView, allow_list: &AllowListSnapshot) {
        let keys = allow_list
            .identities()
            .map(|identity| identity.as_str().to_owned())
            .collect();
        lock(&self.views).push(RenderedView::Granted(sub_view, keys));
    }

    fn render_denied(&self, identity: &Identity) {
        lock(&self.views).push(RenderedView::Denied(identity.as_str().to_owned()));
    }
}

/// Confirmation fake answering every prompt the same way.
pub(crate) struct FixedConfirmation {
    answer: bool,
    prompts: Mutex<Vec<String>>,
}

impl FixedConfirmation {
    pub(crate) fn new(answer: bool) -> Self {
        Self {
            answer,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }
}

#[async_trait]
impl OperatorConfirmation for FixedConfirmation {
    async fn confirm(&self, prompt: &str) -> bool {
        lock(&self.prompts).push(prompt.to_owned());
        self.answer
    }
}
