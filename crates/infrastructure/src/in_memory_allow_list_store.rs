use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use allowgate_application::{AllowListStore, SnapshotSink, SubscriptionHandle};
use allowgate_core::{AppResult, Identity};
use allowgate_domain::{AllowListEntry, AllowListPath, AllowListSnapshot};
use tokio::sync::RwLock;
use tracing::debug;


#[derive(Debug)]
struct Listener {
    key: u64,
    collection: String,
    sink: SnapshotSink,
}

/// In-memory allow-list store with live listeners.
///
/// Listeners get the current contents on subscribe and after every effective
/// change. Deliveries happen under the write lock, so every listener observes
/// writes in the same order.
#[derive(Debug, Default)]
pub struct InMemoryAllowListStore {
    collections: RwLock<HashMap<String, Vec<AllowListEntry>>>,
    listeners: Arc<Mutex<Vec<Listener>>>,
    next_listener_key: AtomicU64,
}

impl InMemoryAllowListStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store whose collection at `path` starts with `entries`.
    #[must_use]
    pub fn seeded(path: &AllowListPath, entries: Vec<AllowListEntry>) -> Self {
        Self {
            collections: RwLock::new(HashMap::from([(path.collection_path(), entries)])),
            ..Self::default()
        }
    }

    /// Returns the number of open listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }

    /// Drops every open listener with `message`, like a lost backend connection.
    pub fn interrupt_listeners(&self, message: &str) {
        let listeners: Vec<Listener> = lock(&self.listeners).drain(..).collect();
        for listener in listeners {
            listener.sink.fail(message);
        }
    }

    fn deliver(&self, collection: &str, entries: &[AllowListEntry]) {
        let snapshot = AllowListSnapshot::from_entries(entries.iter().cloned());
        let mut listeners = lock(&self.listeners);
        listeners.retain(|listener| {
            listener.collection != collection || listener.sink.deliver(snapshot.clone())
        });
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl AllowListStore for InMemoryAllowListStore {
    async fn subscribe(
        &self,
        path: &AllowListPath,
        sink: SnapshotSink,
    ) -> AppResult<SubscriptionHandle> {
        let collection = path.collection_path();
        let collections = self.collections.write().await;
        let entries = collections.get(&collection).cloned().unwrap_or_default();

        sink.deliver(AllowListSnapshot::from_entries(entries));

        let key = self.next_listener_key.fetch_add(1, Ordering::Relaxed);
        lock(&self.listeners).push(Listener {
            key,
            collection: collection.clone(),
            sink,
        });
        drop(collections);

        debug!(listener_key = key, collection = %collection, "in-memory listener registered");

        let listeners = Arc::clone(&self.listeners);
        Ok(SubscriptionHandle::new(move || {
            lock(&listeners).retain(|listener| listener.key != key);
        }))
    }

    async fn upsert_entry(&self, path: &AllowListPath, entry: AllowListEntry) -> AppResult<()> {
        let collection = path.collection_path();
        let mut collections = self.collections.write().await;
        let entries = collections.entry(collection.clone()).or_default();

        match entries
            .iter_mut()
            .find(|existing| existing.identity() == entry.identity())
        {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }

        self.deliver(&collection, entries);
        Ok(())
    }

    async fn delete_entry(&self, path: &AllowListPath, identity: &Identity) -> AppResult<()> {
        let collection = path.collection_path();
        let mut collections = self.collections.write().await;
        let Some(entries) = collections.get_mut(&collection) else {
            return Ok(());
        };

        let before = entries.len();
        entries.retain(|entry| entry.identity() != identity);
        if entries.len() != before {
            self.deliver(&collection, entries);
        }

        Ok(())
    }
}
