//! Firestore REST adapter for the allow-list collection.
//!
//! The REST surface has no push channel, so a subscription is a background
//! task that lists the collection on an interval and delivers a full snapshot
//! whenever the listing differs from the previous delivery.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use allowgate_application::{AllowListStore, SnapshotSink, SubscriptionHandle};
use allowgate_core::{AppError, AppResult, Identity};
use allowgate_domain::{AllowListEntry, AllowListPath, AllowListSnapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use url::Url;

use crate::FirebaseSession;
use crate::firebase_rest::{endpoint, response_error};


/// Documents requested per listing page.
pub const FIRESTORE_PAGE_SIZE: u32 = 300;

const ADDED_BY_FIELD: &str = "addedBy";
const TIMESTAMP_FIELD: &str = "timestamp";

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default)]
    fields: HashMap<String, FieldValue>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    string_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp_value: Option<String>,
}

impl FieldValue {
    fn string(value: String) -> Self {
        Self {
            string_value: Some(value),
            timestamp_value: None,
        }
    }

    fn as_text(&self) -> Option<&str> {
        self.string_value
            .as_deref()
            .or(self.timestamp_value.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<Document>,
    next_page_token: Option<String>,
}

/// Allow-list store over the Firestore REST API.
#[derive(Debug, Clone)]
pub struct FirestoreAllowListStore {
    session: FirebaseSession,
    poll_interval: Duration,
}

impl FirestoreAllowListStore {
    /// Creates a store sending requests as the identity signed into `session`.
    #[must_use]
    pub fn new(session: FirebaseSession, poll_interval: Duration) -> Self {
        Self {
            session,
            poll_interval: poll_interval.max(Duration::from_millis(100)),
        }
    }

    fn collection_url(&self, path: &AllowListPath) -> AppResult<Url> {
        self.documents_url(&path.segments())
    }

    fn document_url(&self, path: &AllowListPath, identity: &Identity) -> AppResult<Url> {
        let mut segments = path.segments().to_vec();
        segments.push(identity.as_str());
        self.documents_url(&segments)
    }

    fn documents_url(&self, relative: &[&str]) -> AppResult<Url> {
        let config = self.session.config();
        let mut segments = vec![
            "v1",
            "projects",
            config.project_id.as_str(),
            "databases",
            "(default)",
            "documents",
        ];
        segments.extend_from_slice(relative);

        endpoint(&config.firestore_url, &segments, Some(&config.api_key))
    }

    /// Reads every document of the collection, following page tokens.
    async fn list_entries(&self, path: &AllowListPath) -> AppResult<Vec<AllowListEntry>> {
        let token = self.session.bearer_token().await?;
        let mut entries = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = self.collection_url(path)?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("pageSize", &FIRESTORE_PAGE_SIZE.to_string());
                if let Some(page_token) = page_token.as_deref() {
                    query.append_pair("pageToken", page_token);
                }
            }

            let response = self
                .session
                .http_client()
                .get(url)
                .bearer_auth(&token)
                .send()
                .await
                .map_err(|error| {
                    AppError::Subscription(format!("allow-list listing request failed: {error}"))
                })?;

            if !response.status().is_success() {
                return Err(AppError::Subscription(format!(
                    "allow-list listing rejected: {}",
                    response_error(response).await
                )));
            }

            let page: ListDocumentsResponse = response.json().await.map_err(|error| {
                AppError::Internal(format!("allow-list listing is malformed: {error}"))
            })?;
            entries.extend(page.documents.iter().filter_map(decode_document));

            match page.next_page_token.filter(|value| !value.is_empty()) {
                Some(next) => page_token = Some(next),
                None => return Ok(entries),
            }
        }
    }
}

#[async_trait]
impl AllowListStore for FirestoreAllowListStore {
    async fn subscribe(
        &self,
        path: &AllowListPath,
        sink: SnapshotSink,
    ) -> AppResult<SubscriptionHandle> {
        let initial = self
            .list_entries(path)
            .await
            .map_err(|error| AppError::Subscription(error.message().to_owned()))?;
        sink.deliver(AllowListSnapshot::from_entries(initial.clone()));

        let (cancel_sender, cancel_receiver) = oneshot::channel();
        tokio::spawn(poll_collection(
            self.clone(),
            path.clone(),
            sink,
            initial,
            cancel_receiver,
        ));

        Ok(SubscriptionHandle::new(move || {
            let _ = cancel_sender.send(());
        }))
    }

    async fn upsert_entry(&self, path: &AllowListPath, entry: AllowListEntry) -> AppResult<()> {
        let token = self.session.bearer_token().await?;
        let url = self.document_url(path, entry.identity())?;

        let response = self
            .session
            .http_client()
            .patch(url)
            .bearer_auth(token)
            .json(&encode_entry(&entry))
            .send()
            .await
            .map_err(|error| AppError::Write(format!("allow-list write request failed: {error}")))?;

        if !response.status().is_success() {
            return Err(AppError::Write(response_error(response).await));
        }

        info!(identity = %entry.identity(), "allow-list document written");
        Ok(())
    }

    async fn delete_entry(&self, path: &AllowListPath, identity: &Identity) -> AppResult<()> {
        let token = self.session.bearer_token().await?;
        let url = self.document_url(path, identity)?;

        let response = self
            .session
            .http_client()
            .delete(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|error| {
                AppError::Write(format!("allow-list delete request failed: {error}"))
            })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            debug!(identity = %identity, "allow-list document already absent");
            return Ok(());
        }

        if !response.status().is_success() {
            return Err(AppError::Write(response_error(response).await));
        }

        info!(identity = %identity, "allow-list document deleted");
        Ok(())
    }
}

async fn poll_collection(
    store: FirestoreAllowListStore,
    path: AllowListPath,
    sink: SnapshotSink,
    mut last_delivered: Vec<AllowListEntry>,
    mut cancelled: oneshot::Receiver<()>,
) {
    let subscription_id = sink.subscription_id();
    let mut interval = tokio::time::interval(store.poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await;

    debug!(subscription_id, collection = %path.collection_path(), "allow-list polling started");

    loop {
        tokio::select! {
            _ = &mut cancelled => break,
            _ = interval.tick() => {}
        }

        if sink.is_closed() {
            break;
        }

        let listing = tokio::select! {
            _ = &mut cancelled => break,
            listing = store.list_entries(&path) => listing,
        };

        match listing {
            Ok(entries) if entries == last_delivered => {}
            Ok(entries) => {
                if !sink.deliver(AllowListSnapshot::from_entries(entries.clone())) {
                    break;
                }
                last_delivered = entries;
            }
            Err(error) => {
                warn!(subscription_id, error = %error, "allow-list polling failed");
                sink.fail(error.message());
                return;
            }
        }
    }

    debug!(subscription_id, "allow-list polling stopped");
}

fn decode_document(document: &Document) -> Option<AllowListEntry> {
    let name = document.name.as_deref()?;
    let key = name.rsplit('/').next().unwrap_or(name);
    let identity = match Identity::new(key) {
        Ok(identity) => identity,
        Err(error) => {
            warn!(document = name, error = %error, "skipping allow-list document with invalid id");
            return None;
        }
    };

    let added_by = document
        .fields
        .get(ADDED_BY_FIELD)
        .and_then(FieldValue::as_text)
        .and_then(|value| Identity::new(value).ok());
    let timestamp = document
        .fields
        .get(TIMESTAMP_FIELD)
        .and_then(FieldValue::as_text)
        .and_then(|value| DateTime::parse_from_rfc3339(value).ok())
        .map(|value| value.with_timezone(&Utc));

    Some(AllowListEntry::observed(identity, added_by, timestamp))
}

fn encode_entry(entry: &AllowListEntry) -> Document {
    let mut fields = HashMap::new();
    if let Some(added_by) = entry.added_by() {
        fields.insert(
            ADDED_BY_FIELD.to_owned(),
            FieldValue::string(added_by.as_str().to_owned()),
        );
    }
    if let Some(timestamp) = entry.timestamp_iso() {
        fields.insert(TIMESTAMP_FIELD.to_owned(), FieldValue::string(timestamp));
    }

    Document { name: None, fields }
}
