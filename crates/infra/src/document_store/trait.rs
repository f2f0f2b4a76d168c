use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use foodflow_events::{Event, EventEnvelope, Subscription};

/// A keyed JSON document and its version.
///
/// Versions start at `1` on first write and grow by one per committed write. A
/// document that does not exist is treated as version `0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub collection: String,
    pub key: String,
    pub version: u64,
    pub body: JsonValue,
}

/// Version of a document observed by a transaction (`0` = absent).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadVersion {
    pub collection: String,
    pub key: String,
    pub version: u64,
}

/// A document body staged for commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    pub collection: String,
    pub key: String,
    pub body: JsonValue,
}

/// A domain event staged for publication on the change feed.
///
/// The store assigns the sequence number (the document's version after the
/// commit) when the batch lands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub collection: String,
    pub key: String,
    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,
    pub payload: JsonValue,
}

impl UncommittedEvent {
    /// Serialize a typed domain event, keeping the metadata the feed needs.
    pub fn from_typed<E>(
        collection: impl Into<String>,
        key: impl Into<String>,
        event: &E,
    ) -> Result<Self, StoreError>
    where
        E: Event + Serialize,
    {
        let payload = serde_json::to_value(event)
            .map_err(|e| StoreError::Serialization(format!("event payload: {e}")))?;

        Ok(Self {
            event_id: Uuid::now_v7(),
            collection: collection.into(),
            key: key.into(),
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }

    /// Stream name of the document this event belongs to.
    pub fn stream(&self) -> String {
        format!("{}/{}", self.collection, self.key)
    }

    pub fn to_envelope(&self, sequence_number: u64) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            self.event_id,
            self.stream(),
            self.collection.clone(),
            sequence_number,
            self.event_type.clone(),
            self.payload.clone(),
        )
    }
}

/// Everything one transaction wants to commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitBatch {
    pub reads: Vec<ReadVersion>,
    pub writes: Vec<PendingWrite>,
    pub events: Vec<UncommittedEvent>,
}

impl CommitBatch {
    pub fn is_read_only(&self) -> bool {
        self.writes.is_empty() && self.events.is_empty()
    }
}

/// Document store operation error.
///
/// Infrastructure failures only; business rule violations are `DomainError`s.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A document read by the transaction changed before commit.
    #[error("optimistic concurrency check failed: {0}")]
    Conflict(String),

    /// Reads must all happen before the first staged write.
    #[error("read of {collection}/{key} after the transaction started writing")]
    ReadAfterWrite { collection: String, key: String },

    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Internal lock poisoned or backend unreachable.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Keyed JSON documents with multi-document optimistic commits.
///
/// ## Commit semantics
///
/// `commit()`:
/// - checks every [`ReadVersion`] against the current document version
/// - applies every [`PendingWrite`] (version + 1) atomically, or none of them
/// - publishes the batch's events on the change feed after the writes land
///
/// A version mismatch fails the whole batch with [`StoreError::Conflict`].
pub trait DocumentStore: Send + Sync {
    fn get(&self, collection: &str, key: &str) -> Result<Option<StoredDocument>, StoreError>;

    /// Every document of `collection` matching `filter`, ordered by key.
    fn scan(
        &self,
        collection: &str,
        filter: &dyn Fn(&StoredDocument) -> bool,
    ) -> Result<Vec<StoredDocument>, StoreError>;

    /// Apply a batch; returns the envelopes published for it.
    fn commit(&self, batch: CommitBatch) -> Result<Vec<EventEnvelope<JsonValue>>, StoreError>;

    /// Change feed of committed events.
    fn subscribe(&self) -> Subscription<EventEnvelope<JsonValue>>;
}

impl<S> DocumentStore for Arc<S>
where
    S: DocumentStore + ?Sized,
{
    fn get(&self, collection: &str, key: &str) -> Result<Option<StoredDocument>, StoreError> {
        (**self).get(collection, key)
    }

    fn scan(
        &self,
        collection: &str,
        filter: &dyn Fn(&StoredDocument) -> bool,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        (**self).scan(collection, filter)
    }

    fn commit(&self, batch: CommitBatch) -> Result<Vec<EventEnvelope<JsonValue>>, StoreError> {
        (**self).commit(batch)
    }

    fn subscribe(&self) -> Subscription<EventEnvelope<JsonValue>> {
        (**self).subscribe()
    }
}
