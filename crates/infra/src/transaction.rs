//! Read-before-write transactions over a [`DocumentStore`].

use std::collections::BTreeMap;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use foodflow_core::DomainError;
use foodflow_events::{Event, EventEnvelope};

use crate::document_store::{
    CommitBatch, DocumentStore, PendingWrite, ReadVersion, StoreError, StoredDocument,
    UncommittedEvent,
};
use crate::error::ServiceError;

type DocKey = (String, String);

/// One optimistic unit of work.
///
/// Records the version of every document it reads and buffers writes until
/// [`commit`](Self::commit). Once a write is staged, further reads are refused,
/// so every decision is made against a consistent snapshot. Dropping a
/// transaction without committing discards it.
pub struct Transaction<'s> {
    store: &'s dyn DocumentStore,
    reads: BTreeMap<DocKey, u64>,
    writes: BTreeMap<DocKey, JsonValue>,
    events: Vec<UncommittedEvent>,
}

impl<'s> Transaction<'s> {
    pub fn begin(store: &'s dyn DocumentStore) -> Self {
        Self {
            store,
            reads: BTreeMap::new(),
            writes: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    fn ensure_reading(&self, collection: &str, key: &str) -> Result<(), StoreError> {
        if !self.writes.is_empty() {
            return Err(StoreError::ReadAfterWrite {
                collection: collection.to_string(),
                key: key.to_string(),
            });
        }
        Ok(())
    }

    fn record(&mut self, collection: &str, key: &str, version: u64) {
        // The first observation wins: commit checks nothing moved since then.
        self.reads
            .entry((collection.to_string(), key.to_string()))
            .or_insert(version);
    }

    fn decode<T: DeserializeOwned>(doc: &StoredDocument) -> Result<T, StoreError> {
        serde_json::from_value(doc.body.clone()).map_err(|e| {
            StoreError::Serialization(format!("{}/{}: {e}", doc.collection, doc.key))
        })
    }

    /// Read a document; absence is recorded too, so a concurrent insert conflicts.
    pub fn get<T: DeserializeOwned>(
        &mut self,
        collection: &str,
        key: &str,
    ) -> Result<Option<T>, StoreError> {
        self.ensure_reading(collection, key)?;
        let doc = self.store.get(collection, key)?;
        self.record(collection, key, doc.as_ref().map(|d| d.version).unwrap_or(0));
        doc.as_ref().map(Self::decode).transpose()
    }

    /// Like [`get`](Self::get) but a missing document is a `NotFound` error.
    pub fn require<T: DeserializeOwned>(
        &mut self,
        collection: &str,
        key: &str,
        kind: &'static str,
    ) -> Result<T, ServiceError> {
        self.get(collection, key)?
            .ok_or_else(|| DomainError::not_found(kind, key).into())
    }

    /// Every document of `collection` whose decoded body satisfies `filter`.
    ///
    /// Only matching documents join the read set.
    pub fn scan<T: DeserializeOwned>(
        &mut self,
        collection: &str,
        filter: impl Fn(&T) -> bool,
    ) -> Result<Vec<T>, StoreError> {
        self.ensure_reading(collection, "*")?;
        let mut out = Vec::new();
        for doc in self.store.scan(collection, &|_| true)? {
            let value: T = Self::decode(&doc)?;
            if filter(&value) {
                self.record(collection, &doc.key, doc.version);
                out.push(value);
            }
        }
        Ok(out)
    }

    /// Stage a document write. Later writes to the same key replace earlier ones.
    pub fn put<T: Serialize>(
        &mut self,
        collection: &str,
        key: &str,
        value: &T,
    ) -> Result<(), StoreError> {
        let body = serde_json::to_value(value)
            .map_err(|e| StoreError::Serialization(format!("{collection}/{key}: {e}")))?;
        self.writes
            .insert((collection.to_string(), key.to_string()), body);
        Ok(())
    }

    /// Stage a domain event for the change feed.
    pub fn emit<E: Event + Serialize>(
        &mut self,
        collection: &str,
        key: &str,
        event: &E,
    ) -> Result<(), StoreError> {
        self.events
            .push(UncommittedEvent::from_typed(collection, key, event)?);
        Ok(())
    }

    /// Stage every event of a slice.
    pub fn emit_all<E: Event + Serialize>(
        &mut self,
        collection: &str,
        key: &str,
        events: &[E],
    ) -> Result<(), StoreError> {
        for event in events {
            self.emit(collection, key, event)?;
        }
        Ok(())
    }

    pub fn commit(self) -> Result<Vec<EventEnvelope<JsonValue>>, StoreError> {
        let batch = CommitBatch {
            reads: self
                .reads
                .into_iter()
                .map(|((collection, key), version)| ReadVersion {
                    collection,
                    key,
                    version,
                })
                .collect(),
            writes: self
                .writes
                .into_iter()
                .map(|((collection, key), body)| PendingWrite {
                    collection,
                    key,
                    body,
                })
                .collect(),
            events: self.events,
        };
        self.store.commit(batch)
    }
}

/// Run `body` in a fresh transaction and commit it, retrying on version conflicts.
///
/// Domain failures returned by `body` abort immediately and nothing is written.
/// Only [`StoreError::Conflict`] at commit re-runs the body, at most
/// `max_attempts` times in total.
pub fn with_transaction<T, F>(
    store: &dyn DocumentStore,
    max_attempts: u32,
    mut body: F,
) -> Result<T, ServiceError>
where
    F: FnMut(&mut Transaction<'_>) -> Result<T, ServiceError>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let mut tx = Transaction::begin(store);
        let value = body(&mut tx)?;
        match tx.commit() {
            Ok(_) => return Ok(value),
            Err(StoreError::Conflict(reason)) if attempt < max_attempts => {
                tracing::warn!(attempt, max_attempts, %reason, "transaction conflict, retrying");
                attempt += 1;
            }
            Err(StoreError::Conflict(reason)) => {
                tracing::warn!(attempt, %reason, "transaction conflict, giving up");
                return Err(ServiceError::ConcurrencyConflict {
                    attempts: attempt,
                    last: reason,
                });
            }
            Err(other) => return Err(other.into()),
        }
    }
}
