use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use serde_json::Value as JsonValue;

use foodflow_core::ExpectedVersion;
use foodflow_events::{EventBus, EventEnvelope, InMemoryEventBus, Subscription};

use super::r#trait::{CommitBatch, DocumentStore, StoreError, StoredDocument};

type Collection = BTreeMap<String, StoredDocument>;

/// In-memory document store with optimistic multi-document commits.
///
/// Intended for tests/dev and single-process deployments. One write lock
/// serialises commits; reads take the shared lock.
#[derive(Debug)]
pub struct InMemoryDocumentStore<B = InMemoryEventBus<EventEnvelope<JsonValue>>> {
    collections: RwLock<HashMap<String, Collection>>,
    bus: B,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::with_bus(InMemoryEventBus::new())
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> InMemoryDocumentStore<B> {
    pub fn with_bus(bus: B) -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            bus,
        }
    }

    fn poisoned() -> StoreError {
        StoreError::Unavailable("lock poisoned".to_string())
    }

    fn version_of(collections: &HashMap<String, Collection>, collection: &str, key: &str) -> u64 {
        collections
            .get(collection)
            .and_then(|c| c.get(key))
            .map(|d| d.version)
            .unwrap_or(0)
    }
}

impl<B> DocumentStore for InMemoryDocumentStore<B>
where
    B: EventBus<EventEnvelope<JsonValue>>,
{
    fn get(&self, collection: &str, key: &str) -> Result<Option<StoredDocument>, StoreError> {
        let collections = self.collections.read().map_err(|_| Self::poisoned())?;
        Ok(collections
            .get(collection)
            .and_then(|c| c.get(key))
            .cloned())
    }

    fn scan(
        &self,
        collection: &str,
        filter: &dyn Fn(&StoredDocument) -> bool,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        let collections = self.collections.read().map_err(|_| Self::poisoned())?;
        Ok(collections
            .get(collection)
            .map(|c| c.values().filter(|d| filter(d)).cloned().collect())
            .unwrap_or_default())
    }

    fn commit(&self, batch: CommitBatch) -> Result<Vec<EventEnvelope<JsonValue>>, StoreError> {
        if batch.is_read_only() {
            return Ok(vec![]);
        }

        let envelopes = {
            let mut collections = self.collections.write().map_err(|_| Self::poisoned())?;

            for read in &batch.reads {
                let current = Self::version_of(&collections, &read.collection, &read.key);
                if !ExpectedVersion::Exact(read.version).matches(current) {
                    return Err(StoreError::Conflict(format!(
                        "{}/{} was read at version {} but is now at {current}",
                        read.collection, read.key, read.version
                    )));
                }
            }

            for write in batch.writes {
                let docs = collections.entry(write.collection.clone()).or_default();
                let version = docs.get(&write.key).map(|d| d.version).unwrap_or(0) + 1;
                docs.insert(
                    write.key.clone(),
                    StoredDocument {
                        collection: write.collection,
                        key: write.key,
                        version,
                        body: write.body,
                    },
                );
            }

            batch
                .events
                .iter()
                .map(|e| e.to_envelope(Self::version_of(&collections, &e.collection, &e.key)))
                .collect::<Vec<_>>()
        };

        // Writes are durable at this point; a failed publish must not undo them.
        for envelope in &envelopes {
            if let Err(err) = self.bus.publish(envelope.clone()) {
                tracing::warn!(
                    stream = envelope.stream(),
                    event_type = envelope.event_type(),
                    error = ?err,
                    "change feed publish failed"
                );
            }
        }

        Ok(envelopes)
    }

    fn subscribe(&self) -> Subscription<EventEnvelope<JsonValue>> {
        self.bus.subscribe()
    }
}
