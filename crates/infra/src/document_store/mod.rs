//! Document storage abstractions and implementations.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryDocumentStore;
pub use r#trait::{
    CommitBatch, DocumentStore, PendingWrite, ReadVersion, StoreError, StoredDocument,
    UncommittedEvent,
};
