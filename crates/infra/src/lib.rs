//! Infrastructure layer: document storage, transactions, the ledger component,
//! configuration and the supply-chain engine.

pub mod config;
pub mod document_store;
pub mod engine;
pub mod error;
pub mod inventory;
pub mod transaction;

pub use config::EngineConfig;
pub use document_store::{DocumentStore, InMemoryDocumentStore, StoreError};
pub use engine::{ForecastEntry, SupplyChain};
pub use error::ServiceError;
pub use inventory::Inventory;
pub use transaction::{Transaction, with_transaction};
