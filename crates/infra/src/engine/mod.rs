//! The supply-chain engine: one method per workflow verb.
//!
//! Every mutating method resolves and authorizes the acting profile, then runs
//! one [`with_transaction`] body: read documents and ledger rows, decide with
//! the pure domain aggregates, stage ledger movements through [`Inventory`],
//! and write documents, rows and change-feed events in a single commit.

mod forecasts;
mod logistics;
mod pipeline;
mod procurement;
mod targets;

pub use forecasts::ForecastEntry;

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use foodflow_auth::{Action, Profile, ProfileDirectory, authorize};
use foodflow_catalog::RecipeCatalog;
use foodflow_core::{Clock, DomainError, UserId};
use foodflow_events::{Event, EventEnvelope, Subscription};
use foodflow_inventory::{StockKey, StockRecord};

use crate::config::EngineConfig;
use crate::document_store::{DocumentStore, StoreError};
use crate::error::ServiceError;
use crate::inventory::Inventory;
use crate::transaction::{Transaction, with_transaction};

/// Document collection names.
pub mod collections {
    pub const FORECASTS: &str = "forecasts";
    pub const FORECAST_ALLOTMENTS: &str = "forecastAllotments";
    pub const DAILY_TARGETS: &str = "dailyTargets";
    pub const DAILY_TARGET_DATES: &str = "dailyTargetDates";
    pub const COOKING_ASSIGNMENTS: &str = "cookingAssignments";
    pub const ASSIGNMENT_BATCHES: &str = "assignmentBatches";
    pub const PROCUREMENT_REQUESTS: &str = "procurementRequests";
    pub const BULK_BUY_ORDERS: &str = "bulkBuyOrders";
    pub const DISTRIBUTIONS: &str = "distributions";
    pub const STOCK_BACK_REQUESTS: &str = "stockBackRequests";
    pub const SPOILAGE_LOGS: &str = "spoilageLogs";
}

/// Orchestrates the supply-chain workflow over a [`DocumentStore`].
///
/// Cheap to share behind an `Arc`; every method is synchronous and may be
/// called from many threads at once.
pub struct SupplyChain {
    store: Arc<dyn DocumentStore>,
    catalog: Arc<dyn RecipeCatalog>,
    directory: Arc<dyn ProfileDirectory>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl SupplyChain {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        catalog: Arc<dyn RecipeCatalog>,
        directory: Arc<dyn ProfileDirectory>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            catalog,
            directory,
            clock,
            config,
        }
    }

    /// Like [`new`](Self::new) with configuration read from `FOODFLOW_*` variables.
    pub fn from_env(
        store: Arc<dyn DocumentStore>,
        catalog: Arc<dyn RecipeCatalog>,
        directory: Arc<dyn ProfileDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ServiceError> {
        Ok(Self::new(store, catalog, directory, clock, EngineConfig::from_env()?))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Change feed of every committed domain and ledger event.
    pub fn subscribe(&self) -> Subscription<EventEnvelope<JsonValue>> {
        self.store.subscribe()
    }

    /// Current ledger row, if the row was ever written.
    pub fn stock_level(&self, key: &StockKey) -> Result<Option<StockRecord>, ServiceError> {
        Inventory::level(self.store.as_ref(), key)
    }

    fn transact<T>(
        &self,
        body: impl FnMut(&mut Transaction<'_>) -> Result<T, ServiceError>,
    ) -> Result<T, ServiceError> {
        with_transaction(
            self.store.as_ref(),
            self.config.max_transaction_attempts,
            body,
        )
    }

    fn profile(&self, id: UserId) -> Result<Profile, ServiceError> {
        self.directory
            .profile(id)
            .ok_or_else(|| DomainError::not_found("profile", id.to_string()).into())
    }

    /// Resolve `actor` and check it may perform `action`.
    fn authorized(&self, actor: UserId, action: Action) -> Result<Profile, ServiceError> {
        let profile = self.profile(actor)?;
        authorize(&profile, action)?;
        Ok(profile)
    }

    /// Committed snapshot of one document.
    fn load<T: DeserializeOwned>(
        &self,
        collection: &str,
        key: &str,
    ) -> Result<Option<T>, ServiceError> {
        let Some(doc) = self.store.get(collection, key)? else {
            return Ok(None);
        };
        serde_json::from_value(doc.body)
            .map(Some)
            .map_err(|e| StoreError::Serialization(format!("{collection}/{key}: {e}")).into())
    }
}

/// Stage an aggregate's new state together with the events that produced it.
fn save<A, E>(
    tx: &mut Transaction<'_>,
    collection: &str,
    key: &str,
    aggregate: &A,
    events: &[E],
) -> Result<(), StoreError>
where
    A: Serialize,
    E: Event + Serialize,
{
    tx.put(collection, key, aggregate)?;
    tx.emit_all(collection, key, events)
}
