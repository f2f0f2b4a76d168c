//! The single component allowed to read and write ledger rows.
//!
//! Every movement is planned as [`StockAdjustments`], staged against rows read
//! inside the caller's transaction, then written together with its change-feed
//! events. Staging performs all reads, so callers stage before their own writes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use foodflow_core::Quantity;
use foodflow_inventory::{InventoryEvent, MovementReason, StockAdjustments, StockKey, StockRecord};

use crate::document_store::{DocumentStore, StoreError};
use crate::error::ServiceError;
use crate::transaction::Transaction;

/// New rows and their events, validated and ready to write.
#[derive(Debug, Clone)]
pub struct StagedMovement {
    plan: StockAdjustments,
    rows: Vec<StockRecord>,
    reason: MovementReason,
    occurred_at: DateTime<Utc>,
}

impl StagedMovement {
    pub fn rows(&self) -> &[StockRecord] {
        &self.rows
    }
}

pub struct Inventory;

impl Inventory {
    /// Current row for `key` inside `tx` (joins the read set).
    pub fn read(
        tx: &mut Transaction<'_>,
        key: &StockKey,
    ) -> Result<Option<StockRecord>, StoreError> {
        tx.get(key.namespace.collection(), &key.document_key())
    }

    /// Unreserved on-hand quantity for `key` inside `tx`.
    pub fn available(tx: &mut Transaction<'_>, key: &StockKey) -> Result<Quantity, StoreError> {
        Ok(Self::read(tx, key)?
            .map(|r| r.available())
            .unwrap_or_default())
    }

    /// On-hand quantity (reserved units included) for `key` inside `tx`.
    pub fn on_hand(tx: &mut Transaction<'_>, key: &StockKey) -> Result<Quantity, StoreError> {
        Ok(Self::read(tx, key)?.map(|r| r.quantity).unwrap_or_default())
    }

    /// Read every row the plan touches and validate the plan against them.
    ///
    /// Fails with `InsufficientStock`/`InsufficientKitchenStock` before
    /// anything is written.
    pub fn stage(
        tx: &mut Transaction<'_>,
        plan: StockAdjustments,
        reason: MovementReason,
        occurred_at: DateTime<Utc>,
    ) -> Result<StagedMovement, ServiceError> {
        let mut current = BTreeMap::new();
        for key in plan.keys() {
            if let Some(row) = Self::read(tx, key)? {
                current.insert(key.clone(), row);
            }
        }
        let rows = plan.apply(&current)?;
        tracing::debug!(rows = rows.len(), ?reason, "ledger movement staged");

        Ok(StagedMovement {
            plan,
            rows,
            reason,
            occurred_at,
        })
    }

    /// Stage the new rows and their `inventory.stock.adjusted` events.
    pub fn write(tx: &mut Transaction<'_>, staged: StagedMovement) -> Result<(), StoreError> {
        let events = staged
            .plan
            .events(&staged.rows, staged.reason, staged.occurred_at);
        for row in &staged.rows {
            tx.put(row.key.namespace.collection(), &row.key.document_key(), row)?;
        }
        for event in &events {
            let InventoryEvent::StockAdjusted(adjusted) = event;
            let key = &adjusted.key;
            tx.emit(key.namespace.collection(), &key.document_key(), event)?;
        }
        Ok(())
    }

    /// Row snapshot outside any transaction.
    pub fn level(
        store: &dyn DocumentStore,
        key: &StockKey,
    ) -> Result<Option<StockRecord>, ServiceError> {
        let Some(doc) = store.get(key.namespace.collection(), &key.document_key())? else {
            return Ok(None);
        };
        serde_json::from_value(doc.body)
            .map(Some)
            .map_err(|e| StoreError::Serialization(format!("{key}: {e}")).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document_store::InMemoryDocumentStore;
    use crate::transaction::with_transaction;
    use foodflow_core::{DomainError, KitchenId};
    use proptest::prelude::*;

    fn credit(store: &InMemoryDocumentStore, key: StockKey, quantity: i64, unit: &str) {
        with_transaction(store, 1, |tx| {
            let mut plan = StockAdjustments::new();
            plan.credit(key.clone(), Quantity::from(quantity), unit)?;
            let staged = Inventory::stage(tx, plan, MovementReason::BulkBuyReceipt, Utc::now())?;
            Inventory::write(tx, staged)?;
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn failed_debit_leaves_every_row_untouched() {
        let store = InMemoryDocumentStore::new();
        credit(&store, StockKey::raw("rice"), 10, "kg");
        credit(&store, StockKey::raw("oil"), 1, "l");

        let result = with_transaction(&store, 1, |tx| {
            let mut plan = StockAdjustments::new();
            plan.debit(StockKey::raw("rice"), Quantity::from(4), "kg")?;
            plan.debit(StockKey::raw("oil"), Quantity::from(2), "l")?;
            let staged = Inventory::stage(tx, plan, MovementReason::Dispersal, Utc::now())?;
            Inventory::write(tx, staged)?;
            Ok(())
        });

        let err = result.unwrap_err();
        assert!(matches!(
            err.as_domain(),
            Some(DomainError::InsufficientStock { key, .. }) if key == "oil"
        ));
        let rice = Inventory::level(&store, &StockKey::raw("rice")).unwrap().unwrap();
        assert_eq!(rice.quantity, Quantity::from(10));
    }

    #[test]
    fn kitchen_rows_are_separate_per_kitchen() {
        let store = InMemoryDocumentStore::new();
        let (a, b) = (KitchenId::new(), KitchenId::new());
        credit(&store, StockKey::kitchen(a, "rice"), 3, "kg");

        assert!(Inventory::level(&store, &StockKey::kitchen(b, "rice")).unwrap().is_none());
        let feed = store.subscribe();
        credit(&store, StockKey::kitchen(a, "rice"), 2, "kg");

        let row = Inventory::level(&store, &StockKey::kitchen(a, "rice")).unwrap().unwrap();
        assert_eq!(row.quantity, Quantity::from(5));
        let events = feed.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].sequence_number(), 2);
    }

    proptest! {
        #[test]
        fn committed_movements_conserve_the_row(
            deltas in proptest::collection::vec(-20i64..20, 1..40)
        ) {
            let store = InMemoryDocumentStore::new();
            let key = StockKey::raw("flour");
            let mut expected = 0i64;

            for delta in deltas {
                let result = with_transaction(&store, 1, |tx| {
                    let mut plan = StockAdjustments::new();
                    if delta >= 0 {
                        plan.credit(key.clone(), Quantity::from(delta), "kg")?;
                    } else {
                        plan.debit(key.clone(), Quantity::from(-delta), "kg")?;
                    }
                    let staged = Inventory::stage(tx, plan, MovementReason::Spoilage, Utc::now())?;
                    Inventory::write(tx, staged)?;
                    Ok(())
                });
                prop_assert_eq!(result.is_ok(), expected + delta >= 0);
                if result.is_ok() {
                    expected += delta;
                }
            }

            let on_hand = Inventory::level(&store, &key)
                .unwrap()
                .map(|row| row.quantity)
                .unwrap_or(Quantity::ZERO);
            prop_assert_eq!(on_hand, Quantity::from(expected));
        }
    }
}
