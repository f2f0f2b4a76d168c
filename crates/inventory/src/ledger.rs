use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use foodflow_core::{DomainError, DomainResult, KitchenId, Quantity};
use foodflow_events::Event;

/// One of the four ledgers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockNamespace {
    /// Raw ingredients in central stores.
    Raw,
    /// Finished items held centrally instead of being cooked again.
    Prepared,
    /// Ingredients (and prepared items) sitting in a kitchen.
    Kitchen,
    /// Finished items ready for the field.
    Logistics,
}

impl StockNamespace {
    /// Document collection backing this ledger.
    pub fn collection(&self) -> &'static str {
        match self {
            StockNamespace::Raw => "stock",
            StockNamespace::Prepared => "preparedStock",
            StockNamespace::Kitchen => "kitchenStock",
            StockNamespace::Logistics => "logisticsInventory",
        }
    }

    pub fn all() -> [StockNamespace; 4] {
        [
            StockNamespace::Raw,
            StockNamespace::Prepared,
            StockNamespace::Kitchen,
            StockNamespace::Logistics,
        ]
    }
}

/// Address of one ledger row.
///
/// Item names are normalised (trimmed, lowercased) so "Rice" and "rice " hit
/// the same row.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StockKey {
    pub namespace: StockNamespace,
    pub kitchen: Option<KitchenId>,
    pub item: String,
}

impl StockKey {
    fn build(namespace: StockNamespace, kitchen: Option<KitchenId>, item: &str) -> Self {
        Self {
            namespace,
            kitchen,
            item: item.trim().to_lowercase(),
        }
    }

    pub fn raw(ingredient: &str) -> Self {
        Self::build(StockNamespace::Raw, None, ingredient)
    }

    pub fn prepared(item: &str) -> Self {
        Self::build(StockNamespace::Prepared, None, item)
    }

    pub fn logistics(item: &str) -> Self {
        Self::build(StockNamespace::Logistics, None, item)
    }

    pub fn kitchen(kitchen: KitchenId, item: &str) -> Self {
        Self::build(StockNamespace::Kitchen, Some(kitchen), item)
    }

    /// Key of the row inside its namespace collection.
    pub fn document_key(&self) -> String {
        match self.kitchen {
            Some(kitchen) => format!("{kitchen}/{}", self.item),
            None => self.item.clone(),
        }
    }

    /// The insufficiency error for this row (kitchen rows get the kitchen variant).
    pub fn shortage(&self, available: Quantity, requested: Quantity) -> DomainError {
        match (self.namespace, self.kitchen) {
            (StockNamespace::Kitchen, Some(kitchen)) => DomainError::InsufficientKitchenStock {
                kitchen: kitchen.to_string(),
                ingredient: self.item.clone(),
                available,
                requested,
            },
            _ => DomainError::InsufficientStock {
                namespace: self.namespace.collection().to_string(),
                key: self.item.clone(),
                available,
                requested,
            },
        }
    }
}

impl core::fmt::Display for StockKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.namespace.collection(), self.document_key())
    }
}

/// One ledger row. `quantity` is never negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    pub key: StockKey,
    pub quantity: Quantity,
    pub unit: String,
    /// Units promised to accepted forecasts (prepared stock only).
    #[serde(default)]
    pub reserved: Quantity,
}

impl StockRecord {
    pub fn empty(key: StockKey, unit: impl Into<String>) -> Self {
        Self {
            key,
            quantity: Quantity::ZERO,
            unit: unit.into(),
            reserved: Quantity::ZERO,
        }
    }

    /// On-hand quantity not promised to anyone.
    pub fn available(&self) -> Quantity {
        self.quantity.saturating_sub(self.reserved)
    }
}

/// Why a ledger row moved.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementReason {
    ProcurementReceipt,
    BulkBuyReceipt,
    ForecastReservation,
    Dispersal,
    KitchenReceipt,
    Cooking,
    Distribution,
    Restock,
    Spoilage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PlannedDelta {
    amount: Quantity,
    unit: String,
    release: Quantity,
    reserve: Quantity,
}

/// A set of ledger deltas aggregated per row.
///
/// Several lines touching the same row (two BOM lines both needing rice, two
/// bulk-buy lines for the same ingredient) collapse into one net delta, so each
/// row is read once and written once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockAdjustments {
    deltas: BTreeMap<StockKey, PlannedDelta>,
}

impl StockAdjustments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    /// Rows touched by this plan, in deterministic order.
    pub fn keys(&self) -> impl Iterator<Item = &StockKey> {
        self.deltas.keys()
    }

    /// Net signed change planned for `key`.
    pub fn net(&self, key: &StockKey) -> Quantity {
        self.deltas.get(key).map(|d| d.amount).unwrap_or_default()
    }

    fn entry(&mut self, key: StockKey, unit: &str) -> &mut PlannedDelta {
        self.deltas.entry(key).or_insert_with(|| PlannedDelta {
            amount: Quantity::ZERO,
            unit: unit.to_string(),
            release: Quantity::ZERO,
            reserve: Quantity::ZERO,
        })
    }

    fn ensure_non_negative(key: &StockKey, quantity: Quantity) -> DomainResult<()> {
        if quantity.is_negative() {
            return Err(DomainError::validation(format!(
                "{key}: ledger amounts must not be negative (got {quantity})"
            )));
        }
        Ok(())
    }

    /// Add `quantity` to a row (created if absent).
    pub fn credit(&mut self, key: StockKey, quantity: Quantity, unit: &str) -> DomainResult<()> {
        Self::ensure_non_negative(&key, quantity)?;
        if !quantity.is_zero() {
            self.entry(key, unit).amount += quantity;
        }
        Ok(())
    }

    /// Remove `quantity` from a row. Reservations are clamped to what is left.
    pub fn debit(&mut self, key: StockKey, quantity: Quantity, unit: &str) -> DomainResult<()> {
        Self::ensure_non_negative(&key, quantity)?;
        if !quantity.is_zero() {
            self.entry(key, unit).amount -= quantity;
        }
        Ok(())
    }

    /// Remove `quantity` and release the same amount of reservation: the units
    /// leave for the purpose they were reserved for.
    pub fn consume(&mut self, key: StockKey, quantity: Quantity, unit: &str) -> DomainResult<()> {
        Self::ensure_non_negative(&key, quantity)?;
        if !quantity.is_zero() {
            let delta = self.entry(key, unit);
            delta.amount -= quantity;
            delta.release += quantity;
        }
        Ok(())
    }

    /// Promise `quantity` of the row's available units without moving them.
    pub fn reserve(&mut self, key: StockKey, quantity: Quantity, unit: &str) -> DomainResult<()> {
        Self::ensure_non_negative(&key, quantity)?;
        if !quantity.is_zero() {
            self.entry(key, unit).reserve += quantity;
        }
        Ok(())
    }

    /// Merge another plan into this one.
    pub fn extend(&mut self, other: StockAdjustments) {
        for (key, delta) in other.deltas {
            let entry = self.entry(key, &delta.unit);
            entry.amount += delta.amount;
            entry.release += delta.release;
            entry.reserve += delta.reserve;
        }
    }

    /// Validate the whole plan against current rows and return the new rows.
    ///
    /// All-or-nothing: the first row that would go negative fails the plan and
    /// no row is returned. Rows missing from `current` start empty.
    pub fn apply(
        &self,
        current: &BTreeMap<StockKey, StockRecord>,
    ) -> DomainResult<Vec<StockRecord>> {
        let mut out = Vec::with_capacity(self.deltas.len());

        for (key, delta) in &self.deltas {
            let mut record = current
                .get(key)
                .cloned()
                .unwrap_or_else(|| StockRecord::empty(key.clone(), delta.unit.clone()));

            if record.unit.is_empty() {
                record.unit = delta.unit.clone();
            } else if !delta.unit.is_empty() && !record.unit.eq_ignore_ascii_case(&delta.unit) {
                return Err(DomainError::validation(format!(
                    "{key}: unit mismatch (ledger uses {}, movement uses {})",
                    record.unit, delta.unit
                )));
            }

            let after = record.quantity + delta.amount;
            if after.is_negative() {
                return Err(key.shortage(record.quantity, -delta.amount));
            }
            record.quantity = after;

            let reserved = record.reserved.saturating_sub(delta.release) + delta.reserve;
            if reserved > record.quantity {
                if delta.reserve.is_positive() {
                    return Err(key.shortage(
                        record.available() + delta.release.min(record.reserved),
                        delta.reserve,
                    ));
                }
                record.reserved = record.quantity;
            } else {
                record.reserved = reserved;
            }

            out.push(record);
        }

        Ok(out)
    }

    /// Change-feed events describing the rows produced by [`apply`](Self::apply).
    pub fn events(
        &self,
        after: &[StockRecord],
        reason: MovementReason,
        occurred_at: DateTime<Utc>,
    ) -> Vec<InventoryEvent> {
        after
            .iter()
            .filter_map(|record| {
                let delta = self.deltas.get(&record.key)?;
                Some(InventoryEvent::StockAdjusted(StockAdjusted {
                    key: record.key.clone(),
                    delta: delta.amount,
                    quantity_after: record.quantity,
                    reserved_after: record.reserved,
                    reason,
                    occurred_at,
                }))
            })
            .collect()
    }
}

/// Event: StockAdjusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjusted {
    pub key: StockKey,
    pub delta: Quantity,
    pub quantity_after: Quantity,
    pub reserved_after: Quantity,
    pub reason: MovementReason,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryEvent {
    StockAdjusted(StockAdjusted),
}

impl Event for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::StockAdjusted(_) => "inventory.stock.adjusted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryEvent::StockAdjusted(e) => e.occurred_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn q(v: i64) -> Quantity {
        Quantity::from(v)
    }

    fn ledger(rows: Vec<StockRecord>) -> BTreeMap<StockKey, StockRecord> {
        rows.into_iter().map(|r| (r.key.clone(), r)).collect()
    }

    fn row(key: StockKey, quantity: i64) -> StockRecord {
        StockRecord {
            quantity: q(quantity),
            ..StockRecord::empty(key, "kg")
        }
    }

    #[test]
    fn keys_are_normalised() {
        assert_eq!(StockKey::raw(" Rice "), StockKey::raw("rice"));
        let kitchen = KitchenId::new();
        assert_eq!(
            StockKey::kitchen(kitchen, "Rice").document_key(),
            format!("{kitchen}/rice")
        );
    }

    #[test]
    fn duplicate_lines_collapse_into_one_delta() {
        let mut plan = StockAdjustments::new();
        plan.credit(StockKey::raw("rice"), q(5), "kg").unwrap();
        plan.credit(StockKey::raw("Rice"), q(7), "kg").unwrap();
        assert_eq!(plan.len(), 1);

        let after = plan.apply(&BTreeMap::new()).unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].quantity, q(12));
        assert_eq!(after[0].unit, "kg");
    }

    #[test]
    fn plan_fails_as_a_whole_when_any_row_goes_negative() {
        let current = ledger(vec![row(StockKey::raw("rice"), 10), row(StockKey::raw("oil"), 1)]);
        let mut plan = StockAdjustments::new();
        plan.debit(StockKey::raw("rice"), q(4), "kg").unwrap();
        plan.debit(StockKey::raw("oil"), q(2), "kg").unwrap();

        let err = plan.apply(&current).unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                namespace: "stock".into(),
                key: "oil".into(),
                available: q(1),
                requested: q(2),
            }
        );
    }

    #[test]
    fn kitchen_shortage_names_the_kitchen() {
        let kitchen = KitchenId::new();
        let mut plan = StockAdjustments::new();
        plan.debit(StockKey::kitchen(kitchen, "rice"), q(1), "kg").unwrap();
        let err = plan.apply(&BTreeMap::new()).unwrap_err();
        assert!(matches!(
            err,
            DomainError::InsufficientKitchenStock { kitchen: k, .. } if k == kitchen.to_string()
        ));
    }

    #[test]
    fn unit_mismatch_is_rejected() {
        let current = ledger(vec![row(StockKey::raw("milk"), 10)]);
        let mut plan = StockAdjustments::new();
        plan.credit(StockKey::raw("milk"), q(1), "l").unwrap();
        assert!(matches!(plan.apply(&current), Err(DomainError::Validation(_))));
    }

    #[test]
    fn negative_inputs_are_validation_errors() {
        let mut plan = StockAdjustments::new();
        assert!(plan.credit(StockKey::raw("rice"), q(-1), "kg").is_err());
        assert!(plan.is_empty());
    }

    #[test]
    fn reservations_limit_availability_and_are_released_on_consume() {
        let key = StockKey::prepared("biryani");
        let current = ledger(vec![StockRecord {
            unit: "unit".into(),
            ..row(key.clone(), 20)
        }]);

        let mut too_much = StockAdjustments::new();
        too_much.reserve(key.clone(), q(21), "unit").unwrap();
        assert!(matches!(
            too_much.apply(&current),
            Err(DomainError::InsufficientStock { .. })
        ));

        let mut reserve = StockAdjustments::new();
        reserve.reserve(key.clone(), q(15), "unit").unwrap();
        let after = reserve.apply(&current).unwrap();
        assert_eq!(after[0].reserved, q(15));
        assert_eq!(after[0].available(), q(5));

        let current = ledger(after);
        let mut consume = StockAdjustments::new();
        consume.consume(key.clone(), q(10), "unit").unwrap();
        let after = consume.apply(&current).unwrap();
        assert_eq!(after[0].quantity, q(10));
        assert_eq!(after[0].reserved, q(5));

        let current = ledger(after);
        let mut spoil = StockAdjustments::new();
        spoil.debit(key, q(8), "unit").unwrap();
        let after = spoil.apply(&current).unwrap();
        assert_eq!(after[0].quantity, q(2));
        assert_eq!(after[0].reserved, q(2));
    }

    #[test]
    fn events_describe_every_touched_row() {
        let mut plan = StockAdjustments::new();
        plan.credit(StockKey::raw("rice"), q(16), "kg").unwrap();
        let after = plan.apply(&BTreeMap::new()).unwrap();
        let events = plan.events(&after, MovementReason::ProcurementReceipt, Utc::now());
        assert_eq!(events.len(), 1);
        let InventoryEvent::StockAdjusted(e) = &events[0];
        assert_eq!(e.delta, q(16));
        assert_eq!(e.quantity_after, q(16));
        assert_eq!(events[0].event_type(), "inventory.stock.adjusted");
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: whatever sequence of credits and debits is attempted, the
        /// row never goes negative, and a rejected plan leaves it untouched.
        #[test]
        fn ledger_rows_never_go_negative(
            ops in prop::collection::vec((any::<bool>(), 1i64..500), 1..60)
        ) {
            let key = StockKey::raw("rice");
            let mut current: BTreeMap<StockKey, StockRecord> = BTreeMap::new();
            let mut expected = 0i64;

            for (is_credit, amount) in ops {
                let mut plan = StockAdjustments::new();
                if is_credit {
                    plan.credit(key.clone(), q(amount), "kg").unwrap();
                } else {
                    plan.debit(key.clone(), q(amount), "kg").unwrap();
                }

                match plan.apply(&current) {
                    Ok(rows) => {
                        expected += if is_credit { amount } else { -amount };
                        for r in rows {
                            current.insert(r.key.clone(), r);
                        }
                    }
                    Err(e) => {
                        prop_assert!(!is_credit);
                        let short = matches!(e, DomainError::InsufficientStock { .. });
                        prop_assert!(short, "unexpected error: {e:?}");
                    }
                }

                let now = current.get(&key).map(|r| r.quantity).unwrap_or_default();
                prop_assert!(!now.is_negative());
                prop_assert_eq!(now, q(expected));
            }
        }
    }
}
