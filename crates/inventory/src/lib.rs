//! Inventory ledger domain module.
//!
//! Four independently keyed quantity stores (raw, prepared, kitchen, logistics)
//! and the pure planning logic for mutating them: deltas are aggregated per key,
//! validated against the current rows, and only then turned into new rows. The
//! infrastructure layer owns reading and writing the rows.

pub mod ledger;
pub mod spoilage;

pub use ledger::{
    InventoryEvent, MovementReason, StockAdjusted, StockAdjustments, StockKey, StockNamespace,
    StockRecord,
};
pub use spoilage::SpoilageLog;
