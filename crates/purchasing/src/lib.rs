//! Procurement and bulk-buy domain module.
//!
//! Turns accepted forecasts into ingredient purchase requests (shortfall against
//! prepared and raw stock) and tracks ad-hoc bulk purchases through finance
//! approval. Pure domain logic: no IO.

pub mod bulk_buy;
pub mod procurement;
pub mod shortfall;

pub use bulk_buy::{
    ApproveBulkBuy, BulkBuyCommand, BulkBuyEvent, BulkBuyId, BulkBuyOrder, BulkBuyRequested,
    BulkBuyStatus, BulkBuyStatusChanged, ConfirmBulkBuyReceipt, MarkPurchased, RejectBulkBuy,
    RequestBulkBuy,
};
pub use procurement::{
    ConfirmProcurementReceipt, ProcurementCommand, ProcurementEvent, ProcurementReceived,
    ProcurementRequest, ProcurementRequested, ProcurementStatus, RequestProcurement,
};
pub use shortfall::{
    IngredientLine, PreparedCover, ProcurementPlan, aggregate_lines, validate_lines,
};
