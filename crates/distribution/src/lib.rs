//! Distribution and stock-back domain module.
//!
//! Finished goods leave logistics stock for outlets (distribution) and unsold
//! goods come back to prepared stock (stock-back). Pure domain logic: no IO.

pub mod shipment;
pub mod stock_back;

pub use shipment::{
    ConfirmDistributionReceipt, Dispatch, Distribution, DistributionCommand,
    DistributionDispatched, DistributionEvent, DistributionId, DistributionReceived,
    DistributionStatus, ShipmentItem, normalize_items,
};
pub use stock_back::{
    AdvanceStockBack, ReportStockBack, StockBackAdvanced, StockBackCommand, StockBackEvent,
    StockBackId, StockBackReported, StockBackRequest, StockBackStatus,
};
