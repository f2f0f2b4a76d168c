//! Kitchen assignment, dispersal and cooking domain module.
//!
//! Splits a date's aggregated daily targets across kitchens (cook from raw or
//! hand over prepared units), drives each kitchen's assignment through the
//! dispersal/cooking pipeline, and expands recipes into the ledger plans each
//! step needs. Pure domain logic: no IO.

pub mod allocation;
pub mod assignment;
pub mod batch;
pub mod bom;

pub use allocation::{
    AggregatedTarget, AllocationLine, AllocationPlan, KitchenAllocation, aggregate_targets,
};
pub use assignment::{
    AssignedItem, AssignmentAdvanced, AssignmentChange, AssignmentCommand, AssignmentEvent,
    AssignmentId, AssignmentStatus, Collect, CollectForLogistics, ConfirmReceipt, CookingAssignment,
    CookingRecorded, Disperse, PreparedItem, RecordCooked,
};
pub use batch::AssignmentBatch;
pub use bom::{PORTION_UNIT, cooking_plan, dispersal_plan, receipt_plan};
