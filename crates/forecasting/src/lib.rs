//! Forecast workflow domain module.
//!
//! Weekly forecast lines move through a two-step approval chain (stock manager,
//! then finance). Accepted lines open an allotment that daily targets draw from.
//! Pure domain logic: no IO, no storage.

pub mod allotment;
pub mod composite;
pub mod daily_target;
pub mod forecast;

pub use allotment::{AllotmentLine, ForecastAllotment};
pub use composite::{CompositeReview, RecipeTotal};
pub use daily_target::{DailyTarget, DailyTargetId, DateTargets, TargetRequest};
pub use forecast::{
    Approve, ApproverChain, DraftRevised, ForecastApproved, ForecastCommand, ForecastDrafted,
    ForecastEvent, ForecastItem, ForecastLine, ForecastLineId, ForecastProcured, ForecastRejected,
    ForecastStatus, ForecastSubmitted, ItemOverride, MarkProcured, Reject, ReviewStage,
    ReviseDraft, SaveDraft, StatusChange, Submit, SubmitDraft, validate_items,
};
