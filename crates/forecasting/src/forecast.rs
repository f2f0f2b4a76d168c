use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use foodflow_catalog::RecipeId;
use foodflow_core::{Aggregate, AggregateRoot, DomainError, DomainResult, Quantity, UserId, Week};
use foodflow_events::Event;

/// Forecast line identifier.
///
/// Derived from `(submitter, week)`, so a second submission for the same pair
/// lands on the same document and is refused.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ForecastLineId(String);

impl ForecastLineId {
    pub fn for_submission(submitter: UserId, week: Week) -> Self {
        Self(format!("{submitter}:{}", week.label()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ForecastLineId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Forecast line status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastStatus {
    Draft,
    PendingStockManagerApproval,
    Rejected,
    PendingFinanceApproval,
    RejectedByFinance,
    AcceptedByFinance,
    Procured,
}

impl ForecastStatus {
    /// Transition table: the only states reachable from `self`.
    pub fn allowed_next(self) -> &'static [ForecastStatus] {
        use ForecastStatus::*;
        match self {
            Draft => &[PendingStockManagerApproval],
            PendingStockManagerApproval => &[PendingFinanceApproval, Rejected],
            PendingFinanceApproval => &[AcceptedByFinance, RejectedByFinance],
            AcceptedByFinance => &[Procured],
            Rejected | RejectedByFinance | Procured => &[],
        }
    }

    pub fn can_move_to(self, next: ForecastStatus) -> bool {
        self.allowed_next().contains(&next)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_next().is_empty()
    }

    /// Review stage waiting on this status, if any.
    pub fn pending_stage(self) -> Option<ReviewStage> {
        match self {
            ForecastStatus::PendingStockManagerApproval => Some(ReviewStage::StockManager),
            ForecastStatus::PendingFinanceApproval => Some(ReviewStage::Finance),
            _ => None,
        }
    }

    /// Accepted lines are the ones daily targets may draw from.
    pub fn is_accepted(self) -> bool {
        matches!(
            self,
            ForecastStatus::AcceptedByFinance | ForecastStatus::Procured
        )
    }
}

/// One of the two approval steps of the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStage {
    StockManager,
    Finance,
}

impl ReviewStage {
    pub fn pending_status(self) -> ForecastStatus {
        match self {
            ReviewStage::StockManager => ForecastStatus::PendingStockManagerApproval,
            ReviewStage::Finance => ForecastStatus::PendingFinanceApproval,
        }
    }

    pub fn approved_status(self) -> ForecastStatus {
        match self {
            ReviewStage::StockManager => ForecastStatus::PendingFinanceApproval,
            ReviewStage::Finance => ForecastStatus::AcceptedByFinance,
        }
    }

    pub fn rejected_status(self) -> ForecastStatus {
        match self {
            ReviewStage::StockManager => ForecastStatus::Rejected,
            ReviewStage::Finance => ForecastStatus::RejectedByFinance,
        }
    }
}

/// Designated approvers, resolved from the reporting hierarchy at submission.
///
/// `None` means no ancestor holds the role and any holder may act.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproverChain {
    pub stock_manager: Option<UserId>,
    pub finance: Option<UserId>,
}

impl ApproverChain {
    pub fn designated(&self, stage: ReviewStage) -> Option<UserId> {
        match stage {
            ReviewStage::StockManager => self.stock_manager,
            ReviewStage::Finance => self.finance,
        }
    }
}

/// Forecast item: a recipe, the weekly quantity, and the recipe revision pinned
/// at submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastItem {
    pub recipe_id: RecipeId,
    pub name: String,
    pub quantity: Quantity,
    pub revision: u32,
}

impl ForecastItem {
    pub fn new(
        recipe_id: RecipeId,
        name: impl Into<String>,
        quantity: Quantity,
        revision: u32,
    ) -> Self {
        Self {
            recipe_id,
            name: name.into(),
            quantity,
            revision,
        }
    }
}

/// Reviewer quantity override for an item already on the line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOverride {
    pub recipe_id: RecipeId,
    pub quantity: Quantity,
}

/// Audit entry for one status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: Option<ForecastStatus>,
    pub to: ForecastStatus,
    pub by: UserId,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Reject empty lists, non-positive quantities and repeated recipes.
pub fn validate_items(items: &[ForecastItem]) -> DomainResult<()> {
    if items.is_empty() {
        return Err(DomainError::validation("forecast must contain at least one item"));
    }
    let mut seen = BTreeSet::new();
    for item in items {
        item.quantity.ensure_positive(item.recipe_id.as_str())?;
        if !seen.insert(&item.recipe_id) {
            return Err(DomainError::validation(format!(
                "recipe {} appears more than once",
                item.recipe_id
            )));
        }
    }
    Ok(())
}

/// Aggregate root: ForecastLine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastLine {
    id: ForecastLineId,
    submitter: Option<UserId>,
    week: Option<Week>,
    approvers: ApproverChain,
    items: Vec<ForecastItem>,
    status: ForecastStatus,
    history: Vec<StatusChange>,
    version: u64,
    created: bool,
}

impl ForecastLine {
    /// Create an empty, not-yet-created aggregate instance.
    pub fn empty(id: ForecastLineId) -> Self {
        Self {
            id,
            submitter: None,
            week: None,
            approvers: ApproverChain::default(),
            items: Vec::new(),
            status: ForecastStatus::Draft,
            history: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn submitter(&self) -> Option<UserId> {
        self.submitter
    }

    pub fn week(&self) -> Option<Week> {
        self.week
    }

    pub fn approvers(&self) -> ApproverChain {
        self.approvers
    }

    pub fn items(&self) -> &[ForecastItem] {
        &self.items
    }

    pub fn item(&self, recipe_id: &RecipeId) -> Option<&ForecastItem> {
        self.items.iter().find(|i| &i.recipe_id == recipe_id)
    }

    pub fn status(&self) -> ForecastStatus {
        self.status
    }

    pub fn history(&self) -> &[StatusChange] {
        &self.history
    }
}

impl AggregateRoot for ForecastLine {
    type Id = ForecastLineId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: SaveDraft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveDraft {
    pub submitter: UserId,
    pub week: Week,
    pub items: Vec<ForecastItem>,
    pub approvers: ApproverChain,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReviseDraft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviseDraft {
    pub actor: UserId,
    pub items: Vec<ForecastItem>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Submit (create directly in review).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submit {
    pub submitter: UserId,
    pub week: Week,
    pub items: Vec<ForecastItem>,
    pub approvers: ApproverChain,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SubmitDraft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitDraft {
    pub actor: UserId,
    /// Chain re-resolved at submission; the hierarchy may have changed since the draft.
    pub approvers: ApproverChain,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Approve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approve {
    pub actor: UserId,
    pub stage: ReviewStage,
    pub modified_items: Option<Vec<ItemOverride>>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Reject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reject {
    pub actor: UserId,
    pub stage: ReviewStage,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkProcured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkProcured {
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForecastCommand {
    SaveDraft(SaveDraft),
    ReviseDraft(ReviseDraft),
    Submit(Submit),
    SubmitDraft(SubmitDraft),
    Approve(Approve),
    Reject(Reject),
    MarkProcured(MarkProcured),
}

/// Event: ForecastDrafted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastDrafted {
    pub line_id: ForecastLineId,
    pub submitter: UserId,
    pub week: Week,
    pub items: Vec<ForecastItem>,
    pub approvers: ApproverChain,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DraftRevised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftRevised {
    pub line_id: ForecastLineId,
    pub items: Vec<ForecastItem>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ForecastSubmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastSubmitted {
    pub line_id: ForecastLineId,
    pub submitter: UserId,
    pub week: Week,
    pub items: Vec<ForecastItem>,
    pub approvers: ApproverChain,
    /// `Some(Draft)` when an existing draft was submitted.
    pub from: Option<ForecastStatus>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ForecastApproved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastApproved {
    pub line_id: ForecastLineId,
    pub stage: ReviewStage,
    pub approved_by: UserId,
    /// Full item list after overrides; `None` when the reviewer changed nothing.
    pub items: Option<Vec<ForecastItem>>,
    pub from: ForecastStatus,
    pub to: ForecastStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ForecastRejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastRejected {
    pub line_id: ForecastLineId,
    pub stage: ReviewStage,
    pub rejected_by: UserId,
    pub reason: String,
    pub from: ForecastStatus,
    pub to: ForecastStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ForecastProcured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastProcured {
    pub line_id: ForecastLineId,
    pub by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForecastEvent {
    ForecastDrafted(ForecastDrafted),
    DraftRevised(DraftRevised),
    ForecastSubmitted(ForecastSubmitted),
    ForecastApproved(ForecastApproved),
    ForecastRejected(ForecastRejected),
    ForecastProcured(ForecastProcured),
}

impl Event for ForecastEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ForecastEvent::ForecastDrafted(_) => "forecasting.forecast.drafted",
            ForecastEvent::DraftRevised(_) => "forecasting.forecast.draft_revised",
            ForecastEvent::ForecastSubmitted(_) => "forecasting.forecast.submitted",
            ForecastEvent::ForecastApproved(_) => "forecasting.forecast.approved",
            ForecastEvent::ForecastRejected(_) => "forecasting.forecast.rejected",
            ForecastEvent::ForecastProcured(_) => "forecasting.forecast.procured",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ForecastEvent::ForecastDrafted(e) => e.occurred_at,
            ForecastEvent::DraftRevised(e) => e.occurred_at,
            ForecastEvent::ForecastSubmitted(e) => e.occurred_at,
            ForecastEvent::ForecastApproved(e) => e.occurred_at,
            ForecastEvent::ForecastRejected(e) => e.occurred_at,
            ForecastEvent::ForecastProcured(e) => e.occurred_at,
        }
    }
}

impl Aggregate for ForecastLine {
    type Command = ForecastCommand;
    type Event = ForecastEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ForecastEvent::ForecastDrafted(e) => {
                self.submitter = Some(e.submitter);
                self.week = Some(e.week);
                self.items = e.items.clone();
                self.approvers = e.approvers;
                self.status = ForecastStatus::Draft;
                self.created = true;
                self.history.push(StatusChange {
                    from: None,
                    to: ForecastStatus::Draft,
                    by: e.submitter,
                    at: e.occurred_at,
                    note: None,
                });
            }
            ForecastEvent::DraftRevised(e) => {
                self.items = e.items.clone();
            }
            ForecastEvent::ForecastSubmitted(e) => {
                self.submitter = Some(e.submitter);
                self.week = Some(e.week);
                self.items = e.items.clone();
                self.approvers = e.approvers;
                self.status = ForecastStatus::PendingStockManagerApproval;
                self.created = true;
                self.history.push(StatusChange {
                    from: e.from,
                    to: ForecastStatus::PendingStockManagerApproval,
                    by: e.submitter,
                    at: e.occurred_at,
                    note: None,
                });
            }
            ForecastEvent::ForecastApproved(e) => {
                if let Some(items) = &e.items {
                    self.items = items.clone();
                }
                self.status = e.to;
                self.history.push(StatusChange {
                    from: Some(e.from),
                    to: e.to,
                    by: e.approved_by,
                    at: e.occurred_at,
                    note: e.items.as_ref().map(|_| "quantities modified".to_string()),
                });
            }
            ForecastEvent::ForecastRejected(e) => {
                self.status = e.to;
                self.history.push(StatusChange {
                    from: Some(e.from),
                    to: e.to,
                    by: e.rejected_by,
                    at: e.occurred_at,
                    note: Some(e.reason.clone()),
                });
            }
            ForecastEvent::ForecastProcured(e) => {
                self.history.push(StatusChange {
                    from: Some(self.status),
                    to: ForecastStatus::Procured,
                    by: e.by,
                    at: e.occurred_at,
                    note: None,
                });
                self.status = ForecastStatus::Procured;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ForecastCommand::SaveDraft(cmd) => self.handle_save_draft(cmd),
            ForecastCommand::ReviseDraft(cmd) => self.handle_revise_draft(cmd),
            ForecastCommand::Submit(cmd) => self.handle_submit(cmd),
            ForecastCommand::SubmitDraft(cmd) => self.handle_submit_draft(cmd),
            ForecastCommand::Approve(cmd) => self.handle_approve(cmd),
            ForecastCommand::Reject(cmd) => self.handle_reject(cmd),
            ForecastCommand::MarkProcured(cmd) => self.handle_mark_procured(cmd),
        }
    }
}

impl ForecastLine {
    fn ensure_created(&self) -> DomainResult<()> {
        if !self.created {
            return Err(DomainError::not_found("forecast", self.id.as_str()));
        }
        Ok(())
    }

    fn ensure_new(&self, submitter: UserId, week: Week) -> DomainResult<()> {
        if self.created {
            return Err(DomainError::DuplicateSubmission {
                submitter: submitter.to_string(),
                week: week.label(),
            });
        }
        if self.id != ForecastLineId::for_submission(submitter, week) {
            return Err(DomainError::validation(
                "forecast id does not match submitter and week",
            ));
        }
        Ok(())
    }

    fn ensure_transition(&self, to: ForecastStatus) -> DomainResult<()> {
        if !self.status.can_move_to(to) {
            return Err(DomainError::invalid_transition("forecast", self.status, to));
        }
        Ok(())
    }

    fn ensure_own_draft(&self, actor: UserId) -> DomainResult<()> {
        if self.status != ForecastStatus::Draft {
            return Err(DomainError::precondition(format!(
                "forecast {} is no longer a draft",
                self.id
            )));
        }
        if self.submitter != Some(actor) {
            return Err(DomainError::unauthorized(
                "only the submitter may edit a draft forecast",
            ));
        }
        Ok(())
    }

    fn with_overrides(&self, overrides: &[ItemOverride]) -> DomainResult<Vec<ForecastItem>> {
        let mut items = self.items.clone();
        for o in overrides {
            let item = items
                .iter_mut()
                .find(|i| i.recipe_id == o.recipe_id)
                .ok_or_else(|| {
                    DomainError::validation(format!(
                        "recipe {} is not part of forecast {}",
                        o.recipe_id, self.id
                    ))
                })?;
            item.quantity = o.quantity.ensure_positive(o.recipe_id.as_str())?;
        }
        Ok(items)
    }

    fn handle_save_draft(&self, cmd: &SaveDraft) -> DomainResult<Vec<ForecastEvent>> {
        self.ensure_new(cmd.submitter, cmd.week)?;
        validate_items(&cmd.items)?;

        Ok(vec![ForecastEvent::ForecastDrafted(ForecastDrafted {
            line_id: self.id.clone(),
            submitter: cmd.submitter,
            week: cmd.week,
            items: cmd.items.clone(),
            approvers: cmd.approvers,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_revise_draft(&self, cmd: &ReviseDraft) -> DomainResult<Vec<ForecastEvent>> {
        self.ensure_created()?;
        self.ensure_own_draft(cmd.actor)?;
        validate_items(&cmd.items)?;

        Ok(vec![ForecastEvent::DraftRevised(DraftRevised {
            line_id: self.id.clone(),
            items: cmd.items.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_submit(&self, cmd: &Submit) -> DomainResult<Vec<ForecastEvent>> {
        self.ensure_new(cmd.submitter, cmd.week)?;
        validate_items(&cmd.items)?;

        Ok(vec![ForecastEvent::ForecastSubmitted(ForecastSubmitted {
            line_id: self.id.clone(),
            submitter: cmd.submitter,
            week: cmd.week,
            items: cmd.items.clone(),
            approvers: cmd.approvers,
            from: None,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_submit_draft(&self, cmd: &SubmitDraft) -> DomainResult<Vec<ForecastEvent>> {
        self.ensure_created()?;
        self.ensure_own_draft(cmd.actor)?;
        self.ensure_transition(ForecastStatus::PendingStockManagerApproval)?;
        let (Some(submitter), Some(week)) = (self.submitter, self.week) else {
            return Err(DomainError::precondition("draft is missing submitter or week"));
        };

        Ok(vec![ForecastEvent::ForecastSubmitted(ForecastSubmitted {
            line_id: self.id.clone(),
            submitter,
            week,
            items: self.items.clone(),
            approvers: cmd.approvers,
            from: Some(ForecastStatus::Draft),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(&self, cmd: &Approve) -> DomainResult<Vec<ForecastEvent>> {
        self.ensure_created()?;
        let to = cmd.stage.approved_status();
        self.ensure_transition(to)?;

        let items = match &cmd.modified_items {
            Some(overrides) if !overrides.is_empty() => Some(self.with_overrides(overrides)?),
            _ => None,
        };

        Ok(vec![ForecastEvent::ForecastApproved(ForecastApproved {
            line_id: self.id.clone(),
            stage: cmd.stage,
            approved_by: cmd.actor,
            items,
            from: self.status,
            to,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reject(&self, cmd: &Reject) -> DomainResult<Vec<ForecastEvent>> {
        self.ensure_created()?;
        let to = cmd.stage.rejected_status();
        self.ensure_transition(to)?;
        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("a rejection reason is required"));
        }

        Ok(vec![ForecastEvent::ForecastRejected(ForecastRejected {
            line_id: self.id.clone(),
            stage: cmd.stage,
            rejected_by: cmd.actor,
            reason: cmd.reason.clone(),
            from: self.status,
            to,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_procured(&self, cmd: &MarkProcured) -> DomainResult<Vec<ForecastEvent>> {
        self.ensure_created()?;
        self.ensure_transition(ForecastStatus::Procured)?;

        Ok(vec![ForecastEvent::ForecastProcured(ForecastProcured {
            line_id: self.id.clone(),
            by: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn week() -> Week {
        Week::starting(NaiveDate::from_ymd_opt(2024, 1, 6).unwrap())
    }

    fn biryani(quantity: i64) -> ForecastItem {
        ForecastItem::new(RecipeId::new("biryani"), "Biryani", Quantity::from(quantity), 1)
    }

    fn submitted(submitter: UserId) -> ForecastLine {
        let mut line = ForecastLine::empty(ForecastLineId::for_submission(submitter, week()));
        line.execute(&ForecastCommand::Submit(Submit {
            submitter,
            week: week(),
            items: vec![biryani(100)],
            approvers: ApproverChain::default(),
            occurred_at: Utc::now(),
        }))
        .unwrap();
        line
    }

    fn approve(stage: ReviewStage) -> ForecastCommand {
        ForecastCommand::Approve(Approve {
            actor: UserId::new(),
            stage,
            modified_items: None,
            occurred_at: Utc::now(),
        })
    }

    fn reject(stage: ReviewStage) -> ForecastCommand {
        ForecastCommand::Reject(Reject {
            actor: UserId::new(),
            stage,
            reason: "too optimistic".into(),
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn submit_creates_line_pending_stock_manager() {
        let line = submitted(UserId::new());
        assert_eq!(line.status(), ForecastStatus::PendingStockManagerApproval);
        assert_eq!(line.history().len(), 1);
        assert_eq!(line.version(), 1);
    }

    #[test]
    fn second_submission_for_same_week_is_a_duplicate() {
        let submitter = UserId::new();
        let line = submitted(submitter);
        let err = line
            .handle(&ForecastCommand::Submit(Submit {
                submitter,
                week: week(),
                items: vec![biryani(5)],
                approvers: ApproverChain::default(),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::DuplicateSubmission { .. }));
    }

    #[test]
    fn items_are_validated() {
        assert!(validate_items(&[]).is_err());
        assert!(validate_items(&[biryani(0)]).is_err());
        assert!(validate_items(&[biryani(1), biryani(2)]).is_err());
        assert!(validate_items(&[biryani(1)]).is_ok());
    }

    #[test]
    fn approvals_follow_the_chain() {
        let mut line = submitted(UserId::new());

        let err = line.handle(&approve(ReviewStage::Finance)).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));

        line.execute(&approve(ReviewStage::StockManager)).unwrap();
        assert_eq!(line.status(), ForecastStatus::PendingFinanceApproval);

        line.execute(&approve(ReviewStage::Finance)).unwrap();
        assert_eq!(line.status(), ForecastStatus::AcceptedByFinance);
        assert!(line.status().is_accepted());

        line.execute(&ForecastCommand::MarkProcured(MarkProcured {
            actor: UserId::new(),
            occurred_at: Utc::now(),
        }))
        .unwrap();
        assert_eq!(line.status(), ForecastStatus::Procured);
        assert_eq!(line.history().len(), 4);
    }

    #[test]
    fn approval_can_override_quantities() {
        let mut line = submitted(UserId::new());
        line.execute(&ForecastCommand::Approve(Approve {
            actor: UserId::new(),
            stage: ReviewStage::StockManager,
            modified_items: Some(vec![ItemOverride {
                recipe_id: RecipeId::new("biryani"),
                quantity: Quantity::from(80),
            }]),
            occurred_at: Utc::now(),
        }))
        .unwrap();
        assert_eq!(line.items()[0].quantity, Quantity::from(80));

        let unknown = line.handle(&ForecastCommand::Approve(Approve {
            actor: UserId::new(),
            stage: ReviewStage::Finance,
            modified_items: Some(vec![ItemOverride {
                recipe_id: RecipeId::new("korma"),
                quantity: Quantity::from(1),
            }]),
            occurred_at: Utc::now(),
        }));
        assert!(matches!(unknown, Err(DomainError::Validation(_))));
    }

    #[test]
    fn rejection_freezes_the_line() {
        let mut line = submitted(UserId::new());
        line.execute(&reject(ReviewStage::StockManager)).unwrap();
        assert_eq!(line.status(), ForecastStatus::Rejected);
        assert!(line.status().is_terminal());
        assert_eq!(line.history().last().unwrap().note.as_deref(), Some("too optimistic"));

        assert!(line.handle(&approve(ReviewStage::StockManager)).is_err());
        assert!(line.handle(&approve(ReviewStage::Finance)).is_err());
    }

    #[test]
    fn finance_rejection_has_its_own_status() {
        let mut line = submitted(UserId::new());
        line.execute(&approve(ReviewStage::StockManager)).unwrap();
        line.execute(&reject(ReviewStage::Finance)).unwrap();
        assert_eq!(line.status(), ForecastStatus::RejectedByFinance);
    }

    #[test]
    fn drafts_are_editable_only_by_their_submitter() {
        let submitter = UserId::new();
        let mut line = ForecastLine::empty(ForecastLineId::for_submission(submitter, week()));
        line.execute(&ForecastCommand::SaveDraft(SaveDraft {
            submitter,
            week: week(),
            items: vec![biryani(10)],
            approvers: ApproverChain::default(),
            occurred_at: Utc::now(),
        }))
        .unwrap();
        assert_eq!(line.status(), ForecastStatus::Draft);

        let stranger = line.handle(&ForecastCommand::ReviseDraft(ReviseDraft {
            actor: UserId::new(),
            items: vec![biryani(12)],
            occurred_at: Utc::now(),
        }));
        assert!(matches!(stranger, Err(DomainError::Unauthorized(_))));

        line.execute(&ForecastCommand::ReviseDraft(ReviseDraft {
            actor: submitter,
            items: vec![biryani(12)],
            occurred_at: Utc::now(),
        }))
        .unwrap();
        assert_eq!(line.items()[0].quantity, Quantity::from(12));

        line.execute(&ForecastCommand::SubmitDraft(SubmitDraft {
            actor: submitter,
            approvers: ApproverChain::default(),
            occurred_at: Utc::now(),
        }))
        .unwrap();
        assert_eq!(line.status(), ForecastStatus::PendingStockManagerApproval);
        assert_eq!(line.history()[1].from, Some(ForecastStatus::Draft));

        let late_edit = line.handle(&ForecastCommand::ReviseDraft(ReviseDraft {
            actor: submitter,
            items: vec![biryani(1)],
            occurred_at: Utc::now(),
        }));
        assert!(matches!(late_edit, Err(DomainError::PreconditionFailed(_))));
    }

    #[test]
    fn mark_procured_requires_finance_acceptance() {
        let line = submitted(UserId::new());
        let err = line
            .handle(&ForecastCommand::MarkProcured(MarkProcured {
                actor: UserId::new(),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
    }

    fn any_command() -> impl Strategy<Value = ForecastCommand> {
        prop_oneof![
            Just(approve(ReviewStage::StockManager)),
            Just(approve(ReviewStage::Finance)),
            Just(reject(ReviewStage::StockManager)),
            Just(reject(ReviewStage::Finance)),
            Just(ForecastCommand::MarkProcured(MarkProcured {
                actor: UserId::new(),
                occurred_at: Utc::now(),
            })),
        ]
    }

    proptest! {
        #[test]
        fn every_recorded_transition_is_in_the_table(
            commands in proptest::collection::vec(any_command(), 0..12)
        ) {
            let mut line = submitted(UserId::new());
            for command in &commands {
                let _ = line.execute(command);
            }
            for change in line.history().iter().skip(1) {
                let from = change.from.unwrap();
                prop_assert!(from.can_move_to(change.to));
            }
        }
    }
}
