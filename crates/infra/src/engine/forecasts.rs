use std::collections::{BTreeMap, BTreeSet};

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use foodflow_auth::{Action, OrgTree, Profile, Role, authorize, ensure_designated};
use foodflow_catalog::RecipeId;
use foodflow_core::{Aggregate, AggregateRoot, DomainError, Quantity, UserId, Week};
use foodflow_forecasting::{
    Approve, ApproverChain, CompositeReview, ForecastAllotment, ForecastCommand, ForecastEvent,
    ForecastItem, ForecastLine, ForecastLineId, ForecastStatus, ItemOverride, MarkProcured,
    Reject, ReviewStage, ReviseDraft, SaveDraft, Submit, SubmitDraft,
};
use foodflow_inventory::{MovementReason, StockAdjustments, StockKey};
use foodflow_kitchen::PORTION_UNIT;
use foodflow_purchasing::{
    IngredientLine, PreparedCover, ProcurementCommand, ProcurementPlan, ProcurementRequest,
    RequestProcurement,
};

use super::collections::{FORECASTS, FORECAST_ALLOTMENTS, PROCUREMENT_REQUESTS};
use super::{SupplyChain, save};
use crate::document_store::StoreError;
use crate::error::ServiceError;
use crate::inventory::Inventory;
use crate::transaction::Transaction;

/// A recipe (by id or by name) and its weekly quantity, as entered by a submitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastEntry {
    pub recipe: String,
    pub quantity: Quantity,
}

impl ForecastEntry {
    pub fn new(recipe: impl Into<String>, quantity: Quantity) -> Self {
        Self {
            recipe: recipe.into(),
            quantity,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Decision<'a> {
    Approve(Option<&'a [ItemOverride]>),
    Reject(&'a str),
}

/// Shortfall of one accepted line, computed before anything is written.
#[derive(Debug)]
pub(super) struct ProcurementOutcome {
    pub(super) covers: Vec<PreparedCover>,
    pub(super) shortfall: Vec<IngredientLine>,
    pub(super) existing: Option<ProcurementRequest>,
}

/// Stock already counted toward earlier lines of one transaction.
///
/// Prepared units become reservations on write; raw amounts only stop later
/// lines of the same acceptance from counting the same ingredient twice.
#[derive(Debug, Default)]
pub(super) struct Promised {
    prepared: BTreeMap<RecipeId, Quantity>,
    raw: BTreeMap<String, Quantity>,
}

fn review_action(stage: ReviewStage) -> Action {
    match stage {
        ReviewStage::StockManager => Action::ReviewForecastAsStockManager,
        ReviewStage::Finance => Action::ReviewForecastAsFinance,
    }
}

impl SupplyChain {
    /// Pin each entry to the catalog's current recipe revision.
    fn pin_items(&self, entries: &[ForecastEntry]) -> Result<Vec<ForecastItem>, ServiceError> {
        entries
            .iter()
            .map(|entry| {
                let recipe = self
                    .catalog
                    .recipe(&RecipeId::new(&entry.recipe))
                    .or_else(|| self.catalog.recipe_by_name(&entry.recipe))
                    .ok_or_else(|| DomainError::not_found("recipe", entry.recipe.clone()))?;
                Ok(ForecastItem::new(
                    recipe.id,
                    recipe.name,
                    entry.quantity,
                    recipe.revision,
                ))
            })
            .collect()
    }

    /// Nearest stock manager and finance approver above `submitter`.
    fn approver_chain(&self, submitter: UserId) -> ApproverChain {
        let tree = OrgTree::from_directory(self.directory.as_ref());
        ApproverChain {
            stock_manager: tree.nearest_with_role(submitter, Role::StockManager),
            finance: tree.nearest_with_role(submitter, Role::Finance),
        }
    }

    fn ensure_week(&self, week: Week) -> Result<(), ServiceError> {
        if week.start().weekday() != self.config.week_starts_on {
            return Err(DomainError::validation(format!(
                "week {week} does not start on {}",
                self.config.week_starts_on
            ))
            .into());
        }
        Ok(())
    }

    /// Create or look up the line document for `(submitter, week)` and run `command` on it.
    fn create_line(
        &self,
        submitter: UserId,
        week: Week,
        command: ForecastCommand,
    ) -> Result<ForecastLine, ServiceError> {
        let id = ForecastLineId::for_submission(submitter, week);
        self.transact(|tx| {
            let mut line = tx
                .get::<ForecastLine>(FORECASTS, id.as_str())?
                .unwrap_or_else(|| ForecastLine::empty(id.clone()));
            let events = line.execute(&command)?;
            save(tx, FORECASTS, id.as_str(), &line, &events)?;
            Ok(line)
        })
    }

    fn update_line(
        &self,
        forecast_id: &ForecastLineId,
        command: ForecastCommand,
    ) -> Result<ForecastLine, ServiceError> {
        self.transact(|tx| {
            let mut line: ForecastLine = tx.require(FORECASTS, forecast_id.as_str(), "forecast")?;
            let events = line.execute(&command)?;
            save(tx, FORECASTS, forecast_id.as_str(), &line, &events)?;
            Ok(line)
        })
    }

    /// Submit a weekly forecast straight into stock-manager review.
    ///
    /// At most one line exists per `(actor, week)`; a second submission fails
    /// with `DuplicateSubmission`.
    #[instrument(skip(self, entries))]
    pub fn submit(
        &self,
        actor: UserId,
        week: Week,
        entries: &[ForecastEntry],
    ) -> Result<ForecastLine, ServiceError> {
        self.authorized(actor, Action::SubmitForecast)?;
        self.ensure_week(week)?;
        let command = ForecastCommand::Submit(Submit {
            submitter: actor,
            week,
            items: self.pin_items(entries)?,
            approvers: self.approver_chain(actor),
            occurred_at: self.clock.now(),
        });
        let line = self.create_line(actor, week, command)?;
        info!(forecast = %line.id(), "forecast submitted");
        Ok(line)
    }

    #[instrument(skip(self, entries))]
    pub fn save_draft(
        &self,
        actor: UserId,
        week: Week,
        entries: &[ForecastEntry],
    ) -> Result<ForecastLine, ServiceError> {
        self.authorized(actor, Action::SubmitForecast)?;
        self.ensure_week(week)?;
        let command = ForecastCommand::SaveDraft(SaveDraft {
            submitter: actor,
            week,
            items: self.pin_items(entries)?,
            approvers: self.approver_chain(actor),
            occurred_at: self.clock.now(),
        });
        let line = self.create_line(actor, week, command)?;
        info!(forecast = %line.id(), "forecast draft saved");
        Ok(line)
    }

    #[instrument(skip(self, entries))]
    pub fn revise_draft(
        &self,
        actor: UserId,
        forecast_id: &ForecastLineId,
        entries: &[ForecastEntry],
    ) -> Result<ForecastLine, ServiceError> {
        self.authorized(actor, Action::SubmitForecast)?;
        let command = ForecastCommand::ReviseDraft(ReviseDraft {
            actor,
            items: self.pin_items(entries)?,
            occurred_at: self.clock.now(),
        });
        self.update_line(forecast_id, command)
    }

    /// Send a draft to review. Approvers are resolved now, not when the draft was saved.
    #[instrument(skip(self))]
    pub fn submit_draft(
        &self,
        actor: UserId,
        forecast_id: &ForecastLineId,
    ) -> Result<ForecastLine, ServiceError> {
        self.authorized(actor, Action::SubmitForecast)?;
        let command = ForecastCommand::SubmitDraft(SubmitDraft {
            actor,
            approvers: self.approver_chain(actor),
            occurred_at: self.clock.now(),
        });
        let line = self.update_line(forecast_id, command)?;
        info!(forecast = %forecast_id, "forecast draft submitted");
        Ok(line)
    }

    /// Approve the line at its current review stage, optionally overriding quantities.
    ///
    /// Finance acceptance also opens the allotment, reserves covering prepared
    /// stock and raises the procurement request (or marks the line procured
    /// when nothing needs buying), all in the same commit.
    #[instrument(skip(self, modified_items))]
    pub fn approve(
        &self,
        actor: UserId,
        forecast_id: &ForecastLineId,
        modified_items: Option<Vec<ItemOverride>>,
    ) -> Result<ForecastLine, ServiceError> {
        let profile = self.profile(actor)?;
        let decision = Decision::Approve(modified_items.as_deref());
        self.review_one(&profile, forecast_id, decision)
    }

    #[instrument(skip(self, reason))]
    pub fn reject(
        &self,
        actor: UserId,
        forecast_id: &ForecastLineId,
        reason: &str,
    ) -> Result<ForecastLine, ServiceError> {
        let profile = self.profile(actor)?;
        self.review_one(&profile, forecast_id, Decision::Reject(reason))
    }

    /// Lines of `week` waiting at `stage` for `approver`, with per-recipe totals.
    pub fn composite_review(
        &self,
        week: Week,
        stage: ReviewStage,
        approver: Option<UserId>,
    ) -> Result<CompositeReview, ServiceError> {
        let pending = self.transact(|tx| Ok(pending_lines(tx, week, stage)?))?;
        Ok(CompositeReview::build(week, stage, approver, &pending))
    }

    /// Approve every line of the actor's composite view at once (all or nothing).
    #[instrument(skip(self))]
    pub fn approve_composite(
        &self,
        actor: UserId,
        week: Week,
        stage: ReviewStage,
    ) -> Result<Vec<ForecastLine>, ServiceError> {
        let profile = self.profile(actor)?;
        self.review_composite(&profile, week, stage, Decision::Approve(None))
    }

    #[instrument(skip(self, reason))]
    pub fn reject_composite(
        &self,
        actor: UserId,
        week: Week,
        stage: ReviewStage,
        reason: &str,
    ) -> Result<Vec<ForecastLine>, ServiceError> {
        let profile = self.profile(actor)?;
        self.review_composite(&profile, week, stage, Decision::Reject(reason))
    }

    /// Lines of `week` submitted by anyone reporting (directly or not) to `manager`.
    pub fn forecasts_for_manager(
        &self,
        manager: UserId,
        week: Week,
    ) -> Result<Vec<ForecastLine>, ServiceError> {
        let tree = OrgTree::from_directory(self.directory.as_ref());
        let team: BTreeSet<UserId> = tree.subordinates(manager).into_iter().collect();
        self.transact(|tx| {
            Ok(tx.scan(FORECASTS, |line: &ForecastLine| {
                line.week() == Some(week) && line.submitter().is_some_and(|s| team.contains(&s))
            })?)
        })
    }

    pub fn forecast(
        &self,
        forecast_id: &ForecastLineId,
    ) -> Result<Option<ForecastLine>, ServiceError> {
        self.load(FORECASTS, forecast_id.as_str())
    }

    pub fn allotment(
        &self,
        forecast_id: &ForecastLineId,
    ) -> Result<Option<ForecastAllotment>, ServiceError> {
        self.load(FORECAST_ALLOTMENTS, forecast_id.as_str())
    }

    fn review_one(
        &self,
        profile: &Profile,
        forecast_id: &ForecastLineId,
        decision: Decision<'_>,
    ) -> Result<ForecastLine, ServiceError> {
        let reviewed = self.transact(|tx| {
            let line: ForecastLine = tx.require(FORECASTS, forecast_id.as_str(), "forecast")?;
            self.review(tx, profile, vec![line], decision)
        })?;
        reviewed
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::not_found("forecast", forecast_id.as_str()).into())
    }

    fn review_composite(
        &self,
        profile: &Profile,
        week: Week,
        stage: ReviewStage,
        decision: Decision<'_>,
    ) -> Result<Vec<ForecastLine>, ServiceError> {
        self.transact(|tx| {
            let pending = pending_lines(tx, week, stage)?;
            let composite = CompositeReview::for_reviewer(week, stage, profile.id, &pending);
            if composite.is_empty() {
                return Err(DomainError::precondition(format!(
                    "no forecasts of week {week} await review by {}",
                    profile.id
                ))
                .into());
            }
            let lines = pending
                .into_iter()
                .filter(|l| composite.lines.contains(l.id()))
                .collect();
            self.review(tx, profile, lines, decision)
        })
    }

    /// Apply one decision to every line. Reads everything first, then writes.
    fn review(
        &self,
        tx: &mut Transaction<'_>,
        profile: &Profile,
        mut lines: Vec<ForecastLine>,
        decision: Decision<'_>,
    ) -> Result<Vec<ForecastLine>, ServiceError> {
        let now = self.clock.now();

        let mut events: Vec<Vec<ForecastEvent>> = Vec::with_capacity(lines.len());
        for line in &mut lines {
            let stage = line.status().pending_stage().ok_or_else(|| {
                DomainError::precondition(format!(
                    "forecast {} is not awaiting review ({:?})",
                    line.id(),
                    line.status()
                ))
            })?;
            authorize(profile, review_action(stage))?;
            ensure_designated(profile, line.approvers().designated(stage))?;

            let command = match decision {
                Decision::Approve(overrides) => ForecastCommand::Approve(Approve {
                    actor: profile.id,
                    stage,
                    modified_items: overrides.map(<[ItemOverride]>::to_vec),
                    occurred_at: now,
                }),
                Decision::Reject(reason) => ForecastCommand::Reject(Reject {
                    actor: profile.id,
                    stage,
                    reason: reason.to_string(),
                    occurred_at: now,
                }),
            };
            events.push(line.execute(&command)?);
        }

        let mut promised = Promised::default();
        let mut outcomes = Vec::with_capacity(lines.len());
        for line in &lines {
            outcomes.push(if line.status() == ForecastStatus::AcceptedByFinance {
                Some(self.plan_procurement(tx, line, &mut promised)?)
            } else {
                None
            });
        }

        let mut reservations = StockAdjustments::new();
        for cover in outcomes.iter().flatten().flat_map(|o| &o.covers) {
            reservations.reserve(
                StockKey::prepared(cover.recipe_id.as_str()),
                cover.quantity,
                PORTION_UNIT,
            )?;
        }
        let staged = if reservations.is_empty() {
            None
        } else {
            Some(Inventory::stage(
                tx,
                reservations,
                MovementReason::ForecastReservation,
                now,
            )?)
        };

        for ((line, mut line_events), outcome) in lines.iter_mut().zip(events).zip(outcomes) {
            if let Some(outcome) = outcome {
                line_events.extend(self.accept(tx, profile.id, line, outcome)?);
            }
            save(tx, FORECASTS, line.id().as_str(), &*line, &line_events)?;
            info!(forecast = %line.id(), status = ?line.status(), "forecast reviewed");
        }
        if let Some(staged) = staged {
            Inventory::write(tx, staged)?;
        }

        Ok(lines)
    }

    /// Shortfall of an accepted line against unreserved prepared stock and raw stock.
    ///
    /// Stock in `promised` is not counted again; this line's covers and the raw
    /// amounts it draws on are added to it.
    pub(super) fn plan_procurement(
        &self,
        tx: &mut Transaction<'_>,
        line: &ForecastLine,
        promised: &mut Promised,
    ) -> Result<ProcurementOutcome, ServiceError> {
        let mut available = BTreeMap::new();
        for item in line.items() {
            let on_shelf = Inventory::available(tx, &StockKey::prepared(item.recipe_id.as_str()))?;
            let claimed = promised.prepared.get(&item.recipe_id).copied().unwrap_or_default();
            available.insert(item.recipe_id.clone(), on_shelf.saturating_sub(claimed));
        }

        let plan = ProcurementPlan::prepare(
            line.items(),
            |recipe_id| available.get(recipe_id).copied().unwrap_or_default(),
            self.catalog.as_ref(),
        )?;
        for cover in &plan.covered_by_prepared {
            *promised.prepared.entry(cover.recipe_id.clone()).or_default() += cover.quantity;
        }

        let mut raw = BTreeMap::new();
        for name in plan.ingredient_names() {
            let on_hand = Inventory::on_hand(tx, &StockKey::raw(name))?;
            let claimed = promised.raw.get(name).copied().unwrap_or_default();
            raw.insert(name.to_string(), on_hand.saturating_sub(claimed));
        }
        let shortfall = plan.shortfall(|name| raw.get(name).copied().unwrap_or_default());
        for needed in &plan.required {
            let drawn = needed.quantity.min(raw.get(&needed.name).copied().unwrap_or_default());
            *promised.raw.entry(needed.name.clone()).or_default() += drawn;
        }
        tracing::debug!(
            forecast = %line.id(),
            covered = plan.covered_by_prepared.len(),
            to_buy = shortfall.len(),
            "shortfall computed"
        );

        Ok(ProcurementOutcome {
            covers: plan.covered_by_prepared,
            shortfall,
            existing: tx.get(PROCUREMENT_REQUESTS, line.id().as_str())?,
        })
    }

    /// Write-phase of finance acceptance: allotment plus request or procured mark.
    fn accept(
        &self,
        tx: &mut Transaction<'_>,
        actor: UserId,
        line: &mut ForecastLine,
        outcome: ProcurementOutcome,
    ) -> Result<Vec<ForecastEvent>, ServiceError> {
        let now = self.clock.now();
        let allotment = ForecastAllotment::from_forecast(line)?;
        tx.put(FORECAST_ALLOTMENTS, line.id().as_str(), &allotment)?;

        if outcome.shortfall.is_empty() {
            info!(forecast = %line.id(), "nothing to buy, forecast procured");
            return Ok(line.execute(&ForecastCommand::MarkProcured(MarkProcured {
                actor,
                occurred_at: now,
            }))?);
        }
        if outcome.existing.is_none() {
            self.raise_request(tx, actor, line.id(), outcome.shortfall)?;
        }
        Ok(vec![])
    }

    pub(super) fn raise_request(
        &self,
        tx: &mut Transaction<'_>,
        actor: UserId,
        forecast_id: &ForecastLineId,
        shortfall: Vec<IngredientLine>,
    ) -> Result<ProcurementRequest, ServiceError> {
        let mut request = ProcurementRequest::empty(forecast_id.clone());
        let events = request.execute(&ProcurementCommand::Request(RequestProcurement {
            ingredients: shortfall,
            requested_by: actor,
            occurred_at: self.clock.now(),
        }))?;
        save(tx, PROCUREMENT_REQUESTS, forecast_id.as_str(), &request, &events)?;
        info!(
            forecast = %forecast_id,
            lines = request.ingredients().len(),
            "procurement requested"
        );
        Ok(request)
    }
}

fn pending_lines(
    tx: &mut Transaction<'_>,
    week: Week,
    stage: ReviewStage,
) -> Result<Vec<ForecastLine>, StoreError> {
    tx.scan(FORECASTS, |line: &ForecastLine| {
        line.week() == Some(week) && line.status() == stage.pending_status()
    })
}
