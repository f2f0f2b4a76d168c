use std::collections::BTreeSet;

use chrono::NaiveDate;
use tracing::{info, instrument};

use foodflow_auth::{Action, OrgTree, Role};
use foodflow_core::{DomainError, UserId, Week};
use foodflow_forecasting::{
    DailyTarget, DailyTargetId, DateTargets, ForecastAllotment, ForecastLine, ForecastLineId,
    TargetRequest,
};
use foodflow_inventory::StockKey;
use foodflow_kitchen::{
    AggregatedTarget, AllocationPlan, AssignmentBatch, CookingAssignment, aggregate_targets,
};

use super::collections::{
    ASSIGNMENT_BATCHES, COOKING_ASSIGNMENTS, DAILY_TARGETS, DAILY_TARGET_DATES, FORECASTS,
    FORECAST_ALLOTMENTS,
};
use super::SupplyChain;
use crate::error::ServiceError;
use crate::inventory::Inventory;
use crate::transaction::Transaction;

impl SupplyChain {
    /// Set (or replace) a team's target for one day, drawn from its accepted weekly forecast.
    ///
    /// Zonal managers may only set targets for teams below them in the hierarchy.
    #[instrument(skip(self, requests))]
    pub fn set_daily_target(
        &self,
        actor: UserId,
        team: UserId,
        date: NaiveDate,
        requests: &[TargetRequest],
    ) -> Result<DailyTarget, ServiceError> {
        let profile = self.authorized(actor, Action::SetDailyTarget)?;
        if !profile.is_admin() && !profile.has_role(Role::StockManager) && team != actor {
            let tree = OrgTree::from_directory(self.directory.as_ref());
            if !tree.ancestors(team).contains(&actor) {
                return Err(DomainError::unauthorized(format!(
                    "{actor} does not manage team {team}"
                ))
                .into());
            }
        }

        let week = Week::containing(date, self.config.week_starts_on);
        let forecast_id = ForecastLineId::for_submission(team, week);
        let target_id = DailyTargetId::for_team(team, date);
        let index_key = DateTargets::key(date);

        let target = self.transact(|tx| {
            ensure_unassigned(tx, date)?;
            let line: ForecastLine = tx.require(FORECASTS, forecast_id.as_str(), "forecast")?;
            if !line.status().is_accepted() {
                return Err(DomainError::precondition(format!(
                    "forecast {forecast_id} is {:?}, not accepted",
                    line.status()
                ))
                .into());
            }
            let mut allotment: ForecastAllotment =
                tx.require(FORECAST_ALLOTMENTS, forecast_id.as_str(), "forecast allotment")?;
            let previous: Option<DailyTarget> = tx.get(DAILY_TARGETS, target_id.as_str())?;
            let mut index = tx
                .get::<DateTargets>(DAILY_TARGET_DATES, &index_key)?
                .unwrap_or_else(|| DateTargets::new(date));

            if let Some(previous) = &previous {
                allotment.restore(&previous.items);
            }
            let items = allotment.consume(requests)?;
            let target =
                DailyTarget::new(team, actor, forecast_id.clone(), date, items, self.clock.now());

            tx.put(FORECAST_ALLOTMENTS, forecast_id.as_str(), &allotment)?;
            tx.put(DAILY_TARGETS, target_id.as_str(), &target)?;
            if index.insert(target_id.clone()) {
                tx.put(DAILY_TARGET_DATES, &index_key, &index)?;
            }
            Ok(target)
        })?;

        info!(target = %target_id, forecast = %forecast_id, "daily target set");
        Ok(target)
    }

    /// Every team's target for `date`, summed per recipe.
    pub fn aggregate_targets_for_date(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<AggregatedTarget>, ServiceError> {
        self.transact(|tx| Ok(aggregate_targets(&targets_for_date(tx, date)?)))
    }

    pub fn daily_target(
        &self,
        team: UserId,
        date: NaiveDate,
    ) -> Result<Option<DailyTarget>, ServiceError> {
        self.load(DAILY_TARGETS, DailyTargetId::for_team(team, date).as_str())
    }

    /// Split the date's aggregated targets across kitchens.
    ///
    /// The plan must allocate every aggregated quantity exactly, and prepared
    /// allocations must be on hand. Creates one assignment per kitchen with
    /// work and records the date's batch, which freezes its targets.
    #[instrument(skip(self, plan), fields(date = %plan.date))]
    pub fn assign(
        &self,
        actor: UserId,
        plan: &AllocationPlan,
    ) -> Result<Vec<CookingAssignment>, ServiceError> {
        self.authorized(actor, Action::AssignKitchens)?;
        let date = plan.date;

        let assignments = self.transact(|tx| {
            ensure_unassigned(tx, date)?;
            let targets = targets_for_date(tx, date)?;
            if targets.is_empty() {
                return Err(
                    DomainError::precondition(format!("no daily targets set for {date}")).into(),
                );
            }
            let aggregated = aggregate_targets(&targets);
            plan.validate(&aggregated)?;

            for (recipe_id, wanted) in plan.prepared_totals() {
                let key = StockKey::prepared(recipe_id.as_str());
                let on_hand = Inventory::on_hand(tx, &key)?;
                if wanted > on_hand {
                    return Err(key.shortage(on_hand, wanted).into());
                }
            }

            let forecast_ids: Vec<ForecastLineId> = targets
                .iter()
                .map(|t| t.forecast_id.clone())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            let now = self.clock.now();
            let assignments = plan.build_assignments(&aggregated, &forecast_ids, now)?;

            for assignment in &assignments {
                tx.put(
                    COOKING_ASSIGNMENTS,
                    &assignment.id_typed().to_string(),
                    assignment,
                )?;
            }
            tx.put(
                ASSIGNMENT_BATCHES,
                &AssignmentBatch::key(date),
                &AssignmentBatch {
                    date,
                    assignments: assignments.iter().map(CookingAssignment::id_typed).collect(),
                    forecast_ids,
                    assigned_by: actor,
                    assigned_at: now,
                },
            )?;
            Ok(assignments)
        })?;

        info!(kitchens = assignments.len(), "kitchens assigned");
        Ok(assignments)
    }

    pub fn assignment_batch(
        &self,
        date: NaiveDate,
    ) -> Result<Option<AssignmentBatch>, ServiceError> {
        self.load(ASSIGNMENT_BATCHES, &AssignmentBatch::key(date))
    }
}

fn ensure_unassigned(tx: &mut Transaction<'_>, date: NaiveDate) -> Result<(), ServiceError> {
    if tx
        .get::<AssignmentBatch>(ASSIGNMENT_BATCHES, &AssignmentBatch::key(date))?
        .is_some()
    {
        return Err(DomainError::precondition(format!(
            "{date} was already assigned to kitchens"
        ))
        .into());
    }
    Ok(())
}

/// Targets listed in the date's index, each read by key.
fn targets_for_date(
    tx: &mut Transaction<'_>,
    date: NaiveDate,
) -> Result<Vec<DailyTarget>, ServiceError> {
    let Some(index) = tx.get::<DateTargets>(DAILY_TARGET_DATES, &DateTargets::key(date))? else {
        return Ok(Vec::new());
    };
    index
        .targets
        .iter()
        .map(|id| tx.require(DAILY_TARGETS, id.as_str(), "daily target"))
        .collect()
}
