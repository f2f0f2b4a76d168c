use chrono::NaiveDate;
use tracing::{info, instrument};

use foodflow_auth::{Action, Profile};
use foodflow_catalog::RecipeCatalog;
use foodflow_core::{Aggregate, DomainError, DomainResult, KitchenId, UserId};
use foodflow_inventory::{MovementReason, StockAdjustments};
use foodflow_kitchen::{
    AllocationLine, AssignmentCommand, AssignmentId, Collect, CollectForLogistics, ConfirmReceipt,
    CookingAssignment, Disperse, RecordCooked, cooking_plan, dispersal_plan, receipt_plan,
};

use super::collections::COOKING_ASSIGNMENTS;
use super::{SupplyChain, save};
use crate::error::ServiceError;
use crate::inventory::Inventory;

/// Ledger movement that accompanies an assignment step.
#[derive(Debug, Clone, Copy)]
enum Movement {
    Dispersal,
    KitchenReceipt,
    Cooking,
}

impl Movement {
    fn plan(
        self,
        assignment: &CookingAssignment,
        catalog: &dyn RecipeCatalog,
    ) -> DomainResult<StockAdjustments> {
        match self {
            Movement::Dispersal => dispersal_plan(assignment, catalog),
            Movement::KitchenReceipt => receipt_plan(assignment, catalog),
            Movement::Cooking => cooking_plan(assignment, catalog),
        }
    }

    fn reason(self) -> MovementReason {
        match self {
            Movement::Dispersal => MovementReason::Dispersal,
            Movement::KitchenReceipt => MovementReason::KitchenReceipt,
            Movement::Cooking => MovementReason::Cooking,
        }
    }
}

/// Kitchen staff act only for the kitchen their profile operates.
fn ensure_operates(profile: &Profile, kitchen: KitchenId) -> Result<(), ServiceError> {
    if profile.is_admin() || profile.kitchen_id == Some(kitchen) {
        return Ok(());
    }
    Err(DomainError::unauthorized(format!(
        "profile {} does not operate kitchen {kitchen}",
        profile.id
    ))
    .into())
}

impl SupplyChain {
    /// Run one assignment step and its ledger movement in a single transaction.
    ///
    /// The movement is planned from the assignment state after the step, so
    /// cooking debits what was actually recorded as cooked.
    fn run_assignment(
        &self,
        assignment_id: AssignmentId,
        command: AssignmentCommand,
        movement: Option<Movement>,
    ) -> Result<CookingAssignment, ServiceError> {
        let key = assignment_id.to_string();
        let now = self.clock.now();
        let assignment = self.transact(|tx| {
            let mut assignment: CookingAssignment =
                tx.require(COOKING_ASSIGNMENTS, &key, "cooking assignment")?;
            let events = assignment.execute(&command)?;

            let staged = match movement {
                Some(m) => {
                    let plan = m.plan(&assignment, self.catalog.as_ref())?;
                    Some(Inventory::stage(tx, plan, m.reason(), now)?)
                }
                None => None,
            };

            save(tx, COOKING_ASSIGNMENTS, &key, &assignment, &events)?;
            if let Some(staged) = staged {
                Inventory::write(tx, staged)?;
            }
            Ok(assignment)
        })?;

        info!(assignment = %assignment_id, status = ?assignment.status(), "assignment advanced");
        Ok(assignment)
    }

    /// Send ingredients and reserved prepared units to the kitchen.
    ///
    /// Debits raw stock by the BOM of the assigned quantities and consumes the
    /// prepared units; any shortage rolls back the whole dispersal.
    #[instrument(skip(self))]
    pub fn disperse(
        &self,
        actor: UserId,
        assignment_id: AssignmentId,
    ) -> Result<CookingAssignment, ServiceError> {
        self.authorized(actor, Action::Disperse)?;
        let command = AssignmentCommand::Disperse(Disperse {
            actor,
            occurred_at: self.clock.now(),
        });
        self.run_assignment(assignment_id, command, Some(Movement::Dispersal))
    }

    /// The kitchen confirms what was dispersed; credits its local stock.
    #[instrument(skip(self))]
    pub fn confirm_receipt(
        &self,
        actor: UserId,
        assignment_id: AssignmentId,
        kitchen: KitchenId,
    ) -> Result<CookingAssignment, ServiceError> {
        let profile = self.authorized(actor, Action::ConfirmKitchenReceipt)?;
        ensure_operates(&profile, kitchen)?;
        let command = AssignmentCommand::ConfirmReceipt(ConfirmReceipt {
            actor,
            kitchen,
            occurred_at: self.clock.now(),
        });
        self.run_assignment(assignment_id, command, Some(Movement::KitchenReceipt))
    }

    /// Record actual output. Kitchen stock pays for the cooked quantities and the
    /// prepared units it held; logistics stock receives both.
    #[instrument(skip(self, cooked))]
    pub fn record_cooked(
        &self,
        actor: UserId,
        assignment_id: AssignmentId,
        kitchen: KitchenId,
        cooked: Vec<AllocationLine>,
    ) -> Result<CookingAssignment, ServiceError> {
        let profile = self.authorized(actor, Action::RecordCooked)?;
        ensure_operates(&profile, kitchen)?;
        let command = AssignmentCommand::RecordCooked(RecordCooked {
            actor,
            kitchen,
            cooked,
            occurred_at: self.clock.now(),
        });
        self.run_assignment(assignment_id, command, Some(Movement::Cooking))
    }

    #[instrument(skip(self))]
    pub fn collect(
        &self,
        actor: UserId,
        assignment_id: AssignmentId,
    ) -> Result<CookingAssignment, ServiceError> {
        self.authorized(actor, Action::CollectFromKitchen)?;
        let command = AssignmentCommand::Collect(Collect {
            actor,
            occurred_at: self.clock.now(),
        });
        self.run_assignment(assignment_id, command, None)
    }

    #[instrument(skip(self))]
    pub fn collect_for_logistics(
        &self,
        actor: UserId,
        assignment_id: AssignmentId,
    ) -> Result<CookingAssignment, ServiceError> {
        self.authorized(actor, Action::CollectForLogistics)?;
        let command = AssignmentCommand::CollectForLogistics(CollectForLogistics {
            actor,
            occurred_at: self.clock.now(),
        });
        self.run_assignment(assignment_id, command, None)
    }

    pub fn assignment(
        &self,
        assignment_id: AssignmentId,
    ) -> Result<Option<CookingAssignment>, ServiceError> {
        self.load(COOKING_ASSIGNMENTS, &assignment_id.to_string())
    }

    /// Assignments of one date, optionally for one kitchen only.
    pub fn assignments_for_date(
        &self,
        date: NaiveDate,
        kitchen: Option<KitchenId>,
    ) -> Result<Vec<CookingAssignment>, ServiceError> {
        self.transact(|tx| {
            Ok(tx.scan(COOKING_ASSIGNMENTS, |a: &CookingAssignment| {
                a.date() == date && kitchen.is_none_or(|k| a.kitchen() == k)
            })?)
        })
    }
}
