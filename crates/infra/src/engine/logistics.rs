use tracing::{info, instrument};

use foodflow_auth::{Action, Role};
use foodflow_core::{Aggregate, AggregateId, DomainError, OutletId, Quantity, UserId};
use foodflow_distribution::{
    AdvanceStockBack, ConfirmDistributionReceipt, Dispatch, Distribution, DistributionCommand,
    DistributionId, ReportStockBack, ShipmentItem, StockBackCommand, StockBackId,
    StockBackRequest, StockBackStatus,
};
use foodflow_inventory::{MovementReason, SpoilageLog, StockAdjustments, StockKey};
use foodflow_kitchen::PORTION_UNIT;

use super::collections::{DISTRIBUTIONS, SPOILAGE_LOGS, STOCK_BACK_REQUESTS};
use super::{SupplyChain, save};
use crate::error::ServiceError;
use crate::inventory::Inventory;

impl SupplyChain {
    /// Ship finished items from logistics stock to an outlet.
    #[instrument(skip(self, items))]
    pub fn create_distribution(
        &self,
        actor: UserId,
        outlet: OutletId,
        items: &[ShipmentItem],
    ) -> Result<Distribution, ServiceError> {
        self.authorized(actor, Action::Distribute)?;
        let id = DistributionId::new(AggregateId::new());
        let key = id.to_string();
        let now = self.clock.now();
        let command = DistributionCommand::Dispatch(Dispatch {
            outlet,
            items: items.to_vec(),
            actor,
            occurred_at: now,
        });

        let distribution = self.transact(|tx| {
            let mut distribution = Distribution::empty(id);
            let events = distribution.execute(&command)?;
            let mut plan = StockAdjustments::new();
            for item in distribution.items() {
                plan.debit(
                    StockKey::logistics(item.recipe_id.as_str()),
                    item.quantity,
                    PORTION_UNIT,
                )?;
            }
            let staged = Inventory::stage(tx, plan, MovementReason::Distribution, now)?;

            save(tx, DISTRIBUTIONS, &key, &distribution, &events)?;
            Inventory::write(tx, staged)?;
            Ok(distribution)
        })?;

        info!(distribution = %id, %outlet, "distribution dispatched");
        Ok(distribution)
    }

    /// The outlet confirms arrival. No ledger effect.
    #[instrument(skip(self))]
    pub fn confirm_distribution_receipt(
        &self,
        actor: UserId,
        id: DistributionId,
    ) -> Result<Distribution, ServiceError> {
        self.authorized(actor, Action::ConfirmDistributionReceipt)?;
        let key = id.to_string();
        let command = DistributionCommand::ConfirmReceipt(ConfirmDistributionReceipt {
            actor,
            occurred_at: self.clock.now(),
        });
        let distribution = self.transact(|tx| {
            let mut distribution: Distribution = tx.require(DISTRIBUTIONS, &key, "distribution")?;
            let events = distribution.execute(&command)?;
            save(tx, DISTRIBUTIONS, &key, &distribution, &events)?;
            Ok(distribution)
        })?;
        info!(distribution = %id, "distribution received");
        Ok(distribution)
    }

    pub fn distribution(&self, id: DistributionId) -> Result<Option<Distribution>, ServiceError> {
        self.load(DISTRIBUTIONS, &id.to_string())
    }

    /// Report unsold items waiting at an outlet for pickup.
    #[instrument(skip(self, items))]
    pub fn process_stock_back(
        &self,
        actor: UserId,
        outlet: OutletId,
        items: &[ShipmentItem],
    ) -> Result<StockBackRequest, ServiceError> {
        self.authorized(actor, Action::ReportStockBack)?;
        let id = StockBackId::new(AggregateId::new());
        let key = id.to_string();
        let command = StockBackCommand::Report(ReportStockBack {
            outlet,
            items: items.to_vec(),
            actor,
            occurred_at: self.clock.now(),
        });
        let request = self.transact(|tx| {
            let mut request = StockBackRequest::empty(id);
            let events = request.execute(&command)?;
            save(tx, STOCK_BACK_REQUESTS, &key, &request, &events)?;
            Ok(request)
        })?;
        info!(stock_back = %id, %outlet, "stock-back reported");
        Ok(request)
    }

    #[instrument(skip(self))]
    pub fn confirm_pickup(
        &self,
        actor: UserId,
        id: StockBackId,
    ) -> Result<StockBackRequest, ServiceError> {
        self.authorized(actor, Action::PickUpStockBack)?;
        self.advance_stock_back(actor, id, StockBackStatus::PickedUp)
    }

    #[instrument(skip(self))]
    pub fn mark_ready_for_restock(
        &self,
        actor: UserId,
        id: StockBackId,
    ) -> Result<StockBackRequest, ServiceError> {
        self.authorized(actor, Action::PickUpStockBack)?;
        self.advance_stock_back(actor, id, StockBackStatus::ReadyForRestock)
    }

    /// Put returned items back on the prepared-stock shelf. Happens once.
    #[instrument(skip(self))]
    pub fn confirm_restock(
        &self,
        actor: UserId,
        id: StockBackId,
    ) -> Result<StockBackRequest, ServiceError> {
        self.authorized(actor, Action::Restock)?;
        self.advance_stock_back(actor, id, StockBackStatus::Restocked)
    }

    pub fn stock_back(&self, id: StockBackId) -> Result<Option<StockBackRequest>, ServiceError> {
        self.load(STOCK_BACK_REQUESTS, &id.to_string())
    }

    fn advance_stock_back(
        &self,
        actor: UserId,
        id: StockBackId,
        to: StockBackStatus,
    ) -> Result<StockBackRequest, ServiceError> {
        let key = id.to_string();
        let now = self.clock.now();
        let command = StockBackCommand::Advance(AdvanceStockBack {
            to,
            actor,
            occurred_at: now,
        });

        let request = self.transact(|tx| {
            let mut request: StockBackRequest =
                tx.require(STOCK_BACK_REQUESTS, &key, "stock-back request")?;
            let events = request.execute(&command)?;

            let staged = if to == StockBackStatus::Restocked {
                let mut plan = StockAdjustments::new();
                for item in request.items() {
                    plan.credit(
                        StockKey::prepared(item.recipe_id.as_str()),
                        item.quantity,
                        PORTION_UNIT,
                    )?;
                }
                Some(Inventory::stage(tx, plan, MovementReason::Restock, now)?)
            } else {
                None
            };

            save(tx, STOCK_BACK_REQUESTS, &key, &request, &events)?;
            if let Some(staged) = staged {
                Inventory::write(tx, staged)?;
            }
            Ok(request)
        })?;

        info!(stock_back = %id, status = ?request.status(), "stock-back advanced");
        Ok(request)
    }

    /// Write off spoiled stock from any ledger row and log why.
    ///
    /// Kitchen staff may only write off rows of their own kitchen.
    #[instrument(skip(self, reason))]
    pub fn report_spoilage(
        &self,
        actor: UserId,
        key: StockKey,
        quantity: Quantity,
        reason: &str,
    ) -> Result<SpoilageLog, ServiceError> {
        let profile = self.authorized(actor, Action::ReportSpoilage)?;
        let kitchen_only = profile.has_role(Role::Kitchen)
            && !profile.has_role(Role::StockManager)
            && !profile.has_role(Role::Logistics);
        let foreign_row = key.kitchen.is_none_or(|k| profile.kitchen_id != Some(k));
        if kitchen_only && !profile.is_admin() && foreign_row {
            return Err(DomainError::unauthorized(format!(
                "profile {actor} may not write off {key}"
            ))
            .into());
        }

        let now = self.clock.now();
        let log = SpoilageLog::new(key.clone(), quantity, reason, actor, now)?;
        let log_key = log.id.to_string();

        self.transact(|tx| {
            let mut plan = StockAdjustments::new();
            // Empty unit: the row keeps whatever unit it was created with.
            plan.debit(key.clone(), quantity, "")?;
            let staged = Inventory::stage(tx, plan, MovementReason::Spoilage, now)?;
            tx.put(SPOILAGE_LOGS, &log_key, &log)?;
            Inventory::write(tx, staged)?;
            Ok(())
        })?;

        info!(%key, %quantity, "spoilage recorded");
        Ok(log)
    }
}
