use tracing::{info, instrument};

use foodflow_auth::Action;
use foodflow_core::{Aggregate, AggregateId, DomainError, UserId};
use foodflow_forecasting::{
    ForecastCommand, ForecastLine, ForecastLineId, ForecastStatus, MarkProcured,
};
use foodflow_inventory::{MovementReason, StockAdjustments, StockKey};
use foodflow_purchasing::{
    ApproveBulkBuy, BulkBuyCommand, BulkBuyId, BulkBuyOrder, ConfirmBulkBuyReceipt,
    ConfirmProcurementReceipt, IngredientLine, MarkPurchased, ProcurementCommand,
    ProcurementRequest, RejectBulkBuy, RequestBulkBuy,
};

use super::collections::{BULK_BUY_ORDERS, FORECASTS, PROCUREMENT_REQUESTS};
use super::forecasts::Promised;
use super::{SupplyChain, save};
use crate::error::ServiceError;
use crate::inventory::Inventory;

fn raw_credits(lines: &[IngredientLine]) -> Result<StockAdjustments, DomainError> {
    let mut plan = StockAdjustments::new();
    for line in lines {
        plan.credit(StockKey::raw(&line.name), line.quantity, &line.unit)?;
    }
    Ok(plan)
}

impl SupplyChain {
    /// Return the forecast's procurement request, raising it if it is missing.
    ///
    /// Repeated calls return the same request. `None` means nothing needs
    /// buying; the forecast is then (or already was) procured.
    #[instrument(skip(self))]
    pub fn create_procurement_request(
        &self,
        actor: UserId,
        forecast_id: &ForecastLineId,
    ) -> Result<Option<ProcurementRequest>, ServiceError> {
        self.authorized(actor, Action::CreateProcurementRequest)?;
        self.transact(|tx| {
            let mut line: ForecastLine = tx.require(FORECASTS, forecast_id.as_str(), "forecast")?;
            if let Some(existing) =
                tx.get::<ProcurementRequest>(PROCUREMENT_REQUESTS, forecast_id.as_str())?
            {
                return Ok(Some(existing));
            }
            match line.status() {
                ForecastStatus::AcceptedByFinance => {}
                ForecastStatus::Procured => return Ok(None),
                status => {
                    return Err(DomainError::precondition(format!(
                        "forecast {forecast_id} is {status:?}, not accepted by finance"
                    ))
                    .into());
                }
            }

            // Reservations made at acceptance stay where they are.
            let outcome = self.plan_procurement(tx, &line, &mut Promised::default())?;
            if outcome.shortfall.is_empty() {
                let events = line.execute(&ForecastCommand::MarkProcured(MarkProcured {
                    actor,
                    occurred_at: self.clock.now(),
                }))?;
                save(tx, FORECASTS, forecast_id.as_str(), &line, &events)?;
                return Ok(None);
            }
            Ok(Some(self.raise_request(tx, actor, forecast_id, outcome.shortfall)?))
        })
    }

    /// Purchased ingredients arrived: credit raw stock, close the request and
    /// mark the forecast procured, all at once.
    #[instrument(skip(self))]
    pub fn confirm_procurement_receipt(
        &self,
        actor: UserId,
        forecast_id: &ForecastLineId,
    ) -> Result<ProcurementRequest, ServiceError> {
        self.authorized(actor, Action::ConfirmProcurementReceipt)?;
        let now = self.clock.now();
        let request = self.transact(|tx| {
            let mut request: ProcurementRequest =
                tx.require(PROCUREMENT_REQUESTS, forecast_id.as_str(), "procurement request")?;
            let mut line: ForecastLine = tx.require(FORECASTS, forecast_id.as_str(), "forecast")?;

            let events = request.execute(&ProcurementCommand::ConfirmReceipt(
                ConfirmProcurementReceipt {
                    actor,
                    occurred_at: now,
                },
            ))?;
            let line_events = if line.status() == ForecastStatus::AcceptedByFinance {
                line.execute(&ForecastCommand::MarkProcured(MarkProcured {
                    actor,
                    occurred_at: now,
                }))?
            } else {
                Vec::new()
            };
            let staged = Inventory::stage(
                tx,
                raw_credits(request.ingredients())?,
                MovementReason::ProcurementReceipt,
                now,
            )?;

            save(tx, PROCUREMENT_REQUESTS, forecast_id.as_str(), &request, &events)?;
            if !line_events.is_empty() {
                save(tx, FORECASTS, forecast_id.as_str(), &line, &line_events)?;
            }
            Inventory::write(tx, staged)?;
            Ok(request)
        })?;

        info!(forecast = %forecast_id, "procurement received");
        Ok(request)
    }

    pub fn procurement_request(
        &self,
        forecast_id: &ForecastLineId,
    ) -> Result<Option<ProcurementRequest>, ServiceError> {
        self.load(PROCUREMENT_REQUESTS, forecast_id.as_str())
    }

    /// Ask finance for a stock purchase outside any forecast.
    #[instrument(skip(self, lines))]
    pub fn create_bulk_buy(
        &self,
        actor: UserId,
        lines: Vec<IngredientLine>,
    ) -> Result<BulkBuyOrder, ServiceError> {
        self.authorized(actor, Action::RequestBulkBuy)?;
        let id = BulkBuyId::new(AggregateId::new());
        let command = BulkBuyCommand::Request(RequestBulkBuy {
            requested_by: actor,
            lines,
            occurred_at: self.clock.now(),
        });
        let key = id.to_string();
        let order = self.transact(|tx| {
            let mut order = BulkBuyOrder::empty(id);
            let events = order.execute(&command)?;
            save(tx, BULK_BUY_ORDERS, &key, &order, &events)?;
            Ok(order)
        })?;
        info!(order = %id, "bulk buy requested");
        Ok(order)
    }

    #[instrument(skip(self))]
    pub fn approve_bulk_buy(
        &self,
        actor: UserId,
        id: BulkBuyId,
    ) -> Result<BulkBuyOrder, ServiceError> {
        self.authorized(actor, Action::ApproveBulkBuy)?;
        let command = BulkBuyCommand::Approve(ApproveBulkBuy {
            actor,
            occurred_at: self.clock.now(),
        });
        self.update_bulk_buy(id, command, false)
    }

    #[instrument(skip(self, reason))]
    pub fn reject_bulk_buy(
        &self,
        actor: UserId,
        id: BulkBuyId,
        reason: &str,
    ) -> Result<BulkBuyOrder, ServiceError> {
        self.authorized(actor, Action::ApproveBulkBuy)?;
        let command = BulkBuyCommand::Reject(RejectBulkBuy {
            actor,
            reason: reason.to_string(),
            occurred_at: self.clock.now(),
        });
        self.update_bulk_buy(id, command, false)
    }

    #[instrument(skip(self))]
    pub fn mark_bulk_buy_purchased(
        &self,
        actor: UserId,
        id: BulkBuyId,
    ) -> Result<BulkBuyOrder, ServiceError> {
        self.authorized(actor, Action::PurchaseBulkBuy)?;
        let command = BulkBuyCommand::MarkPurchased(MarkPurchased {
            actor,
            occurred_at: self.clock.now(),
        });
        self.update_bulk_buy(id, command, false)
    }

    /// Complete the order and credit raw stock once per ingredient.
    #[instrument(skip(self))]
    pub fn confirm_bulk_buy_receipt(
        &self,
        actor: UserId,
        id: BulkBuyId,
    ) -> Result<BulkBuyOrder, ServiceError> {
        self.authorized(actor, Action::ConfirmBulkBuyReceipt)?;
        let command = BulkBuyCommand::ConfirmReceipt(ConfirmBulkBuyReceipt {
            actor,
            occurred_at: self.clock.now(),
        });
        self.update_bulk_buy(id, command, true)
    }

    pub fn bulk_buy(&self, id: BulkBuyId) -> Result<Option<BulkBuyOrder>, ServiceError> {
        self.load(BULK_BUY_ORDERS, &id.to_string())
    }

    fn update_bulk_buy(
        &self,
        id: BulkBuyId,
        command: BulkBuyCommand,
        credit_raw_stock: bool,
    ) -> Result<BulkBuyOrder, ServiceError> {
        let key = id.to_string();
        let now = self.clock.now();
        let order = self.transact(|tx| {
            let mut order: BulkBuyOrder = tx.require(BULK_BUY_ORDERS, &key, "bulk-buy order")?;
            let events = order.execute(&command)?;
            let staged = if credit_raw_stock {
                Some(Inventory::stage(
                    tx,
                    raw_credits(&order.receipt_lines())?,
                    MovementReason::BulkBuyReceipt,
                    now,
                )?)
            } else {
                None
            };

            save(tx, BULK_BUY_ORDERS, &key, &order, &events)?;
            if let Some(staged) = staged {
                Inventory::write(tx, staged)?;
            }
            Ok(order)
        })?;
        info!(order = %id, status = ?order.status(), "bulk buy updated");
        Ok(order)
    }
}
