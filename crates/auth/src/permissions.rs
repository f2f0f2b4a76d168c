use serde::{Deserialize, Serialize};

use crate::Role;

/// Every mutating step of the supply chain, used as the unit of authorization.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    SubmitForecast,
    ReviewForecastAsStockManager,
    ReviewForecastAsFinance,
    SetDailyTarget,
    AssignKitchens,
    Disperse,
    ConfirmKitchenReceipt,
    RecordCooked,
    CollectFromKitchen,
    CollectForLogistics,
    CreateProcurementRequest,
    ConfirmProcurementReceipt,
    RequestBulkBuy,
    ApproveBulkBuy,
    PurchaseBulkBuy,
    ConfirmBulkBuyReceipt,
    Distribute,
    ConfirmDistributionReceipt,
    ReportStockBack,
    PickUpStockBack,
    Restock,
    ReportSpoilage,
}

impl Action {
    /// Roles allowed to perform this action (`Admin` is implied everywhere).
    pub fn allowed_roles(&self) -> &'static [Role] {
        match self {
            Action::SubmitForecast => &[Role::Sales],
            Action::ReviewForecastAsStockManager => &[Role::StockManager],
            Action::ReviewForecastAsFinance => &[Role::Finance],
            Action::SetDailyTarget => &[Role::ZonalManager, Role::StockManager],
            Action::AssignKitchens | Action::Disperse | Action::CollectFromKitchen => {
                &[Role::StockManager]
            }
            Action::ConfirmKitchenReceipt | Action::RecordCooked => &[Role::Kitchen],
            Action::CollectForLogistics | Action::PickUpStockBack => &[Role::Logistics],
            Action::Distribute => &[Role::Logistics, Role::StockManager],
            Action::CreateProcurementRequest => &[Role::StockManager, Role::Finance],
            Action::ConfirmProcurementReceipt | Action::PurchaseBulkBuy => {
                &[Role::Purchaser, Role::StockManager]
            }
            Action::ConfirmBulkBuyReceipt | Action::Restock => &[Role::StockManager],
            Action::RequestBulkBuy => &[Role::StockManager, Role::Purchaser],
            Action::ApproveBulkBuy => &[Role::Finance],
            Action::ConfirmDistributionReceipt | Action::ReportStockBack => &[Role::Sales],
            Action::ReportSpoilage => &[Role::StockManager, Role::Kitchen, Role::Logistics],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::SubmitForecast => "forecast.submit",
            Action::ReviewForecastAsStockManager => "forecast.review.stock_manager",
            Action::ReviewForecastAsFinance => "forecast.review.finance",
            Action::SetDailyTarget => "target.set",
            Action::AssignKitchens => "kitchen.assign",
            Action::Disperse => "kitchen.disperse",
            Action::ConfirmKitchenReceipt => "kitchen.confirm_receipt",
            Action::RecordCooked => "kitchen.record_cooked",
            Action::CollectFromKitchen => "kitchen.collect",
            Action::CollectForLogistics => "kitchen.collect_for_logistics",
            Action::CreateProcurementRequest => "procurement.create",
            Action::ConfirmProcurementReceipt => "procurement.confirm_receipt",
            Action::RequestBulkBuy => "bulk_buy.request",
            Action::ApproveBulkBuy => "bulk_buy.approve",
            Action::PurchaseBulkBuy => "bulk_buy.purchase",
            Action::ConfirmBulkBuyReceipt => "bulk_buy.confirm_receipt",
            Action::Distribute => "distribution.create",
            Action::ConfirmDistributionReceipt => "distribution.confirm_receipt",
            Action::ReportStockBack => "stock_back.report",
            Action::PickUpStockBack => "stock_back.pickup",
            Action::Restock => "stock_back.restock",
            Action::ReportSpoilage => "spoilage.report",
        }
    }
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
