use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use foodflow_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, DomainResult, OutletId, UserId,
};
use foodflow_events::Event;

use crate::shipment::{ShipmentItem, normalize_items};

/// Stock-back request identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockBackId(pub AggregateId);

impl StockBackId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for StockBackId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Stock-back status lifecycle. Strictly linear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockBackStatus {
    PendingLogisticsPickup,
    PickedUp,
    ReadyForRestock,
    Restocked,
}

impl StockBackStatus {
    pub fn allowed_next(self) -> &'static [StockBackStatus] {
        use StockBackStatus::*;
        match self {
            PendingLogisticsPickup => &[PickedUp],
            PickedUp => &[ReadyForRestock],
            ReadyForRestock => &[Restocked],
            Restocked => &[],
        }
    }
}

/// Aggregate root: StockBackRequest (unsold goods returning from an outlet).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockBackRequest {
    id: StockBackId,
    outlet: Option<OutletId>,
    items: Vec<ShipmentItem>,
    status: StockBackStatus,
    reported_by: Option<UserId>,
    version: u64,
    created: bool,
}

impl StockBackRequest {
    /// Create an empty, not-yet-created aggregate instance.
    pub fn empty(id: StockBackId) -> Self {
        Self {
            id,
            outlet: None,
            items: Vec::new(),
            status: StockBackStatus::PendingLogisticsPickup,
            reported_by: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> StockBackId {
        self.id
    }

    pub fn outlet(&self) -> Option<OutletId> {
        self.outlet
    }

    pub fn items(&self) -> &[ShipmentItem] {
        &self.items
    }

    pub fn status(&self) -> StockBackStatus {
        self.status
    }

    pub fn reported_by(&self) -> Option<UserId> {
        self.reported_by
    }
}

impl AggregateRoot for StockBackRequest {
    type Id = StockBackId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: ReportStockBack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportStockBack {
    pub outlet: OutletId,
    pub items: Vec<ShipmentItem>,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdvanceStockBack (pickup, ready-for-restock, restock).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceStockBack {
    pub to: StockBackStatus,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockBackCommand {
    Report(ReportStockBack),
    Advance(AdvanceStockBack),
}

/// Event: StockBackReported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockBackReported {
    pub stock_back_id: StockBackId,
    pub outlet: OutletId,
    pub items: Vec<ShipmentItem>,
    pub reported_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockBackAdvanced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockBackAdvanced {
    pub stock_back_id: StockBackId,
    pub from: StockBackStatus,
    pub to: StockBackStatus,
    pub by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockBackEvent {
    StockBackReported(StockBackReported),
    StockBackAdvanced(StockBackAdvanced),
}

impl Event for StockBackEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StockBackEvent::StockBackReported(_) => "distribution.stock_back.reported",
            StockBackEvent::StockBackAdvanced(_) => "distribution.stock_back.advanced",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StockBackEvent::StockBackReported(e) => e.occurred_at,
            StockBackEvent::StockBackAdvanced(e) => e.occurred_at,
        }
    }
}

impl Aggregate for StockBackRequest {
    type Command = StockBackCommand;
    type Event = StockBackEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            StockBackEvent::StockBackReported(e) => {
                self.outlet = Some(e.outlet);
                self.items = e.items.clone();
                self.reported_by = Some(e.reported_by);
                self.status = StockBackStatus::PendingLogisticsPickup;
                self.created = true;
            }
            StockBackEvent::StockBackAdvanced(e) => {
                self.status = e.to;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            StockBackCommand::Report(cmd) => self.handle_report(cmd),
            StockBackCommand::Advance(cmd) => self.handle_advance(cmd),
        }
    }
}

impl StockBackRequest {
    fn handle_report(&self, cmd: &ReportStockBack) -> DomainResult<Vec<StockBackEvent>> {
        if self.created {
            return Err(DomainError::precondition(format!(
                "stock-back request {} already exists",
                self.id
            )));
        }

        Ok(vec![StockBackEvent::StockBackReported(StockBackReported {
            stock_back_id: self.id,
            outlet: cmd.outlet,
            items: normalize_items(&cmd.items)?,
            reported_by: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_advance(&self, cmd: &AdvanceStockBack) -> DomainResult<Vec<StockBackEvent>> {
        if !self.created {
            return Err(DomainError::not_found("stock-back request", self.id.to_string()));
        }
        if !self.status.allowed_next().contains(&cmd.to) {
            return Err(DomainError::precondition(format!(
                "stock-back request {} is {:?}, cannot move to {:?}",
                self.id, self.status, cmd.to
            )));
        }

        Ok(vec![StockBackEvent::StockBackAdvanced(StockBackAdvanced {
            stock_back_id: self.id,
            from: self.status,
            to: cmd.to,
            by: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }
}
