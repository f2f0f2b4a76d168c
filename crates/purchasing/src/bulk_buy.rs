use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use foodflow_core::{Aggregate, AggregateId, AggregateRoot, DomainError, DomainResult, UserId};
use foodflow_events::Event;

use crate::shortfall::{IngredientLine, aggregate_lines, validate_lines};

/// Bulk-buy order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BulkBuyId(pub AggregateId);

impl BulkBuyId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for BulkBuyId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Bulk-buy status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkBuyStatus {
    PendingFinanceApproval,
    Approved,
    Rejected,
    Purchased,
    Completed,
}

impl BulkBuyStatus {
    pub fn allowed_next(self) -> &'static [BulkBuyStatus] {
        use BulkBuyStatus::*;
        match self {
            PendingFinanceApproval => &[Approved, Rejected],
            Approved => &[Purchased],
            Purchased => &[Completed],
            Rejected | Completed => &[],
        }
    }
}

/// Aggregate root: BulkBuyOrder (stock replenishment outside any forecast).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkBuyOrder {
    id: BulkBuyId,
    requested_by: Option<UserId>,
    lines: Vec<IngredientLine>,
    status: BulkBuyStatus,
    rejection_reason: Option<String>,
    version: u64,
    created: bool,
}

impl BulkBuyOrder {
    /// Create an empty, not-yet-created aggregate instance.
    pub fn empty(id: BulkBuyId) -> Self {
        Self {
            id,
            requested_by: None,
            lines: Vec::new(),
            status: BulkBuyStatus::PendingFinanceApproval,
            rejection_reason: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> BulkBuyId {
        self.id
    }

    pub fn requested_by(&self) -> Option<UserId> {
        self.requested_by
    }

    pub fn lines(&self) -> &[IngredientLine] {
        &self.lines
    }

    pub fn status(&self) -> BulkBuyStatus {
        self.status
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    /// Lines summed per ingredient, as credited to raw stock on receipt.
    pub fn receipt_lines(&self) -> Vec<IngredientLine> {
        aggregate_lines(&self.lines)
    }
}

impl AggregateRoot for BulkBuyOrder {
    type Id = BulkBuyId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RequestBulkBuy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestBulkBuy {
    pub requested_by: UserId,
    pub lines: Vec<IngredientLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApproveBulkBuy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveBulkBuy {
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RejectBulkBuy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectBulkBuy {
    pub actor: UserId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkPurchased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkPurchased {
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConfirmBulkBuyReceipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmBulkBuyReceipt {
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BulkBuyCommand {
    Request(RequestBulkBuy),
    Approve(ApproveBulkBuy),
    Reject(RejectBulkBuy),
    MarkPurchased(MarkPurchased),
    ConfirmReceipt(ConfirmBulkBuyReceipt),
}

/// Event: BulkBuyRequested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkBuyRequested {
    pub order_id: BulkBuyId,
    pub requested_by: UserId,
    pub lines: Vec<IngredientLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BulkBuyStatusChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkBuyStatusChanged {
    pub order_id: BulkBuyId,
    pub from: BulkBuyStatus,
    pub to: BulkBuyStatus,
    pub by: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BulkBuyEvent {
    BulkBuyRequested(BulkBuyRequested),
    BulkBuyStatusChanged(BulkBuyStatusChanged),
}

impl Event for BulkBuyEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BulkBuyEvent::BulkBuyRequested(_) => "purchasing.bulk_buy.requested",
            BulkBuyEvent::BulkBuyStatusChanged(_) => "purchasing.bulk_buy.status_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            BulkBuyEvent::BulkBuyRequested(e) => e.occurred_at,
            BulkBuyEvent::BulkBuyStatusChanged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for BulkBuyOrder {
    type Command = BulkBuyCommand;
    type Event = BulkBuyEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            BulkBuyEvent::BulkBuyRequested(e) => {
                self.id = e.order_id;
                self.requested_by = Some(e.requested_by);
                self.lines = e.lines.clone();
                self.status = BulkBuyStatus::PendingFinanceApproval;
                self.created = true;
            }
            BulkBuyEvent::BulkBuyStatusChanged(e) => {
                self.status = e.to;
                if e.to == BulkBuyStatus::Rejected {
                    self.rejection_reason = e.reason.clone();
                }
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            BulkBuyCommand::Request(cmd) => self.handle_request(cmd),
            BulkBuyCommand::Approve(cmd) => {
                self.change(BulkBuyStatus::Approved, cmd.actor, None, cmd.occurred_at)
            }
            BulkBuyCommand::Reject(cmd) => {
                if cmd.reason.trim().is_empty() {
                    return Err(DomainError::validation("a rejection reason is required"));
                }
                self.change(
                    BulkBuyStatus::Rejected,
                    cmd.actor,
                    Some(cmd.reason.clone()),
                    cmd.occurred_at,
                )
            }
            BulkBuyCommand::MarkPurchased(cmd) => {
                self.change(BulkBuyStatus::Purchased, cmd.actor, None, cmd.occurred_at)
            }
            BulkBuyCommand::ConfirmReceipt(cmd) => {
                self.change(BulkBuyStatus::Completed, cmd.actor, None, cmd.occurred_at)
            }
        }
    }
}

impl BulkBuyOrder {
    fn handle_request(&self, cmd: &RequestBulkBuy) -> DomainResult<Vec<BulkBuyEvent>> {
        if self.created {
            return Err(DomainError::precondition(format!(
                "bulk-buy order {} already exists",
                self.id
            )));
        }
        validate_lines(&cmd.lines)?;

        Ok(vec![BulkBuyEvent::BulkBuyRequested(BulkBuyRequested {
            order_id: self.id,
            requested_by: cmd.requested_by,
            lines: cmd.lines.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn change(
        &self,
        to: BulkBuyStatus,
        by: UserId,
        reason: Option<String>,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Vec<BulkBuyEvent>> {
        if !self.created {
            return Err(DomainError::not_found("bulk-buy order", self.id.to_string()));
        }
        if !self.status.allowed_next().contains(&to) {
            return Err(DomainError::invalid_transition("bulk-buy order", self.status, to));
        }

        Ok(vec![BulkBuyEvent::BulkBuyStatusChanged(BulkBuyStatusChanged {
            order_id: self.id,
            from: self.status,
            to,
            by,
            reason,
            occurred_at,
        })])
    }
}
