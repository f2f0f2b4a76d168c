use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use foodflow_catalog::RecipeId;
use foodflow_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, DomainResult, OutletId, Quantity, UserId,
};
use foodflow_events::Event;

/// Finished items moving between logistics and an outlet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentItem {
    pub recipe_id: RecipeId,
    pub quantity: Quantity,
}

impl ShipmentItem {
    pub fn new(recipe_id: impl AsRef<str>, quantity: Quantity) -> Self {
        Self {
            recipe_id: RecipeId::new(recipe_id),
            quantity,
        }
    }
}

/// Validate and merge repeated recipes.
pub fn normalize_items(items: &[ShipmentItem]) -> DomainResult<Vec<ShipmentItem>> {
    if items.is_empty() {
        return Err(DomainError::validation("at least one item is required"));
    }
    let mut totals: BTreeMap<RecipeId, Quantity> = BTreeMap::new();
    for item in items {
        item.quantity.ensure_positive(item.recipe_id.as_str())?;
        *totals.entry(item.recipe_id.clone()).or_default() += item.quantity;
    }
    Ok(totals
        .into_iter()
        .map(|(recipe_id, quantity)| ShipmentItem { recipe_id, quantity })
        .collect())
}

/// Distribution identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DistributionId(pub AggregateId);

impl DistributionId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for DistributionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Distribution status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionStatus {
    InTransit,
    Received,
}

/// Aggregate root: Distribution (logistics stock shipped to an outlet).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    id: DistributionId,
    outlet: Option<OutletId>,
    items: Vec<ShipmentItem>,
    status: DistributionStatus,
    dispatched_by: Option<UserId>,
    received_by: Option<UserId>,
    version: u64,
    created: bool,
}

impl Distribution {
    /// Create an empty, not-yet-created aggregate instance.
    pub fn empty(id: DistributionId) -> Self {
        Self {
            id,
            outlet: None,
            items: Vec::new(),
            status: DistributionStatus::InTransit,
            dispatched_by: None,
            received_by: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> DistributionId {
        self.id
    }

    pub fn outlet(&self) -> Option<OutletId> {
        self.outlet
    }

    pub fn items(&self) -> &[ShipmentItem] {
        &self.items
    }

    pub fn status(&self) -> DistributionStatus {
        self.status
    }

    pub fn dispatched_by(&self) -> Option<UserId> {
        self.dispatched_by
    }

    pub fn received_by(&self) -> Option<UserId> {
        self.received_by
    }
}

impl AggregateRoot for Distribution {
    type Id = DistributionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: Dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispatch {
    pub outlet: OutletId,
    pub items: Vec<ShipmentItem>,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConfirmDistributionReceipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmDistributionReceipt {
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistributionCommand {
    Dispatch(Dispatch),
    ConfirmReceipt(ConfirmDistributionReceipt),
}

/// Event: DistributionDispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionDispatched {
    pub distribution_id: DistributionId,
    pub outlet: OutletId,
    pub items: Vec<ShipmentItem>,
    pub dispatched_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DistributionReceived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionReceived {
    pub distribution_id: DistributionId,
    pub received_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistributionEvent {
    DistributionDispatched(DistributionDispatched),
    DistributionReceived(DistributionReceived),
}

impl Event for DistributionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DistributionEvent::DistributionDispatched(_) => "distribution.shipment.dispatched",
            DistributionEvent::DistributionReceived(_) => "distribution.shipment.received",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DistributionEvent::DistributionDispatched(e) => e.occurred_at,
            DistributionEvent::DistributionReceived(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Distribution {
    type Command = DistributionCommand;
    type Event = DistributionEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            DistributionEvent::DistributionDispatched(e) => {
                self.outlet = Some(e.outlet);
                self.items = e.items.clone();
                self.dispatched_by = Some(e.dispatched_by);
                self.status = DistributionStatus::InTransit;
                self.created = true;
            }
            DistributionEvent::DistributionReceived(e) => {
                self.received_by = Some(e.received_by);
                self.status = DistributionStatus::Received;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            DistributionCommand::Dispatch(cmd) => {
                if self.created {
                    return Err(DomainError::precondition(format!(
                        "distribution {} already exists",
                        self.id
                    )));
                }
                Ok(vec![DistributionEvent::DistributionDispatched(
                    DistributionDispatched {
                        distribution_id: self.id,
                        outlet: cmd.outlet,
                        items: normalize_items(&cmd.items)?,
                        dispatched_by: cmd.actor,
                        occurred_at: cmd.occurred_at,
                    },
                )])
            }
            DistributionCommand::ConfirmReceipt(cmd) => {
                if !self.created {
                    return Err(DomainError::not_found("distribution", self.id.to_string()));
                }
                if self.status != DistributionStatus::InTransit {
                    return Err(DomainError::invalid_transition(
                        "distribution",
                        self.status,
                        DistributionStatus::Received,
                    ));
                }
                Ok(vec![DistributionEvent::DistributionReceived(
                    DistributionReceived {
                        distribution_id: self.id,
                        received_by: cmd.actor,
                        occurred_at: cmd.occurred_at,
                    },
                )])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatched() -> Distribution {
        let mut d = Distribution::empty(DistributionId::new(AggregateId::new()));
        d.execute(&DistributionCommand::Dispatch(Dispatch {
            outlet: OutletId::new(),
            items: vec![
                ShipmentItem::new("biryani", Quantity::from(30)),
                ShipmentItem::new("Biryani", Quantity::from(10)),
            ],
            actor: UserId::new(),
            occurred_at: Utc::now(),
        }))
        .unwrap();
        d
    }

    fn receive() -> DistributionCommand {
        DistributionCommand::ConfirmReceipt(ConfirmDistributionReceipt {
            actor: UserId::new(),
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn dispatch_merges_repeated_items() {
        let d = dispatched();
        assert_eq!(d.status(), DistributionStatus::InTransit);
        assert_eq!(d.items(), &[ShipmentItem::new("biryani", Quantity::from(40))]);
    }

    #[test]
    fn receipt_is_confirmed_once() {
        let mut d = dispatched();
        d.execute(&receive()).unwrap();
        assert_eq!(d.status(), DistributionStatus::Received);
        assert!(matches!(
            d.handle(&receive()),
            Err(DomainError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn items_must_be_positive() {
        assert!(normalize_items(&[]).is_err());
        assert!(normalize_items(&[ShipmentItem::new("biryani", Quantity::ZERO)]).is_err());
    }
}
