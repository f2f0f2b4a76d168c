use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use foodflow_catalog::RecipeId;
use foodflow_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, DomainResult, KitchenId, Quantity, UserId,
};
use foodflow_events::Event;
use foodflow_forecasting::ForecastLineId;

use crate::allocation::AllocationLine;

/// Cooking assignment identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssignmentId(pub AggregateId);

impl AssignmentId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for AssignmentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Cooking assignment status lifecycle. Strictly linear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    PendingDispersal,
    Dispersed,
    IngredientsReceived,
    PendingStockManagerCollection,
    ReadyForLogisticsCollection,
    Collected,
}

impl AssignmentStatus {
    pub fn allowed_next(self) -> &'static [AssignmentStatus] {
        use AssignmentStatus::*;
        match self {
            PendingDispersal => &[Dispersed],
            Dispersed => &[IngredientsReceived],
            IngredientsReceived => &[PendingStockManagerCollection],
            PendingStockManagerCollection => &[ReadyForLogisticsCollection],
            ReadyForLogisticsCollection => &[Collected],
            Collected => &[],
        }
    }

    pub fn can_move_to(self, next: AssignmentStatus) -> bool {
        self.allowed_next().contains(&next)
    }
}

/// Recipe a kitchen cooks from raw ingredients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignedItem {
    pub recipe_id: RecipeId,
    pub name: String,
    pub quantity: Quantity,
    pub revision: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooked_quantity: Option<Quantity>,
}

/// Finished units handed to a kitchen from prepared stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedItem {
    pub recipe_id: RecipeId,
    pub name: String,
    pub quantity: Quantity,
}

/// Audit entry for one status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentChange {
    pub from: AssignmentStatus,
    pub to: AssignmentStatus,
    pub by: UserId,
    pub at: DateTime<Utc>,
}

/// Aggregate root: CookingAssignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookingAssignment {
    id: AssignmentId,
    date: NaiveDate,
    kitchen: KitchenId,
    items: Vec<AssignedItem>,
    from_prepared: Vec<PreparedItem>,
    status: AssignmentStatus,
    forecast_ids: Vec<ForecastLineId>,
    created_at: DateTime<Utc>,
    history: Vec<AssignmentChange>,
    version: u64,
}

impl CookingAssignment {
    /// A freshly planned assignment waiting for dispersal.
    pub fn planned(
        date: NaiveDate,
        kitchen: KitchenId,
        items: Vec<AssignedItem>,
        from_prepared: Vec<PreparedItem>,
        forecast_ids: Vec<ForecastLineId>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AssignmentId::new(AggregateId::new()),
            date,
            kitchen,
            items,
            from_prepared,
            status: AssignmentStatus::PendingDispersal,
            forecast_ids,
            created_at,
            history: Vec::new(),
            version: 0,
        }
    }

    pub fn id_typed(&self) -> AssignmentId {
        self.id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn kitchen(&self) -> KitchenId {
        self.kitchen
    }

    pub fn items(&self) -> &[AssignedItem] {
        &self.items
    }

    pub fn from_prepared(&self) -> &[PreparedItem] {
        &self.from_prepared
    }

    pub fn status(&self) -> AssignmentStatus {
        self.status
    }

    pub fn forecast_ids(&self) -> &[ForecastLineId] {
        &self.forecast_ids
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn history(&self) -> &[AssignmentChange] {
        &self.history
    }
}

impl AggregateRoot for CookingAssignment {
    type Id = AssignmentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: Disperse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disperse {
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConfirmReceipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmReceipt {
    pub actor: UserId,
    pub kitchen: KitchenId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordCooked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCooked {
    pub actor: UserId,
    pub kitchen: KitchenId,
    /// Actual output per recipe; items not listed cooked nothing.
    pub cooked: Vec<AllocationLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Collect (stock manager picks up from the kitchen).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collect {
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CollectForLogistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectForLogistics {
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentCommand {
    Disperse(Disperse),
    ConfirmReceipt(ConfirmReceipt),
    RecordCooked(RecordCooked),
    Collect(Collect),
    CollectForLogistics(CollectForLogistics),
}

/// Event: AssignmentAdvanced (any status step without extra data).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentAdvanced {
    pub assignment_id: AssignmentId,
    pub kitchen: KitchenId,
    pub from: AssignmentStatus,
    pub to: AssignmentStatus,
    pub by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CookingRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookingRecorded {
    pub assignment_id: AssignmentId,
    pub kitchen: KitchenId,
    pub cooked: Vec<AllocationLine>,
    pub by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentEvent {
    Dispersed(AssignmentAdvanced),
    IngredientsReceived(AssignmentAdvanced),
    CookingRecorded(CookingRecorded),
    Collected(AssignmentAdvanced),
    CollectedForLogistics(AssignmentAdvanced),
}

impl Event for AssignmentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AssignmentEvent::Dispersed(_) => "kitchen.assignment.dispersed",
            AssignmentEvent::IngredientsReceived(_) => "kitchen.assignment.ingredients_received",
            AssignmentEvent::CookingRecorded(_) => "kitchen.assignment.cooking_recorded",
            AssignmentEvent::Collected(_) => "kitchen.assignment.collected",
            AssignmentEvent::CollectedForLogistics(_) => {
                "kitchen.assignment.collected_for_logistics"
            }
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            AssignmentEvent::Dispersed(e)
            | AssignmentEvent::IngredientsReceived(e)
            | AssignmentEvent::Collected(e)
            | AssignmentEvent::CollectedForLogistics(e) => e.occurred_at,
            AssignmentEvent::CookingRecorded(e) => e.occurred_at,
        }
    }
}

impl Aggregate for CookingAssignment {
    type Command = AssignmentCommand;
    type Event = AssignmentEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            AssignmentEvent::Dispersed(e)
            | AssignmentEvent::IngredientsReceived(e)
            | AssignmentEvent::Collected(e)
            | AssignmentEvent::CollectedForLogistics(e) => {
                self.advance(e.to, e.by, e.occurred_at);
            }
            AssignmentEvent::CookingRecorded(e) => {
                for item in &mut self.items {
                    let cooked: Quantity = e
                        .cooked
                        .iter()
                        .filter(|c| c.recipe_id == item.recipe_id)
                        .map(|c| c.quantity)
                        .sum();
                    item.cooked_quantity = Some(cooked);
                }
                self.advance(
                    AssignmentStatus::PendingStockManagerCollection,
                    e.by,
                    e.occurred_at,
                );
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            AssignmentCommand::Disperse(cmd) => Ok(vec![AssignmentEvent::Dispersed(
                self.step(AssignmentStatus::Dispersed, cmd.actor, cmd.occurred_at)?,
            )]),
            AssignmentCommand::ConfirmReceipt(cmd) => {
                self.ensure_kitchen(cmd.kitchen)?;
                Ok(vec![AssignmentEvent::IngredientsReceived(self.step(
                    AssignmentStatus::IngredientsReceived,
                    cmd.actor,
                    cmd.occurred_at,
                )?)])
            }
            AssignmentCommand::RecordCooked(cmd) => self.handle_record_cooked(cmd),
            AssignmentCommand::Collect(cmd) => Ok(vec![AssignmentEvent::Collected(self.step(
                AssignmentStatus::ReadyForLogisticsCollection,
                cmd.actor,
                cmd.occurred_at,
            )?)]),
            AssignmentCommand::CollectForLogistics(cmd) => {
                Ok(vec![AssignmentEvent::CollectedForLogistics(self.step(
                    AssignmentStatus::Collected,
                    cmd.actor,
                    cmd.occurred_at,
                )?)])
            }
        }
    }
}

impl CookingAssignment {
    fn advance(&mut self, to: AssignmentStatus, by: UserId, at: DateTime<Utc>) {
        self.history.push(AssignmentChange {
            from: self.status,
            to,
            by,
            at,
        });
        self.status = to;
    }

    fn ensure_transition(&self, to: AssignmentStatus) -> DomainResult<()> {
        if !self.status.can_move_to(to) {
            return Err(DomainError::invalid_transition("cooking assignment", self.status, to));
        }
        Ok(())
    }

    fn ensure_kitchen(&self, kitchen: KitchenId) -> DomainResult<()> {
        if self.kitchen != kitchen {
            return Err(DomainError::precondition(format!(
                "assignment {} belongs to kitchen {}, not {kitchen}",
                self.id, self.kitchen
            )));
        }
        Ok(())
    }

    fn step(
        &self,
        to: AssignmentStatus,
        by: UserId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<AssignmentAdvanced> {
        self.ensure_transition(to)?;
        Ok(AssignmentAdvanced {
            assignment_id: self.id,
            kitchen: self.kitchen,
            from: self.status,
            to,
            by,
            occurred_at,
        })
    }

    fn handle_record_cooked(&self, cmd: &RecordCooked) -> DomainResult<Vec<AssignmentEvent>> {
        self.ensure_kitchen(cmd.kitchen)?;
        self.ensure_transition(AssignmentStatus::PendingStockManagerCollection)?;

        for line in &cmd.cooked {
            if line.quantity.is_negative() {
                return Err(DomainError::validation(format!(
                    "{}: cooked quantity cannot be negative",
                    line.recipe_id
                )));
            }
            if !self.items.iter().any(|i| i.recipe_id == line.recipe_id) {
                return Err(DomainError::validation(format!(
                    "{} was not assigned to kitchen {}",
                    line.recipe_id, self.kitchen
                )));
            }
        }

        Ok(vec![AssignmentEvent::CookingRecorded(CookingRecorded {
            assignment_id: self.id,
            kitchen: self.kitchen,
            cooked: cmd.cooked.clone(),
            by: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    /// Cooked quantity per item, once recorded.
    pub fn cooked(&self) -> Vec<(&AssignedItem, Quantity)> {
        self.items
            .iter()
            .map(|i| (i, i.cooked_quantity.unwrap_or_default()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment(kitchen: KitchenId) -> CookingAssignment {
        CookingAssignment::planned(
            NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
            kitchen,
            vec![AssignedItem {
                recipe_id: RecipeId::new("biryani"),
                name: "Biryani".into(),
                quantity: Quantity::from(50),
                revision: 1,
                cooked_quantity: None,
            }],
            vec![],
            vec![],
            Utc::now(),
        )
    }

    fn disperse() -> AssignmentCommand {
        AssignmentCommand::Disperse(Disperse {
            actor: UserId::new(),
            occurred_at: Utc::now(),
        })
    }

    fn receive(kitchen: KitchenId) -> AssignmentCommand {
        AssignmentCommand::ConfirmReceipt(ConfirmReceipt {
            actor: UserId::new(),
            kitchen,
            occurred_at: Utc::now(),
        })
    }

    fn cooked(kitchen: KitchenId, quantity: i64) -> AssignmentCommand {
        AssignmentCommand::RecordCooked(RecordCooked {
            actor: UserId::new(),
            kitchen,
            cooked: vec![AllocationLine::new("biryani", Quantity::from(quantity))],
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn full_pipeline_is_linear() {
        let kitchen = KitchenId::new();
        let mut a = assignment(kitchen);
        a.execute(&disperse()).unwrap();
        a.execute(&receive(kitchen)).unwrap();
        a.execute(&cooked(kitchen, 48)).unwrap();
        assert_eq!(a.items()[0].cooked_quantity, Some(Quantity::from(48)));
        a.execute(&AssignmentCommand::Collect(Collect {
            actor: UserId::new(),
            occurred_at: Utc::now(),
        }))
        .unwrap();
        a.execute(&AssignmentCommand::CollectForLogistics(CollectForLogistics {
            actor: UserId::new(),
            occurred_at: Utc::now(),
        }))
        .unwrap();
        assert_eq!(a.status(), AssignmentStatus::Collected);
        assert_eq!(a.history().len(), 5);
        assert!(a.history().windows(2).all(|w| w[0].to == w[1].from));
    }

    #[test]
    fn dispersing_twice_is_refused() {
        let mut a = assignment(KitchenId::new());
        a.execute(&disperse()).unwrap();
        assert!(matches!(
            a.handle(&disperse()),
            Err(DomainError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn receipt_must_come_from_the_assigned_kitchen() {
        let mut a = assignment(KitchenId::new());
        a.execute(&disperse()).unwrap();
        assert!(matches!(
            a.handle(&receive(KitchenId::new())),
            Err(DomainError::PreconditionFailed(_))
        ));
    }

    #[test]
    fn cooking_cannot_skip_receipt_or_report_unassigned_items() {
        let kitchen = KitchenId::new();
        let mut a = assignment(kitchen);
        a.execute(&disperse()).unwrap();
        assert!(a.handle(&cooked(kitchen, 10)).is_err());

        a.execute(&receive(kitchen)).unwrap();
        let unknown = AssignmentCommand::RecordCooked(RecordCooked {
            actor: UserId::new(),
            kitchen,
            cooked: vec![AllocationLine::new("korma", Quantity::from(1))],
            occurred_at: Utc::now(),
        });
        assert!(matches!(a.handle(&unknown), Err(DomainError::Validation(_))));
    }
}
