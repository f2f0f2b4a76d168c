use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use foodflow_core::{Aggregate, AggregateRoot, DomainError, DomainResult, UserId};
use foodflow_events::Event;
use foodflow_forecasting::ForecastLineId;

use crate::shortfall::{IngredientLine, validate_lines};

/// Procurement request status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcurementStatus {
    Requested,
    Received,
}

/// Aggregate root: ProcurementRequest.
///
/// Keyed by the forecast it was derived from, so at most one exists per forecast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcurementRequest {
    id: ForecastLineId,
    ingredients: Vec<IngredientLine>,
    status: ProcurementStatus,
    requested_by: Option<UserId>,
    requested_at: Option<DateTime<Utc>>,
    received_by: Option<UserId>,
    received_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl ProcurementRequest {
    /// Create an empty, not-yet-created aggregate instance.
    pub fn empty(forecast_id: ForecastLineId) -> Self {
        Self {
            id: forecast_id,
            ingredients: Vec::new(),
            status: ProcurementStatus::Requested,
            requested_by: None,
            requested_at: None,
            received_by: None,
            received_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn forecast_id(&self) -> &ForecastLineId {
        &self.id
    }

    pub fn ingredients(&self) -> &[IngredientLine] {
        &self.ingredients
    }

    pub fn status(&self) -> ProcurementStatus {
        self.status
    }

    pub fn requested_by(&self) -> Option<UserId> {
        self.requested_by
    }

    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        self.received_at
    }

    pub fn received_by(&self) -> Option<UserId> {
        self.received_by
    }

    pub fn requested_at(&self) -> Option<DateTime<Utc>> {
        self.requested_at
    }
}

impl AggregateRoot for ProcurementRequest {
    type Id = ForecastLineId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RequestProcurement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestProcurement {
    pub ingredients: Vec<IngredientLine>,
    pub requested_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ConfirmProcurementReceipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmProcurementReceipt {
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcurementCommand {
    Request(RequestProcurement),
    ConfirmReceipt(ConfirmProcurementReceipt),
}

/// Event: ProcurementRequested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcurementRequested {
    pub forecast_id: ForecastLineId,
    pub ingredients: Vec<IngredientLine>,
    pub requested_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProcurementReceived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcurementReceived {
    pub forecast_id: ForecastLineId,
    pub received_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcurementEvent {
    ProcurementRequested(ProcurementRequested),
    ProcurementReceived(ProcurementReceived),
}

impl Event for ProcurementEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProcurementEvent::ProcurementRequested(_) => "purchasing.procurement.requested",
            ProcurementEvent::ProcurementReceived(_) => "purchasing.procurement.received",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProcurementEvent::ProcurementRequested(e) => e.occurred_at,
            ProcurementEvent::ProcurementReceived(e) => e.occurred_at,
        }
    }
}

impl Aggregate for ProcurementRequest {
    type Command = ProcurementCommand;
    type Event = ProcurementEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProcurementEvent::ProcurementRequested(e) => {
                self.ingredients = e.ingredients.clone();
                self.requested_by = Some(e.requested_by);
                self.requested_at = Some(e.occurred_at);
                self.status = ProcurementStatus::Requested;
                self.created = true;
            }
            ProcurementEvent::ProcurementReceived(e) => {
                self.received_by = Some(e.received_by);
                self.received_at = Some(e.occurred_at);
                self.status = ProcurementStatus::Received;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProcurementCommand::Request(cmd) => self.handle_request(cmd),
            ProcurementCommand::ConfirmReceipt(cmd) => self.handle_confirm_receipt(cmd),
        }
    }
}

impl ProcurementRequest {
    fn handle_request(&self, cmd: &RequestProcurement) -> DomainResult<Vec<ProcurementEvent>> {
        if self.created {
            return Err(DomainError::precondition(format!(
                "procurement request for {} already exists",
                self.id
            )));
        }
        validate_lines(&cmd.ingredients)?;

        Ok(vec![ProcurementEvent::ProcurementRequested(ProcurementRequested {
            forecast_id: self.id.clone(),
            ingredients: cmd.ingredients.clone(),
            requested_by: cmd.requested_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_confirm_receipt(
        &self,
        cmd: &ConfirmProcurementReceipt,
    ) -> DomainResult<Vec<ProcurementEvent>> {
        if !self.created {
            return Err(DomainError::not_found("procurement request", self.id.as_str()));
        }
        if self.status != ProcurementStatus::Requested {
            return Err(DomainError::invalid_transition(
                "procurement request",
                self.status,
                ProcurementStatus::Received,
            ));
        }

        Ok(vec![ProcurementEvent::ProcurementReceived(ProcurementReceived {
            forecast_id: self.id.clone(),
            received_by: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use foodflow_core::{Quantity, Week};

    fn forecast_id() -> ForecastLineId {
        ForecastLineId::for_submission(
            UserId::new(),
            Week::starting(NaiveDate::from_ymd_opt(2024, 1, 6).unwrap()),
        )
    }

    fn request() -> ProcurementCommand {
        ProcurementCommand::Request(RequestProcurement {
            ingredients: vec![IngredientLine::new("rice", Quantity::from(16), "kg")],
            requested_by: UserId::new(),
            occurred_at: Utc::now(),
        })
    }

    fn receive() -> ProcurementCommand {
        ProcurementCommand::ConfirmReceipt(ConfirmProcurementReceipt {
            actor: UserId::new(),
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn request_then_receive() {
        let mut req = ProcurementRequest::empty(forecast_id());
        req.execute(&request()).unwrap();
        assert_eq!(req.status(), ProcurementStatus::Requested);
        req.execute(&receive()).unwrap();
        assert_eq!(req.status(), ProcurementStatus::Received);
        assert!(req.received_at().is_some());
        assert_eq!(req.version(), 2);
    }

    #[test]
    fn one_request_per_forecast() {
        let mut req = ProcurementRequest::empty(forecast_id());
        req.execute(&request()).unwrap();
        assert!(matches!(req.handle(&request()), Err(DomainError::PreconditionFailed(_))));
    }

    #[test]
    fn receipt_happens_once() {
        let mut req = ProcurementRequest::empty(forecast_id());
        assert!(matches!(req.handle(&receive()), Err(DomainError::NotFound { .. })));
        req.execute(&request()).unwrap();
        req.execute(&receive()).unwrap();
        assert!(matches!(
            req.handle(&receive()),
            Err(DomainError::InvalidTransition { .. })
        ));
    }
}
