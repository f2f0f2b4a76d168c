use serde::{Deserialize, Serialize};

use foodflow_catalog::RecipeId;
use foodflow_core::{AggregateRoot, DomainError, DomainResult, Quantity, UserId, Week};

use crate::daily_target::{TargetRequest, validate_requests};
use crate::forecast::{ForecastItem, ForecastLine, ForecastLineId};

/// What is left of one approved recipe quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllotmentLine {
    pub recipe_id: RecipeId,
    pub name: String,
    pub revision: u32,
    pub approved: Quantity,
    pub remaining: Quantity,
}

/// Running balance of an accepted forecast: `remaining = approved - Σ daily targets`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastAllotment {
    pub forecast_id: ForecastLineId,
    pub team: UserId,
    pub week: Week,
    pub lines: Vec<AllotmentLine>,
}

impl ForecastAllotment {
    /// Open the allotment of a line that finance accepted.
    pub fn from_forecast(line: &ForecastLine) -> DomainResult<Self> {
        if !line.status().is_accepted() {
            return Err(DomainError::precondition(format!(
                "forecast {} is not accepted",
                line.id()
            )));
        }
        let (Some(team), Some(week)) = (line.submitter(), line.week()) else {
            return Err(DomainError::precondition(format!(
                "forecast {} has no submitter or week",
                line.id()
            )));
        };

        Ok(Self {
            forecast_id: line.id().clone(),
            team,
            week,
            lines: line
                .items()
                .iter()
                .map(|i| AllotmentLine {
                    recipe_id: i.recipe_id.clone(),
                    name: i.name.clone(),
                    revision: i.revision,
                    approved: i.quantity,
                    remaining: i.quantity,
                })
                .collect(),
        })
    }

    pub fn remaining(&self, recipe_id: &RecipeId) -> Quantity {
        self.line(recipe_id).map(|l| l.remaining).unwrap_or_default()
    }

    fn line(&self, recipe_id: &RecipeId) -> Option<&AllotmentLine> {
        self.lines.iter().find(|l| &l.recipe_id == recipe_id)
    }

    /// Draw `requests` from the allotment and return them as pinned target items.
    ///
    /// Nothing is drawn unless every request fits.
    pub fn consume(&mut self, requests: &[TargetRequest]) -> DomainResult<Vec<ForecastItem>> {
        validate_requests(requests)?;

        let mut items = Vec::with_capacity(requests.len());
        for request in requests {
            let remaining = self.remaining(&request.recipe_id);
            let line = self
                .line(&request.recipe_id)
                .filter(|_| request.quantity <= remaining)
                .ok_or_else(|| DomainError::ExceedsForecast {
                    recipe: request.recipe_id.to_string(),
                    requested: request.quantity,
                    remaining,
                })?;
            items.push(ForecastItem::new(
                line.recipe_id.clone(),
                line.name.clone(),
                request.quantity,
                line.revision,
            ));
        }

        for item in &items {
            if let Some(line) = self.lines.iter_mut().find(|l| l.recipe_id == item.recipe_id) {
                line.remaining -= item.quantity;
            }
        }
        Ok(items)
    }

    /// Give back quantities of a replaced target. Never exceeds the approved amount.
    pub fn restore(&mut self, items: &[ForecastItem]) {
        for item in items {
            if let Some(line) = self.lines.iter_mut().find(|l| l.recipe_id == item.recipe_id) {
                line.remaining = (line.remaining + item.quantity).min(line.approved);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::{Approve, ApproverChain, ForecastCommand, ReviewStage, Submit};
    use chrono::{NaiveDate, Utc};
    use foodflow_core::Aggregate;
    use proptest::prelude::*;

    fn accepted(quantity: i64) -> ForecastLine {
        let submitter = UserId::new();
        let week = Week::starting(NaiveDate::from_ymd_opt(2024, 1, 6).unwrap());
        let mut line = ForecastLine::empty(ForecastLineId::for_submission(submitter, week));
        line.execute(&ForecastCommand::Submit(Submit {
            submitter,
            week,
            items: vec![ForecastItem::new(
                RecipeId::new("biryani"),
                "Biryani",
                Quantity::from(quantity),
                3,
            )],
            approvers: ApproverChain::default(),
            occurred_at: Utc::now(),
        }))
        .unwrap();
        for stage in [ReviewStage::StockManager, ReviewStage::Finance] {
            line.execute(&ForecastCommand::Approve(Approve {
                actor: UserId::new(),
                stage,
                modified_items: None,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        }
        line
    }

    fn request(recipe: &str, quantity: i64) -> TargetRequest {
        TargetRequest {
            recipe_id: RecipeId::new(recipe),
            quantity: Quantity::from(quantity),
        }
    }

    #[test]
    fn only_accepted_lines_open_an_allotment() {
        let submitter = UserId::new();
        let week = Week::starting(NaiveDate::from_ymd_opt(2024, 1, 6).unwrap());
        let line = ForecastLine::empty(ForecastLineId::for_submission(submitter, week));
        assert!(ForecastAllotment::from_forecast(&line).is_err());
        assert!(ForecastAllotment::from_forecast(&accepted(10)).is_ok());
    }

    #[test]
    fn consume_pins_revision_and_decrements() {
        let mut allotment = ForecastAllotment::from_forecast(&accepted(100)).unwrap();
        let items = allotment.consume(&[request("biryani", 60)]).unwrap();
        assert_eq!(items[0].revision, 3);
        assert_eq!(allotment.remaining(&RecipeId::new("biryani")), Quantity::from(40));

        let err = allotment.consume(&[request("biryani", 41)]).unwrap_err();
        assert_eq!(
            err,
            DomainError::ExceedsForecast {
                recipe: "biryani".into(),
                requested: Quantity::from(41),
                remaining: Quantity::from(40),
            }
        );
        assert_eq!(allotment.remaining(&RecipeId::new("biryani")), Quantity::from(40));
    }

    #[test]
    fn recipes_outside_the_forecast_have_nothing_left() {
        let mut allotment = ForecastAllotment::from_forecast(&accepted(100)).unwrap();
        assert!(matches!(
            allotment.consume(&[request("korma", 1)]),
            Err(DomainError::ExceedsForecast { remaining, .. }) if remaining == Quantity::ZERO
        ));
    }

    #[test]
    fn restore_is_capped_at_the_approved_amount() {
        let mut allotment = ForecastAllotment::from_forecast(&accepted(10)).unwrap();
        let items = allotment.consume(&[request("biryani", 4)]).unwrap();
        allotment.restore(&items);
        allotment.restore(&items);
        assert_eq!(allotment.remaining(&RecipeId::new("biryani")), Quantity::from(10));
    }

    proptest! {
        #[test]
        fn targets_never_exceed_the_weekly_forecast(
            approved in 1i64..500,
            draws in proptest::collection::vec(1i64..100, 0..20)
        ) {
            let mut allotment = ForecastAllotment::from_forecast(&accepted(approved)).unwrap();
            let mut drawn = Quantity::ZERO;
            for d in draws {
                if let Ok(items) = allotment.consume(&[request("biryani", d)]) {
                    drawn += items[0].quantity;
                }
            }
            prop_assert!(drawn <= Quantity::from(approved));
            prop_assert_eq!(
                allotment.remaining(&RecipeId::new("biryani")),
                Quantity::from(approved) - drawn
            );
        }
    }
}
