use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use foodflow_catalog::RecipeId;
use foodflow_core::calendar::date_label;
use foodflow_core::{DomainError, DomainResult, Entity, Quantity, UserId};

use crate::forecast::{ForecastItem, ForecastLineId};

/// Requested daily quantity of one recipe, before it is pinned to the forecast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRequest {
    pub recipe_id: RecipeId,
    pub quantity: Quantity,
}

impl TargetRequest {
    pub fn new(recipe_id: impl AsRef<str>, quantity: Quantity) -> Self {
        Self {
            recipe_id: RecipeId::new(recipe_id),
            quantity,
        }
    }
}

pub(crate) fn validate_requests(requests: &[TargetRequest]) -> DomainResult<()> {
    if requests.is_empty() {
        return Err(DomainError::validation("daily target must contain at least one item"));
    }
    let mut seen = BTreeSet::new();
    for r in requests {
        r.quantity.ensure_positive(r.recipe_id.as_str())?;
        if !seen.insert(&r.recipe_id) {
            return Err(DomainError::validation(format!(
                "recipe {} appears more than once",
                r.recipe_id
            )));
        }
    }
    Ok(())
}

/// Daily target identifier: one per `(team, date)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DailyTargetId(String);

impl DailyTargetId {
    pub fn for_team(team: UserId, date: NaiveDate) -> Self {
        Self(format!("{team}:{}", date_label(date)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for DailyTargetId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A day-scoped slice of a team's accepted weekly forecast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyTarget {
    pub id: DailyTargetId,
    pub team: UserId,
    pub zonal_owner: UserId,
    pub forecast_id: ForecastLineId,
    pub date: NaiveDate,
    pub items: Vec<ForecastItem>,
    pub set_at: DateTime<Utc>,
}

impl Entity for DailyTarget {
    type Id = DailyTargetId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl DailyTarget {
    pub fn new(
        team: UserId,
        zonal_owner: UserId,
        forecast_id: ForecastLineId,
        date: NaiveDate,
        items: Vec<ForecastItem>,
        set_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: DailyTargetId::for_team(team, date),
            team,
            zonal_owner,
            forecast_id,
            date,
            items,
            set_at,
        }
    }

    pub fn quantity(&self, recipe_id: &RecipeId) -> Quantity {
        self.items
            .iter()
            .filter(|i| &i.recipe_id == recipe_id)
            .map(|i| i.quantity)
            .sum()
    }
}

/// Every daily target set for one date.
///
/// Written whenever a target for the date is set and read by kitchen
/// assignment, so the two cannot interleave unnoticed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateTargets {
    pub date: NaiveDate,
    pub targets: Vec<DailyTargetId>,
}

impl DateTargets {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            targets: Vec::new(),
        }
    }

    pub fn key(date: NaiveDate) -> String {
        date_label(date)
    }

    /// Add `id`; false when it was already listed.
    pub fn insert(&mut self, id: DailyTargetId) -> bool {
        match self.targets.binary_search(&id) {
            Ok(_) => false,
            Err(pos) => {
                self.targets.insert(pos, id);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_derived_from_team_and_date() {
        let team = UserId::new();
        let date = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
        assert_eq!(
            DailyTargetId::for_team(team, date).as_str(),
            format!("{team}:08-01-2024")
        );
    }

    #[test]
    fn requests_must_be_positive_and_distinct() {
        assert!(validate_requests(&[]).is_err());
        assert!(validate_requests(&[TargetRequest::new("biryani", Quantity::ZERO)]).is_err());
        assert!(
            validate_requests(&[
                TargetRequest::new("biryani", Quantity::from(1)),
                TargetRequest::new("Biryani", Quantity::from(2)),
            ])
            .is_err()
        );
    }

    #[test]
    fn quantity_reads_the_item() {
        let target = DailyTarget::new(
            UserId::new(),
            UserId::new(),
            ForecastLineId::for_submission(UserId::new(), foodflow_core::Week::starting(
                NaiveDate::from_ymd_opt(2024, 1, 6).unwrap(),
            )),
            NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
            vec![ForecastItem::new(RecipeId::new("biryani"), "Biryani", Quantity::from(50), 1)],
            Utc::now(),
        );
        assert_eq!(target.quantity(&RecipeId::new("biryani")), Quantity::from(50));
        assert_eq!(target.quantity(&RecipeId::new("korma")), Quantity::ZERO);
    }

    #[test]
    fn date_index_lists_each_target_once() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
        let (a, b) = (UserId::new(), UserId::new());
        let mut index = DateTargets::new(date);
        assert!(index.insert(DailyTargetId::for_team(a, date)));
        assert!(index.insert(DailyTargetId::for_team(b, date)));
        assert!(!index.insert(DailyTargetId::for_team(a, date)));
        assert_eq!(index.targets.len(), 2);
        assert_eq!(DateTargets::key(date), "08-01-2024");
    }
}
