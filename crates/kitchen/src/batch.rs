use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use foodflow_core::calendar::date_label;
use foodflow_core::{Entity, UserId};
use foodflow_forecasting::ForecastLineId;

use crate::assignment::AssignmentId;

/// Record that a date was assigned to kitchens.
///
/// One per date. Its existence freezes the date's daily targets and refuses a
/// second assignment run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentBatch {
    pub date: NaiveDate,
    pub assignments: Vec<AssignmentId>,
    pub forecast_ids: Vec<ForecastLineId>,
    pub assigned_by: UserId,
    pub assigned_at: DateTime<Utc>,
}

impl AssignmentBatch {
    pub fn key(date: NaiveDate) -> String {
        date_label(date)
    }
}

impl Entity for AssignmentBatch {
    type Id = NaiveDate;

    fn id(&self) -> &Self::Id {
        &self.date
    }
}
