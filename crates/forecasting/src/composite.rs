use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use foodflow_catalog::RecipeId;
use foodflow_core::{AggregateRoot, Quantity, UserId, Week};

use crate::forecast::{ForecastLine, ForecastLineId, ReviewStage};

/// Per-recipe total across the lines of a composite review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeTotal {
    pub recipe_id: RecipeId,
    pub name: String,
    pub quantity: Quantity,
}

/// All lines of one week waiting on the same reviewer, viewed as one.
///
/// Approving or rejecting the composite fans out to every line in `lines`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeReview {
    pub week: Week,
    pub stage: ReviewStage,
    /// Designated approver shared by the lines; `None` groups the lines with no
    /// designated approver for this stage.
    pub approver: Option<UserId>,
    pub lines: Vec<ForecastLineId>,
    pub totals: Vec<RecipeTotal>,
}

impl CompositeReview {
    /// Group the lines of `week` that are pending at `stage` and designate `approver`.
    pub fn build<'a>(
        week: Week,
        stage: ReviewStage,
        approver: Option<UserId>,
        candidates: impl IntoIterator<Item = &'a ForecastLine>,
    ) -> Self {
        Self::collect(week, stage, approver, candidates, |designated| {
            designated == approver
        })
    }

    /// Everything `reviewer` may act on at `stage`: the lines designating them
    /// plus the lines with no designated approver.
    pub fn for_reviewer<'a>(
        week: Week,
        stage: ReviewStage,
        reviewer: UserId,
        candidates: impl IntoIterator<Item = &'a ForecastLine>,
    ) -> Self {
        Self::collect(week, stage, Some(reviewer), candidates, |designated| {
            designated.is_none_or(|d| d == reviewer)
        })
    }

    fn collect<'a>(
        week: Week,
        stage: ReviewStage,
        approver: Option<UserId>,
        candidates: impl IntoIterator<Item = &'a ForecastLine>,
        includes: impl Fn(Option<UserId>) -> bool,
    ) -> Self {
        let mut lines = Vec::new();
        let mut totals: BTreeMap<RecipeId, RecipeTotal> = BTreeMap::new();

        for line in candidates {
            if line.week() != Some(week)
                || line.status() != stage.pending_status()
                || !includes(line.approvers().designated(stage))
            {
                continue;
            }
            lines.push(line.id().clone());
            for item in line.items() {
                totals
                    .entry(item.recipe_id.clone())
                    .and_modify(|t| t.quantity += item.quantity)
                    .or_insert_with(|| RecipeTotal {
                        recipe_id: item.recipe_id.clone(),
                        name: item.name.clone(),
                        quantity: item.quantity,
                    });
            }
        }
        lines.sort();

        Self {
            week,
            stage,
            approver,
            lines,
            totals: totals.into_values().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn total(&self, recipe_id: &RecipeId) -> Quantity {
        self.totals
            .iter()
            .find(|t| &t.recipe_id == recipe_id)
            .map(|t| t.quantity)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::{
        ApproverChain, Approve, ForecastCommand, ForecastItem, ForecastStatus, Submit,
    };
    use chrono::{NaiveDate, Utc};
    use foodflow_core::Aggregate;

    fn week() -> Week {
        Week::starting(NaiveDate::from_ymd_opt(2024, 1, 6).unwrap())
    }

    fn line(manager: Option<UserId>, week: Week, biryani: i64, korma: i64) -> ForecastLine {
        let submitter = UserId::new();
        let mut items = vec![ForecastItem::new(
            RecipeId::new("biryani"),
            "Biryani",
            Quantity::from(biryani),
            1,
        )];
        if korma > 0 {
            items.push(ForecastItem::new(
                RecipeId::new("korma"),
                "Korma",
                Quantity::from(korma),
                1,
            ));
        }
        let mut line = ForecastLine::empty(ForecastLineId::for_submission(submitter, week));
        line.execute(&ForecastCommand::Submit(Submit {
            submitter,
            week,
            items,
            approvers: ApproverChain {
                stock_manager: manager,
                finance: None,
            },
            occurred_at: Utc::now(),
        }))
        .unwrap();
        line
    }

    #[test]
    fn groups_by_week_stage_and_approver() {
        let manager = UserId::new();
        let other_week = Week::starting(NaiveDate::from_ymd_opt(2024, 1, 13).unwrap());

        let a = line(Some(manager), week(), 60, 0);
        let b = line(Some(manager), week(), 40, 10);
        let elsewhere = line(Some(UserId::new()), week(), 5, 0);
        let later = line(Some(manager), other_week, 7, 0);
        let mut advanced = line(Some(manager), week(), 9, 0);
        advanced
            .execute(&ForecastCommand::Approve(Approve {
                actor: manager,
                stage: ReviewStage::StockManager,
                modified_items: None,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        assert_eq!(advanced.status(), ForecastStatus::PendingFinanceApproval);

        let lines = [a, b, elsewhere, later, advanced];
        let review =
            CompositeReview::build(week(), ReviewStage::StockManager, Some(manager), &lines);

        assert_eq!(review.lines.len(), 2);
        assert_eq!(review.total(&RecipeId::new("biryani")), Quantity::from(100));
        assert_eq!(review.total(&RecipeId::new("korma")), Quantity::from(10));
        assert_eq!(review.total(&RecipeId::new("dal")), Quantity::ZERO);
    }

    #[test]
    fn finance_stage_sees_lines_past_the_first_approval() {
        let manager = UserId::new();
        let mut pending = line(Some(manager), week(), 9, 0);
        pending
            .execute(&ForecastCommand::Approve(Approve {
                actor: manager,
                stage: ReviewStage::StockManager,
                modified_items: None,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        let fresh = line(Some(manager), week(), 3, 0);

        let lines = [pending, fresh];
        let review = CompositeReview::build(week(), ReviewStage::Finance, None, &lines);
        assert_eq!(review.lines.len(), 1);
        assert_eq!(review.total(&RecipeId::new("biryani")), Quantity::from(9));
    }

    #[test]
    fn a_reviewer_also_covers_lines_without_a_designated_approver() {
        let manager = UserId::new();
        let mine = line(Some(manager), week(), 10, 0);
        let open = line(None, week(), 5, 0);
        let theirs = line(Some(UserId::new()), week(), 7, 0);

        let lines = [mine, open, theirs];
        let review =
            CompositeReview::for_reviewer(week(), ReviewStage::StockManager, manager, &lines);
        assert_eq!(review.approver, Some(manager));
        assert_eq!(review.lines.len(), 2);
        assert_eq!(review.total(&RecipeId::new("biryani")), Quantity::from(15));

        let designated_only =
            CompositeReview::build(week(), ReviewStage::StockManager, Some(manager), &lines);
        assert_eq!(designated_only.lines.len(), 1);
    }
}
