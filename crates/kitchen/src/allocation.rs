use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use foodflow_catalog::RecipeId;
use foodflow_core::{DomainError, DomainResult, KitchenId, Quantity};
use foodflow_forecasting::{DailyTarget, ForecastLineId};

use crate::assignment::{AssignedItem, CookingAssignment, PreparedItem};

/// Working total for one recipe across every team's target on a date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedTarget {
    pub recipe_id: RecipeId,
    pub name: String,
    /// Highest revision pinned by any contributing target.
    pub revision: u32,
    pub quantity: Quantity,
}

/// Sum daily targets by recipe.
pub fn aggregate_targets<'a>(
    targets: impl IntoIterator<Item = &'a DailyTarget>,
) -> Vec<AggregatedTarget> {
    let mut totals: BTreeMap<RecipeId, AggregatedTarget> = BTreeMap::new();
    for target in targets {
        for item in &target.items {
            totals
                .entry(item.recipe_id.clone())
                .and_modify(|t| {
                    t.quantity += item.quantity;
                    t.revision = t.revision.max(item.revision);
                })
                .or_insert_with(|| AggregatedTarget {
                    recipe_id: item.recipe_id.clone(),
                    name: item.name.clone(),
                    revision: item.revision,
                    quantity: item.quantity,
                });
        }
    }
    totals.into_values().collect()
}

/// Quantity of one recipe given to a kitchen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationLine {
    pub recipe_id: RecipeId,
    pub quantity: Quantity,
}

impl AllocationLine {
    pub fn new(recipe_id: impl AsRef<str>, quantity: Quantity) -> Self {
        Self {
            recipe_id: RecipeId::new(recipe_id),
            quantity,
        }
    }
}

/// What one kitchen cooks and what it receives ready-made from prepared stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KitchenAllocation {
    pub kitchen: KitchenId,
    pub cook: Vec<AllocationLine>,
    pub prepared: Vec<AllocationLine>,
}

impl KitchenAllocation {
    pub fn new(kitchen: KitchenId) -> Self {
        Self {
            kitchen,
            cook: Vec::new(),
            prepared: Vec::new(),
        }
    }

    pub fn cook(mut self, recipe_id: impl AsRef<str>, quantity: Quantity) -> Self {
        self.cook.push(AllocationLine::new(recipe_id, quantity));
        self
    }

    pub fn from_prepared(mut self, recipe_id: impl AsRef<str>, quantity: Quantity) -> Self {
        self.prepared.push(AllocationLine::new(recipe_id, quantity));
        self
    }

    fn has_work(&self) -> bool {
        self.cook
            .iter()
            .chain(&self.prepared)
            .any(|l| l.quantity.is_positive())
    }
}

/// Per-kitchen split of one date's aggregated targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationPlan {
    pub date: NaiveDate,
    pub kitchens: Vec<KitchenAllocation>,
}

impl AllocationPlan {
    pub fn new(date: NaiveDate, kitchens: Vec<KitchenAllocation>) -> Self {
        Self { date, kitchens }
    }

    /// Σ prepared units requested per recipe.
    pub fn prepared_totals(&self) -> BTreeMap<RecipeId, Quantity> {
        let mut totals = BTreeMap::new();
        for line in self.kitchens.iter().flat_map(|k| &k.prepared) {
            *totals.entry(line.recipe_id.clone()).or_insert(Quantity::ZERO) += line.quantity;
        }
        totals
    }

    fn allocated_totals(&self) -> BTreeMap<RecipeId, Quantity> {
        let mut totals = BTreeMap::new();
        for line in self
            .kitchens
            .iter()
            .flat_map(|k| k.cook.iter().chain(&k.prepared))
        {
            *totals.entry(line.recipe_id.clone()).or_insert(Quantity::ZERO) += line.quantity;
        }
        totals
    }

    /// Conservation check: for every recipe, Σ cook + Σ prepared equals the
    /// aggregated target exactly, and nothing outside the targets is allocated.
    pub fn validate(&self, targets: &[AggregatedTarget]) -> DomainResult<()> {
        let mut kitchens = BTreeSet::new();
        for allocation in &self.kitchens {
            if !kitchens.insert(allocation.kitchen) {
                return Err(DomainError::validation(format!(
                    "kitchen {} is listed twice",
                    allocation.kitchen
                )));
            }
            let sources = [("cook", &allocation.cook), ("prepared", &allocation.prepared)];
            for (source, lines) in sources {
                let mut recipes = BTreeSet::new();
                if let Some(line) = lines.iter().find(|l| !recipes.insert(&l.recipe_id)) {
                    return Err(DomainError::validation(format!(
                        "{}: listed twice in the {source} lines of kitchen {}",
                        line.recipe_id, allocation.kitchen
                    )));
                }
            }
            for line in allocation.cook.iter().chain(&allocation.prepared) {
                if line.quantity.is_negative() {
                    return Err(DomainError::validation(format!(
                        "{}: allocation for kitchen {} is negative",
                        line.recipe_id, allocation.kitchen
                    )));
                }
            }
        }

        let mut allocated = self.allocated_totals();
        for target in targets {
            let got = allocated.remove(&target.recipe_id).unwrap_or_default();
            if got != target.quantity {
                return Err(DomainError::AllocationMismatch {
                    item: target.recipe_id.to_string(),
                    expected: target.quantity,
                    allocated: got,
                });
            }
        }
        if let Some((recipe_id, got)) = allocated.into_iter().find(|(_, q)| !q.is_zero()) {
            return Err(DomainError::AllocationMismatch {
                item: recipe_id.to_string(),
                expected: Quantity::ZERO,
                allocated: got,
            });
        }
        Ok(())
    }

    /// One assignment per kitchen with a nonzero allocation.
    ///
    /// Call after [`validate`](Self::validate).
    pub fn build_assignments(
        &self,
        targets: &[AggregatedTarget],
        forecast_ids: &[ForecastLineId],
        created_at: DateTime<Utc>,
    ) -> DomainResult<Vec<CookingAssignment>> {
        let lookup: BTreeMap<&RecipeId, &AggregatedTarget> =
            targets.iter().map(|t| (&t.recipe_id, t)).collect();
        let target = |recipe_id: &RecipeId| {
            lookup
                .get(recipe_id)
                .copied()
                .ok_or_else(|| DomainError::not_found("daily target item", recipe_id.as_str()))
        };

        let mut assignments = Vec::new();
        for allocation in self.kitchens.iter().filter(|k| k.has_work()) {
            let mut items = Vec::new();
            for line in allocation.cook.iter().filter(|l| l.quantity.is_positive()) {
                let t = target(&line.recipe_id)?;
                items.push(AssignedItem {
                    recipe_id: t.recipe_id.clone(),
                    name: t.name.clone(),
                    quantity: line.quantity,
                    revision: t.revision,
                    cooked_quantity: None,
                });
            }
            let mut prepared = Vec::new();
            for line in allocation.prepared.iter().filter(|l| l.quantity.is_positive()) {
                let t = target(&line.recipe_id)?;
                prepared.push(PreparedItem {
                    recipe_id: t.recipe_id.clone(),
                    name: t.name.clone(),
                    quantity: line.quantity,
                });
            }
            assignments.push(CookingAssignment::planned(
                self.date,
                allocation.kitchen,
                items,
                prepared,
                forecast_ids.to_vec(),
                created_at,
            ));
        }
        Ok(assignments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foodflow_core::{UserId, Week};
    use foodflow_forecasting::ForecastItem;
    use proptest::prelude::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()
    }

    fn target(recipe: &str, quantity: i64, revision: u32) -> DailyTarget {
        let team = UserId::new();
        DailyTarget::new(
            team,
            UserId::new(),
            ForecastLineId::for_submission(team, Week::starting(date())),
            date(),
            vec![ForecastItem::new(
                RecipeId::new(recipe),
                recipe,
                Quantity::from(quantity),
                revision,
            )],
            Utc::now(),
        )
    }

    fn biryani_target(quantity: i64) -> Vec<AggregatedTarget> {
        vec![AggregatedTarget {
            recipe_id: RecipeId::new("biryani"),
            name: "Biryani".into(),
            revision: 1,
            quantity: Quantity::from(quantity),
        }]
    }

    #[test]
    fn targets_are_summed_per_recipe_with_latest_revision() {
        let targets = [target("biryani", 60, 1), target("biryani", 40, 2), target("korma", 5, 1)];
        let aggregated = aggregate_targets(&targets);
        assert_eq!(aggregated.len(), 2);
        assert_eq!(aggregated[0].recipe_id.as_str(), "biryani");
        assert_eq!(aggregated[0].quantity, Quantity::from(100));
        assert_eq!(aggregated[0].revision, 2);
    }

    #[test]
    fn exact_allocation_passes() {
        let plan = AllocationPlan::new(
            date(),
            vec![
                KitchenAllocation::new(KitchenId::new()).cook("biryani", Quantity::from(50)),
                KitchenAllocation::new(KitchenId::new())
                    .cook("biryani", Quantity::from(30))
                    .from_prepared("biryani", Quantity::from(20)),
            ],
        );
        plan.validate(&biryani_target(100)).unwrap();
        assert_eq!(
            plan.prepared_totals().get(&RecipeId::new("biryani")),
            Some(&Quantity::from(20))
        );

        let assignments = plan.build_assignments(&biryani_target(100), &[], Utc::now()).unwrap();
        assert_eq!(assignments.len(), 2);
        assert_eq!(assignments[1].from_prepared()[0].quantity, Quantity::from(20));
    }

    #[test]
    fn over_and_under_allocation_fail() {
        let over = AllocationPlan::new(
            date(),
            vec![
                KitchenAllocation::new(KitchenId::new())
                    .cook("biryani", Quantity::from(80))
                    .from_prepared("biryani", Quantity::from(21)),
            ],
        );
        assert_eq!(
            over.validate(&biryani_target(100)).unwrap_err(),
            DomainError::AllocationMismatch {
                item: "biryani".into(),
                expected: Quantity::from(100),
                allocated: Quantity::from(101),
            }
        );

        let under = AllocationPlan::new(
            date(),
            vec![KitchenAllocation::new(KitchenId::new()).cook("biryani", Quantity::from(99))],
        );
        assert!(matches!(
            under.validate(&biryani_target(100)),
            Err(DomainError::AllocationMismatch { .. })
        ));
    }

    #[test]
    fn allocating_unknown_items_fails() {
        let plan = AllocationPlan::new(
            date(),
            vec![
                KitchenAllocation::new(KitchenId::new())
                    .cook("biryani", Quantity::from(100))
                    .cook("korma", Quantity::from(1)),
            ],
        );
        assert!(matches!(
            plan.validate(&biryani_target(100)),
            Err(DomainError::AllocationMismatch { item, .. }) if item == "korma"
        ));
    }

    #[test]
    fn a_recipe_appears_once_per_kitchen_and_source() {
        let kitchen = KitchenId::new();
        let cooked_twice = AllocationPlan::new(
            date(),
            vec![
                KitchenAllocation::new(kitchen)
                    .cook("biryani", Quantity::from(10))
                    .cook("Biryani", Quantity::from(10)),
            ],
        );
        assert!(matches!(
            cooked_twice.validate(&biryani_target(20)),
            Err(DomainError::Validation(_))
        ));

        let prepared_twice = AllocationPlan::new(
            date(),
            vec![
                KitchenAllocation::new(kitchen)
                    .from_prepared("biryani", Quantity::from(10))
                    .from_prepared("biryani", Quantity::from(10)),
            ],
        );
        assert!(matches!(
            prepared_twice.validate(&biryani_target(20)),
            Err(DomainError::Validation(_))
        ));

        // Cooking and taking prepared units of one recipe is a normal split.
        let split = AllocationPlan::new(
            date(),
            vec![
                KitchenAllocation::new(kitchen)
                    .cook("biryani", Quantity::from(10))
                    .from_prepared("biryani", Quantity::from(10)),
            ],
        );
        split.validate(&biryani_target(20)).unwrap();
    }

    #[test]
    fn kitchens_without_work_get_no_assignment() {
        let plan = AllocationPlan::new(
            date(),
            vec![
                KitchenAllocation::new(KitchenId::new()).cook("biryani", Quantity::from(100)),
                KitchenAllocation::new(KitchenId::new()).cook("biryani", Quantity::ZERO),
            ],
        );
        plan.validate(&biryani_target(100)).unwrap();
        let assignments = plan.build_assignments(&biryani_target(100), &[], Utc::now()).unwrap();
        assert_eq!(assignments.len(), 1);
    }

    proptest! {
        #[test]
        fn validate_accepts_exactly_the_conserving_splits(
            parts in proptest::collection::vec(0i64..200, 1..6),
            skew in -3i64..=3,
        ) {
            let total: i64 = parts.iter().sum();
            let mut kitchens: Vec<KitchenAllocation> = parts
                .iter()
                .map(|p| {
                    KitchenAllocation::new(KitchenId::new()).cook("biryani", Quantity::from(*p))
                })
                .collect();
            kitchens[0] = kitchens[0].clone().from_prepared("biryani", Quantity::from(skew.max(0)));
            let allocated = total + skew.max(0);
            let plan = AllocationPlan::new(date(), kitchens);

            let result = plan.validate(&biryani_target(total + skew));
            prop_assert_eq!(result.is_ok(), allocated == total + skew);
        }
    }
}
