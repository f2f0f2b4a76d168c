use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use foodflow_catalog::{RecipeCatalog, RecipeId};
use foodflow_core::{DomainError, DomainResult, Quantity, ValueObject};
use foodflow_forecasting::ForecastItem;

/// An amount of one raw ingredient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngredientLine {
    pub name: String,
    pub quantity: Quantity,
    pub unit: String,
}

impl ValueObject for IngredientLine {}

impl IngredientLine {
    pub fn new(name: impl Into<String>, quantity: Quantity, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quantity,
            unit: unit.into(),
        }
    }
}

/// Sum lines by (normalised) ingredient name.
pub fn aggregate_lines<'a>(
    lines: impl IntoIterator<Item = &'a IngredientLine>,
) -> Vec<IngredientLine> {
    let mut totals: BTreeMap<String, IngredientLine> = BTreeMap::new();
    for line in lines {
        let key = line.name.trim().to_lowercase();
        totals
            .entry(key.clone())
            .and_modify(|t| t.quantity += line.quantity)
            .or_insert_with(|| IngredientLine::new(key, line.quantity, line.unit.clone()));
    }
    totals.into_values().collect()
}

/// Prepared units counted against a forecast item instead of cooking them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedCover {
    pub recipe_id: RecipeId,
    pub quantity: Quantity,
}

/// First half of the shortfall computation: what must be cooked and which
/// ingredients that takes.
///
/// `to_cook = max(0, requested - available prepared)`; required ingredients are
/// `Σ to_cook × BOM`, aggregated by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcurementPlan {
    pub covered_by_prepared: Vec<PreparedCover>,
    pub required: Vec<IngredientLine>,
}

impl ProcurementPlan {
    pub fn prepare<C>(
        items: &[ForecastItem],
        available_prepared: impl Fn(&RecipeId) -> Quantity,
        catalog: &C,
    ) -> DomainResult<Self>
    where
        C: RecipeCatalog + ?Sized,
    {
        let mut covered_by_prepared = Vec::new();
        let mut required = Vec::new();

        for item in items {
            let available = available_prepared(&item.recipe_id);
            let covered = item.quantity.min(available.max(Quantity::ZERO));
            if covered.is_positive() {
                covered_by_prepared.push(PreparedCover {
                    recipe_id: item.recipe_id.clone(),
                    quantity: covered,
                });
            }

            let to_cook = item.quantity.saturating_sub(covered);
            if to_cook.is_zero() {
                continue;
            }
            let recipe = catalog.require_revision(&item.recipe_id, item.revision)?;
            required.extend(
                recipe
                    .requirements(to_cook)
                    .into_iter()
                    .map(|r| IngredientLine::new(r.name, r.quantity, r.unit)),
            );
        }

        Ok(Self {
            covered_by_prepared,
            required: aggregate_lines(&required),
        })
    }

    /// Ingredient names whose raw stock must be read to finish the computation.
    pub fn ingredient_names(&self) -> impl Iterator<Item = &str> {
        self.required.iter().map(|l| l.name.as_str())
    }

    /// Second half: `to_buy = max(0, required - raw stock)`, raw stock counted
    /// once per ingredient. Empty means nothing needs purchasing.
    pub fn shortfall(&self, raw_on_hand: impl Fn(&str) -> Quantity) -> Vec<IngredientLine> {
        self.required
            .iter()
            .filter_map(|line| {
                let to_buy = line.quantity.saturating_sub(raw_on_hand(&line.name));
                to_buy
                    .is_positive()
                    .then(|| IngredientLine::new(line.name.clone(), to_buy, line.unit.clone()))
            })
            .collect()
    }
}

/// Validate hand-entered purchase lines.
pub fn validate_lines(lines: &[IngredientLine]) -> DomainResult<()> {
    if lines.is_empty() {
        return Err(DomainError::validation("at least one ingredient line is required"));
    }
    for line in lines {
        if line.name.trim().is_empty() {
            return Err(DomainError::validation("ingredient name cannot be empty"));
        }
        line.quantity.ensure_positive(&line.name)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use foodflow_catalog::{InMemoryRecipeCatalog, Ingredient, Recipe};
    use proptest::prelude::*;

    fn q(s: &str) -> Quantity {
        s.parse().unwrap()
    }

    fn catalog() -> InMemoryRecipeCatalog {
        let catalog = InMemoryRecipeCatalog::new();
        catalog
            .upsert(Recipe::new(
                "biryani",
                "Biryani",
                vec![Ingredient::new("rice", q("0.2"), "kg")],
            ))
            .unwrap();
        catalog
            .upsert(Recipe::new(
                "pulao",
                "Pulao",
                vec![
                    Ingredient::new("Rice", q("0.1"), "kg"),
                    Ingredient::new("peas", q("0.05"), "kg"),
                ],
            ))
            .unwrap();
        catalog
    }

    fn item(recipe: &str, quantity: i64) -> ForecastItem {
        ForecastItem::new(RecipeId::new(recipe), recipe, Quantity::from(quantity), 1)
    }

    #[test]
    fn biryani_scenario_needs_sixteen_kilos_of_rice() {
        let plan = ProcurementPlan::prepare(
            &[item("biryani", 100)],
            |_| Quantity::from(20),
            &catalog(),
        )
        .unwrap();
        assert_eq!(plan.covered_by_prepared[0].quantity, Quantity::from(20));
        assert_eq!(plan.required, vec![IngredientLine::new("rice", q("16"), "kg")]);

        let to_buy = plan.shortfall(|_| Quantity::ZERO);
        assert_eq!(to_buy, vec![IngredientLine::new("rice", q("16"), "kg")]);
    }

    #[test]
    fn raw_stock_is_subtracted_once_across_recipes() {
        let plan = ProcurementPlan::prepare(
            &[item("biryani", 50), item("pulao", 100)],
            |_| Quantity::ZERO,
            &catalog(),
        )
        .unwrap();
        // 50 × 0.2 + 100 × 0.1
        assert_eq!(plan.required[1], IngredientLine::new("rice", q("20"), "kg"));

        let to_buy = plan.shortfall(|name| if name == "rice" { q("15") } else { Quantity::ZERO });
        assert_eq!(
            to_buy,
            vec![
                IngredientLine::new("peas", q("5"), "kg"),
                IngredientLine::new("rice", q("5"), "kg"),
            ]
        );
    }

    #[test]
    fn fully_covered_forecast_has_no_shortfall() {
        let plan =
            ProcurementPlan::prepare(&[item("biryani", 10)], |_| Quantity::from(30), &catalog())
                .unwrap();
        assert!(plan.required.is_empty());
        assert!(plan.shortfall(|_| Quantity::ZERO).is_empty());
    }

    #[test]
    fn duplicate_lines_are_summed_by_name() {
        let lines = [
            IngredientLine::new("Rice", q("2"), "kg"),
            IngredientLine::new("rice ", q("3"), "kg"),
        ];
        assert_eq!(aggregate_lines(&lines), vec![IngredientLine::new("rice", q("5"), "kg")]);
        assert!(validate_lines(&[]).is_err());
        assert!(validate_lines(&[IngredientLine::new("rice", Quantity::ZERO, "kg")]).is_err());
    }

    proptest! {
        #[test]
        fn shortfall_is_never_negative_and_closes_the_gap(
            requested in 0i64..1000,
            prepared in 0i64..1000,
            raw in 0i64..500,
        ) {
            let plan = ProcurementPlan::prepare(
                &[item("biryani", requested)],
                |_| Quantity::from(prepared),
                &catalog(),
            ).unwrap();
            let to_buy = plan.shortfall(|_| Quantity::from(raw));
            let bought: Quantity = to_buy.iter().map(|l| l.quantity).sum();
            prop_assert!(!bought.is_negative());

            let needed = q("0.2") * Quantity::from((requested - prepared).max(0));
            prop_assert_eq!(bought, needed.saturating_sub(Quantity::from(raw)));
        }
    }
}
