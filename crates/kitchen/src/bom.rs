//! Bill-of-materials expansion into ledger plans.
//!
//! Each step of the pipeline moves stock between ledgers; these functions turn
//! an assignment into the aggregated deltas for that step. Every plan is
//! computed from the recipe revision pinned on the assignment.

use foodflow_catalog::{RecipeCatalog, RecipeId};
use foodflow_core::{DomainResult, KitchenId, Quantity};
use foodflow_inventory::{StockAdjustments, StockKey};

use crate::assignment::CookingAssignment;

/// Unit of finished items in prepared and logistics stock.
pub const PORTION_UNIT: &str = "unit";

/// Ingredients needed to cook `quantity` of a pinned recipe revision.
fn expand<C>(
    catalog: &C,
    recipe_id: &RecipeId,
    revision: u32,
    quantity: Quantity,
    mut each: impl FnMut(&str, Quantity, &str) -> DomainResult<()>,
) -> DomainResult<()>
where
    C: RecipeCatalog + ?Sized,
{
    let recipe = catalog.require_revision(recipe_id, revision)?;
    for req in recipe.requirements(quantity) {
        each(&req.name, req.quantity, &req.unit)?;
    }
    Ok(())
}

/// Dispersal: debit raw stock for the BOM of every assigned item and consume the
/// prepared units handed to the kitchen.
pub fn dispersal_plan<C>(
    assignment: &CookingAssignment,
    catalog: &C,
) -> DomainResult<StockAdjustments>
where
    C: RecipeCatalog + ?Sized,
{
    let mut plan = StockAdjustments::new();
    for item in assignment.items() {
        expand(catalog, &item.recipe_id, item.revision, item.quantity, |name, q, unit| {
            plan.debit(StockKey::raw(name), q, unit)
        })?;
    }
    for prepared in assignment.from_prepared() {
        plan.consume(
            StockKey::prepared(prepared.recipe_id.as_str()),
            prepared.quantity,
            PORTION_UNIT,
        )?;
    }
    Ok(plan)
}

/// Kitchen receipt: credit the kitchen with what dispersal sent.
pub fn receipt_plan<C>(
    assignment: &CookingAssignment,
    catalog: &C,
) -> DomainResult<StockAdjustments>
where
    C: RecipeCatalog + ?Sized,
{
    let kitchen = assignment.kitchen();
    let mut plan = StockAdjustments::new();
    for item in assignment.items() {
        expand(catalog, &item.recipe_id, item.revision, item.quantity, |name, q, unit| {
            plan.credit(StockKey::kitchen(kitchen, name), q, unit)
        })?;
    }
    for prepared in assignment.from_prepared() {
        plan.credit(
            prepared_in_kitchen(kitchen, &prepared.recipe_id),
            prepared.quantity,
            PORTION_UNIT,
        )?;
    }
    Ok(plan)
}

/// Cooking: debit the kitchen for the BOM of the cooked quantities and for the
/// prepared units it held, and credit logistics stock with the finished output.
///
/// Expects cooked quantities to be recorded on `assignment` already.
pub fn cooking_plan<C>(
    assignment: &CookingAssignment,
    catalog: &C,
) -> DomainResult<StockAdjustments>
where
    C: RecipeCatalog + ?Sized,
{
    let kitchen = assignment.kitchen();
    let mut plan = StockAdjustments::new();
    for (item, cooked) in assignment.cooked() {
        expand(catalog, &item.recipe_id, item.revision, cooked, |name, q, unit| {
            plan.debit(StockKey::kitchen(kitchen, name), q, unit)
        })?;
        plan.credit(StockKey::logistics(item.recipe_id.as_str()), cooked, PORTION_UNIT)?;
    }
    for prepared in assignment.from_prepared() {
        plan.debit(
            prepared_in_kitchen(kitchen, &prepared.recipe_id),
            prepared.quantity,
            PORTION_UNIT,
        )?;
        plan.credit(
            StockKey::logistics(prepared.recipe_id.as_str()),
            prepared.quantity,
            PORTION_UNIT,
        )?;
    }
    Ok(plan)
}

/// Finished units parked in a kitchen row, kept apart from same-named ingredients.
fn prepared_in_kitchen(kitchen: KitchenId, recipe_id: &RecipeId) -> StockKey {
    StockKey::kitchen(kitchen, &format!("prepared:{recipe_id}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::{
        AssignedItem, AssignmentCommand, ConfirmReceipt, Disperse, PreparedItem, RecordCooked,
    };
    use crate::allocation::AllocationLine;
    use chrono::{NaiveDate, Utc};
    use foodflow_catalog::{InMemoryRecipeCatalog, Ingredient, Recipe};
    use foodflow_core::{Aggregate, UserId};

    fn q(s: &str) -> Quantity {
        s.parse().unwrap()
    }

    fn catalog() -> InMemoryRecipeCatalog {
        let catalog = InMemoryRecipeCatalog::new();
        catalog
            .upsert(Recipe::new(
                "biryani",
                "Biryani",
                vec![
                    Ingredient::new("rice", q("0.2"), "kg"),
                    Ingredient::new("chicken", q("0.15"), "kg"),
                ],
            ))
            .unwrap();
        catalog
    }

    fn assignment(kitchen: KitchenId) -> CookingAssignment {
        CookingAssignment::planned(
            NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
            kitchen,
            vec![AssignedItem {
                recipe_id: RecipeId::new("biryani"),
                name: "Biryani".into(),
                quantity: Quantity::from(30),
                revision: 1,
                cooked_quantity: None,
            }],
            vec![PreparedItem {
                recipe_id: RecipeId::new("biryani"),
                name: "Biryani".into(),
                quantity: Quantity::from(20),
            }],
            vec![],
            Utc::now(),
        )
    }

    #[test]
    fn dispersal_debits_raw_and_consumes_prepared() {
        let plan = dispersal_plan(&assignment(KitchenId::new()), &catalog()).unwrap();
        assert_eq!(plan.net(&StockKey::raw("rice")), q("-6"));
        assert_eq!(plan.net(&StockKey::raw("chicken")), q("-4.5"));
        assert_eq!(plan.net(&StockKey::prepared("biryani")), Quantity::from(-20));
    }

    #[test]
    fn receipt_mirrors_dispersal_into_the_kitchen() {
        let kitchen = KitchenId::new();
        let plan = receipt_plan(&assignment(kitchen), &catalog()).unwrap();
        assert_eq!(plan.net(&StockKey::kitchen(kitchen, "rice")), q("6"));
        assert_eq!(
            plan.net(&StockKey::kitchen(kitchen, "prepared:biryani")),
            Quantity::from(20)
        );
    }

    #[test]
    fn cooking_uses_actual_output() {
        let kitchen = KitchenId::new();
        let mut a = assignment(kitchen);
        a.execute(&AssignmentCommand::Disperse(Disperse {
            actor: UserId::new(),
            occurred_at: Utc::now(),
        }))
        .unwrap();
        a.execute(&AssignmentCommand::ConfirmReceipt(ConfirmReceipt {
            actor: UserId::new(),
            kitchen,
            occurred_at: Utc::now(),
        }))
        .unwrap();
        a.execute(&AssignmentCommand::RecordCooked(RecordCooked {
            actor: UserId::new(),
            kitchen,
            cooked: vec![AllocationLine::new("biryani", Quantity::from(25))],
            occurred_at: Utc::now(),
        }))
        .unwrap();

        let plan = cooking_plan(&a, &catalog()).unwrap();
        assert_eq!(plan.net(&StockKey::kitchen(kitchen, "rice")), q("-5"));
        assert_eq!(plan.net(&StockKey::logistics("biryani")), Quantity::from(45));
    }

    #[test]
    fn unknown_revision_is_not_found() {
        let base = assignment(KitchenId::new());
        let a = CookingAssignment::planned(
            base.date(),
            base.kitchen(),
            vec![AssignedItem {
                revision: 9,
                ..base.items()[0].clone()
            }],
            vec![],
            vec![],
            Utc::now(),
        );
        assert!(dispersal_plan(&a, &catalog()).is_err());
    }
}
