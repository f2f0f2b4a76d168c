use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use foodflow_core::{DomainError, DomainResult, Entity, Quantity, ValueObject};

/// Recipe identifier: a lowercase slug such as `"biryani"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipeId(String);

impl RecipeId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for RecipeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecipeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// One BOM line: amount of an ingredient needed per produced unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    pub quantity: Quantity,
    pub unit: String,
}

impl ValueObject for Ingredient {}

impl Ingredient {
    pub fn new(name: impl Into<String>, quantity: Quantity, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quantity,
            unit: unit.into(),
        }
    }
}

/// Total amount of one ingredient needed for a production run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngredientRequirement {
    pub name: String,
    pub quantity: Quantity,
    pub unit: String,
}

/// A finished item and its bill of materials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: RecipeId,
    pub name: String,
    /// Bumped on every edit; in-flight work pins the revision it started with.
    pub revision: u32,
    pub ingredients: Vec<Ingredient>,
    pub selling_price: Decimal,
    pub mrp: Decimal,
}

impl Entity for Recipe {
    type Id = RecipeId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Recipe {
    pub fn new(id: impl AsRef<str>, name: impl Into<String>, ingredients: Vec<Ingredient>) -> Self {
        Self {
            id: RecipeId::new(id),
            name: name.into(),
            revision: 0,
            ingredients,
            selling_price: Decimal::ZERO,
            mrp: Decimal::ZERO,
        }
    }

    pub fn priced(mut self, selling_price: Decimal, mrp: Decimal) -> Self {
        self.selling_price = selling_price;
        self.mrp = mrp;
        self
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.id.as_str().is_empty() {
            return Err(DomainError::validation("recipe id cannot be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("recipe name cannot be empty"));
        }
        if self.ingredients.is_empty() {
            return Err(DomainError::validation(format!(
                "recipe {} has no ingredients",
                self.id
            )));
        }
        for ingredient in &self.ingredients {
            if ingredient.name.trim().is_empty() {
                return Err(DomainError::validation("ingredient name cannot be empty"));
            }
            ingredient
                .quantity
                .ensure_positive(&format!("{}/{}", self.id, ingredient.name))?;
        }
        if self.selling_price.is_sign_negative() || self.mrp.is_sign_negative() {
            return Err(DomainError::validation("prices cannot be negative"));
        }
        if self.mrp > Decimal::ZERO && self.selling_price > self.mrp {
            return Err(DomainError::validation(format!(
                "recipe {}: selling price exceeds MRP",
                self.id
            )));
        }
        Ok(())
    }

    /// Ingredient amounts needed to produce `produced` units, one entry per
    /// ingredient name (duplicate BOM lines are summed).
    pub fn requirements(&self, produced: Quantity) -> Vec<IngredientRequirement> {
        let mut totals: BTreeMap<String, IngredientRequirement> = BTreeMap::new();
        for ingredient in &self.ingredients {
            let needed = ingredient.quantity * produced;
            totals
                .entry(ingredient.name.trim().to_lowercase())
                .and_modify(|r| r.quantity += needed)
                .or_insert_with(|| IngredientRequirement {
                    name: ingredient.name.clone(),
                    quantity: needed,
                    unit: ingredient.unit.clone(),
                });
        }
        totals.into_values().collect()
    }
}

/// Recipe lookup consumed by the workflow engine.
pub trait RecipeCatalog: Send + Sync {
    /// Latest revision.
    fn recipe(&self, id: &RecipeId) -> Option<Recipe>;

    /// Latest revision, matched case-insensitively on the display name.
    fn recipe_by_name(&self, name: &str) -> Option<Recipe>;

    /// A specific, possibly superseded, revision.
    fn recipe_revision(&self, id: &RecipeId, revision: u32) -> Option<Recipe>;

    fn require(&self, id: &RecipeId) -> DomainResult<Recipe> {
        self.recipe(id)
            .ok_or_else(|| DomainError::not_found("recipe", id.as_str()))
    }

    fn require_revision(&self, id: &RecipeId, revision: u32) -> DomainResult<Recipe> {
        self.recipe_revision(id, revision)
            .ok_or_else(|| DomainError::not_found("recipe", format!("{id}@{revision}")))
    }
}

impl<S> RecipeCatalog for Arc<S>
where
    S: RecipeCatalog + ?Sized,
{
    fn recipe(&self, id: &RecipeId) -> Option<Recipe> {
        (**self).recipe(id)
    }

    fn recipe_by_name(&self, name: &str) -> Option<Recipe> {
        (**self).recipe_by_name(name)
    }

    fn recipe_revision(&self, id: &RecipeId, revision: u32) -> Option<Recipe> {
        (**self).recipe_revision(id, revision)
    }
}

/// In-memory catalog keeping every revision of every recipe.
#[derive(Debug, Default)]
pub struct InMemoryRecipeCatalog {
    revisions: RwLock<HashMap<RecipeId, Vec<Recipe>>>,
}

impl InMemoryRecipeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new revision. Earlier revisions stay readable so in-flight work
    /// keeps the bill of materials it was planned with.
    pub fn upsert(&self, mut recipe: Recipe) -> DomainResult<Recipe> {
        recipe.validate()?;
        let mut map = self
            .revisions
            .write()
            .map_err(|_| DomainError::conflict("recipe catalog lock poisoned"))?;
        let history = map.entry(recipe.id.clone()).or_default();
        recipe.revision = history.len() as u32 + 1;
        history.push(recipe.clone());
        Ok(recipe)
    }
}

impl RecipeCatalog for InMemoryRecipeCatalog {
    fn recipe(&self, id: &RecipeId) -> Option<Recipe> {
        self.revisions.read().ok()?.get(id)?.last().cloned()
    }

    fn recipe_by_name(&self, name: &str) -> Option<Recipe> {
        let wanted = name.trim().to_lowercase();
        let map = self.revisions.read().ok()?;
        map.values()
            .filter_map(|history| history.last())
            .find(|r| r.name.to_lowercase() == wanted)
            .cloned()
    }

    fn recipe_revision(&self, id: &RecipeId, revision: u32) -> Option<Recipe> {
        let map = self.revisions.read().ok()?;
        map.get(id)?
            .iter()
            .find(|r| r.revision == revision)
            .cloned()
    }
}
