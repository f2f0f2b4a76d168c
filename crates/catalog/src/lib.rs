//! Recipe catalog (leaf module).
//!
//! Maps a finished item to its ingredient bill of materials. Pure domain data
//! plus the lookup collaborator the workflow engine consumes.

pub mod recipe;

pub use recipe::{
    InMemoryRecipeCatalog, Ingredient, IngredientRequirement, Recipe, RecipeCatalog, RecipeId,
};
