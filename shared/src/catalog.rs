//! Browsing and saving recipes.

use serde::Deserialize;
use tracing::info;

use crate::dto::{GeneratedRecipe, NewRecipe, Recipe};
use crate::error::Result;
use crate::store::RecipeStore;

/// Category value meaning "no category filter".
pub const ALL_CATEGORIES: &str = "all";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipeFilter {
    pub search: Option<String>,
    pub category: Option<String>,
}

impl RecipeFilter {
    fn matches(&self, recipe: &Recipe) -> bool {
        self.matches_search(recipe) && self.matches_category(recipe)
    }

    fn matches_search(&self, recipe: &Recipe) -> bool {
        let Some(term) = self.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
            return true;
        };
        let term = term.to_lowercase();
        recipe.title.to_lowercase().contains(&term)
            || recipe
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&term))
            || recipe
                .ingredients
                .iter()
                .any(|i| i.to_lowercase().contains(&term))
    }

    fn matches_category(&self, recipe: &Recipe) -> bool {
        match self.category.as_deref() {
            None | Some("") | Some(ALL_CATEGORIES) => true,
            Some(c) => recipe.category == c,
        }
    }
}

/// Recipes matching `filter`, in their original order.
pub fn filter_recipes(recipes: Vec<Recipe>, filter: &RecipeFilter) -> Vec<Recipe> {
    recipes.into_iter().filter(|r| filter.matches(r)).collect()
}

/// Add a user-typed ingredient to an edited list: trimmed, non-empty and not already present.
/// Returns whether the list changed.
pub fn add_ingredient(list: &mut Vec<String>, entry: &str) -> bool {
    let entry = entry.trim();
    if entry.is_empty() || list.iter().any(|i| i == entry) {
        return false;
    }
    list.push(entry.to_string());
    true
}

/// Persist a batch of generated recipes in a single write.
pub async fn save_generated_recipes(
    store: &dyn RecipeStore,
    recipes: Vec<GeneratedRecipe>,
) -> Result<Vec<Recipe>> {
    let rows: Vec<NewRecipe> = recipes.into_iter().map(NewRecipe::from).collect();
    let saved = store.insert_recipes(rows).await?;
    info!(count = saved.len(), "generated recipes saved");
    Ok(saved)
}
