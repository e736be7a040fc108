//! Record shapes exchanged with the hosted model, the backend tables and the
//! HTTP clients of `recipe-api`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use uuid::Uuid;

/// One ingredient the vision model claims to see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedIngredient {
    pub name: String,
    pub confidence: f64,
}

/// A recipe as proposed by the text model, before it is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedRecipe {
    pub title: String,
    pub description: String,
    pub ingredients: Vec<String>,
    pub steps: Vec<String>,
    pub category: String,
    pub estimated_time: String,
    pub servings: u32,
}

/// Row of the `recipes` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub ingredients: Vec<String>,
    pub steps: Vec<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    pub category: String,
    #[serde(default)]
    pub estimated_time: Option<String>,
    #[serde(default)]
    pub servings: Option<u32>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for the `recipes` table; id and timestamp are generated by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRecipe {
    pub title: String,
    pub description: Option<String>,
    pub ingredients: Vec<String>,
    pub steps: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub category: String,
    pub estimated_time: Option<String>,
    pub servings: Option<u32>,
}

impl From<GeneratedRecipe> for NewRecipe {
    fn from(r: GeneratedRecipe) -> Self {
        Self {
            title: r.title,
            description: Some(r.description),
            ingredients: r.ingredients,
            steps: r.steps,
            image_url: None,
            category: r.category,
            estimated_time: Some(r.estimated_time),
            servings: Some(r.servings),
        }
    }
}

/// Row of the `favorites` join table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Favorite {
    pub id: Uuid,
    pub user_id: Uuid,
    pub recipe_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFavorite {
    pub user_id: Uuid,
    pub recipe_id: Uuid,
}

/// A favorite together with the recipe it points at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoriteWithRecipe {
    #[serde(flatten)]
    pub favorite: Favorite,
    pub recipe: Recipe,
}

/// Row of the append-only `ingredient_queries` log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientQuery {
    pub id: Uuid,
    pub user_id: Uuid,
    pub image_url: String,
    pub recognized_ingredients: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewIngredientQuery {
    pub user_id: Uuid,
    pub image_url: String,
    pub recognized_ingredients: Vec<String>,
}

/// Aggregates shown on a user's profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_queries: u64,
    pub total_favorites: u64,
    pub recent_queries: Vec<IngredientQuery>,
}

/// Categories the generator is asked to choose from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter, AsRefStr, Serialize, Deserialize,
)]
pub enum RecipeCategory {
    #[strum(serialize = "main dish")]
    #[serde(rename = "main dish")]
    MainDish,
    #[strum(serialize = "appetizer")]
    #[serde(rename = "appetizer")]
    Appetizer,
    #[strum(serialize = "dessert")]
    #[serde(rename = "dessert")]
    Dessert,
    #[strum(serialize = "side dish")]
    #[serde(rename = "side dish")]
    SideDish,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn generated_recipe_uses_camel_case() {
        let r: GeneratedRecipe = serde_json::from_str(
            r#"{"title":"Soup","description":"Warm","ingredients":["2 carrots","1 onion"],
                "steps":["chop","boil"],"category":"main dish","estimatedTime":"30 minutes","servings":4}"#,
        )
        .unwrap();
        assert_eq!(r.estimated_time, "30 minutes");
        let v = serde_json::to_value(&r).unwrap();
        assert!(v.get("estimatedTime").is_some());
    }

    #[test]
    fn new_recipe_keeps_list_order() {
        let r = GeneratedRecipe {
            title: "Salad".into(),
            description: "Fresh".into(),
            ingredients: vec!["c".into(), "a".into(), "b".into()],
            steps: vec!["3".into(), "1".into(), "2".into()],
            category: "side dish".into(),
            estimated_time: "10 minutes".into(),
            servings: 2,
        };
        let row = NewRecipe::from(r.clone());
        assert_eq!(row.ingredients, r.ingredients);
        assert_eq!(row.steps, r.steps);
        let v = serde_json::to_value(&row).unwrap();
        assert_eq!(v["estimated_time"], "10 minutes");
        assert!(v.get("image_url").is_none());
    }

    #[test]
    fn categories_round_trip_through_strings() {
        let names: Vec<String> = RecipeCategory::iter().map(|c| c.to_string()).collect();
        assert_eq!(names, ["main dish", "appetizer", "dessert", "side dish"]);
        assert_eq!(
            RecipeCategory::from_str("side dish").unwrap(),
            RecipeCategory::SideDish
        );
        assert!(RecipeCategory::from_str("snack").is_err());
    }
}
