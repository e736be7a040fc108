//! Recipe suggestions for a list of ingredients via a hosted text model.

use std::sync::Arc;
use tracing::{error, info};

use crate::anthropic_client::{ContentBlock, LanguageModel};
use crate::dto::GeneratedRecipe;
use crate::reply::decode_array;

const MAX_TOKENS: u32 = 1500;

const SYSTEM_PROMPT: &str = "You are a helpful chef assistant. Generate creative and practical recipes using the provided ingredients.
Assume basic pantry staples are available: salt, pepper, oil, water, common spices.
Return exactly 3 different recipe suggestions as a JSON array.";

const RECIPE_FORMAT: &str = r#"Return a JSON array with this exact format:
[
  {
    "title": "Recipe Name",
    "description": "Brief description",
    "ingredients": ["ingredient with quantity", "..."],
    "steps": ["step 1", "step 2", "..."],
    "category": "main dish|appetizer|dessert|side dish",
    "estimatedTime": "30 minutes",
    "servings": 4
  }
]"#;

#[derive(thiserror::Error, Debug)]
pub enum GenerationError {
    #[error("Failed to generate recipes")]
    Failed,
}

/// The user turn sent to the model for `ingredients`.
pub fn user_prompt(ingredients: &[String]) -> String {
    format!(
        "Create recipes using these ingredients: {}\n\n{}",
        ingredients.join(", "),
        RECIPE_FORMAT
    )
}

pub struct RecipeGenerator {
    model: Arc<dyn LanguageModel>,
}

impl RecipeGenerator {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Ask the model for recipes that use `ingredients`.
    ///
    /// The reply is decoded as-is; the number of recipes returned is not checked.
    pub async fn generate(&self, ingredients: &[String]) -> Result<Vec<GeneratedRecipe>, GenerationError> {
        let content = vec![ContentBlock::text(user_prompt(ingredients))];
        let reply = match self.model.complete(Some(SYSTEM_PROMPT), content, MAX_TOKENS).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("error generating recipes: {e}");
                return Err(GenerationError::Failed);
            }
        };
        match decode_array::<GeneratedRecipe>(&reply) {
            Ok(recipes) => {
                info!(count = recipes.len(), "recipes generated");
                Ok(recipes)
            }
            Err(e) => {
                error!("error generating recipes: {e}");
                Err(GenerationError::Failed)
            }
        }
    }
}
