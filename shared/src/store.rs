//! Persistence seams for recipes, favorites, ingredient queries and images.

use async_trait::async_trait;
use uuid::Uuid;

use crate::dto::{
    Favorite, FavoriteWithRecipe, IngredientQuery, NewFavorite, NewIngredientQuery, NewRecipe,
    Recipe,
};
use crate::error::Result;

#[async_trait]
pub trait RecipeStore: Send + Sync {
    /// Insert all rows in one write; either every row is created or none is.
    /// Returned rows follow the input order.
    async fn insert_recipes(&self, recipes: Vec<NewRecipe>) -> Result<Vec<Recipe>>;

    /// All recipes, newest first.
    async fn list_recipes(&self) -> Result<Vec<Recipe>>;

    async fn get_recipe(&self, id: Uuid) -> Result<Option<Recipe>>;

    async fn find_favorite(&self, user_id: Uuid, recipe_id: Uuid) -> Result<Option<Favorite>>;

    async fn insert_favorite(&self, favorite: NewFavorite) -> Result<Favorite>;

    async fn delete_favorite(&self, id: Uuid) -> Result<()>;

    /// The user's favorites with their recipes, newest first. Favorites whose
    /// recipe no longer exists are left out.
    async fn list_favorites(&self, user_id: Uuid) -> Result<Vec<FavoriteWithRecipe>>;

    async fn favorite_recipe_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>>;

    async fn count_favorites(&self, user_id: Uuid) -> Result<u64>;

    async fn insert_ingredient_query(&self, query: NewIngredientQuery) -> Result<IngredientQuery>;

    async fn recent_ingredient_queries(&self, user_id: Uuid, limit: usize)
        -> Result<Vec<IngredientQuery>>;

    async fn count_ingredient_queries(&self, user_id: Uuid) -> Result<u64>;
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Store `bytes` at `path` and return the public URL.
    async fn upload_image(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String>;
}
