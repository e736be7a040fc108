//! Favorites and per-user profile figures.

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::dto::{Favorite, NewFavorite, UserStats};
use crate::error::{AppError, Result};
use crate::store::RecipeStore;

/// Number of recent ingredient queries shown on a profile.
pub const RECENT_QUERY_LIMIT: usize = 5;

/// Outcome of [`toggle_favorite`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "favorite", rename_all = "lowercase")]
pub enum FavoriteToggle {
    Added(Favorite),
    Removed,
}

impl FavoriteToggle {
    pub fn is_favorited(&self) -> bool {
        matches!(self, FavoriteToggle::Added(_))
    }
}

/// Flip whether `user_id` has favorited the recipe with id `recipe_id`.
pub async fn toggle_favorite(
    store: &dyn RecipeStore,
    user_id: Uuid,
    recipe_id: Uuid,
) -> Result<FavoriteToggle> {
    if store.get_recipe(recipe_id).await?.is_none() {
        return Err(AppError::NotFound);
    }
    match store.find_favorite(user_id, recipe_id).await? {
        Some(existing) => {
            store.delete_favorite(existing.id).await?;
            info!(%user_id, %recipe_id, "removed from favorites");
            Ok(FavoriteToggle::Removed)
        }
        None => {
            let fav = store
                .insert_favorite(NewFavorite { user_id, recipe_id })
                .await?;
            info!(%user_id, %recipe_id, "added to favorites");
            Ok(FavoriteToggle::Added(fav))
        }
    }
}

pub async fn user_stats(store: &dyn RecipeStore, user_id: Uuid) -> Result<UserStats> {
    let total_queries = store.count_ingredient_queries(user_id).await?;
    let total_favorites = store.count_favorites(user_id).await?;
    let recent_queries = store
        .recent_ingredient_queries(user_id, RECENT_QUERY_LIMIT)
        .await?;
    Ok(UserStats {
        total_queries,
        total_favorites,
        recent_queries,
    })
}
