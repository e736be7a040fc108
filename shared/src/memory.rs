//! In-process [`RecipeStore`] and [`ImageStore`] for tests.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::dto::{
    Favorite, FavoriteWithRecipe, IngredientQuery, NewFavorite, NewIngredientQuery, NewRecipe,
    Recipe,
};
use crate::error::{AppError, Result};
use crate::store::{ImageStore, RecipeStore};

#[derive(Default)]
struct Tables {
    recipes: Vec<Recipe>,
    favorites: Vec<Favorite>,
    queries: Vec<IngredientQuery>,
    images: HashMap<String, (Vec<u8>, String)>,
    ticks: i64,
}

impl Tables {
    /// Strictly increasing timestamps so "newest first" is deterministic.
    fn now(&mut self) -> chrono::DateTime<Utc> {
        self.ticks += 1;
        Utc::now() + Duration::milliseconds(self.ticks)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose writes all fail with a backend error.
    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_write(&self) -> Result<()> {
        if self.fail_writes {
            Err(AppError::Backend {
                status: 503,
                message: "writes disabled".into(),
            })
        } else {
            Ok(())
        }
    }

    pub fn recipe_count(&self) -> usize {
        self.lock().recipes.len()
    }

    pub fn favorite_count(&self) -> usize {
        self.lock().favorites.len()
    }

    pub fn image(&self, path: &str) -> Option<(Vec<u8>, String)> {
        self.lock().images.get(path).cloned()
    }

    /// Remove a recipe without touching favorites that point at it.
    pub fn drop_recipe(&self, id: Uuid) {
        self.lock().recipes.retain(|r| r.id != id);
    }
}

#[async_trait]
impl RecipeStore for MemoryStore {
    async fn insert_recipes(&self, recipes: Vec<NewRecipe>) -> Result<Vec<Recipe>> {
        self.check_write()?;
        let mut t = self.lock();
        let mut created = Vec::with_capacity(recipes.len());
        for r in recipes {
            let created_at = t.now();
            created.push(Recipe {
                id: Uuid::new_v4(),
                title: r.title,
                description: r.description,
                ingredients: r.ingredients,
                steps: r.steps,
                image_url: r.image_url,
                category: r.category,
                estimated_time: r.estimated_time,
                servings: r.servings,
                created_at,
            });
        }
        t.recipes.extend(created.iter().cloned());
        Ok(created)
    }

    async fn list_recipes(&self) -> Result<Vec<Recipe>> {
        let mut v = self.lock().recipes.clone();
        v.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(v)
    }

    async fn get_recipe(&self, id: Uuid) -> Result<Option<Recipe>> {
        Ok(self.lock().recipes.iter().find(|r| r.id == id).cloned())
    }

    async fn find_favorite(&self, user_id: Uuid, recipe_id: Uuid) -> Result<Option<Favorite>> {
        Ok(self
            .lock()
            .favorites
            .iter()
            .find(|f| f.user_id == user_id && f.recipe_id == recipe_id)
            .cloned())
    }

    async fn insert_favorite(&self, favorite: NewFavorite) -> Result<Favorite> {
        self.check_write()?;
        let mut t = self.lock();
        let created_at = t.now();
        let fav = Favorite {
            id: Uuid::new_v4(),
            user_id: favorite.user_id,
            recipe_id: favorite.recipe_id,
            created_at,
        };
        t.favorites.push(fav.clone());
        Ok(fav)
    }

    async fn delete_favorite(&self, id: Uuid) -> Result<()> {
        self.check_write()?;
        self.lock().favorites.retain(|f| f.id != id);
        Ok(())
    }

    async fn list_favorites(&self, user_id: Uuid) -> Result<Vec<FavoriteWithRecipe>> {
        let t = self.lock();
        let mut v: Vec<FavoriteWithRecipe> = t
            .favorites
            .iter()
            .filter(|f| f.user_id == user_id)
            .filter_map(|f| {
                t.recipes
                    .iter()
                    .find(|r| r.id == f.recipe_id)
                    .map(|r| FavoriteWithRecipe {
                        favorite: f.clone(),
                        recipe: r.clone(),
                    })
            })
            .collect();
        v.sort_by(|a, b| b.favorite.created_at.cmp(&a.favorite.created_at));
        Ok(v)
    }

    async fn favorite_recipe_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(self
            .lock()
            .favorites
            .iter()
            .filter(|f| f.user_id == user_id)
            .map(|f| f.recipe_id)
            .collect())
    }

    async fn count_favorites(&self, user_id: Uuid) -> Result<u64> {
        Ok(self.lock().favorites.iter().filter(|f| f.user_id == user_id).count() as u64)
    }

    async fn insert_ingredient_query(&self, query: NewIngredientQuery) -> Result<IngredientQuery> {
        self.check_write()?;
        let mut t = self.lock();
        let created_at = t.now();
        let row = IngredientQuery {
            id: Uuid::new_v4(),
            user_id: query.user_id,
            image_url: query.image_url,
            recognized_ingredients: query.recognized_ingredients,
            created_at,
        };
        t.queries.push(row.clone());
        Ok(row)
    }

    async fn recent_ingredient_queries(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<IngredientQuery>> {
        let mut v: Vec<IngredientQuery> = self
            .lock()
            .queries
            .iter()
            .filter(|q| q.user_id == user_id)
            .cloned()
            .collect();
        v.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        v.truncate(limit);
        Ok(v)
    }

    async fn count_ingredient_queries(&self, user_id: Uuid) -> Result<u64> {
        Ok(self.lock().queries.iter().filter(|q| q.user_id == user_id).count() as u64)
    }
}

#[async_trait]
impl ImageStore for MemoryStore {
    async fn upload_image(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        self.check_write()?;
        self.lock()
            .images
            .insert(path.to_string(), (bytes, content_type.to_string()));
        Ok(format!("memory://images/{path}"))
    }
}
