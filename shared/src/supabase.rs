//! Data access against the hosted backend: PostgREST tables and object storage.

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::Settings;
use crate::dto::{
    Favorite, FavoriteWithRecipe, IngredientQuery, NewFavorite, NewIngredientQuery, NewRecipe,
    Recipe,
};
use crate::error::{AppError, Result};
use crate::store::{ImageStore, RecipeStore};

const RECIPES: &str = "recipes";
const FAVORITES: &str = "favorites";
const INGREDIENT_QUERIES: &str = "ingredient_queries";

/// Storage bucket as reported by the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct Bucket {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub public: bool,
}

/// Entry of a storage listing.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageObject {
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Deserialize)]
struct FavoriteRow {
    #[serde(flatten)]
    favorite: Favorite,
    recipe: Option<Recipe>,
}

#[derive(Deserialize)]
struct RecipeIdRow {
    recipe_id: Uuid,
}

#[derive(Serialize)]
struct ListObjectsRequest<'a> {
    prefix: &'a str,
    limit: u32,
    offset: u32,
}

#[derive(Clone)]
pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    bucket: String,
}

impl SupabaseClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        anon_key: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            bucket: bucket.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.http_timeout_secs))
            .build()?;
        Ok(Self::new(
            http,
            settings.supabase_url.clone(),
            settings.supabase_anon_key.clone(),
            settings.storage_bucket.clone(),
        ))
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn rest(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn storage(&self, tail: &str) -> String {
        format!("{}/storage/v1/{}", self.base_url, tail)
    }

    fn authed(&self, rb: RequestBuilder) -> RequestBuilder {
        rb.header("apikey", &self.anon_key).bearer_auth(&self.anon_key)
    }

    /// Public URL of an object in the configured bucket.
    pub fn public_url(&self, path: &str) -> String {
        self.storage(&format!("object/public/{}/{}", self.bucket, path))
    }

    async fn send(&self, rb: RequestBuilder) -> Result<Response> {
        let res = self.authed(rb).send().await?;
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }
        let body = res.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
            .unwrap_or(body);
        warn!(status = %status, "backend request failed: {message}");
        Err(AppError::Backend {
            status: status.as_u16(),
            message,
        })
    }

    async fn fetch<T: DeserializeOwned>(&self, rb: RequestBuilder) -> Result<T> {
        let res = self.send(rb).await?;
        let bytes = res.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| AppError::Decode(e.to_string()))
    }

    /// Insert rows and return their representation.
    async fn insert<B: Serialize + ?Sized, T: DeserializeOwned>(&self, table: &str, body: &B) -> Result<Vec<T>> {
        self.fetch(
            self.http
                .post(self.rest(table))
                .header("Prefer", "return=representation")
                .json(body),
        )
        .await
    }

    async fn count(&self, table: &str, user_id: Uuid) -> Result<u64> {
        let res = self
            .send(
                self.http
                    .get(self.rest(table))
                    .header("Prefer", "count=exact")
                    .query(&[
                        ("select", "id".to_string()),
                        ("user_id", format!("eq.{user_id}")),
                        ("limit", "1".to_string()),
                    ]),
            )
            .await?;
        let range = res
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        parse_content_range_total(range)
            .ok_or_else(|| AppError::Decode(format!("missing count in content-range {range:?}")))
    }

    pub async fn list_buckets(&self) -> Result<Vec<Bucket>> {
        self.fetch(self.http.get(self.storage("bucket"))).await
    }

    pub async fn list_objects(&self, prefix: &str) -> Result<Vec<StorageObject>> {
        let url = self.storage(&format!("object/list/{}", self.bucket));
        self.fetch(self.http.post(url).json(&ListObjectsRequest {
            prefix,
            limit: 100,
            offset: 0,
        }))
        .await
    }

    pub async fn upload_object(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let url = self.storage(&format!("object/{}/{}", self.bucket, path));
        debug!(%path, size = bytes.len(), "uploading object");
        self.send(
            self.http
                .post(url)
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(bytes),
        )
        .await?;
        Ok(())
    }

    pub async fn remove_objects(&self, paths: &[String]) -> Result<()> {
        let url = self.storage(&format!("object/{}", self.bucket));
        self.send(self.http.delete(url).json(&json!({ "prefixes": paths })))
            .await?;
        Ok(())
    }
}

/// Total from a PostgREST `Content-Range` header such as `0-0/42` or `*/0`.
fn parse_content_range_total(range: &str) -> Option<u64> {
    range.rsplit_once('/')?.1.trim().parse().ok()
}

#[async_trait]
impl RecipeStore for SupabaseClient {
    async fn insert_recipes(&self, recipes: Vec<NewRecipe>) -> Result<Vec<Recipe>> {
        if recipes.is_empty() {
            return Ok(Vec::new());
        }
        self.insert(RECIPES, &recipes).await
    }

    async fn list_recipes(&self) -> Result<Vec<Recipe>> {
        self.fetch(
            self.http
                .get(self.rest(RECIPES))
                .query(&[("select", "*"), ("order", "created_at.desc")]),
        )
        .await
    }

    async fn get_recipe(&self, id: Uuid) -> Result<Option<Recipe>> {
        let rows: Vec<Recipe> = self
            .fetch(
                self.http
                    .get(self.rest(RECIPES))
                    .query(&[("select", "*".to_string()), ("id", format!("eq.{id}"))]),
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn find_favorite(&self, user_id: Uuid, recipe_id: Uuid) -> Result<Option<Favorite>> {
        let rows: Vec<Favorite> = self
            .fetch(self.http.get(self.rest(FAVORITES)).query(&[
                ("select", "*".to_string()),
                ("user_id", format!("eq.{user_id}")),
                ("recipe_id", format!("eq.{recipe_id}")),
                ("limit", "1".to_string()),
            ]))
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_favorite(&self, favorite: NewFavorite) -> Result<Favorite> {
        let rows: Vec<Favorite> = self.insert(FAVORITES, &favorite).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| AppError::Decode("insert returned no favorite".into()))
    }

    async fn delete_favorite(&self, id: Uuid) -> Result<()> {
        self.send(
            self.http
                .delete(self.rest(FAVORITES))
                .query(&[("id", format!("eq.{id}"))]),
        )
        .await?;
        Ok(())
    }

    async fn list_favorites(&self, user_id: Uuid) -> Result<Vec<FavoriteWithRecipe>> {
        let rows: Vec<FavoriteRow> = self
            .fetch(self.http.get(self.rest(FAVORITES)).query(&[
                ("select", "*,recipe:recipes(*)".to_string()),
                ("user_id", format!("eq.{user_id}")),
                ("order", "created_at.desc".to_string()),
            ]))
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                row.recipe.map(|recipe| FavoriteWithRecipe {
                    favorite: row.favorite,
                    recipe,
                })
            })
            .collect())
    }

    async fn favorite_recipe_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        let rows: Vec<RecipeIdRow> = self
            .fetch(self.http.get(self.rest(FAVORITES)).query(&[
                ("select", "recipe_id".to_string()),
                ("user_id", format!("eq.{user_id}")),
            ]))
            .await?;
        Ok(rows.into_iter().map(|r| r.recipe_id).collect())
    }

    async fn count_favorites(&self, user_id: Uuid) -> Result<u64> {
        self.count(FAVORITES, user_id).await
    }

    async fn insert_ingredient_query(&self, query: NewIngredientQuery) -> Result<IngredientQuery> {
        let rows: Vec<IngredientQuery> = self.insert(INGREDIENT_QUERIES, &query).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| AppError::Decode("insert returned no ingredient query".into()))
    }

    async fn recent_ingredient_queries(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<IngredientQuery>> {
        self.fetch(self.http.get(self.rest(INGREDIENT_QUERIES)).query(&[
            ("select", "*".to_string()),
            ("user_id", format!("eq.{user_id}")),
            ("order", "created_at.desc".to_string()),
            ("limit", limit.to_string()),
        ]))
        .await
    }

    async fn count_ingredient_queries(&self, user_id: Uuid) -> Result<u64> {
        self.count(INGREDIENT_QUERIES, user_id).await
    }
}

#[async_trait]
impl ImageStore for SupabaseClient {
    async fn upload_image(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        self.upload_object(path, bytes, content_type).await?;
        Ok(self.public_url(path))
    }
}
