//! Routes, handlers and shared state of the recipe API.

use axum::{
    body::Bytes,
    extract::{
        rejection::{BytesRejection, JsonRejection},
        DefaultBodyLimit, Path, Query, State,
    },
    http::{header, HeaderMap, StatusCode},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use shared::anthropic_client::{AnthropicClient, LanguageModel};
use shared::catalog::{filter_recipes, save_generated_recipes, RecipeFilter};
use shared::config::Settings;
use shared::detector::IngredientDetector;
use shared::dto::{
    DetectedIngredient, Favorite, FavoriteWithRecipe, GeneratedRecipe, IngredientQuery,
    NewIngredientQuery, Recipe, RecipeCategory, UserStats,
};
use shared::error::AppError;
use shared::favorites::{toggle_favorite, user_stats, FavoriteToggle};
use shared::generator::RecipeGenerator;
use shared::images::{extension_for, photo_path, validate_upload, UploadRejection, MAX_IMAGE_BYTES};
use shared::store::{ImageStore, RecipeStore};
use std::sync::Arc;
use std::time::Duration;
use strum::IntoEnumIterator;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    /// `None` when no usable model API key is configured.
    pub detector: Option<Arc<IngredientDetector>>,
    pub generator: Option<Arc<RecipeGenerator>>,
    pub store: Arc<dyn RecipeStore>,
    pub images: Arc<dyn ImageStore>,
}

impl AppState {
    pub fn new(
        settings: &Settings,
        store: Arc<dyn RecipeStore>,
        images: Arc<dyn ImageStore>,
    ) -> Result<Self, reqwest::Error> {
        let model: Option<Arc<dyn LanguageModel>> = AnthropicClient::from_settings(settings)?
            .map(|c| Arc::new(c) as Arc<dyn LanguageModel>);
        if model.is_none() {
            warn!("ANTHROPIC_API_KEY is not configured; detection and generation are disabled");
        }
        let fetch = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.http_timeout_secs))
            .build()?;
        Ok(Self {
            detector: model
                .clone()
                .map(|m| Arc::new(IngredientDetector::new(fetch, m))),
            generator: model.map(|m| Arc::new(RecipeGenerator::new(m))),
            store,
            images,
        })
    }
}

/// Simple liveness endpoint for orchestration.
async fn health() -> &'static str { "OK" }

/* ---------------- DTOs ---------------- */

#[derive(Serialize, Debug)]
struct ErrorResponse { error: String }

type ApiResult<T> = Result<T, (StatusCode, Json<ErrorResponse>)>;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetectRequest {
    #[serde(default)]
    image_url: Option<String>,
}

#[derive(Serialize)]
struct DetectResponse { ingredients: Vec<DetectedIngredient> }

#[derive(Deserialize)]
struct GenerateRequest {
    #[serde(default)]
    ingredients: Option<Vec<String>>,
}

#[derive(Serialize)]
struct GenerateResponse { recipes: Vec<GeneratedRecipe> }

#[derive(Deserialize)]
struct UploadParams { ext: Option<String> }

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    path: String,
    public_url: String,
}

#[derive(Deserialize)]
struct SaveRecipesRequest {
    #[serde(default)]
    recipes: Vec<GeneratedRecipe>,
}

#[derive(Serialize)]
struct RecipesResponse { recipes: Vec<Recipe> }

#[derive(Serialize)]
struct RecipeResponse { recipe: Recipe }

#[derive(Serialize)]
struct CategoriesResponse { categories: Vec<String> }

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryInput {
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    recognized_ingredients: Vec<String>,
}

#[derive(Serialize)]
struct QueryResponse { query: IngredientQuery }

#[derive(Serialize)]
struct FavoritesResponse { favorites: Vec<FavoriteWithRecipe> }

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FavoriteIdsResponse { recipe_ids: Vec<Uuid> }

#[derive(Serialize)]
struct ToggleResponse {
    favorited: bool,
    favorite: Option<Favorite>,
}

/* ---------------- Adapters ---------------- */

async fn detect_ingredients(
    State(state): State<AppState>,
    body: Result<Json<DetectRequest>, JsonRejection>,
) -> ApiResult<Json<DetectResponse>> {
    let image_url = body
        .ok()
        .and_then(|Json(b)| b.image_url)
        .filter(|u| !u.trim().is_empty());
    let Some(image_url) = image_url else {
        return Err(bad_request("Image URL is required"));
    };
    let Some(detector) = state.detector.as_ref() else {
        return Err(missing_key());
    };
    let ingredients = detector.detect(&image_url).await.map_err(int_err)?;
    Ok(Json(DetectResponse { ingredients }))
}

async fn generate_recipes(
    State(state): State<AppState>,
    body: Result<Json<GenerateRequest>, JsonRejection>,
) -> ApiResult<Json<GenerateResponse>> {
    let ingredients = body
        .ok()
        .and_then(|Json(b)| b.ingredients)
        .filter(|list| !list.is_empty());
    let Some(ingredients) = ingredients else {
        return Err(bad_request("Ingredients array is required"));
    };
    let Some(generator) = state.generator.as_ref() else {
        return Err(missing_key());
    };
    let recipes = generator.generate(&ingredients).await.map_err(int_err)?;
    Ok(Json(GenerateResponse { recipes }))
}

/* ---------------- Images ---------------- */

async fn upload_image(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<Json<UploadResponse>> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let body = match body {
        Ok(body) => body,
        // Bodies past the route limit are never buffered
        Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            let rejection = validate_upload(content_type, usize::MAX)
                .err()
                .unwrap_or(UploadRejection::TooLarge);
            return Err(bad_request(&rejection.to_string()));
        }
        Err(e) => return Err(bad_request(&e.body_text())),
    };
    validate_upload(content_type, body.len()).map_err(|e| bad_request(&e.to_string()))?;
    let content_type = content_type.unwrap_or_default();

    let path = photo_path(&extension_for(params.ext.as_deref(), content_type), Utc::now());
    let public_url = state
        .images
        .upload_image(&path, body.to_vec(), content_type)
        .await
        .map_err(|e| {
            error!(%path, "image upload failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { error: "Failed to upload image".into() }))
        })?;
    info!(%path, "image uploaded");
    Ok(Json(UploadResponse { path, public_url }))
}

/* ---------------- Recipes ---------------- */

async fn save_recipes(
    State(state): State<AppState>,
    body: Result<Json<SaveRecipesRequest>, JsonRejection>,
) -> ApiResult<Json<RecipesResponse>> {
    let Json(input) = body.map_err(|e| bad_request(&e.body_text()))?;
    if input.recipes.is_empty() {
        return Err(bad_request("Recipes array is required"));
    }
    let recipes = save_generated_recipes(state.store.as_ref(), input.recipes)
        .await
        .map_err(app_err)?;
    Ok(Json(RecipesResponse { recipes }))
}

async fn list_recipes(
    State(state): State<AppState>,
    Query(filter): Query<RecipeFilter>,
) -> ApiResult<Json<RecipesResponse>> {
    let all = state.store.list_recipes().await.map_err(app_err)?;
    Ok(Json(RecipesResponse { recipes: filter_recipes(all, &filter) }))
}

async fn get_recipe(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<RecipeResponse>> {
    let Some(recipe) = state.store.get_recipe(id).await.map_err(app_err)? else {
        return Err(not_found());
    };
    Ok(Json(RecipeResponse { recipe }))
}

async fn list_categories() -> Json<CategoriesResponse> {
    Json(CategoriesResponse {
        categories: RecipeCategory::iter().map(|c| c.to_string()).collect(),
    })
}

/* ---------------- Ingredient queries ---------------- */

async fn record_query(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    body: Result<Json<QueryInput>, JsonRejection>,
) -> ApiResult<Json<QueryResponse>> {
    let Json(input) = body.map_err(|e| bad_request(&e.body_text()))?;
    let Some(image_url) = input.image_url.filter(|u| !u.trim().is_empty()) else {
        return Err(bad_request("Image URL is required"));
    };
    let query = state
        .store
        .insert_ingredient_query(NewIngredientQuery {
            user_id,
            image_url,
            recognized_ingredients: input.recognized_ingredients,
        })
        .await
        .map_err(app_err)?;
    Ok(Json(QueryResponse { query }))
}

/* ---------------- Favorites ---------------- */

async fn list_favorites(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<FavoritesResponse>> {
    let favorites = state.store.list_favorites(user_id).await.map_err(app_err)?;
    Ok(Json(FavoritesResponse { favorites }))
}

async fn favorite_ids(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<FavoriteIdsResponse>> {
    let recipe_ids = state.store.favorite_recipe_ids(user_id).await.map_err(app_err)?;
    Ok(Json(FavoriteIdsResponse { recipe_ids }))
}

async fn toggle(
    State(state): State<AppState>,
    Path((user_id, recipe_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<ToggleResponse>> {
    let res = toggle_favorite(state.store.as_ref(), user_id, recipe_id)
        .await
        .map_err(app_err)?;
    Ok(Json(match res {
        FavoriteToggle::Added(favorite) => ToggleResponse { favorited: true, favorite: Some(favorite) },
        FavoriteToggle::Removed => ToggleResponse { favorited: false, favorite: None },
    }))
}

async fn remove_favorite(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.store.delete_favorite(id).await.map_err(app_err)?;
    Ok(StatusCode::NO_CONTENT)
}

/* ---------------- Profile ---------------- */

async fn profile(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<UserStats>> {
    let stats = user_stats(state.store.as_ref(), user_id).await.map_err(app_err)?;
    Ok(Json(stats))
}

/* ---------------- Error helpers ---------------- */

fn int_err<E: std::fmt::Display>(e: E) -> (StatusCode, Json<ErrorResponse>) {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { error: e.to_string() }))
}
fn app_err(e: AppError) -> (StatusCode, Json<ErrorResponse>) {
    match e {
        AppError::NotFound => not_found(),
        other => {
            error!("backend error: {}", other);
            int_err("Internal server error")
        }
    }
}
fn missing_key() -> (StatusCode, Json<ErrorResponse>) {
    int_err("Anthropic API key is not configured")
}
fn bad_request(msg: &str) -> (StatusCode, Json<ErrorResponse>) {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: msg.into() }))
}
fn not_found() -> (StatusCode, Json<ErrorResponse>) {
    (StatusCode::NOT_FOUND, Json(ErrorResponse { error: "Not found".into() }))
}

/* ---------------- Router ---------------- */

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/detect-ingredients", post(detect_ingredients))
        .route("/api/generate-recipes", post(generate_recipes))
        .route(
            "/api/images",
            post(upload_image).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES)),
        )
        .route("/api/recipes", get(list_recipes).post(save_recipes))
        .route("/api/recipes/:id", get(get_recipe))
        .route("/api/categories", get(list_categories))
        .route("/api/users/:user_id/ingredient-queries", post(record_query))
        .route("/api/users/:user_id/favorites", get(list_favorites))
        .route("/api/users/:user_id/favorites/ids", get(favorite_ids))
        .route("/api/users/:user_id/favorites/:recipe_id/toggle", post(toggle))
        .route("/api/users/:user_id/profile", get(profile))
        .route("/api/favorites/:id", delete(remove_favorite))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use httpmock::prelude::*;
    use serde_json::{json, Value};
    use shared::memory::MemoryStore;
    use tower::ServiceExt;

    fn app(settings: &Settings, store: Arc<MemoryStore>) -> Router {
        router(AppState::new(settings, store.clone(), store).unwrap())
    }

    fn model_settings(server: &MockServer) -> Settings {
        Settings {
            anthropic_api_key: "test-key".into(),
            anthropic_api_base: server.base_url(),
            ..Settings::default()
        }
    }

    fn keyless() -> Settings {
        Settings::default()
    }

    async fn call(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = hyper::body::to_bytes(res.into_body()).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn post_empty(uri: &str) -> Request<Body> {
        Request::builder().method("POST").uri(uri).body(Body::empty()).unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn model_reply(text: &str) -> Value {
        json!({"content": [{"type": "text", "text": text}]})
    }

    fn recipes_json() -> Value {
        json!([
            {"title": "Veggie Stir Fry", "description": "Quick weeknight dinner",
             "ingredients": ["1 carrot", "1 red bell pepper", "2 tbsp soy sauce"],
             "steps": ["slice vegetables", "heat the wok", "stir fry", "season"],
             "category": "main dish", "estimatedTime": "20 minutes", "servings": 2},
            {"title": "Carrot Sticks", "description": "Crunchy snack",
             "ingredients": ["2 carrots"], "steps": ["peel", "cut"],
             "category": "appetizer", "estimatedTime": "5 minutes", "servings": 1}
        ])
    }

    #[tokio::test]
    async fn health_ok() {
        let (status, body) = call(app(&keyless(), Arc::new(MemoryStore::new())), get_req("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::String("OK".into()));
    }

    #[tokio::test]
    async fn generate_requires_non_empty_ingredients() {
        let store = Arc::new(MemoryStore::new());
        for body in [json!({"ingredients": []}), json!({}), json!({"ingredients": "egg"})] {
            let (status, resp) = call(app(&keyless(), store.clone()), post_json("/api/generate-recipes", body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(resp, json!({"error": "Ingredients array is required"}));
        }
    }

    #[tokio::test]
    async fn detect_requires_image_url_before_key() {
        let store = Arc::new(MemoryStore::new());
        let (status, resp) = call(app(&keyless(), store.clone()), post_json("/api/detect-ingredients", json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp, json!({"error": "Image URL is required"}));

        let bad = Request::builder()
            .method("POST")
            .uri("/api/detect-ingredients")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, _) = call(app(&keyless(), store), bad).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn adapters_report_missing_key() {
        let store = Arc::new(MemoryStore::new());
        let (status, resp) = call(
            app(&keyless(), store.clone()),
            post_json("/api/detect-ingredients", json!({"imageUrl": "https://x/y.jpg"})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp, json!({"error": "Anthropic API key is not configured"}));

        let placeholder = Settings {
            anthropic_api_key: shared::config::PLACEHOLDER_API_KEY.into(),
            ..Settings::default()
        };
        let (status, _) = call(
            app(&placeholder, store),
            post_json("/api/generate-recipes", json!({"ingredients": ["egg"]})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn unreachable_image_is_a_generic_detection_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/404.jpg");
                then.status(404);
            })
            .await;
        let (status, resp) = call(
            app(&model_settings(&server), Arc::new(MemoryStore::new())),
            post_json("/api/detect-ingredients", json!({"imageUrl": server.url("/404.jpg")})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp, json!({"error": "Failed to detect ingredients"}));
    }

    #[tokio::test]
    async fn detect_returns_confident_ingredients() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/fridge.webp");
                then.status(200).header("content-type", "image/webp").body(b"webp");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/messages").body_contains("image/webp");
                then.status(200).json_body(model_reply(
                    r#"[{"name": "broccoli", "confidence": 0.92}, {"name": "plate", "confidence": 0.1}]"#,
                ));
            })
            .await;

        let (status, resp) = call(
            app(&model_settings(&server), Arc::new(MemoryStore::new())),
            post_json("/api/detect-ingredients", json!({"imageUrl": server.url("/fridge.webp")})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp, json!({"ingredients": [{"name": "broccoli", "confidence": 0.92}]}));
    }

    #[tokio::test]
    async fn generate_save_and_fetch_keeps_order() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/messages");
                then.status(200)
                    .json_body(model_reply(&format!("Here you go!\n{}", recipes_json())));
            })
            .await;
        let store = Arc::new(MemoryStore::new());
        let settings = model_settings(&server);

        let (status, generated) = call(
            app(&settings, store.clone()),
            post_json("/api/generate-recipes", json!({"ingredients": ["carrot", "bell pepper"]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(generated["recipes"], recipes_json());

        let (status, saved) = call(
            app(&settings, store.clone()),
            post_json("/api/recipes", json!({"recipes": generated["recipes"]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(store.recipe_count(), 2);
        let id = saved["recipes"][0]["id"].as_str().unwrap().to_string();

        let (status, fetched) = call(app(&settings, store), get_req(&format!("/api/recipes/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["recipe"]["title"], "Veggie Stir Fry");
        assert_eq!(fetched["recipe"]["estimated_time"], "20 minutes");
        assert_eq!(
            fetched["recipe"]["steps"],
            json!(["slice vegetables", "heat the wok", "stir fry", "season"])
        );
        assert_eq!(fetched["recipe"]["ingredients"], recipes_json()[0]["ingredients"]);
    }

    #[tokio::test]
    async fn failed_save_persists_nothing() {
        let store = Arc::new(MemoryStore::failing_writes());
        let (status, resp) = call(
            app(&keyless(), store.clone()),
            post_json("/api/recipes", json!({"recipes": recipes_json()})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp, json!({"error": "Internal server error"}));
        assert_eq!(store.recipe_count(), 0);
    }

    #[tokio::test]
    async fn backend_failures_are_not_echoed() {
        let store = Arc::new(MemoryStore::failing_writes());
        let user = Uuid::new_v4();
        let (status, resp) = call(
            app(&keyless(), store),
            post_json(
                &format!("/api/users/{user}/ingredient-queries"),
                json!({"imageUrl": "https://cdn/x.jpg", "recognizedIngredients": []}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!resp.to_string().contains("writes disabled"));
        assert_eq!(resp, json!({"error": "Internal server error"}));
    }

    #[tokio::test]
    async fn save_rejects_empty_batch() {
        let (status, resp) = call(
            app(&keyless(), Arc::new(MemoryStore::new())),
            post_json("/api/recipes", json!({"recipes": []})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp, json!({"error": "Recipes array is required"}));
    }

    #[tokio::test]
    async fn list_recipes_filters_by_search_and_category() {
        let store = Arc::new(MemoryStore::new());
        let recipes: Vec<GeneratedRecipe> = serde_json::from_value(recipes_json()).unwrap();
        save_generated_recipes(store.as_ref(), recipes).await.unwrap();

        let (_, all) = call(app(&keyless(), store.clone()), get_req("/api/recipes")).await;
        assert_eq!(all["recipes"].as_array().unwrap().len(), 2);
        // newest first
        assert_eq!(all["recipes"][0]["title"], "Carrot Sticks");

        let (_, hits) = call(app(&keyless(), store.clone()), get_req("/api/recipes?search=SOY")).await;
        assert_eq!(hits["recipes"].as_array().unwrap().len(), 1);
        assert_eq!(hits["recipes"][0]["title"], "Veggie Stir Fry");

        let (_, apps) = call(
            app(&keyless(), store.clone()),
            get_req("/api/recipes?search=carrot&category=appetizer"),
        )
        .await;
        assert_eq!(apps["recipes"].as_array().unwrap().len(), 1);
        assert_eq!(apps["recipes"][0]["title"], "Carrot Sticks");

        let (_, every) = call(app(&keyless(), store), get_req("/api/recipes?category=all")).await;
        assert_eq!(every["recipes"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn toggling_favorite_twice_restores_state() {
        let store = Arc::new(MemoryStore::new());
        let recipes: Vec<GeneratedRecipe> = serde_json::from_value(recipes_json()).unwrap();
        let saved = save_generated_recipes(store.as_ref(), recipes).await.unwrap();
        let user = Uuid::new_v4();
        let uri = format!("/api/users/{user}/favorites/{}/toggle", saved[0].id);

        let (status, first) = call(app(&keyless(), store.clone()), post_empty(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["favorited"], true);
        assert_eq!(first["favorite"]["recipe_id"], saved[0].id.to_string());

        let (_, listed) = call(app(&keyless(), store.clone()), get_req(&format!("/api/users/{user}/favorites"))).await;
        assert_eq!(listed["favorites"][0]["recipe"]["title"], "Veggie Stir Fry");

        let (_, second) = call(app(&keyless(), store.clone()), post_empty(&uri)).await;
        assert_eq!(second, json!({"favorited": false, "favorite": null}));

        let (_, ids) = call(app(&keyless(), store), get_req(&format!("/api/users/{user}/favorites/ids"))).await;
        assert_eq!(ids, json!({"recipeIds": []}));
    }

    #[tokio::test]
    async fn toggling_unknown_recipe_is_404() {
        let uri = format!("/api/users/{}/favorites/{}/toggle", Uuid::new_v4(), Uuid::new_v4());
        let (status, _) = call(app(&keyless(), Arc::new(MemoryStore::new())), post_empty(&uri)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn removing_favorite_by_id() {
        let store = Arc::new(MemoryStore::new());
        let recipes: Vec<GeneratedRecipe> = serde_json::from_value(recipes_json()).unwrap();
        let saved = save_generated_recipes(store.as_ref(), recipes).await.unwrap();
        let user = Uuid::new_v4();
        let FavoriteToggle::Added(fav) = toggle_favorite(store.as_ref(), user, saved[1].id).await.unwrap() else {
            panic!("expected a new favorite");
        };

        let req = Request::builder()
            .method("DELETE")
            .uri(format!("/api/favorites/{}", fav.id))
            .body(Body::empty())
            .unwrap();
        let (status, _) = call(app(&keyless(), store.clone()), req).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(store.favorite_count(), 0);
    }

    #[tokio::test]
    async fn upload_validates_and_stores_image() {
        let store = Arc::new(MemoryStore::new());
        let text = Request::builder()
            .method("POST")
            .uri("/api/images")
            .header("content-type", "text/plain")
            .body(Body::from("hello"))
            .unwrap();
        let (status, resp) = call(app(&keyless(), store.clone()), text).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp, json!({"error": "Please select an image file"}));

        let png = Request::builder()
            .method("POST")
            .uri("/api/images?ext=png")
            .header("content-type", "image/png")
            .body(Body::from(&b"\x89PNG"[..]))
            .unwrap();
        let (status, resp) = call(app(&keyless(), store.clone()), png).await;
        assert_eq!(status, StatusCode::OK);
        let path = resp["path"].as_str().unwrap();
        assert!(path.starts_with("ingredient-photos/") && path.ends_with(".png"));
        assert_eq!(resp["publicUrl"], format!("memory://images/{path}"));
        let (bytes, content_type) = store.image(path).unwrap();
        assert_eq!(bytes, b"\x89PNG");
        assert_eq!(content_type, "image/png");
    }

    fn png_upload(len: usize) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/images")
            .header("content-type", "image/png")
            .body(Body::from(vec![7u8; len]))
            .unwrap()
    }

    #[tokio::test]
    async fn oversized_upload_is_a_json_400() {
        let store = Arc::new(MemoryStore::new());
        let (status, resp) = call(app(&keyless(), store.clone()), png_upload(MAX_IMAGE_BYTES + 1)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp, json!({"error": "Image size must be less than 10MB"}));

        let text = Request::builder()
            .method("POST")
            .uri("/api/images")
            .header("content-type", "text/plain")
            .body(Body::from(vec![b'a'; MAX_IMAGE_BYTES + 1]))
            .unwrap();
        let (status, resp) = call(app(&keyless(), store), text).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp, json!({"error": "Please select an image file"}));
    }

    #[tokio::test]
    async fn upload_at_the_size_limit_is_accepted() {
        let store = Arc::new(MemoryStore::new());
        let (status, resp) = call(app(&keyless(), store.clone()), png_upload(MAX_IMAGE_BYTES)).await;
        assert_eq!(status, StatusCode::OK);
        let (bytes, _) = store.image(resp["path"].as_str().unwrap()).unwrap();
        assert_eq!(bytes.len(), MAX_IMAGE_BYTES);
    }

    #[tokio::test]
    async fn image_fetch_honors_configured_timeout() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/slow.jpg");
                then.status(200)
                    .header("content-type", "image/jpeg")
                    .delay(Duration::from_secs(3))
                    .body(b"jpg");
            })
            .await;
        let model = server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/messages");
                then.status(200).json_body(model_reply("[]"));
            })
            .await;
        let settings = Settings { http_timeout_secs: 1, ..model_settings(&server) };

        let (status, resp) = call(
            app(&settings, Arc::new(MemoryStore::new())),
            post_json("/api/detect-ingredients", json!({"imageUrl": server.url("/slow.jpg")})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp, json!({"error": "Failed to detect ingredients"}));
        assert_eq!(model.hits_async().await, 0);
    }

    #[tokio::test]
    async fn queries_feed_the_profile() {
        let store = Arc::new(MemoryStore::new());
        let user = Uuid::new_v4();
        let (status, resp) = call(
            app(&keyless(), store.clone()),
            post_json(
                &format!("/api/users/{user}/ingredient-queries"),
                json!({"imageUrl": "https://cdn/x.jpg", "recognizedIngredients": ["egg", "leek"]}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp["query"]["recognized_ingredients"], json!(["egg", "leek"]));

        let (status, _) = call(
            app(&keyless(), store.clone()),
            post_json(&format!("/api/users/{user}/ingredient-queries"), json!({"recognizedIngredients": []})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, stats) = call(app(&keyless(), store), get_req(&format!("/api/users/{user}/profile"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["totalQueries"], 1);
        assert_eq!(stats["totalFavorites"], 0);
        assert_eq!(stats["recentQueries"][0]["image_url"], "https://cdn/x.jpg");
    }

    #[tokio::test]
    async fn categories_are_listed() {
        let (_, resp) = call(app(&keyless(), Arc::new(MemoryStore::new())), get_req("/api/categories")).await;
        assert_eq!(
            resp,
            json!({"categories": ["main dish", "appetizer", "dessert", "side dish"]})
        );
    }
}
