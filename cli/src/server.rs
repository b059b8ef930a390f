use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;

use larder_core::db::Database;
use larder_core::models::{
    MealPlan, NewPantryItem, NewRecipe, NewReminder, NewReview, PantryItem, Recipe,
    RecipeWithReviews, Reminder, Review, ShoppingListItem, Suggestion, UpdatePantryItem,
    validate_new_pantry_item, validate_new_recipe, validate_new_reminder, validate_pantry_update,
    validate_rating, validate_week_start,
};
use larder_core::seed::{self, SeedSummary};
use larder_core::service::LarderService;

const BODY_LIMIT: usize = 1024 * 1024; // 1 MiB

#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Database>>,
    api_key: Option<String>,
}

impl AppState {
    fn db(&self) -> MutexGuard<'_, Database> {
        self.db
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct RecipeListQuery {
    #[serde(default)]
    include_reviews: bool,
}

#[derive(Deserialize)]
struct CreateReviewRequest {
    recipe_id: Option<String>,
    rating: u8,
    note: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(anyhow::Error),
}

impl ApiError {
    fn bad_request(err: &anyhow::Error) -> Self {
        Self::BadRequest(format!("{err:#}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal(err) => {
                tracing::error!("internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

fn check_week_start(week_start: &str) -> Result<(), ApiError> {
    validate_week_start(week_start)
        .map(|_| ())
        .map_err(|e| ApiError::bad_request(&e))
}

// --- Middleware ---

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(ref expected_key) = state.api_key {
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected_key);

        if !authorized {
            tracing::debug!(path = %request.uri().path(), "rejected unauthenticated request");
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid or missing API key".to_string(),
                }),
            )
                .into_response();
        }
    }
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Recipe handlers ---

async fn list_recipes(
    State(state): State<AppState>,
    Query(params): Query<RecipeListQuery>,
) -> Result<Response, ApiError> {
    let db = state.db();
    if params.include_reviews {
        let recipes = db
            .list_recipes_with_reviews()
            .context("failed to list recipes")?;
        Ok(Json(recipes).into_response())
    } else {
        let recipes = db.list_recipes().context("failed to list recipes")?;
        Ok(Json(recipes).into_response())
    }
}

async fn create_recipe(
    State(state): State<AppState>,
    Json(mut req): Json<NewRecipe>,
) -> Result<(StatusCode, Json<Recipe>), ApiError> {
    validate_new_recipe(&mut req).map_err(|e| ApiError::bad_request(&e))?;
    let recipe = state
        .db()
        .insert_recipe(&req)
        .context("failed to create recipe")?;
    Ok((StatusCode::CREATED, Json(recipe)))
}

async fn get_recipe(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RecipeWithReviews>, ApiError> {
    state
        .db()
        .get_recipe_with_reviews(&id)
        .context("database error")?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Recipe {id} not found")))
}

async fn update_recipe(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut req): Json<NewRecipe>,
) -> Result<Json<Recipe>, ApiError> {
    validate_new_recipe(&mut req).map_err(|e| ApiError::bad_request(&e))?;
    state
        .db()
        .update_recipe(&id, &req)
        .context("failed to update recipe")?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Recipe {id} not found")))
}

async fn delete_recipe(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state
        .db()
        .delete_recipe(&id)
        .context("failed to delete recipe")?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Recipe {id} not found")))
    }
}

// --- Review handlers ---

async fn list_reviews(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Review>>, ApiError> {
    let db = state.db();
    if db.get_recipe(&id).context("database error")?.is_none() {
        return Err(ApiError::NotFound(format!("Recipe {id} not found")));
    }
    let reviews = db.list_reviews(&id).context("failed to list reviews")?;
    Ok(Json(reviews))
}

async fn create_review(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<Review>), ApiError> {
    if req.recipe_id.as_deref().is_some_and(|body_id| body_id != id) {
        return Err(ApiError::BadRequest(
            "recipe_id in body does not match the URL".to_string(),
        ));
    }
    validate_rating(req.rating).map_err(|e| ApiError::bad_request(&e))?;

    let db = state.db();
    if db.get_recipe(&id).context("database error")?.is_none() {
        return Err(ApiError::NotFound(format!("Recipe {id} not found")));
    }
    let review = db
        .add_review(&NewReview {
            recipe_id: id,
            rating: req.rating,
            note: req.note,
        })
        .context("failed to add review")?;
    Ok((StatusCode::CREATED, Json(review)))
}

// --- Pantry handlers ---

async fn list_pantry(State(state): State<AppState>) -> Result<Json<Vec<PantryItem>>, ApiError> {
    let items = state.db().list_pantry().context("database error")?;
    Ok(Json(items))
}

/// Adds stock, merging into an existing (name, unit) row when there is one.
async fn add_pantry_item(
    State(state): State<AppState>,
    Json(mut req): Json<NewPantryItem>,
) -> Result<Json<PantryItem>, ApiError> {
    validate_new_pantry_item(&mut req).map_err(|e| ApiError::bad_request(&e))?;
    let item = state
        .db()
        .upsert_pantry_item(&req)
        .context("failed to add pantry item")?;
    Ok(Json(item))
}

async fn update_pantry_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdatePantryItem>,
) -> Result<Json<PantryItem>, ApiError> {
    if req.is_empty() {
        return Err(ApiError::BadRequest(
            "Provide quantity and/or unit".to_string(),
        ));
    }
    validate_pantry_update(&req).map_err(|e| ApiError::bad_request(&e))?;
    state
        .db()
        .update_pantry_item(&id, &req)
        .context("failed to update pantry item")?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Pantry item {id} not found")))
}

async fn delete_pantry_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state
        .db()
        .delete_pantry_item(&id)
        .context("failed to delete pantry item")?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Pantry item {id} not found")))
    }
}

// --- Suggestions, plans, and shopping ---

async fn suggest(State(state): State<AppState>) -> Result<Json<Vec<Suggestion>>, ApiError> {
    let db = state.db();
    let suggestions = LarderService::new(&*db)
        .suggest()
        .context("failed to rank recipes")?;
    Ok(Json(suggestions))
}

async fn save_meal_plan(
    State(state): State<AppState>,
    Json(plan): Json<MealPlan>,
) -> Result<Json<MealPlan>, ApiError> {
    check_week_start(&plan.week_start)?;
    let db = state.db();
    let saved = LarderService::new(&*db)
        .save_meal_plan(&plan)
        .context("failed to save meal plan")?;
    Ok(Json(saved))
}

async fn get_meal_plan(
    State(state): State<AppState>,
    Path(week_start): Path<String>,
) -> Result<Json<MealPlan>, ApiError> {
    check_week_start(&week_start)?;
    let db = state.db();
    let plan = LarderService::new(&*db)
        .meal_plan(&week_start)
        .context("failed to load meal plan")?;
    Ok(Json(plan))
}

async fn auto_fill_meal_plan(
    State(state): State<AppState>,
    Path(week_start): Path<String>,
) -> Result<Json<MealPlan>, ApiError> {
    check_week_start(&week_start)?;
    let db = state.db();
    let plan = LarderService::new(&*db)
        .auto_fill_meal_plan(&week_start)
        .context("failed to auto-fill meal plan")?;
    Ok(Json(plan))
}

async fn shopping_list(
    State(state): State<AppState>,
    Path(week_start): Path<String>,
) -> Result<Json<Vec<ShoppingListItem>>, ApiError> {
    check_week_start(&week_start)?;
    let db = state.db();
    let items = LarderService::new(&*db)
        .shopping_list(&week_start)
        .context("failed to build shopping list")?;
    Ok(Json(items))
}

// --- Reminders and seeding ---

async fn list_reminders(State(state): State<AppState>) -> Result<Json<Vec<Reminder>>, ApiError> {
    let reminders = state.db().list_reminders().context("database error")?;
    Ok(Json(reminders))
}

async fn create_reminder(
    State(state): State<AppState>,
    Json(req): Json<NewReminder>,
) -> Result<(StatusCode, Json<Reminder>), ApiError> {
    validate_new_reminder(&req).map_err(|e| ApiError::bad_request(&e))?;
    let reminder = state
        .db()
        .insert_reminder(&req)
        .context("failed to create reminder")?;
    Ok((StatusCode::CREATED, Json(reminder)))
}

async fn delete_reminder(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state
        .db()
        .delete_reminder(&id)
        .context("failed to delete reminder")?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Reminder {id} not found")))
    }
}

async fn seed_recipes(State(state): State<AppState>) -> Result<Json<SeedSummary>, ApiError> {
    let summary = seed::seed_sample_recipes(&state.db()).context("failed to seed recipes")?;
    Ok(Json(summary))
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/recipes", get(list_recipes).post(create_recipe))
        .route(
            "/api/recipes/{id}",
            get(get_recipe).put(update_recipe).delete(delete_recipe),
        )
        .route(
            "/api/recipes/{id}/reviews",
            get(list_reviews).post(create_review),
        )
        .route("/api/pantry", get(list_pantry).post(add_pantry_item))
        .route(
            "/api/pantry/{id}",
            put(update_pantry_item).delete(delete_pantry_item),
        )
        .route("/api/suggest", get(suggest))
        .route("/api/mealplan", post(save_meal_plan))
        .route("/api/mealplan/{week_start}", get(get_meal_plan))
        .route(
            "/api/mealplan/{week_start}/auto-fill",
            post(auto_fill_meal_plan),
        )
        .route("/api/shopping-list/{week_start}", get(shopping_list))
        .route("/api/reminders", get(list_reminders).post(create_reminder))
        .route("/api/reminders/{id}", delete(delete_reminder))
        .route("/api/seed", post(seed_recipes))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

/// First and last four characters of a key; short keys are fully masked.
fn masked_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() < 12 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

pub async fn start_server(
    db: Database,
    port: u16,
    bind: &str,
    api_key: Option<String>,
    new_api_key: bool,
) -> anyhow::Result<()> {
    let state = AppState {
        db: Arc::new(Mutex::new(db)),
        api_key: api_key.clone(),
    };

    let app = build_router(state);

    if let Some(ref key) = api_key {
        let origin = if new_api_key { "newly generated" } else { "existing" };
        eprintln!(
            "API key: {} ({origin}, see api_key file in data directory)",
            masked_key(key)
        );
    } else {
        eprintln!("Warning: Authentication disabled (--no-auth). API is open to anyone.");
    }

    if bind != "127.0.0.1" && bind != "localhost" && api_key.is_none() {
        eprintln!(
            "Warning: Listening on {bind} with no authentication. Any device on your network can access this API."
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;
    eprintln!("Listening on http://{bind}:{port}");
    tracing::info!(bind, port, auth = api_key.is_some(), "server started");
    axum::serve(listener, app).await?;

    Ok(())
}
