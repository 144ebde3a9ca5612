use axum::{
    extract::{Path, State},
    response::{Json, Response},
    routing::get,
    Router,
};
use serde_json::{json, Value};
use uuid::Uuid;

use super::deletion;
use crate::api::payloads::{CategoryPatch, NewCategory};
use crate::api::{parse_id, ApiResult, ValidJson};
use crate::app::AppState;
use crate::database::models::Category;
use crate::error::ApiError;
use crate::filter::Filter;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list).post(create))
        .route("/categories/get/count", get(count))
        .route("/categories/:id", get(show).put(update).delete(remove))
}

/// GET /categories
async fn list(State(state): State<AppState>) -> ApiResult<Vec<Category>> {
    let categories = state.repo::<Category>().select_any(&Filter::new()).await?;
    Ok(Json(categories))
}

/// GET /categories/:id
async fn show(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Category> {
    let id = parse_id(&id, "Category")?;
    Ok(Json(state.repo::<Category>().select_404(id).await?))
}

/// POST /categories
async fn create(State(state): State<AppState>, ValidJson(payload): ValidJson<NewCategory>) -> ApiResult<Category> {
    let category = Category {
        id: Uuid::new_v4(),
        name: payload.name.trim().to_string(),
        icon: payload.icon,
        color: payload.color,
    };

    state.repo::<Category>().insert(&category).await?;
    tracing::info!("Created category {} ({})", category.name, category.id);
    Ok(Json(category))
}

/// PUT /categories/:id
async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidJson(patch): ValidJson<CategoryPatch>,
) -> ApiResult<Category> {
    let id = parse_id(&id, "Category")?;
    let repo = state.repo::<Category>();

    let mut category = repo.select_404(id).await?;
    patch.apply(&mut category);

    if !repo.update(&category).await? {
        return Err(ApiError::not_found("The category with the given ID was not found"));
    }
    Ok(Json(category))
}

/// DELETE /categories/:id
///
/// Products referencing the category are left as they are.
async fn remove(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response, ApiError> {
    let id = parse_id(&id, "Category")?;
    let found = state.repo::<Category>().delete(id).await?;
    Ok(deletion(found, "category"))
}

/// GET /categories/get/count
async fn count(State(state): State<AppState>) -> ApiResult<Value> {
    let total = state.repo::<Category>().count(&Filter::new()).await?;
    Ok(Json(json!({ "categoryCount": total })))
}
