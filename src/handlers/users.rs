use axum::{
    extract::{Path, State},
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::deletion;
use crate::api::payloads::{Login, NewUser, UserPatch};
use crate::api::views::UserView;
use crate::api::{parse_id, ApiResult, ValidJson};
use crate::app::AppState;
use crate::auth;
use crate::database::models::user::normalize_email;
use crate::database::models::User;
use crate::database::DatabaseError;
use crate::error::ApiError;
use crate::filter::Filter;
use crate::middleware::AuthUser;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list).post(create))
        .route("/users/login", post(login))
        .route("/users/register", post(register))
        .route("/users/get/count", get(count))
        .route("/users/:id", get(show).put(update).delete(remove))
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: String,
    pub token: String,
}

fn email_conflict(err: DatabaseError) -> ApiError {
    match err {
        DatabaseError::Conflict(_) => ApiError::conflict("A user with this email already exists"),
        other => other.into(),
    }
}

async fn insert_user(state: &AppState, payload: NewUser, is_admin: bool) -> Result<User, ApiError> {
    let password_hash = auth::hash_password(payload.password, state.config.security.bcrypt_cost).await?;

    let user = User {
        id: Uuid::new_v4(),
        name: payload.name.trim().to_string(),
        email: normalize_email(&payload.email),
        password_hash,
        phone: payload.phone,
        is_admin,
        street: payload.street,
        apartment: payload.apartment,
        zip: payload.zip,
        city: payload.city,
        country: payload.country,
    };

    state.repo::<User>().insert(&user).await.map_err(email_conflict)?;
    tracing::info!("Created user {} ({}), admin={}", user.email, user.id, user.is_admin);
    Ok(user)
}

/// GET /users
async fn list(State(state): State<AppState>) -> ApiResult<Vec<UserView>> {
    let users = state.repo::<User>().select_any(&Filter::new()).await?;
    Ok(Json(users.into_iter().map(UserView::from).collect()))
}

/// GET /users/:id
async fn show(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<UserView> {
    let id = parse_id(&id, "User")?;
    let user = state.repo::<User>().select_404(id).await?;
    Ok(Json(user.into()))
}

/// Granting or revoking the admin flag needs an administrator's token
fn require_admin(auth: &AuthUser) -> Result<(), ApiError> {
    if auth.is_admin {
        Ok(())
    } else {
        tracing::debug!("User {} is not allowed to change admin rights", auth.user_id);
        Err(ApiError::unauthorized())
    }
}

/// POST /users (authenticated; administrators may create administrators)
async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidJson(payload): ValidJson<NewUser>,
) -> ApiResult<UserView> {
    let is_admin = payload.is_admin;
    if is_admin {
        require_admin(&auth)?;
    }
    let user = insert_user(&state, payload, is_admin).await?;
    Ok(Json(user.into()))
}

/// POST /users/register (public; always a standard user)
async fn register(State(state): State<AppState>, ValidJson(payload): ValidJson<NewUser>) -> ApiResult<UserView> {
    if payload.is_admin {
        tracing::debug!("Ignoring isAdmin on public registration for {}", payload.email);
    }
    let user = insert_user(&state, payload, false).await?;
    Ok(Json(user.into()))
}

/// PUT /users/:id
async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    ValidJson(mut patch): ValidJson<UserPatch>,
) -> ApiResult<UserView> {
    let id = parse_id(&id, "User")?;
    let repo = state.repo::<User>();
    let mut user = repo.select_404(id).await?;

    if patch.is_admin.is_some_and(|flag| flag != user.is_admin) {
        require_admin(&auth)?;
    }

    patch.apply_profile(&mut user);
    if let Some(email) = patch.email.take() {
        user.email = normalize_email(&email);
    }
    if let Some(password) = patch.password.take() {
        user.password_hash = auth::hash_password(password, state.config.security.bcrypt_cost).await?;
    }

    if !repo.update(&user).await.map_err(email_conflict)? {
        return Err(ApiError::not_found("The user with the given ID was not found"));
    }
    Ok(Json(user.into()))
}

/// DELETE /users/:id
async fn remove(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response, ApiError> {
    let id = parse_id(&id, "User")?;
    let found = state.repo::<User>().delete(id).await?;
    Ok(deletion(found, "user"))
}

/// POST /users/login
async fn login(State(state): State<AppState>, ValidJson(payload): ValidJson<Login>) -> ApiResult<LoginResponse> {
    let email = normalize_email(&payload.email);
    let user = state
        .repo::<User>()
        .select_one(Filter::new().eq("email", email.clone()))
        .await?
        .ok_or_else(|| ApiError::bad_request("The user not found"))?;

    if !auth::verify_password(payload.password, user.password_hash.clone()).await? {
        tracing::debug!("Wrong password for {}", email);
        return Err(ApiError::bad_request("Password is wrong"));
    }

    let token = state.keys.issue(user.id, user.is_admin)?;
    Ok(Json(LoginResponse { user: user.email, token }))
}

/// GET /users/get/count
async fn count(State(state): State<AppState>) -> ApiResult<Value> {
    let total = state.repo::<User>().count(&Filter::new()).await?;
    Ok(Json(json!({ "userCount": total })))
}
