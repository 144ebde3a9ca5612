use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::{self, AuthError, Claims, JwtKeys};
use crate::error::ApiError;

/// Authenticated user context extracted from JWT
#[derive(Clone, Debug, PartialEq)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub is_admin: bool,
}

impl TryFrom<Claims> for AuthUser {
    type Error = AuthError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: claims.user_id()?,
            is_admin: claims.is_admin,
        })
    }
}

/// Handlers behind the gate read the user placed there by `auth_gate`
#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(ApiError::unauthorized)
    }
}

/// Authentication gate: exempt routes pass untouched, everything else needs
/// a valid bearer token or is answered with 401 before reaching a handler.
pub async fn auth_gate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    if state.policy.is_exempt(request.method(), request.uri().path()) {
        return next.run(request).await;
    }

    match authenticate(&state.keys, request.headers()) {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => {
            tracing::debug!("Rejected {} {}: {}", request.method(), request.uri().path(), e);
            ApiError::unauthorized().into_response()
        }
    }
}

fn authenticate(keys: &JwtKeys, headers: &HeaderMap) -> Result<AuthUser, AuthError> {
    let token = auth::extract_bearer(headers)?;
    AuthUser::try_from(keys.verify(token)?)
}
