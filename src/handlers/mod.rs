// Resource handlers, one module per collection. Each exposes `routes()`,
// mounted under the API prefix by `app::build_router`.
pub mod categories;
pub mod orders;
pub mod products;
pub mod users;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

/// Delete envelope: 200 when something was removed, 404 otherwise
pub fn deletion(found: bool, label: &str) -> Response {
    if found {
        (
            StatusCode::OK,
            Json(json!({"success": true, "message": format!("The {} is deleted!", label)})),
        )
            .into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({"success": false, "message": format!("The {} was not found", label)})),
        )
            .into_response()
    }
}
