use axum::{
    extract::{Request, State},
    http::{
        header::{CONTENT_LENGTH, CONTENT_TYPE},
        StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::app::AppState;
use crate::error::{validation_status_code, ValidationFailure};

/// Last step of error shaping: applies the configured status to validation
/// failures and gives bodiless framework errors (405, static 404) the JSON
/// envelope every other error carries.
pub async fn error_policy(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let status = response.status();

    if response.extensions().get::<ValidationFailure>().is_some() {
        *response.status_mut() = validation_status_code(state.config.api.validation_status);
        return response;
    }

    if (status.is_client_error() || status.is_server_error()) && !response.headers().contains_key(CONTENT_TYPE) {
        let mut shaped = (status, Json(bare_error_body(status))).into_response();
        for (name, value) in response.headers() {
            if name != CONTENT_LENGTH && !shaped.headers().contains_key(name) {
                shaped.headers_mut().insert(name.clone(), value.clone());
            }
        }
        return shaped;
    }

    response
}

fn bare_error_body(status: StatusCode) -> serde_json::Value {
    let reason = status.canonical_reason().unwrap_or("Error");
    json!({
        "success": false,
        "message": reason,
        "code": reason.to_ascii_uppercase().replace(' ', "_"),
    })
}
