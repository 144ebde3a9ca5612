use axum::{
    extract::{DefaultBodyLimit, State},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue,
    },
    middleware::from_fn_with_state,
    response::Json,
    routing::get,
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::auth::{JwtKeys, RoutePolicy};
use crate::config::AppConfig;
use crate::database::{Document, DocumentStore, Repository};
use crate::error::ApiError;
use crate::handlers;
use crate::middleware::{auth_gate, error_policy};
use crate::uploads::UploadStore;

/// Shared, read-only per-process state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DocumentStore>,
    pub uploads: Arc<UploadStore>,
    pub policy: Arc<RoutePolicy>,
    pub keys: Arc<JwtKeys>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn DocumentStore>) -> anyhow::Result<Self> {
        let keys = JwtKeys::new(&config.security.jwt_secret, config.security.jwt_expiry_hours)?;
        let policy = RoutePolicy::load(&config)?;
        tracing::debug!("Route policy has {} exemption rules", policy.len());

        Ok(Self {
            uploads: Arc::new(UploadStore::new(&config.uploads)),
            config: Arc::new(config),
            store,
            policy: Arc::new(policy),
            keys: Arc::new(keys),
        })
    }

    pub fn repo<T: Document>(&self) -> Repository<T> {
        Repository::new(self.store.clone())
    }
}

pub fn build_router(state: AppState) -> Router {
    let config = state.config.clone();

    let api = Router::new()
        .merge(handlers::categories::routes())
        .merge(handlers::products::routes())
        .merge(handlers::orders::routes())
        .merge(handlers::users::routes());

    let router = Router::new()
        .route("/", get(root))
        .route("/health", get(health));

    let router = if config.api.prefix.is_empty() {
        router.merge(api)
    } else {
        router.nest(&config.api.prefix, api)
    };

    let mut router = router
        .nest_service(state.uploads.public_path(), ServeDir::new(state.uploads.dir()))
        .fallback(not_found)
        // Layers run bottom-up: CORS sees the request first, the error
        // policy sees the response first.
        .layer(from_fn_with_state(state.clone(), error_policy))
        .layer(from_fn_with_state(state.clone(), auth_gate))
        .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes));

    if config.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }
    if config.security.enable_cors {
        router = router.layer(cors_layer(&config.security.cors_origins));
    }

    router.with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
}

async fn root(State(state): State<AppState>) -> Json<Value> {
    let prefix = &state.config.api.prefix;

    Json(json!({
        "success": true,
        "data": {
            "name": "Shop API (Rust)",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "E-commerce REST backend built with Rust (Axum)",
            "endpoints": {
                "products": format!("{}/products", prefix),
                "categories": format!("{}/categories", prefix),
                "orders": format!("{}/orders", prefix),
                "users": format!("{}/users", prefix),
                "uploads": state.uploads.public_path(),
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.store.ping().await.map_err(|e| {
        tracing::error!("Health check failed: {}", e);
        ApiError::service_unavailable("Document store unavailable")
    })?;

    Ok(Json(json!({
        "success": true,
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}

async fn not_found() -> ApiError {
    ApiError::not_found("Route not found")
}
