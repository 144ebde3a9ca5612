// Request boundary: typed payloads in, views out
pub mod extract;
pub mod payloads;
pub mod views;

use axum::Json;

use crate::error::ApiError;

pub use extract::{parse_id, RequestOrigin, ValidJson};
pub use payloads::{FieldErrors, Validate};

pub type ApiResult<T> = Result<Json<T>, ApiError>;
