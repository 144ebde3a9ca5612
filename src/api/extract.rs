use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Request},
    http::{header::HOST, request::Parts},
    Json,
};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::payloads::Validate;
use crate::error::ApiError;

/// JSON body that must deserialize into `T` and pass `T::validate`
#[derive(Debug)]
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::validation_error(rejection.body_text(), None))?;

        value
            .validate()
            .map_err(|errors| ApiError::validation_error("Invalid request payload", Some(errors)))?;

        Ok(Self(value))
    }
}

/// Scheme and host the client used to reach us
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOrigin {
    pub scheme: String,
    pub host: String,
}

impl RequestOrigin {
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.scheme, self.host)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestOrigin
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let scheme = parts
            .headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| v == "http" || v == "https")
            .unwrap_or_else(|| "http".to_string());

        let host = parts
            .headers
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| parts.uri.authority().map(|a| a.to_string()))
            .ok_or_else(|| ApiError::bad_request("Missing Host header"))?;

        // Reject anything that would not form a valid absolute URL
        let parsed = url::Url::parse(&format!("{}://{}", scheme, host))
            .map_err(|_| ApiError::bad_request("Invalid Host header"))?;
        if parsed.path() != "/" || parsed.query().is_some() || parsed.host_str().is_none() {
            return Err(ApiError::bad_request("Invalid Host header"));
        }

        Ok(Self { scheme, host })
    }
}

/// Parse a path id, rejecting anything that is not a UUID
pub fn parse_id(raw: &str, resource: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::bad_request(format!("Invalid {} Id", resource)))
}
