//! Request extractors: authenticated user, `If-Match` snapshot, JSON bodies.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Request},
    http::{header, request::Parts},
    Json,
};
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;

use biblio_core::User;
use biblio_db::hash_api_key;

use crate::error::ApiError;
use crate::state::AppState;

/// The user behind the request's `Authorization: Bearer <api key>` header.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();
    (!token.is_empty()).then_some(token)
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let token = bearer_token(parts)
            .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;
        let user = state
            .users
            .get_user_by_api_key_hash(&hash_api_key(token))
            .await?
            .ok_or_else(|| {
                debug!(subsystem = "api", component = "auth", "Unknown API key");
                ApiError::Unauthorized("Invalid API key".to_string())
            })?;
        Ok(CurrentUser(user))
    }
}

/// Snapshot id from the `If-Match` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IfMatch(pub Uuid);

/// Parse an entity tag such as `"0191…"` or `W/"0191…"` into a snapshot id.
pub fn parse_etag(value: &str) -> Option<Uuid> {
    let value = value.trim();
    let value = value.strip_prefix("W/").unwrap_or(value);
    let value = value.trim_matches('"');
    Uuid::parse_str(value).ok()
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for IfMatch {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, ApiError> {
        let raw = parts
            .headers
            .get(header::IF_MATCH)
            .ok_or(ApiError::PreconditionRequired)?;
        let raw = raw
            .to_str()
            .map_err(|_| ApiError::PreconditionFailed("Malformed If-Match header".to_string()))?;
        parse_etag(raw)
            .map(IfMatch)
            .ok_or_else(|| ApiError::PreconditionFailed(format!("Unknown snapshot '{}'", raw)))
    }
}

/// `Json<T>` whose rejections render as [`ApiError::BadRequest`].
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, ApiError> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    ApiError::BadRequest(rejection.body_text())
}
