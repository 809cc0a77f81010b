use axum::{
    extract::Extension,
    http::{header::CACHE_CONTROL, HeaderValue},
    response::{IntoResponse, Json},
};
use std::sync::Arc;

use super::state::BrokerState;

/// Published verification keys: the current signing key plus every retained one.
#[utoipa::path(
    get,
    path = "/jwks",
    responses(
        (status = 200, description = "Published session verification keys as a JWKS document")
    ),
    tag = "keys"
)]
pub async fn jwks(Extension(state): Extension<Arc<BrokerState>>) -> impl IntoResponse {
    let jwks = state.storage().published_public_keys().to_jwks();
    (
        [(CACHE_CONTROL, HeaderValue::from_static("no-store"))],
        Json(jwks),
    )
}
