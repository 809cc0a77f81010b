use axum::{
    extract::{Extension, RawQuery},
    http::HeaderMap,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use super::{cookies::DEFAULT_RETURN_URI, identities::resolve, now_unix_seconds, state::BrokerState};
use crate::session::Identity;

/// Shown when an authorization request arrives for a browser with no usable identity.
#[derive(ToSchema, Serialize, Debug, PartialEq, Eq)]
pub struct NoAccountViewModel {
    pub identities: Vec<Identity>,
    /// The authorization request to retry once an identity has been added.
    pub url: String,
    pub root_uri: String,
    pub display_name: String,
    pub return_uri: String,
}

#[utoipa::path(
    get,
    path = "/no-account",
    responses(
        (status = 200, description = "No-account page view model", body = NoAccountViewModel)
    ),
    tag = "login"
)]
pub async fn no_account(
    Extension(state): Extension<Arc<BrokerState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    let storage = state.storage();
    Json(NoAccountViewModel {
        identities: resolve(&headers, storage, now_unix_seconds()),
        url: format!("/auth?{}", query.unwrap_or_default()),
        root_uri: storage.root_uri(),
        display_name: storage.display_name(),
        return_uri: DEFAULT_RETURN_URI.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::test_router;
    use anyhow::Result;
    use axum::{body::Body, http::Request, http::StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn no_account_echoes_the_authorization_query() -> Result<()> {
        let response = test_router()?
            .oneshot(
                Request::builder()
                    .uri("/no-account?client_id=https://app&response_type=code")
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let json: serde_json::Value = serde_json::from_slice(&body)?;
        assert_eq!(json["url"], "/auth?client_id=https://app&response_type=code");
        assert_eq!(json["return_uri"], "/login");
        assert_eq!(json["root_uri"], "https://auth.example.test");
        assert_eq!(json["identities"], serde_json::json!([]));
        Ok(())
    }
}
