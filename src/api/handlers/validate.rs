//! Forward-auth: reverse proxies ask whether a request is authenticated.
//!
//! The answer is either 200 with `Remote-Id-Type`/`Remote-Id` for the primary
//! identity, or a 307 into the broker's authorization entry point. Token problems
//! never surface as server errors.

use axum::{
    body::Bytes as RawBytes,
    extract::{rejection::BytesRejection, Extension, RawQuery},
    http::{
        header::{CONTENT_TYPE, LOCATION},
        HeaderMap, HeaderName, HeaderValue, Method, StatusCode,
    },
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, error, instrument};
use url::form_urlencoded;
use utoipa::IntoParams;

use super::{identities::decode_session, now_unix_seconds, state::BrokerState};
use crate::session::Identity;
use crate::storage::Storage;

pub const REMOTE_ID_TYPE: HeaderName = HeaderName::from_static("remote-id-type");
pub const REMOTE_ID: HeaderName = HeaderName::from_static("remote-id");

const REDIRECT_URI: &str = "redirect_uri";

#[derive(IntoParams, Debug, Default)]
#[into_params(parameter_in = Query)]
pub struct ValidateArgs {
    /// Address of the protected resource; doubles as its OAuth client id.
    pub redirect_uri: String,
}

fn first_value(input: &[u8], name: &str) -> Option<String> {
    form_urlencoded::parse(input)
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

fn is_form_body(method: &Method, headers: &HeaderMap) -> bool {
    let has_body = *method == Method::POST || *method == Method::PUT || *method == Method::PATCH;
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::trim);
    has_body
        && content_type.is_some_and(|ct| ct.eq_ignore_ascii_case("application/x-www-form-urlencoded"))
}

/// `redirect_uri` as a form reader sees it: a urlencoded POST, PUT or PATCH body
/// first, then the query string. The first occurrence wins.
#[must_use]
pub fn redirect_uri_param(
    method: &Method,
    headers: &HeaderMap,
    query: Option<&str>,
    body: &[u8],
) -> String {
    let from_body = if is_form_body(method, headers) {
        first_value(body, REDIRECT_URI)
    } else {
        None
    };
    from_body
        .or_else(|| query.and_then(|q| first_value(q.as_bytes(), REDIRECT_URI)))
        .unwrap_or_default()
}

/// Outcome of forward-auth validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Authenticated(Identity),
    Unauthenticated { location: String },
}

/// Authorization entry point for an anonymous request.
///
/// The protected resource's address is both `client_id` and `redirect_uri`, inserted
/// as-is. `state` is sent empty.
#[must_use]
pub fn auth_redirect_url(root_uri: &str, redirect_uri: &str) -> String {
    format!(
        "{root_uri}/auth?client_id={redirect_uri}&redirect_uri={redirect_uri}&response_type=code&state=&scope="
    )
}

/// Decide the forward-auth outcome from the request cookies alone.
#[must_use]
pub fn validate_request(
    headers: &HeaderMap,
    storage: &dyn Storage,
    redirect_uri: &str,
    now_unix_seconds: i64,
) -> Validation {
    let session = decode_session(headers, storage, now_unix_seconds);
    match session.map(|s| s.identities.into_iter().next()) {
        Ok(Some(identity)) => Validation::Authenticated(identity),
        Ok(None) => {
            debug!("session carries no identities");
            Validation::Unauthenticated {
                location: auth_redirect_url(&storage.root_uri(), redirect_uri),
            }
        }
        Err(err) => {
            debug!("forward-auth anonymous: {err}");
            Validation::Unauthenticated {
                location: auth_redirect_url(&storage.root_uri(), redirect_uri),
            }
        }
    }
}

fn redirect_response(location: &str, root_uri: &str) -> Response {
    // A redirect_uri with bytes not allowed in headers is dropped, not turned into a 5xx.
    let header = HeaderValue::from_str(location)
        .or_else(|_| HeaderValue::from_str(&auth_redirect_url(root_uri, "")))
        .unwrap_or_else(|_| HeaderValue::from_static("/"));
    (StatusCode::TEMPORARY_REDIRECT, [(LOCATION, header)]).into_response()
}

fn authenticated_response(identity: &Identity) -> Option<Response> {
    let id_type = HeaderValue::from_str(identity.id_type().as_str()).ok()?;
    let id = HeaderValue::from_bytes(identity.id().as_bytes()).ok()?;
    Some((StatusCode::OK, [(REMOTE_ID_TYPE, id_type), (REMOTE_ID, id)]).into_response())
}

#[utoipa::path(
    get,
    path = "/validate",
    params(ValidateArgs),
    responses(
        (status = 200, description = "Authenticated; Remote-Id-Type and Remote-Id carry the primary identity"),
        (status = 307, description = "Not authenticated; redirect to the authorization entry point")
    ),
    tag = "forward-auth"
)]
#[instrument(skip_all)]
pub async fn validate(
    Extension(state): Extension<Arc<BrokerState>>,
    method: Method,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Result<RawBytes, BytesRejection>,
) -> Response {
    let body = body.unwrap_or_default();
    let redirect_uri = redirect_uri_param(&method, &headers, query.as_deref(), &body);
    let storage = state.storage();

    match validate_request(&headers, storage, &redirect_uri, now_unix_seconds()) {
        Validation::Authenticated(identity) => {
            if let Some(response) = authenticated_response(&identity) {
                return response;
            }
            // Identities are validated as header-safe on decode; this is unreachable in practice.
            error!(id_type = %identity.id_type(), "identity is not a valid header value");
            let location = auth_redirect_url(&storage.root_uri(), &redirect_uri);
            redirect_response(&location, &storage.root_uri())
        }
        Validation::Unauthenticated { location } => {
            redirect_response(&location, &storage.root_uri())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{
        cookie_headers, signed_token, test_router, test_storage, NOW,
    };
    use super::*;
    use crate::session::IdType;
    use anyhow::Result;
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    #[test]
    fn redirect_url_matches_entry_point_shape() {
        assert_eq!(
            auth_redirect_url("https://auth.example.test", "https://app.example"),
            "https://auth.example.test/auth?client_id=https://app.example&redirect_uri=https://app.example&response_type=code&state=&scope="
        );
    }

    #[test]
    fn first_identity_is_primary() -> Result<()> {
        let storage = test_storage()?;
        let idents = vec![
            Identity::email("a@example.com")?,
            Identity::new(IdType::OAuth2, "sub-1")?,
        ];
        let token = signed_token(&storage, &idents, NOW)?;
        let outcome = validate_request(&cookie_headers(&token)?, &storage, "https://app", NOW);
        assert_eq!(outcome, Validation::Authenticated(idents[0].clone()));
        Ok(())
    }

    #[test]
    fn empty_identity_list_is_unauthenticated() -> Result<()> {
        let storage = test_storage()?;
        let token = signed_token(&storage, &[], NOW)?;
        let outcome = validate_request(&cookie_headers(&token)?, &storage, "https://app", NOW);
        assert!(matches!(outcome, Validation::Unauthenticated { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn anonymous_request_redirects_to_auth() -> Result<()> {
        let response = test_router()?
            .oneshot(
                Request::builder()
                    .uri("/validate?redirect_uri=https://app.example")
                    .body(Body::empty())?,
            )
            .await?;

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response.headers().get(LOCATION).map(HeaderValue::to_str).transpose()?,
            Some("https://auth.example.test/auth?client_id=https://app.example&redirect_uri=https://app.example&response_type=code&state=&scope=")
        );
        assert!(response.headers().get(REMOTE_ID).is_none());
        Ok(())
    }

    #[tokio::test]
    async fn authenticated_request_gets_identity_headers() -> Result<()> {
        let storage = test_storage()?;
        let token = signed_token(
            &storage,
            &[Identity::email("a@example.com")?],
            now_unix_seconds(),
        )?;
        let response = test_router()?
            .oneshot(
                Request::builder()
                    .uri("/validate?redirect_uri=https://app.example")
                    .header("Cookie", format!("authgate_session={token}"))
                    .body(Body::empty())?,
            )
            .await?;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("Remote-Id-Type").map(HeaderValue::as_bytes),
            Some(&b"email"[..])
        );
        assert_eq!(
            response.headers().get("Remote-Id").map(HeaderValue::as_bytes),
            Some(&b"a@example.com"[..])
        );
        Ok(())
    }

    #[tokio::test]
    async fn invalid_token_redirects_instead_of_failing() -> Result<()> {
        let response = test_router()?
            .oneshot(
                Request::builder()
                    .uri("/validate?redirect_uri=https://app.example")
                    .header("Cookie", "authgate_session=not.a.token")
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        Ok(())
    }

    #[tokio::test]
    async fn missing_redirect_uri_still_redirects() -> Result<()> {
        let response = test_router()?
            .oneshot(Request::builder().uri("/validate").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response.headers().get(LOCATION).map(HeaderValue::to_str).transpose()?,
            Some("https://auth.example.test/auth?client_id=&redirect_uri=&response_type=code&state=&scope=")
        );
        Ok(())
    }

    #[test]
    fn redirect_uri_first_value_wins() {
        let headers = HeaderMap::new();
        assert_eq!(
            redirect_uri_param(
                &Method::GET,
                &headers,
                Some("redirect_uri=https%3A%2F%2Fa.example&redirect_uri=https://b.example"),
                b"",
            ),
            "https://a.example"
        );
        assert_eq!(
            redirect_uri_param(&Method::GET, &headers, Some("other=1"), b""),
            ""
        );
    }

    #[test]
    fn form_body_only_counts_for_urlencoded_writes() {
        let mut form = HeaderMap::new();
        form.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded; charset=utf-8"),
        );
        let body = b"redirect_uri=https://body.example";
        let query = Some("redirect_uri=https://query.example");

        assert_eq!(
            redirect_uri_param(&Method::POST, &form, query, body),
            "https://body.example"
        );
        assert_eq!(
            redirect_uri_param(&Method::GET, &form, query, body),
            "https://query.example"
        );
        assert_eq!(
            redirect_uri_param(&Method::POST, &HeaderMap::new(), query, body),
            "https://query.example"
        );
    }

    #[tokio::test]
    async fn repeated_redirect_uri_keeps_the_first() -> Result<()> {
        let response = test_router()?
            .oneshot(
                Request::builder()
                    .uri("/validate?redirect_uri=https://a.example&redirect_uri=https://b.example")
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response.headers().get(LOCATION).map(HeaderValue::to_str).transpose()?,
            Some("https://auth.example.test/auth?client_id=https://a.example&redirect_uri=https://a.example&response_type=code&state=&scope=")
        );
        Ok(())
    }

    #[tokio::test]
    async fn posted_form_redirect_uri_is_used() -> Result<()> {
        let response = test_router()?
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/validate")
                    .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("redirect_uri=https%3A%2F%2Fapp.example"))?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response.headers().get(LOCATION).map(HeaderValue::to_str).transpose()?,
            Some("https://auth.example.test/auth?client_id=https://app.example&redirect_uri=https://app.example&response_type=code&state=&scope=")
        );
        Ok(())
    }

    #[tokio::test]
    async fn header_unsafe_redirect_uri_is_dropped() -> Result<()> {
        let response = test_router()?
            .oneshot(
                Request::builder()
                    .uri("/validate?redirect_uri=https://app%0d%0aX-Evil:%201")
                    .body(Body::empty())?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        let location = response
            .headers()
            .get(LOCATION)
            .map(HeaderValue::to_str)
            .transpose()?
            .unwrap_or_default();
        assert!(!location.contains("Evil"));
        Ok(())
    }
}
