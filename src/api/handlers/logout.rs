use axum::{
    extract::{rejection::FormRejection, Extension, Form},
    http::{
        header::{InvalidHeaderValue, LOCATION, SET_COOKIE},
        HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, error, instrument};
use utoipa::ToSchema;

use super::{
    cookies::clear_session_cookie,
    state::{BrokerState, SessionConfig},
    SET_LOGIN,
};

#[derive(ToSchema, Deserialize, Debug, Default)]
pub struct LogoutForm {
    /// Page to land on after logout; empty means `/`.
    #[serde(default)]
    prev_page: String,
}

/// The full set of logout headers, built before anything is sent.
fn logout_headers(
    config: &SessionConfig,
    prev_page: &str,
) -> Result<[(axum::http::HeaderName, HeaderValue); 3], InvalidHeaderValue> {
    let target = if prev_page.is_empty() { "/" } else { prev_page };
    Ok([
        (SET_COOKIE, clear_session_cookie(config)?),
        (SET_LOGIN, HeaderValue::from_static("logged-out")),
        (LOCATION, HeaderValue::from_str(target)?),
    ])
}

#[utoipa::path(
    post,
    path = "/logout",
    request_body(content = LogoutForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Session cookie cleared; redirect to prev_page"),
        (status = 405, description = "Method not allowed"),
        (status = 500, description = "Response headers could not be built")
    ),
    tag = "login"
)]
#[instrument(skip_all)]
pub async fn logout(
    Extension(state): Extension<Arc<BrokerState>>,
    form: Result<Form<LogoutForm>, FormRejection>,
) -> Response {
    let prev_page = match form {
        Ok(Form(form)) => form.prev_page,
        Err(err) => {
            debug!("logout form not readable, using default page: {err}");
            String::new()
        }
    };

    match logout_headers(state.config(), &prev_page) {
        Ok(headers) => (StatusCode::SEE_OTHER, headers).into_response(),
        Err(err) => {
            error!("failed to build logout response: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{
        signed_token, test_router, test_state_with, test_storage, NOW,
    };
    use super::*;
    use crate::session::Identity;
    use anyhow::Result;
    use axum::{
        body::Body,
        http::{header::COOKIE, Request},
        Router,
    };
    use tower::ServiceExt;

    fn logout_request(body: &'static str) -> Result<Request<Body>> {
        Ok(Request::builder()
            .method("POST")
            .uri("/logout")
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(Body::from(body))?)
    }

    async fn post(router: &Router, body: &'static str) -> Result<Response> {
        Ok(router.clone().oneshot(logout_request(body)?).await?)
    }

    #[tokio::test]
    async fn logout_clears_cookie_and_redirects() -> Result<()> {
        let router = test_router()?;
        let response = post(&router, "prev_page=%2Fdashboard").await?;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(LOCATION).map(HeaderValue::as_bytes),
            Some(&b"/dashboard"[..])
        );
        assert_eq!(
            response.headers().get(SET_LOGIN).map(HeaderValue::as_bytes),
            Some(&b"logged-out"[..])
        );
        let cookie = response
            .headers()
            .get(SET_COOKIE)
            .map(HeaderValue::to_str)
            .transpose()?
            .unwrap_or_default();
        assert!(cookie.starts_with("authgate_session=;"));
        assert!(cookie.contains("Max-Age=0"));
        Ok(())
    }

    #[tokio::test]
    async fn logout_twice_behaves_the_same() -> Result<()> {
        let storage = test_storage()?;
        let token = signed_token(
            &storage,
            &[Identity::email("a@example.com")?],
            NOW,
        )?;
        let router = crate::api::router(test_state_with(storage));

        let mut signed_in = logout_request("prev_page=%2F")?;
        signed_in.headers_mut().insert(
            COOKIE,
            HeaderValue::from_str(&format!("authgate_session={token}"))?,
        );
        let first = router.clone().oneshot(signed_in).await?;
        let second = post(&router, "prev_page=%2F").await?;

        assert_eq!(first.status(), StatusCode::SEE_OTHER);
        assert_eq!(second.status(), StatusCode::SEE_OTHER);
        assert_eq!(first.headers().get(SET_COOKIE), second.headers().get(SET_COOKIE));
        assert_eq!(first.headers().get(SET_LOGIN), second.headers().get(SET_LOGIN));
        Ok(())
    }

    #[tokio::test]
    async fn empty_prev_page_goes_home() -> Result<()> {
        let response = post(&test_router()?, "prev_page=").await?;
        assert_eq!(
            response.headers().get(LOCATION).map(HeaderValue::as_bytes),
            Some(&b"/"[..])
        );
        Ok(())
    }

    #[tokio::test]
    async fn unbuildable_location_is_all_or_nothing() -> Result<()> {
        let response = post(&test_router()?, "prev_page=%2Fa%0Ab").await?;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(SET_COOKIE).is_none());
        assert!(response.headers().get(SET_LOGIN).is_none());
        Ok(())
    }

    #[tokio::test]
    async fn get_is_not_allowed() -> Result<()> {
        let response = test_router()?
            .oneshot(Request::builder().uri("/logout").body(Body::empty())?)
            .await?;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        Ok(())
    }
}
