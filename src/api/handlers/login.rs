//! Login page data and login completion.
//!
//! `GET /login` and `GET /login-fedcm-auto` return the view model the login page
//! renders from, and remember where to come back to. [`complete_login`] is what a
//! concrete login method calls once it has proven an identity.

use axum::{
    extract::Extension,
    http::{
        header::{InvalidHeaderValue, LOCATION, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, instrument};
use utoipa::ToSchema;

use super::{
    cookies::{
        clear_return_uri_cookie, read_return_uri, return_uri_cookie, session_cookie,
        DEFAULT_RETURN_URI,
    },
    identities::{decode_session_with, resolve},
    now_unix_seconds,
    state::{BrokerState, SessionConfig},
    SET_LOGIN,
};
use crate::session::{self, EncodeError, Identity};
use crate::storage::{ProviderView, Storage, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginMode {
    Standard,
    FedCmAuto,
}

impl LoginMode {
    #[must_use]
    pub const fn return_uri(self) -> &'static str {
        match self {
            Self::Standard => "/login",
            Self::FedCmAuto => "/login-fedcm-auto",
        }
    }
}

#[derive(Error, Debug)]
pub enum LoginError {
    #[error("failed to load oauth2 providers: {0}")]
    Providers(#[from] StorageError),
    #[error("failed to sign session: {0}")]
    Encode(#[from] EncodeError),
    #[error("failed to build cookie: {0}")]
    Cookie(#[from] InvalidHeaderValue),
}

impl IntoResponse for LoginError {
    fn into_response(self) -> Response {
        error!("{self}");
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

/// Everything the login page needs. Provider secrets never reach it.
#[derive(ToSchema, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct LoginViewModel {
    pub display_name: String,
    pub can_email: bool,
    pub identities: Vec<Identity>,
    pub oauth2_providers: Vec<ProviderView>,
    pub return_uri: String,
    pub root_uri: String,
    pub fed_cm: bool,
}

/// Build the login view model and the return-destination cookie that goes with it.
///
/// # Errors
///
/// Returns an error if the provider list cannot be read or the cookie cannot be built.
pub fn assemble(
    headers: &HeaderMap,
    storage: &dyn Storage,
    config: &SessionConfig,
    mode: LoginMode,
    now_unix_seconds: i64,
) -> Result<(LoginViewModel, HeaderValue), LoginError> {
    let providers = storage.configured_providers()?;
    let cookie = return_uri_cookie(config, mode.return_uri())?;

    let view = LoginViewModel {
        display_name: storage.display_name(),
        can_email: storage.has_email_delivery(),
        identities: resolve(headers, storage, now_unix_seconds),
        oauth2_providers: providers.iter().map(|p| p.view()).collect(),
        return_uri: mode.return_uri().to_string(),
        root_uri: storage.root_uri(),
        fed_cm: mode == LoginMode::FedCmAuto,
    };

    Ok((view, cookie))
}

fn render(state: &BrokerState, headers: &HeaderMap, mode: LoginMode) -> Response {
    match assemble(
        headers,
        state.storage(),
        state.config(),
        mode,
        now_unix_seconds(),
    ) {
        Ok((view, cookie)) => {
            debug!(
                identities = view.identities.len(),
                providers = view.oauth2_providers.len(),
                "login page assembled"
            );
            (StatusCode::OK, [(SET_COOKIE, cookie)], Json(view)).into_response()
        }
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/login",
    responses(
        (status = 200, description = "Login page view model", body = LoginViewModel),
        (status = 500, description = "Provider configuration could not be read", body = String)
    ),
    tag = "login"
)]
#[instrument(skip_all)]
pub async fn login(Extension(state): Extension<Arc<BrokerState>>, headers: HeaderMap) -> Response {
    render(&state, &headers, LoginMode::Standard)
}

#[utoipa::path(
    get,
    path = "/login-fedcm-auto",
    responses(
        (status = 200, description = "Login page view model with FedCM auto sign-in", body = LoginViewModel),
        (status = 500, description = "Provider configuration could not be read", body = String)
    ),
    tag = "login"
)]
#[instrument(skip_all)]
pub async fn login_fedcm_auto(
    Extension(state): Extension<Arc<BrokerState>>,
    headers: HeaderMap,
) -> Response {
    render(&state, &headers, LoginMode::FedCmAuto)
}

/// Most identities a session carries; beyond this the cookie nears the browser size limit.
pub const MAX_SESSION_IDENTITIES: usize = 16;

/// Identities after adding `identity`: an equal identity is moved to the end and
/// the oldest are evicted past [`MAX_SESSION_IDENTITIES`].
fn merge_identity(mut identities: Vec<Identity>, identity: Identity) -> Vec<Identity> {
    identities.retain(|existing| existing != &identity);
    identities.push(identity);
    if identities.len() > MAX_SESSION_IDENTITIES {
        let evicted = identities.len() - MAX_SESSION_IDENTITIES;
        identities.drain(..evicted);
        debug!(evicted, "oldest identities dropped from session");
    }
    identities
}

/// Add a freshly proven identity to the browser's session and send it back where it
/// came from.
///
/// # Errors
///
/// Returns an error if the session cannot be signed or a cookie cannot be built;
/// nothing is set in that case.
pub fn complete_login(
    headers: &HeaderMap,
    state: &BrokerState,
    identity: Identity,
    now_unix_seconds: i64,
) -> Result<Response, LoginError> {
    let storage = state.storage();
    let config = state.config();
    let keyset = storage.keyset();
    let audience = storage.root_uri();

    let existing = decode_session_with(headers, &keyset, &audience, now_unix_seconds)
        .map(|session| session.identities)
        .unwrap_or_default();
    let identities = merge_identity(existing, identity);

    let token = session::encode(
        &identities,
        &audience,
        config.session_ttl(),
        keyset.current(),
        now_unix_seconds,
    )?;
    let session = session_cookie(config, &token, config.session_ttl())?;
    let clear_return = clear_return_uri_cookie(config)?;

    let location = read_return_uri(headers)
        .and_then(|uri| HeaderValue::from_str(&uri).ok())
        .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_RETURN_URI));

    info!(
        kid = keyset.current().kid(),
        identities = identities.len(),
        "session issued"
    );

    let mut response = (StatusCode::SEE_OTHER, [(LOCATION, location)]).into_response();
    let response_headers = response.headers_mut();
    response_headers.append(SET_COOKIE, session);
    response_headers.append(SET_COOKIE, clear_return);
    response_headers.insert(SET_LOGIN, HeaderValue::from_static("logged-in"));
    Ok(response)
}
