use axum::{
    extract::{ConnectInfo, Extension},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use std::{net::SocketAddr, sync::Arc};
use tracing::error;
use utoipa::ToSchema;

use super::{cookies::DEFAULT_RETURN_URI, state::BrokerState};

/// Client address view; carries the page fields every broker view has.
#[derive(ToSchema, Serialize, Debug, PartialEq, Eq)]
pub struct RemoteIp {
    pub remote_ip: String,
    pub root_uri: String,
    pub display_name: String,
    pub return_uri: String,
}

fn first_header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}

/// Client address as the broker sees it. Forwarding headers are trusted only behind a proxy.
#[must_use]
pub fn remote_ip(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    behind_proxy: bool,
) -> Option<String> {
    if behind_proxy {
        first_header_value(headers, "x-forwarded-for")
            .or_else(|| first_header_value(headers, "x-real-ip"))
            .or_else(|| peer.map(|addr| addr.ip().to_string()))
    } else {
        peer.map(|addr| addr.ip().to_string())
    }
}

#[utoipa::path(
    get,
    path = "/ip",
    responses(
        (status = 200, description = "Client IP address", body = RemoteIp),
        (status = 500, description = "Client address could not be determined")
    ),
    tag = "misc"
)]
pub async fn ip(
    Extension(state): Extension<Arc<BrokerState>>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
) -> Response {
    let peer = connect_info.map(|ConnectInfo(addr)| addr);
    match remote_ip(&headers, peer, state.config().behind_proxy()) {
        Some(remote_ip) => {
            let storage = state.storage();
            Json(RemoteIp {
                remote_ip,
                root_uri: storage.root_uri(),
                display_name: storage.display_name(),
                return_uri: DEFAULT_RETURN_URI.to_string(),
            })
            .into_response()
        }
        None => {
            error!("unable to determine client address");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "unable to determine client address",
            )
                .into_response()
        }
    }
}
