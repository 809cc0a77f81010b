use anyhow::Result;
use axum::{
    http::{header::COOKIE, HeaderMap, HeaderValue},
    Router,
};
use std::{sync::Arc, time::Duration};

use super::state::{BrokerState, SessionConfig};
use crate::session::{
    self,
    test_keys::{signing_key, KEY_1_PEM},
    Identity, Keyset,
};
use crate::storage::{MemoryStorage, Settings, Storage};

pub(crate) const NOW: i64 = 1_700_000_000;
pub(crate) const ROOT_URI: &str = "https://auth.example.test";

pub(crate) fn test_settings() -> Result<Settings> {
    let keyset = Keyset::new(signing_key(KEY_1_PEM, "k1")?, &[])?;
    Ok(Settings::new(ROOT_URI, keyset)?.with_display_name("Example"))
}

pub(crate) fn test_storage() -> Result<MemoryStorage> {
    Ok(MemoryStorage::new(test_settings()?))
}

pub(crate) fn test_state_with(storage: impl Storage + 'static) -> Arc<BrokerState> {
    Arc::new(BrokerState::new(Arc::new(storage), SessionConfig::new()))
}

pub(crate) fn test_router() -> Result<Router> {
    Ok(crate::api::router(test_state_with(test_storage()?)))
}

pub(crate) fn signed_token(storage: &dyn Storage, identities: &[Identity], now: i64) -> Result<String> {
    Ok(session::encode(
        identities,
        &storage.root_uri(),
        Duration::from_secs(3600),
        &storage.current_signing_key(),
        now,
    )?)
}

pub(crate) fn cookie_headers(token: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        COOKIE,
        HeaderValue::from_str(&format!("authgate_session={token}"))?,
    );
    Ok(headers)
}
