//! Broker state shared by every handler.

use std::sync::Arc;
use std::time::Duration;

use crate::storage::Storage;

const DEFAULT_SESSION_TTL_SECONDS: u64 = 24 * 60 * 60;

#[derive(Clone, Debug)]
pub struct SessionConfig {
    session_ttl: Duration,
    behind_proxy: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECONDS),
            behind_proxy: false,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_behind_proxy(mut self, behind_proxy: bool) -> Self {
        self.behind_proxy = behind_proxy;
        self
    }

    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    #[must_use]
    pub fn behind_proxy(&self) -> bool {
        self.behind_proxy
    }

    /// TLS is terminated here unless a trusted proxy does it for us.
    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        !self.behind_proxy
    }
}

pub struct BrokerState {
    storage: Arc<dyn Storage>,
    config: SessionConfig,
}

impl BrokerState {
    pub fn new(storage: Arc<dyn Storage>, config: SessionConfig) -> Self {
        Self { storage, config }
    }

    #[must_use]
    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}
