use crate::{
    api::{
        self,
        handlers::state::{BrokerState, SessionConfig},
    },
    cli::{globals::GlobalArgs, telemetry},
    storage::{MemoryStorage, Storage},
};
use anyhow::{Context, Result};
use std::{sync::Arc, time::Duration};
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub port: u16,
    pub behind_proxy: bool,
    pub session_ttl_seconds: u64,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the storage file cannot be loaded or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let path = args.globals.storage_path().to_path_buf();
    let storage = Arc::new(
        MemoryStorage::from_file(&path)
            .with_context(|| format!("Failed to load storage file {}", path.display()))?,
    );

    info!(
        storage = %path.display(),
        root_uri = %storage.root_uri(),
        current_kid = storage.current_signing_key().kid(),
        published = storage.published_public_keys().len(),
        behind_proxy = args.behind_proxy,
        session_ttl_seconds = args.session_ttl_seconds,
        "starting authgate"
    );

    #[cfg(unix)]
    spawn_reload_on_hangup(storage.clone(), path)?;

    let config = SessionConfig::new()
        .with_session_ttl(Duration::from_secs(args.session_ttl_seconds))
        .with_behind_proxy(args.behind_proxy);
    let state = Arc::new(BrokerState::new(storage, config));

    let result = api::new(args.port, state).await;

    telemetry::shutdown_tracer();

    result
}

/// Re-read the storage file on SIGHUP. A failed reload keeps the running configuration.
#[cfg(unix)]
fn spawn_reload_on_hangup(storage: Arc<MemoryStorage>, path: std::path::PathBuf) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};
    use tracing::error;

    let mut hangup = signal(SignalKind::hangup()).context("Failed to install SIGHUP handler")?;

    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            if let Err(err) = storage.reload(&path) {
                error!("Failed to reload {}: {err}", path.display());
            }
        }
    });

    Ok(())
}
