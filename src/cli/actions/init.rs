use crate::{
    cli::globals::GlobalArgs,
    session::{SigningKey, DEFAULT_KEY_BITS},
    storage::StorageFile,
};
use anyhow::{bail, Context, Result};
use std::path::Path;
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub root_uri: String,
    pub display_name: String,
}

/// Write a new storage file around `key`. Never overwrites an existing file.
///
/// # Errors
///
/// Returns an error if the file exists, the settings are invalid, or writing fails.
pub fn create_storage(
    path: &Path,
    root_uri: &str,
    display_name: &str,
    key: &SigningKey,
) -> Result<StorageFile> {
    if path.exists() {
        bail!("{} already exists, refusing to overwrite", path.display());
    }

    let file = StorageFile::with_signing_key(root_uri, display_name, key)?;
    // Reject what `serve` would reject before anything touches the disk.
    file.clone()
        .into_settings()
        .context("Invalid storage settings")?;
    file.save(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(file)
}

/// Execute the init action.
/// # Errors
/// Returns an error if key generation or [`create_storage`] fails.
pub fn execute(args: &Args) -> Result<()> {
    let path = args.globals.storage_path();
    let key = SigningKey::generate(DEFAULT_KEY_BITS).context("Failed to generate signing key")?;
    create_storage(path, &args.root_uri, &args.display_name, &key)?;

    info!(storage = %path.display(), kid = key.kid(), "storage file created");
    println!("created {} (signing key {})", path.display(), key.kid());
    Ok(())
}
