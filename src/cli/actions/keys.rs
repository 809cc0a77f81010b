//! Offline keyset maintenance on the storage file.
//!
//! A running server picks the result up on SIGHUP.

use crate::{
    cli::globals::GlobalArgs,
    session::{SigningKey, DEFAULT_KEY_BITS},
    storage::StorageFile,
};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeysCommand {
    Rotate,
    Retire(String),
    List,
}

#[derive(Debug)]
pub struct Args {
    pub globals: GlobalArgs,
    pub command: KeysCommand,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyStatus {
    pub kid: String,
    pub current: bool,
}

fn load(path: &Path) -> Result<StorageFile> {
    StorageFile::load(path).with_context(|| format!("Failed to load {}", path.display()))
}

/// Make `next` the signing key; the previous one stays published for verification.
///
/// # Errors
///
/// Returns an error if the file cannot be loaded or saved, or `next` reuses a kid.
pub fn rotate(path: &Path, next: SigningKey) -> Result<String> {
    let mut file = load(path)?;
    let rotated = file.keyset()?.rotate(next)?;
    file.set_keyset(&rotated)?;
    file.save(path)?;

    let kid = rotated.current().kid().to_string();
    info!(kid = %kid, published = rotated.published().len(), "signing key rotated");
    Ok(kid)
}

/// Drop a retained public key.
///
/// # Errors
///
/// Returns an error if `kid` is the current key or is not published.
pub fn retire(path: &Path, kid: &str) -> Result<()> {
    let mut file = load(path)?;
    let retired = file.keyset()?.retire(kid)?;
    file.set_keyset(&retired)?;
    file.save(path)?;

    info!(kid, published = retired.published().len(), "signing key retired");
    Ok(())
}

/// Published keys, current first.
///
/// # Errors
///
/// Returns an error if the file or its keys cannot be read.
pub fn list(path: &Path) -> Result<Vec<KeyStatus>> {
    let keyset = load(path)?.keyset()?;
    let current = keyset.current().kid();
    Ok(keyset
        .published()
        .iter()
        .map(|key| KeyStatus {
            kid: key.kid().to_string(),
            current: key.kid() == current,
        })
        .collect())
}

/// Execute a keys action.
/// # Errors
/// Returns an error if the keyset operation fails.
pub fn execute(args: &Args) -> Result<()> {
    let path = args.globals.storage_path();
    match &args.command {
        KeysCommand::Rotate => {
            let next =
                SigningKey::generate(DEFAULT_KEY_BITS).context("Failed to generate signing key")?;
            let kid = rotate(path, next)?;
            println!("rotated: current key is {kid}");
        }
        KeysCommand::Retire(kid) => {
            retire(path, kid)?;
            println!("retired {kid}");
        }
        KeysCommand::List => {
            for key in list(path)? {
                let status = if key.current { "current" } else { "retained" };
                println!("{}\t{status}", key.kid);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::test_keys::{signing_key, KEY_1_PEM, KEY_2_PEM};
    use std::{env, fs, path::PathBuf};

    fn storage_with_k1(name: &str) -> Result<PathBuf> {
        let path =
            env::temp_dir().join(format!("authgate-keys-{}-{name}.json", uuid::Uuid::new_v4()));
        StorageFile::with_signing_key(
            "https://auth.example.test",
            "Example",
            &signing_key(KEY_1_PEM, "k1")?,
        )?
        .save(&path)?;
        Ok(path)
    }

    #[test]
    fn rotate_then_retire() -> Result<()> {
        let path = storage_with_k1("rotate")?;

        assert_eq!(rotate(&path, signing_key(KEY_2_PEM, "k2")?)?, "k2");
        assert_eq!(
            list(&path)?,
            vec![
                KeyStatus { kid: "k2".to_string(), current: true },
                KeyStatus { kid: "k1".to_string(), current: false },
            ]
        );

        retire(&path, "k1")?;
        assert_eq!(
            list(&path)?,
            vec![KeyStatus { kid: "k2".to_string(), current: true }]
        );

        fs::remove_file(&path)?;
        Ok(())
    }

    #[test]
    fn current_key_cannot_be_retired() -> Result<()> {
        let path = storage_with_k1("current")?;
        assert!(retire(&path, "k1").is_err());
        assert_eq!(list(&path)?.len(), 1);
        fs::remove_file(&path)?;
        Ok(())
    }

    #[test]
    fn rotate_rejects_duplicate_kid() -> Result<()> {
        let path = storage_with_k1("dup")?;
        assert!(rotate(&path, signing_key(KEY_2_PEM, "k1")?).is_err());
        fs::remove_file(&path)?;
        Ok(())
    }
}
