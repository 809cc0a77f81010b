use std::path::{Path, PathBuf};

/// Arguments shared by every subcommand.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub storage_path: PathBuf,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(storage_path: impl Into<PathBuf>) -> Self {
        Self {
            storage_path: storage_path.into(),
        }
    }

    #[must_use]
    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_args() {
        let args = GlobalArgs::new("/etc/authgate/authgate.json");
        assert_eq!(
            args.storage_path(),
            Path::new("/etc/authgate/authgate.json")
        );
    }
}
