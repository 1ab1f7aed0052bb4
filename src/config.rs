//! Vault configuration and platform default locations.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::crypto::KdfParams;
use crate::error::{Result, VaultError};

/// File name of the key file inside the data directory.
pub const KEY_FILE_NAME: &str = "master.key";
/// File name of the record database inside the data directory.
pub const DATABASE_FILE_NAME: &str = "safekey.db";

#[derive(Debug, Clone)]
pub struct VaultConfig {
    key_path: PathBuf,
    kdf: KdfParams,
}

impl VaultConfig {
    pub fn new(key_path: impl Into<PathBuf>) -> Self {
        Self {
            key_path: key_path.into(),
            kdf: KdfParams::default(),
        }
    }

    /// Key file in the platform data directory, default KDF parameters.
    pub fn from_default_location() -> Result<Self> {
        Ok(Self::new(data_dir()?.join(KEY_FILE_NAME)))
    }

    /// Parameters used for vaults created or reset with this configuration.
    pub fn with_kdf(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    pub fn kdf(&self) -> KdfParams {
        self.kdf
    }
}

/// Application-private data directory, e.g. `~/.local/share/safekey`.
pub fn data_dir() -> Result<PathBuf> {
    let project_dirs = ProjectDirs::from("", "", "safekey").ok_or_else(|| {
        VaultError::io(
            "safekey",
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "could not determine platform directories",
            ),
        )
    })?;

    Ok(project_dirs.data_dir().to_path_buf())
}

/// Default location of the record database that snapshots are taken from.
pub fn default_database_path() -> Result<PathBuf> {
    Ok(data_dir()?.join(DATABASE_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_kdf() {
        let kdf = KdfParams::pbkdf2(20_000).unwrap();
        let config = VaultConfig::new("/tmp/vault/master.key").with_kdf(kdf);

        assert_eq!(config.kdf(), kdf);
        assert_eq!(config.key_path(), Path::new("/tmp/vault/master.key"));
    }

    #[test]
    fn defaults_use_pbkdf2() {
        let config = VaultConfig::new("master.key");
        assert_eq!(config.kdf(), KdfParams::default());
    }
}
