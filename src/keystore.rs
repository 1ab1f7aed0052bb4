//! Master key lifecycle: owns the key file and the in-memory key.
//!
//! ```text
//!   Uninitialized --initialize--> Unlocked
//!   Locked        --unlock------> Unlocked
//!   Unlocked      --lock--------> Locked
//!   any           --reset-------> Unlocked   (new salt, new key)
//! ```

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::crypto::{KdfParams, KeyMaterial, derive_key, fingerprint, generate_salt};
use crate::error::{Result, VaultError};
use crate::keyfile::{KeyFile, Protection};
use crate::storage::Storage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// No key file on disk, no key in memory.
    Uninitialized,
    /// Key file present, no key in memory.
    Locked,
    /// Key in memory.
    Unlocked,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => f.write_str("uninitialized"),
            Self::Locked => f.write_str("locked"),
            Self::Unlocked => f.write_str("unlocked"),
        }
    }
}

/// Mediates between the key file on disk and the key held in memory.
///
/// Readers clone the `Arc` under a read lock, so a concurrent `lock` never
/// tears an in-flight encryption; the old key is wiped once the last clone
/// is dropped. Transitions are serialized by a separate mutex so slow key
/// derivation does not hold the read/write lock.
#[derive(Debug)]
pub struct KeyStore {
    storage: Storage,
    kdf: KdfParams,
    key: RwLock<Option<Arc<KeyMaterial>>>,
    transition: Mutex<()>,
}

impl KeyStore {
    /// `kdf` applies to vaults created or reset by this store; existing
    /// key files are always unlocked with the parameters they record.
    pub fn new(path: impl AsRef<Path>, kdf: KdfParams) -> Self {
        Self {
            storage: Storage::new(path.as_ref()),
            kdf,
            key: RwLock::new(None),
            transition: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        self.storage.path()
    }

    pub fn kdf(&self) -> KdfParams {
        self.kdf
    }

    pub fn is_initialized(&self) -> bool {
        self.storage.exists()
    }

    pub fn status(&self) -> Status {
        if self.key.read().is_some() {
            Status::Unlocked
        } else if self.storage.exists() {
            Status::Locked
        } else {
            Status::Uninitialized
        }
    }

    /// Creates the key file and loads the new key.
    ///
    /// # Errors
    ///
    /// [`VaultError::AlreadyInitialized`] if a key file exists; it is left
    /// untouched. Use [`KeyStore::reset`] to replace it deliberately.
    pub fn initialize(&self, password: &str, protection: Protection) -> Result<()> {
        let _guard = self.transition.lock();

        if self.storage.exists() {
            return Err(VaultError::AlreadyInitialized {
                path: self.path().to_path_buf(),
            });
        }

        self.install_new_key(password, protection)?;
        info!(path = %self.path().display(), %protection, "vault initialized");
        Ok(())
    }

    /// Replaces the key file with one derived from a new password.
    ///
    /// Everything encrypted under the previous key becomes unreadable.
    pub fn reset(&self, password: &str, protection: Protection) -> Result<()> {
        let _guard = self.transition.lock();

        warn!(path = %self.path().display(), %protection, "resetting master password");
        self.install_new_key(password, protection)
    }

    /// Verifies `password` against the key file and loads the key.
    ///
    /// A failed attempt changes nothing, so it is safe to retry. When
    /// already unlocked the password is re-verified and the loaded key kept
    /// on failure.
    ///
    /// # Errors
    ///
    /// * [`VaultError::NotInitialized`] if there is no key file.
    /// * [`VaultError::KeyFileCorrupt`] if it cannot be parsed.
    /// * [`VaultError::InvalidCredential`] if the password does not match.
    pub fn unlock(&self, password: &str) -> Result<()> {
        let _guard = self.transition.lock();

        let file = self.key_file()?;
        let key = derive_key(password, file.salt(), *file.kdf())
            .map_err(|e| VaultError::corrupt(self.path(), e.to_string()))?;

        if fingerprint(&key) != *file.key_hash() {
            warn!(path = %self.path().display(), "unlock rejected: password mismatch");
            return Err(VaultError::InvalidCredential);
        }

        *self.key.write() = Some(Arc::new(key));
        info!(
            path = %self.path().display(),
            kdf = file.kdf().algorithm(),
            "vault unlocked"
        );
        Ok(())
    }

    /// Drops the in-memory key. A no-op unless unlocked.
    pub fn lock(&self) {
        let _guard = self.transition.lock();

        if self.key.write().take().is_some() {
            info!(path = %self.path().display(), "vault locked");
        } else {
            debug!("lock requested while no key is loaded");
        }
    }

    /// Returns the loaded key.
    ///
    /// # Errors
    ///
    /// [`VaultError::KeyNotLoaded`] unless unlocked.
    pub fn key(&self) -> Result<Arc<KeyMaterial>> {
        self.key.read().clone().ok_or(VaultError::KeyNotLoaded)
    }

    /// Reads and parses the key file.
    pub fn key_file(&self) -> Result<KeyFile> {
        if !self.storage.exists() {
            return Err(VaultError::NotInitialized {
                path: self.path().to_path_buf(),
            });
        }
        KeyFile::parse(self.path(), &self.storage.load()?)
    }

    /// Caller must hold the transition lock.
    fn install_new_key(&self, password: &str, protection: Protection) -> Result<()> {
        let salt = generate_salt()?;
        let key = derive_key(password, &salt, self.kdf)?;

        let file = KeyFile::new(salt.to_vec(), fingerprint(&key), self.kdf, protection);
        self.storage.save(&file.to_bytes()?)?;

        *self.key.write() = Some(Arc::new(key));
        Ok(())
    }
}
