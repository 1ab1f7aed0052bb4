//! The entry point the rest of the application talks to.

use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::info;
use zeroize::Zeroizing;

use crate::cipher::CipherEngine;
use crate::config::VaultConfig;
use crate::credentials::CredentialProvider;
use crate::error::Result;
use crate::file_cipher::FileCipher;
use crate::keyfile::Protection;
use crate::keystore::{KeyStore, Status};

/// Composes the key store with record and file encryption.
///
/// Owned by the application's composition root and shared by reference;
/// it is `Send + Sync`, so one session serves parallel record decryption.
#[derive(Debug)]
pub struct VaultSession {
    keys: KeyStore,
}

impl VaultSession {
    pub fn new(config: &VaultConfig) -> Self {
        Self {
            keys: KeyStore::new(config.key_path(), config.kdf()),
        }
    }

    pub fn status(&self) -> Status {
        self.keys.status()
    }

    pub fn key_path(&self) -> &Path {
        self.keys.path()
    }

    /// Protection mode recorded in the key file.
    pub fn protection(&self) -> Result<Protection> {
        Ok(self.keys.key_file()?.protection())
    }

    pub fn key_store(&self) -> &KeyStore {
        &self.keys
    }

    pub fn initialize(&self, password: &str) -> Result<()> {
        self.keys.initialize(password, Protection::Passphrase)
    }

    /// Creates the vault with the provider's secret and records its
    /// protection mode.
    pub fn initialize_with(&self, provider: &dyn CredentialProvider) -> Result<()> {
        let password = provider.password()?;
        self.keys.initialize(&password, provider.protection())
    }

    pub fn unlock(&self, password: &str) -> Result<()> {
        self.keys.unlock(password)
    }

    pub fn lock(&self) {
        self.keys.lock();
    }

    /// Replaces the master password; prior ciphertexts become unreadable.
    pub fn reset(&self, provider: &dyn CredentialProvider) -> Result<()> {
        let password = provider.password()?;
        self.keys.reset(&password, provider.protection())
    }

    /// Makes sure a key is loaded: initializes a missing vault or unlocks an
    /// existing one with the provider's secret.
    ///
    /// A failed unlock is returned as-is; the vault is never reinitialized
    /// behind the caller's back.
    pub fn ensure_ready(&self, provider: &dyn CredentialProvider) -> Result<()> {
        match self.keys.status() {
            Status::Unlocked => Ok(()),
            Status::Uninitialized => {
                info!("no key file found, initializing vault");
                self.initialize_with(provider)
            }
            Status::Locked => {
                let password = provider.password()?;
                self.keys.unlock(&password)
            }
        }
    }

    /// Cipher bound to the currently loaded key.
    ///
    /// # Errors
    ///
    /// [`VaultError::KeyNotLoaded`](crate::VaultError::KeyNotLoaded) unless unlocked.
    pub fn cipher(&self) -> Result<CipherEngine> {
        Ok(CipherEngine::new(self.keys.key()?))
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        self.cipher()?.encrypt(plaintext)
    }

    pub fn decrypt(&self, envelope: &str) -> Result<Zeroizing<String>> {
        self.cipher()?.decrypt(envelope)
    }

    /// JSON-encodes a record payload and encrypts it.
    pub fn encrypt_record<T: Serialize>(&self, record: &T) -> Result<String> {
        let cipher = self.cipher()?;
        let json = Zeroizing::new(serde_json::to_string(record)?);
        cipher.encrypt(&json)
    }

    /// Decrypts an envelope and JSON-decodes the record payload.
    pub fn decrypt_record<T: DeserializeOwned>(&self, envelope: &str) -> Result<T> {
        let json = self.decrypt(envelope)?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn encrypt_file(&self, input: &Path, output: &Path) -> Result<()> {
        let cipher = self.cipher()?;
        FileCipher::new(&cipher).encrypt_file(input, output)
    }

    pub fn decrypt_file(&self, input: &Path, output: &Path) -> Result<()> {
        let cipher = self.cipher()?;
        FileCipher::new(&cipher).decrypt_file(input, output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{OsAccount, Passphrase};
    use crate::crypto::KdfParams;
    use crate::error::ErrorKind;
    use serde::Deserialize;
    use tempfile::tempdir;

    fn session(dir: &Path) -> VaultSession {
        let config =
            VaultConfig::new(dir.join("master.key")).with_kdf(KdfParams::pbkdf2(1_000).unwrap());
        VaultSession::new(&config)
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct PasswordEntry {
        title: String,
        username: String,
        password: String,
    }

    #[test]
    fn operations_before_unlock_fail_with_key_not_loaded() {
        let dir = tempdir().unwrap();
        let s = session(dir.path());
        let input = dir.path().join("in.db");
        let output = dir.path().join("out.dat");
        std::fs::write(&input, b"data").unwrap();

        assert_eq!(s.encrypt("x").unwrap_err().kind(), ErrorKind::KeyNotLoaded);
        assert_eq!(s.decrypt("aa:bb").unwrap_err().kind(), ErrorKind::KeyNotLoaded);
        assert_eq!(
            s.encrypt_file(&input, &output).unwrap_err().kind(),
            ErrorKind::KeyNotLoaded
        );
        assert!(!output.exists());
    }

    #[test]
    fn ensure_ready_initializes_then_unlocks() {
        let dir = tempdir().unwrap();
        let provider = Passphrase::new("correct-horse");

        let first = session(dir.path());
        first.ensure_ready(&provider).unwrap();
        assert_eq!(first.status(), Status::Unlocked);
        let envelope = first.encrypt("hunter2").unwrap();

        let second = session(dir.path());
        assert_eq!(second.status(), Status::Locked);
        second.ensure_ready(&provider).unwrap();
        assert_eq!(second.decrypt(&envelope).unwrap().as_str(), "hunter2");
    }

    #[test]
    fn ensure_ready_never_reinitializes_on_wrong_password() {
        let dir = tempdir().unwrap();
        session(dir.path())
            .ensure_ready(&Passphrase::new("right"))
            .unwrap();
        let before = std::fs::read(dir.path().join("master.key")).unwrap();

        let s = session(dir.path());
        let err = s.ensure_ready(&Passphrase::new("wrong")).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidCredential);
        assert_eq!(s.status(), Status::Locked);
        assert_eq!(std::fs::read(dir.path().join("master.key")).unwrap(), before);
    }

    #[test]
    fn os_account_mode_is_recorded() {
        let dir = tempdir().unwrap();
        let s = session(dir.path());
        s.ensure_ready(&OsAccount::for_user("tester")).unwrap();

        assert_eq!(s.protection().unwrap(), Protection::OsAccount);
    }

    #[test]
    fn records_roundtrip_as_json() {
        let dir = tempdir().unwrap();
        let s = session(dir.path());
        s.initialize("pw").unwrap();

        let entry = PasswordEntry {
            title: "mail".to_string(),
            username: "me@example.com".to_string(),
            password: "p4ss:w0rd".to_string(),
        };
        let envelope = s.encrypt_record(&entry).unwrap();

        assert!(!envelope.contains("example.com"));
        assert_eq!(s.decrypt_record::<PasswordEntry>(&envelope).unwrap(), entry);
    }

    #[test]
    fn initialize_with_records_provider_protection() {
        let dir = tempdir().unwrap();
        let s = session(dir.path());
        s.initialize_with(&OsAccount::for_user("tester")).unwrap();
        assert_eq!(s.protection().unwrap(), Protection::OsAccount);
        assert_eq!(s.status(), Status::Unlocked);

        let err = s.initialize_with(&Passphrase::new("pw")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyInitialized);
        assert_eq!(s.protection().unwrap(), Protection::OsAccount);
    }

    #[test]
    fn reset_uses_provider_protection() {
        let dir = tempdir().unwrap();
        let s = session(dir.path());
        s.initialize("pw").unwrap();

        s.reset(&OsAccount::for_user("tester")).unwrap();
        assert_eq!(s.protection().unwrap(), Protection::OsAccount);
        assert_eq!(s.status(), Status::Unlocked);
    }
}
