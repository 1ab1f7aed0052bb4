//! Whole-file encryption for database snapshots.
//!
//! File bytes are base64-encoded and passed through [`CipherEngine`], so a
//! snapshot is a single envelope string on disk.

use std::fs;
use std::path::Path;

use base64::{Engine, engine::general_purpose::STANDARD};
use tracing::debug;
use zeroize::Zeroizing;

use crate::cipher::CipherEngine;
use crate::error::{Result, VaultError};
use crate::storage::Storage;

#[derive(Debug, Clone, Copy)]
pub struct FileCipher<'a> {
    engine: &'a CipherEngine,
}

impl<'a> FileCipher<'a> {
    pub fn new(engine: &'a CipherEngine) -> Self {
        Self { engine }
    }

    /// Encrypts the raw bytes of `input` into an envelope written to `output`.
    ///
    /// # Errors
    ///
    /// [`VaultError::Io`] if `input` cannot be read or `output` cannot be
    /// written.
    pub fn encrypt_file(&self, input: &Path, output: &Path) -> Result<()> {
        let data = Zeroizing::new(fs::read(input).map_err(|e| VaultError::io(input, e))?);
        let encoded = Zeroizing::new(STANDARD.encode(data.as_slice()));

        let envelope = self.engine.encrypt(&encoded)?;
        Storage::new(output).save(envelope.as_bytes())?;

        debug!(
            input = %input.display(),
            output = %output.display(),
            bytes = data.len(),
            "file encrypted"
        );
        Ok(())
    }

    /// Reverses [`FileCipher::encrypt_file`]. `output` is only written once
    /// decryption has fully succeeded.
    ///
    /// # Errors
    ///
    /// * [`VaultError::Io`] on read or write failure.
    /// * [`VaultError::MalformedEnvelope`] if `input` is not an envelope or
    ///   does not carry base64 content.
    /// * [`VaultError::DecryptionFailed`] on a wrong key or tampered data.
    pub fn decrypt_file(&self, input: &Path, output: &Path) -> Result<()> {
        let raw = fs::read(input).map_err(|e| VaultError::io(input, e))?;
        let envelope = String::from_utf8(raw)
            .map_err(|_| VaultError::MalformedEnvelope("snapshot is not text"))?;

        let encoded = self.engine.decrypt(&envelope)?;
        let data = Zeroizing::new(
            STANDARD
                .decode(encoded.as_bytes())
                .map_err(|_| VaultError::MalformedEnvelope("snapshot payload is not base64"))?,
        );

        Storage::new(output).save(&data)?;

        debug!(
            input = %input.display(),
            output = %output.display(),
            bytes = data.len(),
            "file decrypted"
        );
        Ok(())
    }
}
