//! Cryptographic core of the SafeKey secrets vault.
//!
//! A single master key, derived from a password and never written to disk,
//! protects every stored secret. The key file only holds the salt, a
//! fingerprint of the key and the derivation parameters.
//!
//! ```no_run
//! use safekey::{Passphrase, VaultConfig, VaultSession};
//!
//! # fn main() -> safekey::Result<()> {
//! let session = VaultSession::new(&VaultConfig::from_default_location()?);
//! session.ensure_ready(&Passphrase::new("correct-horse"))?;
//!
//! let envelope = session.encrypt("hunter2")?;
//! assert_eq!(session.decrypt(&envelope)?.as_str(), "hunter2");
//! # Ok(())
//! # }
//! ```

pub mod cipher;
pub mod config;
pub mod credentials;
pub mod crypto;
mod error;
pub mod file_cipher;
pub mod keyfile;
pub mod keystore;
pub mod session;
pub mod storage;
pub mod sync;

pub use crate::cipher::CipherEngine;
pub use crate::config::VaultConfig;
pub use crate::credentials::{CredentialProvider, EnvPassphrase, OsAccount, Passphrase};
pub use crate::crypto::{KdfParams, KeyMaterial};
pub use crate::error::{ErrorKind, Result, VaultError};
pub use crate::file_cipher::FileCipher;
pub use crate::keyfile::{KeyFile, Protection};
pub use crate::keystore::{KeyStore, Status};
pub use crate::session::VaultSession;
