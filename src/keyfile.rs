//! On-disk key file: salt, key fingerprint and the parameters that produced
//! them.
//!
//! ```json
//! { "version": 1, "salt": "<hex>", "keyHash": "<hex>",
//!   "kdf": { "algorithm": "pbkdf2-sha256", "iterations": 10000 },
//!   "protection": "passphrase", "created": "<rfc3339>" }
//! ```
//!
//! Version-less files (only `salt` and `keyHash`) still parse; missing
//! fields fall back to PBKDF2-SHA256 at 10,000 iterations and passphrase
//! protection.
//! Unknown fields are ignored.

use std::fmt;
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::crypto::{Fingerprint, KdfParams};
use crate::error::{Result, VaultError};

/// Current key file version.
pub const VERSION_V1: u32 = 1;

/// How the master password is obtained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Protection {
    /// A secret chosen by the user.
    #[default]
    Passphrase,
    /// Opt-in convenience mode: the secret is derived from the OS account,
    /// so only the OS login protects the vault.
    OsAccount,
}

impl fmt::Display for Protection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passphrase => f.write_str("passphrase"),
            Self::OsAccount => f.write_str("os account"),
        }
    }
}

/// Raw JSON shape. Every field is optional so that a missing required field
/// is reported as corruption rather than a serde error.
#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RawKeyFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<u32>,
    salt: Option<String>,
    key_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kdf: Option<KdfParams>,
    #[serde(skip_serializing_if = "Option::is_none")]
    protection: Option<Protection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    created: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFile {
    version: Option<u32>,
    salt: Vec<u8>,
    key_hash: Fingerprint,
    kdf: KdfParams,
    protection: Protection,
    created: Option<String>,
}

impl KeyFile {
    pub fn new(salt: Vec<u8>, key_hash: Fingerprint, kdf: KdfParams, protection: Protection) -> Self {
        Self {
            version: Some(VERSION_V1),
            salt,
            key_hash,
            kdf,
            protection,
            created: Some(Utc::now().to_rfc3339()),
        }
    }

    /// `None` for files written before versioning.
    pub fn version(&self) -> Option<u32> {
        self.version
    }

    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    pub fn key_hash(&self) -> &Fingerprint {
        &self.key_hash
    }

    pub fn kdf(&self) -> &KdfParams {
        &self.kdf
    }

    pub fn protection(&self) -> Protection {
        self.protection
    }

    pub fn created(&self) -> Option<&str> {
        self.created.as_deref()
    }

    /// Parses key file bytes read from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::KeyFileCorrupt`] if the data is not JSON, a
    /// required field is missing or undecodable, the version is newer than
    /// supported, or the recorded KDF parameters are invalid.
    pub fn parse(path: &Path, data: &[u8]) -> Result<Self> {
        let raw: RawKeyFile = serde_json::from_slice(data)
            .map_err(|e| VaultError::corrupt(path, format!("invalid JSON: {e}")))?;

        if let Some(version) = raw.version {
            if version > VERSION_V1 {
                return Err(VaultError::corrupt(
                    path,
                    format!("unsupported key file version: {version}"),
                ));
            }
        }

        let salt = raw
            .salt
            .ok_or_else(|| VaultError::corrupt(path, "missing salt"))?;
        let salt =
            hex::decode(salt.trim()).map_err(|_| VaultError::corrupt(path, "salt is not hex"))?;
        if salt.is_empty() {
            return Err(VaultError::corrupt(path, "salt is empty"));
        }

        let key_hash = raw
            .key_hash
            .ok_or_else(|| VaultError::corrupt(path, "missing keyHash"))?;
        let key_hash = Fingerprint::from_hex(&key_hash)
            .ok_or_else(|| VaultError::corrupt(path, "keyHash is not a hex SHA-256 digest"))?;

        let kdf = raw.kdf.unwrap_or_default();
        kdf.validate()
            .map_err(|e| VaultError::corrupt(path, e.to_string()))?;

        Ok(Self {
            version: raw.version,
            salt,
            key_hash,
            kdf,
            protection: raw.protection.unwrap_or_default(),
            created: raw.created,
        })
    }

    /// Serializes to pretty-printed JSON. Always writes the current version.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let raw = RawKeyFile {
            version: Some(VERSION_V1),
            salt: Some(hex::encode(&self.salt)),
            key_hash: Some(self.key_hash.to_hex()),
            kdf: Some(self.kdf),
            protection: Some(self.protection),
            created: self.created.clone(),
        };
        Ok(serde_json::to_vec_pretty(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const HASH: &str = "c5e478d59288c841aa530db6845c4c8d962893a001ce4e11a4963873aa98134a";

    fn path() -> &'static Path {
        Path::new("master.key")
    }

    #[test]
    fn keyfile_roundtrip() {
        let kdf = KdfParams::argon2id(1024, 2, 1).unwrap();
        let file = KeyFile::new(
            vec![1u8; 16],
            Fingerprint::from_hex(HASH).unwrap(),
            kdf,
            Protection::OsAccount,
        );

        let bytes = file.to_bytes().unwrap();
        let parsed = KeyFile::parse(path(), &bytes).unwrap();

        assert_eq!(parsed, file);
        assert_eq!(parsed.version(), Some(VERSION_V1));
        assert!(parsed.created().is_some());
    }

    #[test]
    fn versionless_file_uses_defaults() {
        let bare = format!(r#"{{"salt":"000102030405060708090a0b0c0d0e0f","keyHash":"{HASH}"}}"#);
        let parsed = KeyFile::parse(path(), bare.as_bytes()).unwrap();

        assert_eq!(parsed.version(), None);
        assert_eq!(*parsed.kdf(), KdfParams::default());
        assert_eq!(parsed.protection(), Protection::Passphrase);
        assert_eq!(parsed.salt().len(), 16);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let json = format!(
            r#"{{"salt":"00ff","keyHash":"{HASH}","hint":"favourite horse","futureField":[1,2]}}"#
        );
        assert!(KeyFile::parse(path(), json.as_bytes()).is_ok());
    }

    #[test]
    fn missing_or_bad_fields_are_corrupt() {
        let cases = [
            "not json".to_string(),
            "{}".to_string(),
            format!(r#"{{"keyHash":"{HASH}"}}"#),
            r#"{"salt":"00ff"}"#.to_string(),
            format!(r#"{{"salt":"xyz","keyHash":"{HASH}"}}"#),
            format!(r#"{{"salt":"","keyHash":"{HASH}"}}"#),
            r#"{"salt":"00ff","keyHash":"abcd"}"#.to_string(),
            format!(r#"{{"version":99,"salt":"00ff","keyHash":"{HASH}"}}"#),
            format!(
                r#"{{"salt":"00ff","keyHash":"{HASH}","kdf":{{"algorithm":"pbkdf2-sha256","iterations":1}}}}"#
            ),
            format!(r#"{{"salt":"00ff","keyHash":"{HASH}","kdf":{{"algorithm":"scrypt"}}}}"#),
            format!(
                r#"{{"salt":"00ff","keyHash":"{HASH}","kdf":{{"algorithm":"pbkdf2-sha256","iterations":4294967295}}}}"#
            ),
            format!(
                r#"{{"salt":"00ff","keyHash":"{HASH}","kdf":{{"algorithm":"argon2id","memCostKib":268435455,"timeCost":1,"parallelism":1}}}}"#
            ),
        ];

        for case in cases {
            let err = KeyFile::parse(path(), case.as_bytes()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::KeyFileCorrupt, "case: {case}");
        }
    }
}
