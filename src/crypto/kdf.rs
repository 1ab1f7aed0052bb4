use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::{Fingerprint, KEY_LEN, KeyMaterial};
use crate::error::{Result, VaultError};

/// PBKDF2 iteration count used when a key file does not record one.
pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 10_000;
/// Lowest PBKDF2 iteration count accepted for new or existing vaults.
pub const MIN_PBKDF2_ITERATIONS: u32 = 1_000;
/// Highest PBKDF2 iteration count accepted; anything above is treated as damage.
pub const MAX_PBKDF2_ITERATIONS: u32 = 10_000_000;
/// Argon2id memory cost for new vaults (64 MiB).
pub const DEFAULT_ARGON2_MEM_KIB: u32 = 64 * 1024;
/// Argon2id passes for new vaults.
pub const DEFAULT_ARGON2_TIME_COST: u32 = 3;
/// Argon2id lanes for new vaults.
pub const DEFAULT_ARGON2_PARALLELISM: u32 = 1;
/// Argon2id upper bounds (4 GiB, 100 passes, 64 lanes).
pub const MAX_ARGON2_MEM_KIB: u32 = 4 * 1024 * 1024;
pub const MAX_ARGON2_TIME_COST: u32 = 100;
pub const MAX_ARGON2_PARALLELISM: u32 = 64;

/// Key stretching algorithm and its work factor.
///
/// Stored in every key file so raising the defaults never strands an
/// existing vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all_fields = "camelCase")]
pub enum KdfParams {
    #[serde(rename = "pbkdf2-sha256")]
    Pbkdf2Sha256 { iterations: u32 },
    #[serde(rename = "argon2id")]
    Argon2id {
        mem_cost_kib: u32,
        time_cost: u32,
        parallelism: u32,
    },
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::Pbkdf2Sha256 {
            iterations: DEFAULT_PBKDF2_ITERATIONS,
        }
    }
}

impl KdfParams {
    pub fn pbkdf2(iterations: u32) -> Result<Self> {
        let params = Self::Pbkdf2Sha256 { iterations };
        params.validate()?;
        Ok(params)
    }

    pub fn argon2id(mem_cost_kib: u32, time_cost: u32, parallelism: u32) -> Result<Self> {
        let params = Self::Argon2id {
            mem_cost_kib,
            time_cost,
            parallelism,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn argon2id_default() -> Self {
        Self::Argon2id {
            mem_cost_kib: DEFAULT_ARGON2_MEM_KIB,
            time_cost: DEFAULT_ARGON2_TIME_COST,
            parallelism: DEFAULT_ARGON2_PARALLELISM,
        }
    }

    pub fn algorithm(&self) -> &'static str {
        match self {
            Self::Pbkdf2Sha256 { .. } => "pbkdf2-sha256",
            Self::Argon2id { .. } => "argon2id",
        }
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            Self::Pbkdf2Sha256 { iterations } => {
                if !(MIN_PBKDF2_ITERATIONS..=MAX_PBKDF2_ITERATIONS).contains(&iterations) {
                    return Err(VaultError::InvalidKdfParams(format!(
                        "pbkdf2 iterations must be between {MIN_PBKDF2_ITERATIONS} and {MAX_PBKDF2_ITERATIONS}"
                    )));
                }
            }
            Self::Argon2id {
                mem_cost_kib,
                time_cost,
                parallelism,
            } => {
                if !(1..=MAX_ARGON2_TIME_COST).contains(&time_cost) {
                    return Err(invalid("argon2 time cost must be between 1 and 100"));
                }
                if !(1..=MAX_ARGON2_PARALLELISM).contains(&parallelism) {
                    return Err(invalid("argon2 parallelism must be between 1 and 64"));
                }
                if mem_cost_kib < 8 * parallelism {
                    return Err(invalid(
                        "argon2 memory cost must be at least 8 * parallelism",
                    ));
                }
                if mem_cost_kib > MAX_ARGON2_MEM_KIB {
                    return Err(invalid("argon2 memory cost must not exceed 4 GiB"));
                }
            }
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> VaultError {
    VaultError::InvalidKdfParams(msg.to_string())
}

/// Derives the master key from a password.
///
/// Deterministic for identical `(password, salt, kdf)`.
pub fn derive_key(password: &str, salt: &[u8], kdf: KdfParams) -> Result<KeyMaterial> {
    kdf.validate()?;

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    match kdf {
        KdfParams::Pbkdf2Sha256 { iterations } => {
            pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut *key);
        }
        KdfParams::Argon2id {
            mem_cost_kib,
            time_cost,
            parallelism,
        } => {
            let params = Params::new(mem_cost_kib, time_cost, parallelism, Some(KEY_LEN))
                .map_err(|e| VaultError::KeyDerivation(format!("argon2 params: {e}")))?;

            Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
                .hash_password_into(password.as_bytes(), salt, &mut *key)
                .map_err(|e| VaultError::KeyDerivation(format!("argon2: {e}")))?;
        }
    }

    Ok(KeyMaterial::from_bytes(*key))
}

/// One-way digest of a derived key, safe to persist.
pub fn fingerprint(key: &KeyMaterial) -> Fingerprint {
    Fingerprint::from_bytes(Sha256::digest(key.as_bytes()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_argon() -> KdfParams {
        KdfParams::argon2id(1024, 1, 1).unwrap()
    }

    #[test]
    fn pbkdf2_matches_known_vector() {
        let mut out = [0u8; 32];
        pbkdf2::pbkdf2_hmac::<Sha256>(b"password", b"salt", 4096, &mut out);
        assert_eq!(
            hex::encode(out),
            "c5e478d59288c841aa530db6845c4c8d962893a001ce4e11a4963873aa98134a"
        );

        let key = derive_key("password", b"salt", KdfParams::pbkdf2(4096).unwrap()).unwrap();
        assert_eq!(key.as_bytes(), &out);
    }

    #[test]
    fn kdf_is_deterministic() {
        let salt = [42u8; 16];

        for kdf in [KdfParams::default(), fast_argon()] {
            let k1 = derive_key("password", &salt, kdf).unwrap();
            let k2 = derive_key("password", &salt, kdf).unwrap();
            assert_eq!(k1.as_bytes(), k2.as_bytes());
            assert_eq!(fingerprint(&k1), fingerprint(&k2));
        }
    }

    #[test]
    fn salt_and_password_change_the_key() {
        let kdf = KdfParams::pbkdf2(MIN_PBKDF2_ITERATIONS).unwrap();
        let base = derive_key("pw", &[1u8; 16], kdf).unwrap();
        let other_salt = derive_key("pw", &[2u8; 16], kdf).unwrap();
        let other_pw = derive_key("pw2", &[1u8; 16], kdf).unwrap();

        assert_ne!(base.as_bytes(), other_salt.as_bytes());
        assert_ne!(base.as_bytes(), other_pw.as_bytes());
    }

    #[test]
    fn kdf_params_affect_output() {
        let salt = [7u8; 16];

        let k1 = derive_key("pw", &salt, KdfParams::pbkdf2(1_000).unwrap()).unwrap();
        let k2 = derive_key("pw", &salt, KdfParams::pbkdf2(1_001).unwrap()).unwrap();
        let k3 = derive_key("pw", &salt, fast_argon()).unwrap();

        assert_ne!(k1.as_bytes(), k2.as_bytes());
        assert_ne!(k1.as_bytes(), k3.as_bytes());
    }

    #[test]
    fn fingerprint_is_not_the_key() {
        let key = derive_key("pw", &[3u8; 16], KdfParams::default()).unwrap();
        assert_ne!(fingerprint(&key).as_bytes(), key.as_bytes());
    }

    #[test]
    fn kdf_invalid_params_fail_gracefully() {
        assert!(KdfParams::pbkdf2(10).is_err());
        assert!(KdfParams::argon2id(0, 0, 0).is_err());
        assert!(KdfParams::argon2id(16, 1, 4).is_err());

        assert!(KdfParams::pbkdf2(MAX_PBKDF2_ITERATIONS).is_ok());
        assert!(KdfParams::pbkdf2(MAX_PBKDF2_ITERATIONS + 1).is_err());
        assert!(KdfParams::pbkdf2(u32::MAX).is_err());
        assert!(KdfParams::argon2id(MAX_ARGON2_MEM_KIB + 1, 1, 1).is_err());
        assert!(KdfParams::argon2id(1024, MAX_ARGON2_TIME_COST + 1, 1).is_err());
        assert!(KdfParams::argon2id(1024, 1, MAX_ARGON2_PARALLELISM + 1).is_err());

        let weak = KdfParams::Pbkdf2Sha256 { iterations: 1 };
        assert!(matches!(
            derive_key("pw", &[0u8; 16], weak),
            Err(VaultError::InvalidKdfParams(_))
        ));
    }

    #[test]
    fn params_serialize_with_algorithm_tag() {
        let json = serde_json::to_value(KdfParams::default()).unwrap();
        assert_eq!(json["algorithm"], "pbkdf2-sha256");
        assert_eq!(json["iterations"], 10_000);

        let json = serde_json::to_value(fast_argon()).unwrap();
        assert_eq!(json["algorithm"], "argon2id");
        assert_eq!(json["memCostKib"], 1024);

        let back: KdfParams = serde_json::from_value(json).unwrap();
        assert_eq!(back, fast_argon());
    }
}
