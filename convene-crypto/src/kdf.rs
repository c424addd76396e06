//! Password hashing and key derivation.
//!
//! Two independent derivations come out of one password:
//!
//! - A verifiable Argon2id hash, salted with the deployment-wide salt,
//!   used only to check the password at login.
//! - A deterministic PBKDF2-HMAC-SHA512 login key, salted with a
//!   per-principal salt, used only to wrap/unwrap the long-term secret.
//!
//! The login key must re-derive to the same bytes at every login, which is
//! why it uses its own salt and never the adaptive hash.

use crate::error::{CryptoError, CryptoResult};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of every symmetric key handled by this crate, in bytes.
pub const KEY_SIZE: usize = 32;

/// Iteration floor for the login-key derivation.
const PBKDF2_MIN_ITERATIONS: u32 = 100_000;

/// Tunable work factors for both derivations.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KdfConfig {
    /// Argon2id memory cost in KiB.
    pub argon2_memory_kib: u32,
    /// Argon2id iteration count.
    pub argon2_iterations: u32,
    /// Argon2id lane count.
    pub argon2_parallelism: u32,
    /// PBKDF2 iteration count. Values below 100,000 are clamped up.
    pub pbkdf2_iterations: u32,
}

impl Default for KdfConfig {
    fn default() -> Self {
        Self {
            argon2_memory_kib: 19_456,
            argon2_iterations: 2,
            argon2_parallelism: 1,
            pbkdf2_iterations: PBKDF2_MIN_ITERATIONS,
        }
    }
}

impl KdfConfig {
    /// Cheap parameters for tests. Never use outside test code.
    pub fn insecure_test() -> Self {
        Self {
            argon2_memory_kib: 8,
            argon2_iterations: 1,
            argon2_parallelism: 1,
            pbkdf2_iterations: PBKDF2_MIN_ITERATIONS,
        }
    }

    fn argon2(&self) -> CryptoResult<Argon2<'static>> {
        let params = Params::new(
            self.argon2_memory_kib,
            self.argon2_iterations,
            self.argon2_parallelism,
            None,
        )
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// The key that wraps a principal's long-term secret. Derived, never stored.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct WrapKey([u8; KEY_SIZE]);

impl WrapKey {
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

/// A principal's long-term secret. Exists unwrapped only in memory
/// (session cache); at rest it is always wrapped under the login key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct LongTermSecret([u8; KEY_SIZE]);

impl LongTermSecret {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

/// A meeting's data key. Reconstructed by unwrapping any one granted copy;
/// never persisted in plaintext.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MeetingDataKey([u8; KEY_SIZE]);

impl MeetingDataKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for MeetingDataKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MeetingDataKey(REDACTED)")
    }
}

/// Generates a fresh random long-term secret.
pub fn generate_secret() -> LongTermSecret {
    let mut bytes = [0u8; KEY_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    LongTermSecret(bytes)
}

/// Generates a fresh random meeting data key.
pub fn generate_data_key() -> MeetingDataKey {
    let mut bytes = [0u8; KEY_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    MeetingDataKey(bytes)
}

/// Generates a random per-principal KDF salt (hex, 16 bytes of entropy).
pub fn generate_kdf_salt() -> String {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Hashes a password with Argon2id, salted with the deployment-wide salt.
///
/// Returns a PHC string embedding the parameters and salt, so
/// [`verify_password`] needs no out-of-band inputs.
///
/// Errors with [`CryptoError::InvalidCredentialsInput`] if the password or
/// salt is empty.
pub fn hash_password(
    password: &str,
    deployment_salt: &str,
    config: &KdfConfig,
) -> CryptoResult<String> {
    if password.is_empty() || deployment_salt.is_empty() {
        return Err(CryptoError::InvalidCredentialsInput);
    }

    // Argon2 salts cap at 64 base64 chars; digest the deployment salt down
    // to a fixed 32 bytes so arbitrarily long salt strings stay valid.
    let digest = Sha256::digest(deployment_salt.as_bytes());
    let salt = SaltString::encode_b64(digest.as_slice())
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    let hash = config
        .argon2()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    Ok(hash.to_string())
}

/// Verifies a password against a stored PHC hash string.
pub fn verify_password(password: &str, stored_hash: &str) -> CryptoResult<bool> {
    if password.is_empty() {
        return Err(CryptoError::InvalidCredentialsInput);
    }
    let parsed =
        PasswordHash::new(stored_hash).map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Derives the login key from a password and the per-principal KDF salt.
///
/// PBKDF2-HMAC-SHA512 with at least 100,000 iterations produces 64 bytes;
/// bytes 32..64 become the wrap key. Deterministic for the same inputs, so
/// the same key is re-derived at every login.
pub fn derive_login_key(
    password: &str,
    kdf_salt: &str,
    config: &KdfConfig,
) -> CryptoResult<WrapKey> {
    if password.is_empty() || kdf_salt.is_empty() {
        return Err(CryptoError::InvalidCredentialsInput);
    }

    let iterations = config.pbkdf2_iterations.max(PBKDF2_MIN_ITERATIONS);
    let mut output = [0u8; 64];
    pbkdf2::pbkdf2_hmac::<Sha512>(
        password.as_bytes(),
        kdf_salt.as_bytes(),
        iterations,
        &mut output,
    );

    let mut key = [0u8; KEY_SIZE];
    key.copy_from_slice(&output[KEY_SIZE..]);
    output.zeroize();
    Ok(WrapKey(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_key_is_deterministic() {
        let cfg = KdfConfig::default();
        let a = derive_login_key("hunter2hunter2", "73616c74", &cfg).unwrap();
        let b = derive_login_key("hunter2hunter2", "73616c74", &cfg).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn login_key_differs_by_salt() {
        let cfg = KdfConfig::default();
        let a = derive_login_key("hunter2hunter2", "salt-one", &cfg).unwrap();
        let b = derive_login_key("hunter2hunter2", "salt-two", &cfg).unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn empty_inputs_rejected() {
        let cfg = KdfConfig::default();
        assert!(matches!(
            derive_login_key("", "salt", &cfg),
            Err(CryptoError::InvalidCredentialsInput)
        ));
        assert!(matches!(
            derive_login_key("pw", "", &cfg),
            Err(CryptoError::InvalidCredentialsInput)
        ));
        assert!(matches!(
            hash_password("", "pepper", &cfg),
            Err(CryptoError::InvalidCredentialsInput)
        ));
        assert!(matches!(
            hash_password("pw", "", &cfg),
            Err(CryptoError::InvalidCredentialsInput)
        ));
    }

    #[test]
    fn password_hash_verifies() {
        let cfg = KdfConfig::insecure_test();
        let hash = hash_password("correct horse", "deployment-pepper", &cfg).unwrap();
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn generated_keys_are_unique() {
        assert_ne!(generate_secret().as_bytes(), generate_secret().as_bytes());
        assert_ne!(generate_kdf_salt(), generate_kdf_salt());
    }
}
