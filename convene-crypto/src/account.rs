//! Account material — registration and login flows.
//!
//! Registration mints a random long-term secret and stores it only in
//! wrapped form. Login verifies the password, re-derives the login key and
//! unwraps the secret; the caller is responsible for putting it in the
//! session cache.

use crate::envelope::{generate_iv, unwrap, wrap};
use crate::error::{CryptoError, CryptoResult};
use crate::kdf::{
    derive_login_key, generate_kdf_salt, generate_secret, hash_password, verify_password,
    KdfConfig, LongTermSecret, KEY_SIZE,
};
use serde::{Deserialize, Serialize};

/// Everything the identity collaborator persists for one principal's
/// crypto state. The long-term secret itself never appears here.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccountMaterial {
    pub password_hash: String,
    pub wrapped_secret: Vec<u8>,
    pub wrap_iv: Vec<u8>,
    pub kdf_salt: String,
}

impl From<&convene_types::Principal> for AccountMaterial {
    fn from(principal: &convene_types::Principal) -> Self {
        Self {
            password_hash: principal.password_hash.clone(),
            wrapped_secret: principal.wrapped_secret.clone(),
            wrap_iv: principal.wrap_iv.clone(),
            kdf_salt: principal.kdf_salt.clone(),
        }
    }
}

/// Creates the crypto material for a new account.
///
/// Generates a fresh long-term secret, hashes the password with the
/// deployment-wide salt and wraps the secret under the login key derived
/// with a new per-principal salt.
pub fn create_account(
    password: &str,
    deployment_salt: &str,
    config: &KdfConfig,
) -> CryptoResult<AccountMaterial> {
    let password_hash = hash_password(password, deployment_salt, config)?;
    let kdf_salt = generate_kdf_salt();
    let login_key = derive_login_key(password, &kdf_salt, config)?;

    let secret = generate_secret();
    let iv = generate_iv();
    let wrapped_secret = wrap(login_key.as_bytes(), &iv, secret.as_bytes())?;

    Ok(AccountMaterial {
        password_hash,
        wrapped_secret,
        wrap_iv: iv.to_vec(),
        kdf_salt,
    })
}

/// Verifies the password and unwraps the long-term secret.
///
/// Errors: [`CryptoError::InvalidCredentials`] on a failed password check,
/// [`CryptoError::DecryptionFailed`] if the stored wrap does not open.
pub fn login(password: &str, material: &AccountMaterial, config: &KdfConfig) -> CryptoResult<LongTermSecret> {
    if !verify_password(password, &material.password_hash)? {
        return Err(CryptoError::InvalidCredentials);
    }

    let login_key = derive_login_key(password, &material.kdf_salt, config)?;
    let plaintext = unwrap(login_key.as_bytes(), &material.wrap_iv, &material.wrapped_secret)?;

    if plaintext.len() != KEY_SIZE {
        return Err(CryptoError::InvalidKeyLength {
            expected: KEY_SIZE,
            actual: plaintext.len(),
        });
    }
    let mut bytes = [0u8; KEY_SIZE];
    bytes.copy_from_slice(&plaintext);
    Ok(LongTermSecret::from_bytes(bytes))
}

/// Re-wraps the long-term secret under a new password.
///
/// The secret itself is unchanged, so every meeting grant wrapped under it
/// keeps working. Mints a fresh KDF salt and IV along with the new hash.
pub fn rewrap_secret(
    old_password: &str,
    new_password: &str,
    deployment_salt: &str,
    material: &AccountMaterial,
    config: &KdfConfig,
) -> CryptoResult<AccountMaterial> {
    let secret = login(old_password, material, config)?;

    let password_hash = hash_password(new_password, deployment_salt, config)?;
    let kdf_salt = generate_kdf_salt();
    let login_key = derive_login_key(new_password, &kdf_salt, config)?;
    let iv = generate_iv();
    let wrapped_secret = wrap(login_key.as_bytes(), &iv, secret.as_bytes())?;

    Ok(AccountMaterial {
        password_hash,
        wrapped_secret,
        wrap_iv: iv.to_vec(),
        kdf_salt,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_login_recovers_secret() {
        let cfg = KdfConfig::insecure_test();
        let material = create_account("opensesame99", "pepper", &cfg).unwrap();
        let first = login("opensesame99", &material, &cfg).unwrap();
        let second = login("opensesame99", &material, &cfg).unwrap();
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn wrong_password_is_invalid_credentials() {
        let cfg = KdfConfig::insecure_test();
        let material = create_account("opensesame99", "pepper", &cfg).unwrap();
        assert!(matches!(
            login("wrong", &material, &cfg),
            Err(CryptoError::InvalidCredentials)
        ));
    }

    #[test]
    fn rewrap_preserves_secret() {
        let cfg = KdfConfig::insecure_test();
        let material = create_account("old-password", "pepper", &cfg).unwrap();
        let before = login("old-password", &material, &cfg).unwrap();

        let rewrapped = rewrap_secret("old-password", "new-password", "pepper", &material, &cfg)
            .unwrap();
        assert_ne!(rewrapped.kdf_salt, material.kdf_salt);

        let after = login("new-password", &rewrapped, &cfg).unwrap();
        assert_eq!(before.as_bytes(), after.as_bytes());
        assert!(matches!(
            login("old-password", &rewrapped, &cfg),
            Err(CryptoError::InvalidCredentials)
        ));
    }
}
