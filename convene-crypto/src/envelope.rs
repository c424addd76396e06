//! Secret envelope — symmetric wrap/unwrap of opaque byte strings.
//!
//! AES-256-CBC with PKCS#7 padding. The cipher key is always the SHA-256
//! digest of the raw key material passed in, so callers may hand over
//! variable-length derived keys safely. The IV travels with the ciphertext
//! and is freshly generated for every wrap.

use crate::error::{CryptoError, CryptoResult};
use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// AES block size; IVs must be exactly this long.
pub const IV_LEN: usize = 16;

/// A wrapped value: IV plus ciphertext, stored together.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub iv: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

/// Generates a fresh random IV. One per wrap call — never reuse.
pub fn generate_iv() -> [u8; IV_LEN] {
    let mut iv = [0u8; IV_LEN];
    rand::rngs::OsRng.fill_bytes(&mut iv);
    iv
}

/// Wraps `plaintext` under `key_material` and `iv`.
///
/// The effective cipher key is SHA-256 of `key_material`.
pub fn wrap(key_material: &[u8], iv: &[u8], plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let key = Sha256::digest(key_material);
    let cipher = Aes256CbcEnc::new_from_slices(key.as_slice(), iv).map_err(|_| {
        CryptoError::InvalidIvLength {
            expected: IV_LEN,
            actual: iv.len(),
        }
    })?;
    Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

/// Unwraps `ciphertext` under `key_material` and `iv`.
///
/// Fails with [`CryptoError::DecryptionFailed`] for a wrong key, wrong IV,
/// or corrupted data — uniformly, so callers cannot build an oracle on the
/// distinction.
pub fn unwrap(key_material: &[u8], iv: &[u8], ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
    let key = Sha256::digest(key_material);
    let cipher = Aes256CbcDec::new_from_slices(key.as_slice(), iv)
        .map_err(|_| CryptoError::DecryptionFailed)?;
    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)
}

/// Wraps with a fresh IV and returns both halves as an [`Envelope`].
pub fn seal(key_material: &[u8], plaintext: &[u8]) -> CryptoResult<Envelope> {
    let iv = generate_iv();
    let ciphertext = wrap(key_material, &iv, plaintext)?;
    Ok(Envelope {
        iv: iv.to_vec(),
        ciphertext,
    })
}

/// Opens an [`Envelope`] produced by [`seal`].
pub fn open(key_material: &[u8], envelope: &Envelope) -> CryptoResult<Vec<u8>> {
    unwrap(key_material, &envelope.iv, &envelope.ciphertext)
}
